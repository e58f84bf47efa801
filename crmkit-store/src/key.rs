//! Collection keys derived from object apiNames.

/// Deterministic collection key for an object: lower-cased and pluralized.
///
/// Names ending in `y` become `...ies`; everything else gains an `s`.
///
/// ```
/// use crmkit_store::collection_key;
/// assert_eq!(collection_key("Contact"), "contacts");
/// assert_eq!(collection_key("Company"), "companies");
/// ```
pub fn collection_key(api_name: &str) -> String {
    let lower = api_name.to_lowercase();
    match lower.strip_suffix('y') {
        Some(stem) => format!("{stem}ies"),
        None => format!("{lower}s"),
    }
}
