//! Built-in CRM objects.
//!
//! `crm_defaults()` provides the standard Account, Contact, Deal and Product
//! objects. They are passed to `SchemaContext::open().with_defaults()` to
//! seed a fresh schema directory; administrators then extend or replace them.

use serde_json::json;

use crate::condition::ConditionNode;
use crate::context::SchemaDefaults;
use crate::types::{
    FieldDef, FieldType, LayoutField, LayoutType, ObjectDef, PageLayout, RecordType, Section, Tab,
    ValidationRule,
};

/// All built-in objects.
pub fn crm_defaults() -> SchemaDefaults {
    SchemaDefaults::new()
        .object(account())
        .object(contact())
        .object(deal())
        .object(product())
}

fn account() -> ObjectDef {
    let mut number = FieldDef::new("accountNumber", "Account Number", FieldType::AutoNumber);
    number.display_format = Some("ACC-{0000}".into());

    ObjectDef::new("Account", "Account")
        .with_field(number)
        .with_field(
            FieldDef::new("accountName", "Account Name", FieldType::Text)
                .required()
                .with_length(None, Some(255)),
        )
        .with_field(
            FieldDef::new("industry", "Industry", FieldType::Picklist).with_picklist([
                "Technology",
                "Finance",
                "Healthcare",
                "Retail",
                "Other",
            ]),
        )
        .with_field(FieldDef::new("website", "Website", FieldType::Url))
        .with_field(FieldDef::new("phone", "Phone", FieldType::Phone))
        .with_field(FieldDef::new(
            "billingAddress",
            "Billing Address",
            FieldType::Address,
        ))
        .with_field(
            FieldDef::new("annualRevenue", "Annual Revenue", FieldType::Currency)
                .with_range(Some(0.0), None),
        )
        .with_layout(
            PageLayout::new("account-create", "New Account", LayoutType::Create)
                .as_default()
                .tab(
                    Tab::new("Details", 0)
                        .section(
                            Section::new("Account Information", 0, 2)
                                .field(LayoutField::new("accountName", 0))
                                .field(LayoutField::new("industry", 1))
                                .field(LayoutField::new("website", 2))
                                .field(LayoutField::new("phone", 3)),
                        )
                        .section(
                            Section::new("Address", 1, 1)
                                .field(LayoutField::new("billingAddress", 0))
                                .field(LayoutField::new("annualRevenue", 1)),
                        ),
                ),
        )
        .with_layout(
            PageLayout::new("account-edit", "Edit Account", LayoutType::Edit)
                .as_default()
                .tab(
                    Tab::new("Details", 0).section(
                        Section::new("Account Information", 0, 2)
                            .field(LayoutField::new("accountNumber", 0))
                            .field(LayoutField::new("accountName", 1))
                            .field(LayoutField::new("industry", 2))
                            .field(LayoutField::new("website", 3))
                            .field(LayoutField::new("phone", 4))
                            .field(LayoutField::new("annualRevenue", 5)),
                    ),
                ),
        )
}

fn contact() -> ObjectDef {
    let contact_layout = |id: &str, name: &str, layout_type: LayoutType| {
        PageLayout::new(id, name, layout_type).as_default().tab(
            Tab::new("Contact", 0)
                .section(
                    Section::new("Name", 0, 2)
                        .field(LayoutField::new("firstName", 0))
                        .field(LayoutField::new("lastName", 1))
                        .field(LayoutField::new("email", 2))
                        .field(LayoutField::new("phone", 3))
                        .field(LayoutField::new("account", 4)),
                )
                .section(
                    Section::new("Preferences", 1, 1)
                        .field(LayoutField::new("doNotCall", 0))
                        .field(LayoutField::new("preferredChannel", 1)),
                ),
        )
    };

    ObjectDef::new("Contact", "Contact")
        .with_field(FieldDef::new("firstName", "First Name", FieldType::Text))
        .with_field(
            FieldDef::new("lastName", "Last Name", FieldType::Text)
                .required()
                .with_length(Some(1), Some(80)),
        )
        .with_field(FieldDef::new("email", "Email", FieldType::Email))
        .with_field(FieldDef::new("phone", "Phone", FieldType::Phone))
        .with_field(FieldDef::new("account", "Account", FieldType::Lookup).with_lookup("Account"))
        .with_field(FieldDef::new("doNotCall", "Do Not Call", FieldType::Checkbox))
        .with_field(
            FieldDef::new(
                "preferredChannel",
                "Preferred Channel",
                FieldType::MultiPicklist,
            )
            .with_picklist(["Email", "Phone", "SMS"])
            .with_visible_if(ConditionNode::leaf("doNotCall", "notEquals", true)),
        )
        .with_layout(contact_layout(
            "contact-create",
            "New Contact",
            LayoutType::Create,
        ))
        .with_layout(contact_layout(
            "contact-edit",
            "Edit Contact",
            LayoutType::Edit,
        ))
}

fn deal() -> ObjectDef {
    let mut deal = ObjectDef::new("Deal", "Deal")
        .with_field(FieldDef::new("dealName", "Deal Name", FieldType::Text).required())
        .with_field(
            FieldDef::new("value", "Value", FieldType::Currency)
                .required()
                .with_range(Some(0.0), None),
        )
        .with_field(
            FieldDef::new("stage", "Stage", FieldType::Picklist).with_picklist([
                "Proposal",
                "Negotiation",
                "Closed Won",
                "Closed Lost",
            ]),
        )
        .with_field(
            FieldDef::new("probability", "Probability", FieldType::Percent)
                .with_range(Some(0.0), Some(100.0)),
        )
        .with_field(FieldDef::new("closeDate", "Close Date", FieldType::Date))
        .with_field(FieldDef::new("account", "Account", FieldType::Lookup).with_lookup("Account"))
        .with_field(
            FieldDef::new("lossReason", "Loss Reason", FieldType::LongText)
                .with_visible_if(ConditionNode::leaf("stage", "equals", "Closed Lost")),
        )
        .with_layout(
            PageLayout::new("deal-create", "New Deal", LayoutType::Create)
                .as_default()
                .tab(
                    Tab::new("Deal", 0).section(
                        Section::new("Deal Information", 0, 2)
                            .field(LayoutField::new("dealName", 0))
                            .field(LayoutField::new("account", 1))
                            .field(LayoutField::new("value", 2))
                            .field(LayoutField::new("stage", 3))
                            .field(LayoutField::new("probability", 4))
                            .field(LayoutField::new("closeDate", 5)),
                    ),
                ),
        )
        .with_layout(
            PageLayout::new("deal-edit", "Edit Deal", LayoutType::Edit)
                .as_default()
                .tab(
                    Tab::new("Deal", 0)
                        .section(
                            Section::new("Deal Information", 0, 2)
                                .field(LayoutField::new("dealName", 0))
                                .field(LayoutField::new("account", 1))
                                .field(LayoutField::new("value", 2))
                                .field(LayoutField::new("stage", 3))
                                .field(LayoutField::new("probability", 4))
                                .field(LayoutField::new("closeDate", 5)),
                        )
                        .section(
                            Section::new("Outcome", 1, 1).field(LayoutField::new("lossReason", 0)),
                        ),
                ),
        )
        .with_record_type(RecordType {
            id: "standard".into(),
            label: "Standard Deal".into(),
            page_layout_id: "deal-edit".into(),
        })
        .with_rule(ValidationRule {
            name: "won_deals_need_close_date".into(),
            condition: ConditionNode::and(vec![
                ConditionNode::leaf("stage", "equals", "Closed Won"),
                ConditionNode::leaf("closeDate", "isEmpty", json!(null)),
            ]),
            error_message: "Closed Won deals need a close date".into(),
            error_field: Some("closeDate".into()),
            active: true,
        });
    deal.default_record_type_id = Some("standard".into());
    deal
}

fn product() -> ObjectDef {
    ObjectDef::new("Product", "Product")
        .with_field(FieldDef::new("productName", "Product Name", FieldType::Text).required())
        .with_field(FieldDef::new("sku", "SKU", FieldType::Text).with_length(None, Some(32)))
        .with_field(
            FieldDef::new("unitPrice", "Unit Price", FieldType::Currency)
                .required()
                .with_range(Some(0.0), None),
        )
        .with_field(FieldDef::new("active", "Active", FieldType::Checkbox))
        .with_layout(
            PageLayout::new("product-create", "New Product", LayoutType::Create)
                .as_default()
                .tab(
                    Tab::new("Product", 0).section(
                        Section::new("Product Information", 0, 3)
                            .field(LayoutField::new("productName", 0))
                            .field(LayoutField::new("sku", 1))
                            .field(LayoutField::new("unitPrice", 2))
                            .field(LayoutField::new("active", 3)),
                    ),
                ),
        )
}
