//! Layout composition into row/column grids.
//!
//! Each section becomes an `OrderedSectionGrid`: cells at
//! `(order / columns, column)` where `column` defaults to `order % columns`.
//! Cells iterate row-major. Fields that land on the same cell, a modeling
//! error, stay in declaration order.

use crmkit_schema::{Diagnostic, FieldLookup, PageLayout, Record, Section};
use serde::Serialize;
use tracing::warn;

use crate::visibility::{evaluate, evaluate_detailed};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub api_name: String,
    pub order: usize,
    pub row: usize,
    pub column: usize,
}

/// One section laid out as a sparse grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedSectionGrid {
    pub tab: String,
    pub tab_order: usize,
    pub label: String,
    pub order: usize,
    pub columns: usize,
    /// Row-major, then column, then declaration order
    pub cells: Vec<GridCell>,
}

impl OrderedSectionGrid {
    pub fn row_count(&self) -> usize {
        self.cells.last().map_or(0, |c| c.row + 1)
    }

    /// Grid width: the section's columns, widened by any explicit column beyond it.
    pub fn width(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.column + 1)
            .max()
            .unwrap_or(0)
            .max(self.columns)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&GridCell> {
        self.cells
            .iter()
            .find(|c| c.row == row && c.column == column)
    }

    /// The rectangular grid with `None` for empty slots.
    pub fn rows(&self) -> Vec<Vec<Option<&GridCell>>> {
        let width = self.width();
        (0..self.row_count())
            .map(|row| (0..width).map(|col| self.cell(row, col)).collect())
            .collect()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|c| c.api_name.as_str())
    }
}

/// A layout filtered to what is currently visible for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposedForm {
    pub sections: Vec<OrderedSectionGrid>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Every section of `layout` as a grid, tabs then sections in ascending order.
pub fn compose(layout: &PageLayout) -> Vec<OrderedSectionGrid> {
    compose_where(layout, |_| true, |_, _| true)
}

/// Like `compose`, dropping hidden sections, hidden fields and fields the
/// object does not define.
pub fn compose_visible(
    layout: &PageLayout,
    record: &Record,
    fields: &impl FieldLookup,
) -> ComposedForm {
    let mut diagnostics = Vec::new();

    let sections = compose_where(
        layout,
        |section| {
            let shown = evaluate_detailed(section.visible_if.as_ref(), record);
            diagnostics.extend(shown.diagnostics);
            shown.visible
        },
        |_, api_name| match fields.field(api_name) {
            Some(field) => evaluate(field.visible_if.as_ref(), record),
            None => {
                warn!(layout = %layout.id, field = api_name, "layout references unknown field");
                false
            }
        },
    );

    for section in layout.tabs.iter().flat_map(|t| &t.sections) {
        for placed in &section.fields {
            if fields.field(&placed.api_name).is_none() {
                diagnostics.push(Diagnostic::unknown_field(
                    &placed.api_name,
                    &format!("layout '{}'", layout.id),
                ));
            }
        }
    }

    ComposedForm {
        sections,
        diagnostics,
    }
}

fn compose_where(
    layout: &PageLayout,
    mut keep_section: impl FnMut(&Section) -> bool,
    mut keep_field: impl FnMut(&Section, &str) -> bool,
) -> Vec<OrderedSectionGrid> {
    let mut tabs: Vec<_> = layout.tabs.iter().collect();
    tabs.sort_by_key(|t| t.order);

    let mut out = Vec::new();
    for tab in tabs {
        let mut sections: Vec<_> = tab.sections.iter().collect();
        sections.sort_by_key(|s| s.order);

        for section in sections {
            if !keep_section(section) {
                continue;
            }
            let columns = section.effective_columns();
            let mut cells: Vec<GridCell> = section
                .fields
                .iter()
                .filter(|f| keep_field(section, &f.api_name))
                .map(|f| GridCell {
                    api_name: f.api_name.clone(),
                    order: f.order,
                    row: f.order / columns,
                    column: f.column.unwrap_or(f.order % columns),
                })
                .collect();
            // Stable: ties keep declaration order
            cells.sort_by_key(|c| (c.row, c.column));

            out.push(OrderedSectionGrid {
                tab: tab.label.clone(),
                tab_order: tab.order,
                label: section.label.clone(),
                order: section.order,
                columns,
                cells,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmkit_schema::{
        crm_defaults, ConditionNode, FieldDef, FieldType, LayoutField, LayoutType, ObjectDef,
        Schema, Tab,
    };

    fn layout_with(columns: usize, orders: &[usize]) -> PageLayout {
        let mut section = Section::new("S", 0, columns);
        for (i, order) in orders.iter().enumerate() {
            section = section.field(LayoutField::new(format!("f{i}"), *order));
        }
        PageLayout::new("l", "L", LayoutType::Create).tab(Tab::new("T", 0).section(section))
    }

    #[test]
    fn grid_round_trips_order_and_columns() {
        for columns in 1..=3 {
            let orders: Vec<usize> = (0..7).collect();
            let grids = compose(&layout_with(columns, &orders));
            let grid = &grids[0];
            assert_eq!(grid.cells.len(), orders.len());
            for cell in &grid.cells {
                assert_eq!(cell.row, cell.order / columns);
                assert_eq!(cell.column, cell.order % columns);
            }
            // Row-major iteration reproduces ascending order
            let seen: Vec<usize> = grid.cells.iter().map(|c| c.order).collect();
            assert_eq!(seen, orders);
        }
    }

    #[test]
    fn rows_are_rectangular_and_sparse() {
        let grid = &compose(&layout_with(3, &[0, 2, 4]))[0];
        let rows = grid.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(rows[0][0].map(|c| c.api_name.as_str()), Some("f0"));
        assert!(rows[0][1].is_none());
        assert_eq!(rows[0][2].map(|c| c.api_name.as_str()), Some("f1"));
        assert_eq!(rows[1][1].map(|c| c.api_name.as_str()), Some("f2"));
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let grid = &compose(&layout_with(2, &[3, 1, 1, 0]))[0];
        let names: Vec<_> = grid.field_names().collect();
        assert_eq!(names, ["f3", "f1", "f2", "f0"]);
    }

    #[test]
    fn explicit_column_overrides_derived_column() {
        let section = Section::new("S", 0, 2)
            .field(LayoutField::new("left", 0))
            .field(LayoutField::new("right", 1).at_column(1))
            .field(LayoutField::new("pinned", 2).at_column(1));
        let layout =
            PageLayout::new("l", "L", LayoutType::Edit).tab(Tab::new("T", 0).section(section));
        let grid = &compose(&layout)[0];
        assert_eq!(grid.cell(1, 1).unwrap().api_name, "pinned");
        assert!(grid.cell(1, 0).is_none());
    }

    #[test]
    fn tabs_and_sections_sorted_by_order() {
        let layout = PageLayout::new("l", "L", LayoutType::Edit)
            .tab(
                Tab::new("Second", 1)
                    .section(Section::new("B2", 1, 1))
                    .section(Section::new("B1", 0, 1)),
            )
            .tab(Tab::new("First", 0).section(Section::new("A", 0, 1)));
        let labels: Vec<_> = compose(&layout).into_iter().map(|g| g.label).collect();
        assert_eq!(labels, ["A", "B1", "B2"]);
    }

    #[test]
    fn empty_layouts_render_empty() {
        let layout = PageLayout::new("l", "L", LayoutType::Create);
        assert!(compose(&layout).is_empty());

        let layout = layout.tab(Tab::new("Empty", 0));
        assert!(compose(&layout).is_empty());

        let grid = &compose(&layout_with(2, &[]))[0];
        assert_eq!(grid.row_count(), 0);
        assert!(grid.rows().is_empty());
    }

    #[test]
    fn out_of_range_columns_are_clamped() {
        let grid = &compose(&layout_with(7, &[0, 1, 2, 3]))[0];
        assert_eq!(grid.columns, 3);
        assert_eq!(grid.cell(1, 0).unwrap().api_name, "f3");
    }

    #[test]
    fn compose_visible_follows_record_state() {
        let schema = Schema::new(crm_defaults().objects().to_vec());
        let deal = schema.object("Deal").unwrap();
        let layout = deal.default_layout(LayoutType::Edit).unwrap();

        let open = Record::new("d").with("stage", "Proposal");
        let form = compose_visible(layout, &open, deal);
        let names: Vec<_> = form.sections.iter().flat_map(|s| s.field_names()).collect();
        assert!(!names.contains(&"lossReason"));
        assert!(form.diagnostics.is_empty());

        let lost = Record::new("d").with("stage", "Closed Lost");
        let form = compose_visible(layout, &lost, deal);
        let names: Vec<_> = form.sections.iter().flat_map(|s| s.field_names()).collect();
        assert!(names.contains(&"lossReason"));
    }

    #[test]
    fn compose_visible_drops_hidden_sections_and_unknown_fields() {
        let object = ObjectDef::new("Lead", "Lead")
            .with_field(FieldDef::new("company", "Company", FieldType::Text));
        let mut hidden = Section::new("Hidden", 1, 1).field(LayoutField::new("company", 0));
        hidden.visible_if = Some(ConditionNode::leaf("company", "equals", "never"));
        let layout = PageLayout::new("l", "L", LayoutType::Create).tab(
            Tab::new("T", 0)
                .section(
                    Section::new("Main", 0, 1)
                        .field(LayoutField::new("company", 0))
                        .field(LayoutField::new("ghost", 1)),
                )
                .section(hidden),
        );

        let form = compose_visible(&layout, &Record::new("r"), &object);
        assert_eq!(form.sections.len(), 1);
        assert_eq!(form.sections[0].field_names().collect::<Vec<_>>(), ["company"]);
        assert_eq!(form.diagnostics.len(), 1);
        assert_eq!(form.diagnostics[0].subject, "ghost");
    }
}
