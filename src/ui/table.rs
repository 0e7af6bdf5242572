use eframe::egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::CellValue;
use crate::state::Session;

// ---------------------------------------------------------------------------
// Preview table (central panel)
// ---------------------------------------------------------------------------

/// Visible rows of the active columns, capped at `preview_rows`.
pub fn preview_table(ui: &mut Ui, session: &Session) {
    let Some(active) = &session.active else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to preview it");
        });
        return;
    };

    let table = &active.dataset.table;
    let columns: Vec<(usize, &str, &'static str)> = active
        .active_columns
        .iter()
        .filter_map(|name| {
            let idx = table.column_index(name)?;
            let category = active.dataset.column(name)?.category.label();
            Some((idx, name.as_str(), category))
        })
        .collect();
    let rows: Vec<usize> = active
        .view
        .indices
        .iter()
        .copied()
        .take(session.settings.preview_rows)
        .collect();

    if rows.len() < active.view.len() {
        ui.label(RichText::new(format!("Showing the first {} of {} visible rows", rows.len(), active.view.len())).weak());
    }

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .column(Column::auto().at_least(40.0))
        .columns(Column::initial(120.0).at_least(40.0).clip(true), columns.len())
        .header(36.0, |mut header| {
            header.col(|ui| {
                ui.strong("#");
            });
            for (_, name, category) in &columns {
                header.col(|ui| {
                    ui.vertical(|ui| {
                        ui.strong(*name);
                        ui.label(RichText::new(*category).weak().small());
                    });
                });
            }
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let source = rows[row.index()];
                row.col(|ui| {
                    ui.label(RichText::new(source.to_string()).weak());
                });
                for (idx, _, _) in &columns {
                    row.col(|ui| {
                        let cell = &table.rows[source][*idx];
                        match cell {
                            CellValue::Null => ui.label(RichText::new("—").weak()),
                            other => ui.label(other.to_string()),
                        };
                    });
                }
            });
        });
}
