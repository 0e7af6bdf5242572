use std::collections::BTreeSet;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::app::CentralView;
use crate::data::classify::ColumnCategory;
use crate::data::error::FilterError;
use crate::data::filter::Predicate;
use crate::data::model::CellValue;
use crate::state::Session;

// ---------------------------------------------------------------------------
// Left side panel – columns and filter widgets
// ---------------------------------------------------------------------------

/// How a column is filtered in the side panel.
enum FilterWidget {
    Years(Vec<i32>),
    Range { lo: f64, hi: f64 },
    Values(BTreeSet<CellValue>),
}

/// Render the left panel: colour selector, column browser, filters.
pub fn side_panel(ui: &mut Ui, session: &mut Session) {
    ui.heading("Data");
    ui.separator();

    let Some(active) = session.active.as_ref() else {
        ui.label("No dataset loaded.");
        ui.label(RichText::new("Open a file or drop one onto the window.").weak());
        return;
    };

    // Clone what we need so we can mutate the session inside the loop.
    let groups = active.groups.clone();
    let active_columns = active.active_columns.clone();
    let color_column = active.color_column.clone();
    let widgets: Vec<(String, FilterWidget)> = active_columns
        .iter()
        .filter_map(|name| {
            let column = active.dataset.column(name)?;
            let idx = active.dataset.table.column_index(name)?;
            let widget = filter_widget(
                column.category,
                &active.dataset.table.unique_values[idx],
                session.settings.max_filter_values,
            )?;
            Some((name.clone(), widget))
        })
        .collect();
    let categories: Vec<(String, &'static str)> = active
        .dataset
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.category.label()))
        .collect();

    let mut errors: Vec<FilterError> = Vec::new();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Colour-by selector ----
            ui.strong("Color by");
            let current = color_column.clone().unwrap_or_else(|| "(none)".to_string());
            egui::ComboBox::from_id_salt("color_by")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    if ui.selectable_label(color_column.is_none(), "(none)").clicked() {
                        session.set_color_column(None);
                    }
                    for col in &active_columns {
                        if ui
                            .selectable_label(color_column.as_deref() == Some(col), col)
                            .clicked()
                        {
                            session.set_color_column(Some(col.clone()));
                        }
                    }
                });
            if let Some(cm) = session.active.as_ref().and_then(|a| a.color_map.as_ref()) {
                for (label, color) in cm.legend_entries().into_iter().take(12) {
                    ui.label(RichText::new(format!("■ {label}")).color(color));
                }
            }
            ui.separator();

            // ---- Column browser by group ----
            egui::CollapsingHeader::new(RichText::new("Columns").strong())
                .id_salt("columns")
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    for (group, names) in &groups {
                        egui::CollapsingHeader::new(format!("{}  ({})", group.label(), names.len()))
                            .id_salt(group.label())
                            .show(ui, |ui: &mut Ui| {
                                for name in names {
                                    let mut checked = active_columns.contains(name);
                                    let kind = categories
                                        .iter()
                                        .find(|(n, _)| n == name)
                                        .map(|(_, label)| *label)
                                        .unwrap_or_default();
                                    ui.horizontal(|ui: &mut Ui| {
                                        if ui.checkbox(&mut checked, name).changed() {
                                            session.toggle_active_column(name);
                                        }
                                        ui.label(RichText::new(kind).weak().small());
                                    });
                                }
                            });
                    }
                });
            ui.separator();

            // ---- Filters ----
            ui.horizontal(|ui: &mut Ui| {
                ui.strong("Filters");
                if ui.small_button("Clear all").clicked() {
                    session.clear_filters();
                }
            });

            for (col, widget) in &widgets {
                let filtered = session.filter_for(col).is_some();
                let header = if filtered {
                    RichText::new(format!("{col} ●")).strong()
                } else {
                    RichText::new(col).strong()
                };
                egui::CollapsingHeader::new(header)
                    .id_salt(("filter", col))
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        let result = match widget {
                            FilterWidget::Years(years) => year_checkboxes(ui, session, col, years),
                            FilterWidget::Range { lo, hi } => range_editor(ui, session, col, *lo, *hi),
                            FilterWidget::Values(values) => value_checkboxes(ui, session, col, values),
                        };
                        if let Err(e) = result {
                            errors.push(e);
                        }
                    });
            }
        });

    if let Some(e) = errors.pop() {
        session.status_message = Some(format!("Error: {e}"));
    }
}

fn filter_widget(
    category: ColumnCategory,
    unique: &BTreeSet<CellValue>,
    max_values: usize,
) -> Option<FilterWidget> {
    if category.is_year_extractable() {
        let years: BTreeSet<i32> = unique.iter().filter_map(CellValue::year).collect();
        return Some(FilterWidget::Years(years.into_iter().collect()));
    }
    if category.is_numeric_valued() || category.is_datetime() {
        let numbers = unique.iter().filter_map(|v| match v {
            CellValue::DateTime(d) => Some(f64::from(chrono::Datelike::year(d))),
            other => other.as_f64(),
        });
        let (lo, hi) = numbers.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        return lo.is_finite().then_some(FilterWidget::Range { lo, hi });
    }
    (category == ColumnCategory::Categorical && unique.len() <= max_values)
        .then(|| FilterWidget::Values(unique.clone()))
}

fn year_checkboxes(ui: &mut Ui, session: &mut Session, col: &str, years: &[i32]) -> Result<(), FilterError> {
    let selected: BTreeSet<i32> = match session.filter_for(col).map(|f| &f.predicate) {
        Some(Predicate::OneOf(members)) => members.iter().filter_map(CellValue::year).collect(),
        _ => years.iter().copied().collect(),
    };

    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("All").clicked() {
            session.select_all(col);
        }
        if ui.small_button("None").clicked() {
            session.set_years(col, [])?;
        }
        Ok::<(), FilterError>(())
    })
    .inner?;

    ui.horizontal_wrapped(|ui: &mut Ui| {
        for year in years {
            let mut checked = selected.contains(year);
            if ui.checkbox(&mut checked, year.to_string()).changed() {
                let mut next = selected.clone();
                if checked {
                    next.insert(*year);
                } else {
                    next.remove(year);
                }
                if next.len() == years.len() {
                    session.remove_filter(col);
                } else {
                    session.set_years(col, next)?;
                }
            }
        }
        Ok::<(), FilterError>(())
    })
    .inner
}

fn range_editor(ui: &mut Ui, session: &mut Session, col: &str, lo: f64, hi: f64) -> Result<(), FilterError> {
    let (mut min, mut max) = match session.filter_for(col).map(|f| &f.predicate) {
        Some(Predicate::Range { min, max }) => (min.unwrap_or(lo), max.unwrap_or(hi)),
        _ => (lo, hi),
    };
    let speed = ((hi - lo) / 200.0).max(0.001);

    let mut changed = false;
    ui.horizontal(|ui: &mut Ui| {
        changed |= ui
            .add(egui::DragValue::new(&mut min).speed(speed).range(lo..=max).prefix("min "))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(&mut max).speed(speed).range(min..=hi).prefix("max "))
            .changed();
        if ui.small_button("Reset").clicked() {
            session.remove_filter(col);
        }
    });
    ui.label(RichText::new(format!("data range {lo} … {hi}")).weak().small());

    if changed {
        session.set_range(col, Some(min), Some(max))?;
    }
    Ok(())
}

fn value_checkboxes(
    ui: &mut Ui,
    session: &mut Session,
    col: &str,
    values: &BTreeSet<CellValue>,
) -> Result<(), FilterError> {
    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("All").clicked() {
            session.select_all(col);
        }
        if ui.small_button("None").clicked() {
            session.select_none(col)?;
        }
        Ok::<(), FilterError>(())
    })
    .inner?;

    let selected = session.selected_values(col);
    let is_color_column = session
        .active
        .as_ref()
        .is_some_and(|a| a.color_column.as_deref() == Some(col));

    for val in values {
        let mut checked = selected.contains(val);

        // Show colour swatch if this is the colour column
        let mut text = RichText::new(val.to_string());
        if is_color_column {
            if let Some(cm) = session.active.as_ref().and_then(|a| a.color_map.as_ref()) {
                text = text.color(cm.color_for(val));
            }
        }

        if ui.checkbox(&mut checked, text).changed() {
            session.toggle_value(col, val)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, session: &mut Session, central: &mut CentralView) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(session);
                ui.close_menu();
            }
            if ui
                .add_enabled(session.active.is_some(), egui::Button::new("Close dataset"))
                .clicked()
            {
                session.clear();
                ui.close_menu();
            }
        });

        ui.separator();
        ui.selectable_value(central, CentralView::Chart, "Chart");
        ui.selectable_value(central, CentralView::Table, "Table");
        ui.separator();

        if let Some(active) = &session.active {
            ui.label(format!(
                "{}: {} rows, {} visible",
                active.dataset.source,
                active.dataset.table.len(),
                active.view.len()
            ));
            ui.separator();
        }

        if let Some(msg) = &session.status_message {
            if msg.starts_with("Error") {
                ui.label(RichText::new(msg).color(Color32::RED));
            } else {
                ui.label(RichText::new(msg).weak());
            }
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(session: &mut Session) {
    let file = rfd::FileDialog::new()
        .set_title("Open data file")
        .add_filter(
            "Supported files",
            &["csv", "tsv", "txt", "xlsx", "xlsm", "xls", "json", "geojson", "parquet", "pq"],
        )
        .add_filter("Delimited text", &["csv", "tsv", "txt"])
        .add_filter("Excel", &["xlsx", "xlsm", "xls"])
        .add_filter("JSON / GeoJSON", &["json", "geojson"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        // Errors are logged and shown in the status line by the session.
        let _ = session.load_path(&path);
    }
}
