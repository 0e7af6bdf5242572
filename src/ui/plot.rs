use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use eframe::egui::{self, Color32, RichText, Ui};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, Legend, Line, Plot, PlotPoints, Points, Polygon,
};

use crate::chart::config::{ChartKind, ChartSpec};
use crate::chart::series::{Aggregate, BarSeries, BoxStats, HistogramBin, LabelledValue, LineSeries, PlotPoint, Series, TimeStep};
use crate::color::{generate_palette, ColorScale};
use crate::state::{ActiveData, Session};

// ---------------------------------------------------------------------------
// Chart panel (central panel)
// ---------------------------------------------------------------------------

/// Render the chart tabs, axis pickers and the current chart.
pub fn chart_panel(ui: &mut Ui, session: &mut Session) {
    if session.active.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to explore it  (File → Open… or drag and drop)");
        });
        return;
    }

    chart_tabs(ui, session);
    axis_pickers(ui, session);
    ui.separator();

    let kind = session.current_chart;
    let Some(result) = session.series(kind) else {
        return;
    };
    let (spec, series) = match result {
        Ok(ok) => ok,
        Err(e) => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.label(RichText::new(e.to_string()).color(Color32::GRAY).heading());
            });
            return;
        }
    };
    let Some(active) = session.active.as_ref() else {
        return;
    };

    ui.label(RichText::new(title(&spec, active.view.len())).strong());
    match series {
        Series::Points(points) => point_plot(ui, active, &spec, &points),
        Series::Bars(bars) => bar_plot(ui, &spec, &bars),
        Series::Slices(slices) => pie_plot(ui, &slices),
        Series::Histogram(bins) => histogram_plot(ui, &spec, &bins),
        Series::Boxes(boxes) => box_plot(ui, &spec, &boxes),
        Series::Line(line) => line_plot(ui, &spec, &line),
    }
}

fn title(spec: &ChartSpec, n: usize) -> String {
    let x = spec.x.as_deref().unwrap_or("?");
    let y = spec.y.as_deref().unwrap_or("?");
    let what = match spec.kind {
        ChartKind::Map => "Geographical distribution".to_string(),
        ChartKind::Bar if spec.y.is_some() => format!("Mean of {y} by {x}"),
        ChartKind::Bar => format!("Count of records by {x}"),
        ChartKind::Pie => format!("Distribution of {x} (share of total)"),
        ChartKind::Histogram => format!("Distribution of {x}"),
        ChartKind::Box => format!("Distribution of {y} by {x}"),
        ChartKind::Line => format!("Mean of {y} over {x}"),
        ChartKind::Scatter => format!("{y} against {x}"),
    };
    match &spec.color {
        Some(c) => format!("{what} by {c}   N = {n}"),
        None => format!("{what}   N = {n}"),
    }
}

fn chart_tabs(ui: &mut Ui, session: &mut Session) {
    let available = session
        .active
        .as_ref()
        .map(|a| a.available_kinds.clone())
        .unwrap_or_default();
    ui.horizontal(|ui: &mut Ui| {
        for kind in ChartKind::ALL {
            let text = if available.contains(&kind) {
                RichText::new(kind.label())
            } else {
                RichText::new(kind.label()).weak()
            };
            ui.selectable_value(&mut session.current_chart, kind, text);
        }
    });
}

/// X / Y combo boxes; "(auto)" clears the override.
fn axis_pickers(ui: &mut Ui, session: &mut Session) {
    let kind = session.current_chart;
    let Some(active) = session.active.as_ref() else {
        return;
    };
    let columns = active.active_columns.clone();
    let current = session.overrides(kind);
    let (x_label, y_label) = match kind {
        ChartKind::Map => ("Longitude", "Latitude"),
        ChartKind::Line => ("Time", "Value"),
        _ => ("X", "Y"),
    };

    let mut next = current.clone();
    ui.horizontal(|ui: &mut Ui| {
        column_combo(ui, ("x_axis", kind), x_label, &mut next.x, &columns);
        if !matches!(kind, ChartKind::Pie | ChartKind::Histogram) {
            column_combo(ui, ("y_axis", kind), y_label, &mut next.y, &columns);
        }
        if matches!(kind, ChartKind::Map | ChartKind::Scatter) {
            column_combo(ui, ("size", kind), "Size", &mut next.size, &columns);
        }
    });

    if next != current {
        if let Err(e) = session.set_override(kind, next) {
            log::warn!("Rejected axis choice: {e}");
            session.status_message = Some(format!("Error: {e}"));
        }
    }
}

fn column_combo(
    ui: &mut Ui,
    id: impl std::hash::Hash,
    label: &str,
    value: &mut Option<String>,
    columns: &[String],
) {
    ui.label(label);
    egui::ComboBox::from_id_salt(id)
        .selected_text(value.as_deref().unwrap_or("(auto)"))
        .show_ui(ui, |ui: &mut Ui| {
            ui.selectable_value(value, None, "(auto)");
            for col in columns {
                ui.selectable_value(value, Some(col.clone()), col);
            }
        });
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

const SIZE_CLASSES: [f32; 4] = [2.5, 4.0, 6.0, 8.5];

/// Split points into one plot series per legend entry and marker size.
fn point_groups(active: &ActiveData, spec: &ChartSpec, points: &[PlotPoint]) -> Vec<(String, Color32, f32, Vec<[f64; 2]>)> {
    let table = &active.dataset.table;
    let color_idx = spec.color.as_deref().and_then(|c| table.column_index(c));
    let color_map = active.color_map.as_ref().filter(|cm| Some(cm.column.as_str()) == spec.color.as_deref());

    let size_idx = spec.size.as_deref().and_then(|c| table.column_index(c));
    let size_range = size_idx.map(|idx| {
        points
            .iter()
            .filter_map(|p| table.rows[p.row][idx].as_f64())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
    });

    let mut groups: BTreeMap<(String, [u8; 4], usize), Vec<[f64; 2]>> = BTreeMap::new();
    for p in points {
        let row = &table.rows[p.row];
        let (name, color) = match (color_idx, color_map) {
            (Some(idx), Some(cm)) => {
                let value = &row[idx];
                let name = match cm.scale {
                    ColorScale::Continuous { .. } => cm.column.clone(),
                    _ => value.to_string(),
                };
                (name, cm.color_for(value))
            }
            _ => ("rows".to_string(), Color32::LIGHT_BLUE),
        };
        let size_class = match (size_idx, size_range) {
            (Some(idx), Some((lo, hi))) if hi > lo => row[idx]
                .as_f64()
                .map(|v| (((v - lo) / (hi - lo)) * (SIZE_CLASSES.len() - 1) as f64).round() as usize)
                .unwrap_or(0),
            _ => 1,
        };
        groups
            .entry((name, color.to_array(), size_class))
            .or_default()
            .push([p.x, p.y]);
    }

    groups
        .into_iter()
        .map(|((name, rgba, size), pts)| {
            let color = Color32::from_rgba_premultiplied(rgba[0], rgba[1], rgba[2], rgba[3]);
            (name, color, SIZE_CLASSES[size.min(SIZE_CLASSES.len() - 1)], pts)
        })
        .collect()
}

fn point_plot(ui: &mut Ui, active: &ActiveData, spec: &ChartSpec, points: &[PlotPoint]) {
    if points.is_empty() {
        ui.label("No rows with numeric values for both axes.");
        return;
    }

    let mut plot = Plot::new(("points_plot", spec.kind))
        .legend(Legend::default())
        .x_axis_label(spec.x.clone().unwrap_or_default())
        .y_axis_label(spec.y.clone().unwrap_or_default())
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);

    if spec.kind == ChartKind::Map {
        // Equirectangular: shrink longitude by the cosine of the mean latitude.
        let mean_lat = points.iter().map(|p| p.y).sum::<f64>() / points.len() as f64;
        let aspect = (1.0 / mean_lat.to_radians().cos().max(0.1)) as f32;
        plot = plot.data_aspect(aspect);
    }

    let table = &active.dataset.table;
    if let Some(idx) = active.hover_column().and_then(|c| table.column_index(c)) {
        let labels: HashMap<(u64, u64), String> = points
            .iter()
            .map(|p| ((p.x.to_bits(), p.y.to_bits()), table.rows[p.row][idx].to_string()))
            .collect();
        let (x_name, y_name) = (spec.x.clone().unwrap_or_default(), spec.y.clone().unwrap_or_default());
        plot = plot.label_formatter(move |_series, value| {
            let coords = format!("{x_name}: {:.3}\n{y_name}: {:.3}", value.x, value.y);
            match labels.get(&(value.x.to_bits(), value.y.to_bits())) {
                Some(label) => format!("{label}\n{coords}"),
                None => coords,
            }
        });
    }

    let groups = point_groups(active, spec, points);
    plot.show(ui, |plot_ui| {
        for (name, color, radius, pts) in groups {
            plot_ui.points(Points::new(PlotPoints::from(pts)).name(name).color(color).radius(radius));
        }
    });
}

fn category_formatter(labels: Vec<String>) -> impl Fn(egui_plot::GridMark, &std::ops::RangeInclusive<f64>) -> String {
    move |mark, _range| {
        let idx = mark.value.round();
        if (mark.value - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    }
}

fn bar_plot(ui: &mut Ui, spec: &ChartSpec, series: &BarSeries) {
    let color = Color32::from_rgb(99, 110, 250);
    let bars: Vec<Bar> = series
        .bars
        .iter()
        .enumerate()
        .map(|(i, b)| Bar::new(i as f64, b.value).width(0.8).name(&b.label).fill(color))
        .collect();
    let labels: Vec<String> = series.bars.iter().map(|b| b.label.clone()).collect();
    let y_label = match series.aggregate {
        Aggregate::Mean => spec.y.clone().unwrap_or_default(),
        Aggregate::Count => "count".to_string(),
    };

    Plot::new("bar_plot")
        .x_axis_label(spec.x.clone().unwrap_or_default())
        .y_axis_label(y_label)
        .x_axis_formatter(category_formatter(labels))
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
}

/// Points on the arc from `start` to `end` (radians), closed through the centre.
fn wedge(start: f64, end: f64) -> Vec<[f64; 2]> {
    let steps = (((end - start) / TAU) * 96.0).ceil().max(2.0) as usize;
    let mut pts = vec![[0.0, 0.0]];
    pts.extend((0..=steps).map(|i| {
        let a = start + (end - start) * i as f64 / steps as f64;
        [a.cos(), a.sin()]
    }));
    pts
}

fn pie_plot(ui: &mut Ui, slices: &[LabelledValue]) {
    let total: f64 = slices.iter().map(|s| s.value).sum();
    if total <= 0.0 {
        ui.label("Nothing to show.");
        return;
    }
    let palette = generate_palette(slices.len());

    Plot::new("pie_plot")
        .legend(Legend::default())
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            let mut angle = std::f64::consts::FRAC_PI_2;
            for (slice, color) in slices.iter().zip(palette) {
                let sweep = TAU * slice.value / total;
                let name = format!(
                    "{}: {} ({:.1}%)",
                    slice.label,
                    slice.value,
                    100.0 * slice.value / total
                );
                plot_ui.polygon(
                    Polygon::new(PlotPoints::from(wedge(angle - sweep, angle)))
                        .name(name)
                        .fill_color(color)
                        .stroke(egui::Stroke::new(1.0, Color32::WHITE)),
                );
                angle -= sweep;
            }
        });
}

fn histogram_plot(ui: &mut Ui, spec: &ChartSpec, bins: &[HistogramBin]) {
    let color = Color32::from_rgb(99, 110, 250);
    let bars: Vec<Bar> = bins
        .iter()
        .map(|b| {
            Bar::new((b.start + b.end) / 2.0, b.count as f64)
                .width(b.end - b.start)
                .name(format!("{:.3} – {:.3}", b.start, b.end))
                .fill(color)
        })
        .collect();

    Plot::new("histogram_plot")
        .x_axis_label(spec.x.clone().unwrap_or_default())
        .y_axis_label("count")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
}

fn box_plot(ui: &mut Ui, spec: &ChartSpec, boxes: &[BoxStats]) {
    let color = Color32::from_rgb(99, 110, 250);
    let elems: Vec<BoxElem> = boxes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            BoxElem::new(
                i as f64,
                BoxSpread::new(b.lower_whisker, b.q1, b.median, b.q3, b.upper_whisker),
            )
            .name(&b.label)
            .box_width(0.6)
            .fill(color.gamma_multiply(0.4))
            .stroke(egui::Stroke::new(1.5, color))
        })
        .collect();
    let outliers: Vec<[f64; 2]> = boxes
        .iter()
        .enumerate()
        .flat_map(|(i, b)| b.outliers.iter().map(move |&v| [i as f64, v]))
        .collect();
    let labels: Vec<String> = boxes.iter().map(|b| b.label.clone()).collect();

    Plot::new("box_plot")
        .x_axis_label(spec.x.clone().unwrap_or_default())
        .y_axis_label(spec.y.clone().unwrap_or_default())
        .x_axis_formatter(category_formatter(labels))
        .show(ui, |plot_ui| {
            plot_ui.box_plot(BoxPlot::new(elems));
            if !outliers.is_empty() {
                plot_ui.points(Points::new(PlotPoints::from(outliers)).color(color).radius(2.5).name("outliers"));
            }
        });
}

fn line_plot(ui: &mut Ui, spec: &ChartSpec, series: &LineSeries) {
    let pts: Vec<[f64; 2]> = series.points.iter().map(|p| [p.t, p.mean]).collect();
    let step = series.step;

    Plot::new("line_plot")
        .x_axis_label(spec.x.clone().unwrap_or_default())
        .y_axis_label(spec.y.clone().unwrap_or_default())
        .x_axis_formatter(move |mark, _range| {
            let year = mark.value.floor();
            let month = ((mark.value - year) * 12.0).round() as u32 + 1;
            match step {
                TimeStep::Year if mark.value.fract().abs() < 1e-9 => format!("{year}"),
                TimeStep::Month if month <= 12 => format!("{year}-{month:02}"),
                _ => String::new(),
            }
        })
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(PlotPoints::from(pts.clone())).width(2.0));
            plot_ui.points(Points::new(PlotPoints::from(pts)).radius(3.0));
        });
}
