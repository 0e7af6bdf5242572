use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;

use super::config::{ChartError, ChartKind, ChartSpec};
use crate::data::coerce::round_decimals;
use crate::data::filter::FilteredView;
use crate::data::model::{CellValue, RawTable};

// ---------------------------------------------------------------------------
// Plot-ready series
// ---------------------------------------------------------------------------

/// Year range an integer axis must fall in to be drawn as whole years.
const YEAR_AXIS: std::ops::RangeInclusive<i64> = 1800..=2100;

const MIN_BINS: usize = 5;
const MAX_BINS: usize = 60;

/// A point on a map or scatter plot; `row` indexes the source table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelledValue {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Mean,
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub aggregate: Aggregate,
    pub bars: Vec<LabelledValue>,
    /// Every bar label is a whole year; the axis shows them as categories.
    pub year_axis: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Tukey box: whiskers reach the furthest value within 1.5 IQR.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub label: String,
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStep {
    Month,
    Year,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint {
    /// Position on the axis in (fractional) years.
    pub t: f64,
    pub label: String,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSeries {
    pub step: TimeStep,
    pub points: Vec<TimePoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Points(Vec<PlotPoint>),
    Bars(BarSeries),
    Slices(Vec<LabelledValue>),
    Histogram(Vec<HistogramBin>),
    Boxes(Vec<BoxStats>),
    Line(LineSeries),
}

/// Build the plot data for `spec` from the visible rows of `table`.
pub fn prepare(table: &RawTable, view: &FilteredView, spec: &ChartSpec) -> Result<Series, ChartError> {
    let resolve = |name: &Option<String>| -> Result<Option<usize>, ChartError> {
        name.as_ref()
            .map(|n| {
                table.column_index(n).ok_or_else(|| ChartError::UnknownColumn {
                    kind: spec.kind,
                    column: n.clone(),
                })
            })
            .transpose()
    };
    let x = resolve(&spec.x)?;
    let y = resolve(&spec.y)?;
    let required = |idx: Option<usize>, name: &Option<String>| {
        idx.ok_or_else(|| ChartError::UnknownColumn {
            kind: spec.kind,
            column: name.clone().unwrap_or_default(),
        })
    };

    Ok(match spec.kind {
        ChartKind::Map | ChartKind::Scatter => Series::Points(points(
            table,
            view,
            required(x, &spec.x)?,
            required(y, &spec.y)?,
        )),
        ChartKind::Bar => Series::Bars(bars(table, view, required(x, &spec.x)?, y)),
        ChartKind::Pie => Series::Slices(slices(table, view, required(x, &spec.x)?)),
        ChartKind::Histogram => Series::Histogram(histogram(table, view, required(x, &spec.x)?)),
        ChartKind::Box => Series::Boxes(boxes(table, view, required(x, &spec.x)?, required(y, &spec.y)?)),
        ChartKind::Line => Series::Line(line(table, view, required(x, &spec.x)?, required(y, &spec.y)?)),
    })
}

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// Visible rows where both cells are numbers.
pub fn points(table: &RawTable, view: &FilteredView, x: usize, y: usize) -> Vec<PlotPoint> {
    view.indices
        .iter()
        .filter_map(|&row| {
            let cells = &table.rows[row];
            Some(PlotPoint {
                x: cells[x].as_f64()?,
                y: cells[y].as_f64()?,
                row,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Bars and slices
// ---------------------------------------------------------------------------

/// Group key for a bar: whole years when the column is year-like numbers.
fn bar_key(cell: &CellValue, year_like: bool) -> CellValue {
    match (cell.as_f64(), year_like) {
        (Some(v), true) => CellValue::Integer(v.round() as i64),
        _ => cell.clone(),
    }
}

fn is_year_like<'a>(mut cells: impl Iterator<Item = &'a CellValue>) -> bool {
    let mut any_in_range = false;
    let all_numeric = cells.all(|c| match c.as_f64() {
        Some(v) => {
            any_in_range |= YEAR_AXIS.contains(&(v.round() as i64));
            true
        }
        None => false,
    });
    all_numeric && any_in_range
}

/// Mean of `y` per distinct `x` (rounded to three decimals), or row counts
/// per `x` when there is no numeric `y`.  Null x values form their own bar.
pub fn bars(table: &RawTable, view: &FilteredView, x: usize, y: Option<usize>) -> BarSeries {
    let year_like = is_year_like(view.column(table, x));
    let y = y.filter(|&y| view.column(table, y).any(|c| c.as_f64().is_some()));

    let bars: Vec<LabelledValue>;
    let keys: Vec<CellValue>;
    let aggregate;
    match y {
        Some(y) => {
            let mut groups: BTreeMap<CellValue, (f64, usize)> = BTreeMap::new();
            for row in view.rows(table) {
                let Some(v) = row[y].as_f64() else { continue };
                let acc = groups.entry(bar_key(&row[x], year_like)).or_default();
                acc.0 += v;
                acc.1 += 1;
            }
            keys = groups.keys().cloned().collect();
            bars = groups
                .into_iter()
                .map(|(k, (sum, n))| LabelledValue {
                    label: k.to_string(),
                    value: round_decimals(sum / n as f64),
                })
                .collect();
            aggregate = Aggregate::Mean;
        }
        None => {
            let mut groups: BTreeMap<CellValue, usize> = BTreeMap::new();
            for cell in view.column(table, x) {
                *groups.entry(bar_key(cell, year_like)).or_default() += 1;
            }
            keys = groups.keys().cloned().collect();
            bars = groups
                .into_iter()
                .map(|(k, n)| LabelledValue {
                    label: k.to_string(),
                    value: n as f64,
                })
                .collect();
            aggregate = Aggregate::Count;
        }
    }

    let year_axis = !keys.is_empty()
        && keys
            .iter()
            .all(|k| matches!(k, CellValue::Integer(i) if YEAR_AXIS.contains(i)));

    BarSeries {
        aggregate,
        bars,
        year_axis,
    }
}

/// Row counts per value of `x`, largest first.
pub fn slices(table: &RawTable, view: &FilteredView, x: usize) -> Vec<LabelledValue> {
    let mut counts: BTreeMap<&CellValue, usize> = BTreeMap::new();
    for cell in view.column(table, x) {
        *counts.entry(cell).or_default() += 1;
    }
    let mut counts: Vec<(&CellValue, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .map(|(k, n)| LabelledValue {
            label: k.to_string(),
            value: n as f64,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Square-root rule clamped to 5..=60 and capped by the distinct count.
pub fn bin_count(values: usize, distinct: usize) -> usize {
    let sqrt = (values as f64).sqrt() as usize;
    sqrt.min(MAX_BINS).min(distinct).max(MIN_BINS)
}

pub fn histogram(table: &RawTable, view: &FilteredView, x: usize) -> Vec<HistogramBin> {
    let values: Vec<f64> = view
        .column(table, x)
        .filter_map(CellValue::as_f64)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Vec::new();
    }

    let distinct: BTreeSet<u64> = values.iter().map(|v| v.to_bits()).collect();
    let n_bins = bin_count(values.len(), distinct.len());

    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi - lo < f64::EPSILON {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / n_bins as f64;

    let mut bins: Vec<HistogramBin> = (0..n_bins)
        .map(|i| HistogramBin {
            start: lo + i as f64 * width,
            end: lo + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();
    for v in values {
        let idx = (((v - lo) / width) as usize).min(n_bins - 1);
        bins[idx].count += 1;
    }
    bins
}

// ---------------------------------------------------------------------------
// Box plot
// ---------------------------------------------------------------------------

/// Quantile of sorted data with linear interpolation between ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

fn box_stats(label: String, mut values: Vec<f64>) -> BoxStats {
    values.sort_by(f64::total_cmp);
    let q1 = quantile(&values, 0.25);
    let median = quantile(&values, 0.5);
    let q3 = quantile(&values, 0.75);
    let fence = 1.5 * (q3 - q1);
    let (inside, outliers): (Vec<f64>, Vec<f64>) = values
        .iter()
        .copied()
        .partition(|&v| v >= q1 - fence && v <= q3 + fence);
    BoxStats {
        label,
        lower_whisker: inside.first().copied().unwrap_or(q1),
        q1,
        median,
        q3,
        upper_whisker: inside.last().copied().unwrap_or(q3),
        outliers,
    }
}

/// Distribution of numeric `y` per value of `x`; groups without numbers are
/// left out.
pub fn boxes(table: &RawTable, view: &FilteredView, x: usize, y: usize) -> Vec<BoxStats> {
    let mut groups: BTreeMap<&CellValue, Vec<f64>> = BTreeMap::new();
    for row in view.rows(table) {
        if let Some(v) = row[y].as_f64() {
            groups.entry(&row[x]).or_default().push(v);
        }
    }
    groups
        .into_iter()
        .map(|(k, values)| box_stats(k.to_string(), values))
        .collect()
}

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

/// Mean of numeric `y` per month when `t` holds timestamps, per whole year
/// when it holds year numbers.  Rows with neither are skipped.
pub fn line(table: &RawTable, view: &FilteredView, t: usize, y: usize) -> LineSeries {
    let monthly = view.column(table, t).any(|c| matches!(c, CellValue::DateTime(_)));
    let step = if monthly { TimeStep::Month } else { TimeStep::Year };

    let mut groups: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for row in view.rows(table) {
        let Some(v) = row[y].as_f64() else { continue };
        let key = match (&row[t], step) {
            (CellValue::DateTime(d), TimeStep::Month) => (d.year(), d.month()),
            (cell, TimeStep::Year) => match cell.as_f64() {
                Some(year) => (year.round() as i32, 1),
                None => continue,
            },
            _ => continue,
        };
        let acc = groups.entry(key).or_default();
        acc.0 += v;
        acc.1 += 1;
    }

    let points = groups
        .into_iter()
        .map(|((year, month), (sum, n))| TimePoint {
            t: year as f64 + (month - 1) as f64 / 12.0,
            label: match step {
                TimeStep::Month => format!("{year:04}-{month:02}"),
                TimeStep::Year => year.to_string(),
            },
            mean: sum / n as f64,
        })
        .collect();

    LineSeries { step, points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table() -> RawTable {
        let rows = vec![
            ("pine", 12.5, 2019, (2019, 3)),
            ("spruce", 20.0, 2020, (2019, 3)),
            ("pine", 7.5, 2020, (2019, 4)),
            ("birch", 4.0, 2021, (2020, 1)),
            ("pine", 10.0, 2021, (2020, 1)),
        ]
        .into_iter()
        .map(|(species, height, year, (y, m))| {
            vec![
                CellValue::Text(species.into()),
                CellValue::Float(height),
                CellValue::Integer(year),
                CellValue::DateTime(NaiveDate::from_ymd_opt(y, m, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()),
            ]
        })
        .collect();
        RawTable::new(
            vec!["species".into(), "height".into(), "year".into(), "measured".into()],
            rows,
        )
    }

    #[test]
    fn bars_average_by_group() {
        let t = table();
        let series = bars(&t, &FilteredView::all(t.len()), 0, Some(1));
        assert_eq!(series.aggregate, Aggregate::Mean);
        let labels: Vec<(&str, f64)> = series.bars.iter().map(|b| (b.label.as_str(), b.value)).collect();
        assert_eq!(labels, vec![("birch", 4.0), ("pine", 10.0), ("spruce", 20.0)]);
        assert!(!series.year_axis);
    }

    #[test]
    fn bars_count_years_in_numeric_order() {
        let t = table();
        let series = bars(&t, &FilteredView::all(t.len()), 2, None);
        assert_eq!(series.aggregate, Aggregate::Count);
        assert!(series.year_axis);
        let labels: Vec<&str> = series.bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2019", "2020", "2021"]);
        assert_eq!(series.bars[1].value, 2.0);
    }

    #[test]
    fn bar_means_round_to_three_decimals() {
        let t = RawTable::new(
            vec!["g".into(), "v".into()],
            vec![
                vec![CellValue::Text("a".into()), CellValue::Float(1.0)],
                vec![CellValue::Text("a".into()), CellValue::Float(1.0)],
                vec![CellValue::Text("a".into()), CellValue::Float(2.0)],
            ],
        );
        let series = bars(&t, &FilteredView::all(3), 0, Some(1));
        assert_eq!(series.bars[0].value, 1.333);
    }

    #[test]
    fn slices_follow_the_view() {
        let t = table();
        let view = FilteredView { indices: vec![0, 1, 2] };
        let slices = slices(&t, &view, 0);
        assert_eq!(slices[0].label, "pine");
        assert_eq!(slices[0].value, 2.0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn bin_count_is_clamped() {
        assert_eq!(bin_count(4, 4), 5);
        assert_eq!(bin_count(100, 100), 10);
        assert_eq!(bin_count(10_000, 10_000), 60);
        assert_eq!(bin_count(10_000, 7), 7);
    }

    #[test]
    fn histogram_counts_every_value() {
        let t = table();
        let bins = histogram(&t, &FilteredView::all(t.len()), 1);
        assert_eq!(bins.len(), 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(bins[0].start, 4.0);
        assert_eq!(bins[4].end, 20.0);
        assert_eq!(bins[4].count, 1);
    }

    #[test]
    fn histogram_of_constant_column_has_width() {
        let t = RawTable::new(vec!["v".into()], vec![vec![CellValue::Integer(3)]; 4]);
        let bins = histogram(&t, &FilteredView::all(4), 0);
        assert!(bins.iter().all(|b| b.end > b.start));
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 4);
    }

    #[test]
    fn box_quartiles_interpolate() {
        let stats = box_stats("g".into(), vec![4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.q1, 1.75);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q3, 3.25);
        assert_eq!((stats.lower_whisker, stats.upper_whisker), (1.0, 4.0));
        assert!(stats.outliers.is_empty());
    }

    #[test]
    fn box_separates_outliers() {
        let stats = box_stats("g".into(), vec![1.0, 2.0, 2.0, 3.0, 100.0]);
        assert_eq!(stats.outliers, vec![100.0]);
        assert_eq!(stats.upper_whisker, 3.0);
    }

    #[test]
    fn line_groups_timestamps_by_month() {
        let t = table();
        let series = line(&t, &FilteredView::all(t.len()), 3, 1);
        assert_eq!(series.step, TimeStep::Month);
        let labels: Vec<&str> = series.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2019-03", "2019-04", "2020-01"]);
        assert_eq!(series.points[0].mean, 16.25);
        assert_eq!(series.points[2].t, 2020.0);
    }

    #[test]
    fn line_groups_year_numbers_by_year() {
        let t = table();
        let series = line(&t, &FilteredView::all(t.len()), 2, 1);
        assert_eq!(series.step, TimeStep::Year);
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[2].mean, 7.0);
    }

    #[test]
    fn prepare_rejects_missing_columns() {
        let t = table();
        let spec = ChartSpec {
            kind: ChartKind::Histogram,
            x: Some("width".into()),
            y: None,
            color: None,
            size: None,
        };
        assert!(prepare(&t, &FilteredView::all(t.len()), &spec).is_err());
    }

    #[test]
    fn scatter_skips_non_numeric_rows() {
        let mut t = table();
        t.rows[1][1] = CellValue::Null;
        let spec = ChartSpec {
            kind: ChartKind::Scatter,
            x: Some("year".into()),
            y: Some("height".into()),
            color: None,
            size: None,
        };
        let Series::Points(points) = prepare(&t, &FilteredView::all(t.len()), &spec).unwrap() else {
            panic!("expected points");
        };
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|p| p.row != 1));
    }
}
