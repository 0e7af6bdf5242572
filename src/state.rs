use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::chart::config::{self, ChartError, ChartKind, ChartOverrides, ChartSpec};
use crate::chart::series::{self, Series};
use crate::color::ColorMap;
use crate::data::classify::ColumnCategory;
use crate::data::error::{FilterError, LoadError};
use crate::data::filter::{self, FilterSpec, FilteredView, Predicate};
use crate::data::groups::{self, ColumnGroup};
use crate::data::model::CellValue;
use crate::data::pipeline::{self, Dataset};
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Per-upload state
// ---------------------------------------------------------------------------

/// Everything derived from one upload.  Built in full before it replaces
/// the previous upload, so the UI never sees a mix of the two.
pub struct ActiveData {
    pub dataset: Dataset,

    /// Columns by browsing group.
    pub groups: BTreeMap<ColumnGroup, Vec<String>>,

    /// Columns offered in the axis pickers and filter list.
    pub active_columns: Vec<String>,

    /// At most one spec per column.
    pub filters: Vec<FilterSpec>,

    /// Rows passing `filters` (cached).
    pub view: FilteredView,

    /// User axis choices per chart kind.
    pub overrides: BTreeMap<ChartKind, ChartOverrides>,

    /// Which column is used for colouring.
    pub color_column: Option<String>,

    /// Active colour map.
    pub color_map: Option<ColorMap>,

    /// Chart kinds whose default bindings resolve.
    pub available_kinds: Vec<ChartKind>,
}

impl ActiveData {
    fn build(dataset: Dataset, settings: &Settings) -> Self {
        let groups = groups::group_columns(&dataset.columns);
        let active_columns =
            groups::preselect_active(&dataset.columns, settings.max_per_group, settings.max_active_columns);
        let view = FilteredView::all(dataset.table.len());
        let available_kinds = config::available_kinds(&dataset.columns);

        // Default colour column: first categorical active column (if any).
        let color_column = active_columns
            .iter()
            .find(|name| dataset.column(name).is_some_and(|c| c.category.is_categorical()))
            .cloned();

        let mut active = ActiveData {
            dataset,
            groups,
            active_columns,
            filters: Vec::new(),
            view,
            overrides: BTreeMap::new(),
            color_column,
            color_map: None,
            available_kinds,
        };
        active.rebuild_color_map();
        active
    }

    /// Column naming each point on hover: the first identifier, else the
    /// first categorical column.
    pub fn hover_column(&self) -> Option<&str> {
        let columns = &self.dataset.columns;
        columns
            .iter()
            .find(|c| c.category == ColumnCategory::Identifier)
            .or_else(|| columns.iter().find(|c| c.category.is_categorical()))
            .map(|c| c.name.as_str())
    }

    fn rebuild_color_map(&mut self) {
        self.color_map = self.color_column.as_ref().and_then(|name| {
            let column = self.dataset.column(name)?;
            let idx = self.dataset.table.column_index(name)?;
            Some(ColorMap::new(name, column.category, &self.dataset.table.unique_values[idx]))
        });
    }

    /// Validate `filters` against the table and make them current.
    fn commit_filters(&mut self, filters: Vec<FilterSpec>) -> Result<(), FilterError> {
        let view = filter::apply(&self.dataset.table, &self.dataset.columns, &filters)?;
        log::debug!(
            "{} filter(s) active, {} of {} rows visible",
            filters.len(),
            view.len(),
            self.dataset.table.len()
        );
        self.filters = filters;
        self.view = view;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct Session {
    pub settings: Settings,

    /// Current upload (None until a file is loaded).
    pub active: Option<ActiveData>,

    /// Chart shown in the central panel.
    pub current_chart: ChartKind,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            active: None,
            current_chart: ChartKind::Map,
            status_message: None,
        }
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.active.as_ref().map(|a| &a.dataset)
    }

    /// Rows passing the current filters.
    pub fn visible(&self) -> Option<&FilteredView> {
        self.active.as_ref().map(|a| &a.view)
    }

    // -- Upload lifecycle --

    /// Load a file from disk.  On failure the previous upload stays and the
    /// error is shown in the status line.
    pub fn load_path(&mut self, path: &Path) -> Result<(), LoadError> {
        let result = pipeline::ingest_path(path, &self.settings.classifier, self.settings.geometry);
        self.finish_load(result)
    }

    /// Load an upload held in memory (e.g. a dropped file).
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), LoadError> {
        let result = pipeline::ingest_bytes(name, bytes, &self.settings.classifier, self.settings.geometry);
        self.finish_load(result)
    }

    fn finish_load(&mut self, result: Result<Dataset, LoadError>) -> Result<(), LoadError> {
        match result {
            Ok(dataset) => {
                self.replace(dataset);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load file: {e}");
                self.status_message = Some(format!("Error: {e}"));
                Err(e)
            }
        }
    }

    /// Discard the previous upload and everything derived from it.
    pub fn replace(&mut self, dataset: Dataset) {
        let active = ActiveData::build(dataset, &self.settings);
        if !active.available_kinds.contains(&self.current_chart) {
            self.current_chart = active.available_kinds.first().copied().unwrap_or(ChartKind::Bar);
        }
        self.status_message = Some(format!(
            "{}: {} rows, {} columns",
            active.dataset.source,
            active.dataset.table.len(),
            active.dataset.table.width()
        ));
        self.active = Some(active);
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.status_message = None;
        self.current_chart = ChartKind::Map;
    }

    // -- Filters --

    pub fn filter_for(&self, column: &str) -> Option<&FilterSpec> {
        self.active
            .as_ref()?
            .filters
            .iter()
            .find(|f| f.column == column)
    }

    /// Add `spec`, replacing any filter on the same column.  An invalid spec
    /// leaves the current filters untouched.
    pub fn set_filter(&mut self, spec: FilterSpec) -> Result<(), FilterError> {
        let Some(active) = self.active.as_mut() else {
            return Err(FilterError::UnknownColumn(spec.column));
        };
        let mut filters: Vec<FilterSpec> = active
            .filters
            .iter()
            .filter(|f| f.column != spec.column)
            .cloned()
            .collect();
        filters.push(spec);
        active.commit_filters(filters).inspect_err(|e| {
            log::warn!("Rejected filter: {e}");
        })
    }

    pub fn remove_filter(&mut self, column: &str) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let filters = active
            .filters
            .iter()
            .filter(|f| f.column != column)
            .cloned()
            .collect();
        if let Err(e) = active.commit_filters(filters) {
            log::error!("Filters became invalid: {e}");
        }
    }

    pub fn clear_filters(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.filters.clear();
            active.view = FilteredView::all(active.dataset.table.len());
        }
    }

    /// Values currently accepted by a column's checkbox filter; every value
    /// when the column is unfiltered.
    pub fn selected_values(&self, column: &str) -> BTreeSet<CellValue> {
        match self.filter_for(column).map(|f| &f.predicate) {
            Some(Predicate::OneOf(members)) => members.clone(),
            _ => self.all_values(column),
        }
    }

    fn all_values(&self, column: &str) -> BTreeSet<CellValue> {
        self.dataset()
            .and_then(|ds| ds.table.column_index(column).map(|idx| ds.table.unique_values[idx].clone()))
            .unwrap_or_default()
    }

    /// Toggle a single value in a column's checkbox filter.
    pub fn toggle_value(&mut self, column: &str, value: &CellValue) -> Result<(), FilterError> {
        let mut selected = self.selected_values(column);
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        if selected == self.all_values(column) {
            self.remove_filter(column);
            Ok(())
        } else {
            self.set_filter(FilterSpec::one_of(column, selected))
        }
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) {
        self.remove_filter(column);
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) -> Result<(), FilterError> {
        self.set_filter(FilterSpec::one_of(column, Vec::<CellValue>::new()))
    }

    /// Keep rows whose year is one of `years`.
    pub fn set_years(&mut self, column: &str, years: impl IntoIterator<Item = i32>) -> Result<(), FilterError> {
        let members = years.into_iter().map(|y| CellValue::Integer(i64::from(y)));
        self.set_filter(FilterSpec::one_of(column, members))
    }

    /// Distinct years present in a column, ascending.
    pub fn years(&self, column: &str) -> Vec<i32> {
        let set: BTreeSet<i32> = self.all_values(column).iter().filter_map(CellValue::year).collect();
        set.into_iter().collect()
    }

    pub fn set_range(&mut self, column: &str, min: Option<f64>, max: Option<f64>) -> Result<(), FilterError> {
        self.set_filter(FilterSpec::range(column, min, max))
    }

    // -- Columns and colour --

    pub fn toggle_active_column(&mut self, column: &str) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if let Some(pos) = active.active_columns.iter().position(|c| c == column) {
            active.active_columns.remove(pos);
        } else if active.dataset.column(column).is_some() {
            active.active_columns.push(column.to_string());
        }
    }

    /// Set colour column and rebuild the map.
    pub fn set_color_column(&mut self, column: Option<String>) {
        if let Some(active) = self.active.as_mut() {
            active.color_column = column.filter(|c| active.dataset.column(c).is_some());
            active.rebuild_color_map();
        }
    }

    // -- Charts --

    /// Store axis choices for `kind` after checking they name real columns.
    pub fn set_override(&mut self, kind: ChartKind, overrides: ChartOverrides) -> Result<(), ChartError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        match config::configure(&active.dataset.columns, kind, &overrides) {
            Err(e @ ChartError::UnknownColumn { .. }) => return Err(e),
            Ok(_) | Err(ChartError::Unavailable { .. }) => {}
        }
        active.overrides.insert(kind, overrides);
        Ok(())
    }

    pub fn overrides(&self, kind: ChartKind) -> ChartOverrides {
        self.active
            .as_ref()
            .and_then(|a| a.overrides.get(&kind).cloned())
            .unwrap_or_default()
    }

    /// Bindings for `kind`: overrides first, then defaults.  The session's
    /// colour column fills in when no colour override is set.
    pub fn chart_spec(&self, kind: ChartKind) -> Option<Result<ChartSpec, ChartError>> {
        let active = self.active.as_ref()?;
        let mut overrides = active.overrides.get(&kind).cloned().unwrap_or_default();
        if overrides.color.is_none() {
            overrides.color = active.color_column.clone();
        }
        Some(config::configure(&active.dataset.columns, kind, &overrides))
    }

    /// Plot data for `kind` over the visible rows.
    pub fn series(&self, kind: ChartKind) -> Option<Result<(ChartSpec, Series), ChartError>> {
        let active = self.active.as_ref()?;
        let spec = match self.chart_spec(kind)? {
            Ok(spec) => spec,
            Err(e) => return Some(Err(e)),
        };
        Some(series::prepare(&active.dataset.table, &active.view, &spec).map(|s| (spec, s)))
    }
}
