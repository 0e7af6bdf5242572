use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::classify::ClassifierConfig;
use crate::data::geojson::GeometryPolicy;

/// Environment variable naming an optional JSON settings file.
pub const CONFIG_ENV: &str = "RUSTY_ATLAS_CONFIG";

/// Tunables for ingestion and the side panel.  Every field has a default,
/// so a settings file only lists what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub classifier: ClassifierConfig,
    pub geometry: GeometryPolicy,
    /// Upper bound on preselected active columns.
    pub max_active_columns: usize,
    /// Preselected columns taken from each name group.
    pub max_per_group: usize,
    /// Columns with more distinct values than this get no checkbox filter.
    pub max_filter_values: usize,
    /// Rows shown in the preview table.
    pub preview_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            geometry: GeometryPolicy::default(),
            max_active_columns: 30,
            max_per_group: 4,
            max_filter_values: 60,
            preview_rows: 500,
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&text).context("parsing settings JSON")
    }

    /// Settings from `$RUSTY_ATLAS_CONFIG` when set and readable, defaults otherwise.
    pub fn load() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::from_path(Path::new(&path)) {
            Ok(settings) => {
                log::info!("Using settings from {}", Path::new(&path).display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring settings file: {e:#}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"geometry": "skip", "classifier": {{"sample_size": 50}}}}"#).unwrap();
        let settings = Settings::from_path(file.path()).unwrap();
        assert_eq!(settings.geometry, GeometryPolicy::Skip);
        assert_eq!(settings.classifier.sample_size, 50);
        assert_eq!(settings.classifier.min_parse_ratio, 0.8);
        assert_eq!(settings.max_active_columns, 30);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Settings::from_path(file.path()).is_err());
    }
}
