/// Data layer: core types, loading, classification and filtering.
///
/// Architecture:
/// ```text
///  .csv / .xlsx / .json / .geojson / .parquet
///        │
///        ▼
///   ┌──────────┐   ┌─────────┐
///   │  loader   │──▶│ geojson  │  FeatureCollection → one row per feature
///   └──────────┘   └─────────┘
///        │  RawTable
///        ▼
///   ┌───────────┐
///   │ normalize  │  clean headers, empty tokens → null
///   └───────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ reproject  │  KKJ grid columns → latitude / longitude
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐   ┌────────┐
///   │ classify  │──▶│ coerce  │  typed cells, malformed → null
///   └──────────┘   └────────┘
///        │  Dataset
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterSpecs → FilteredView
///   └──────────┘
/// ```

pub mod classify;
pub mod coerce;
pub mod error;
pub mod filter;
pub mod geojson;
pub mod groups;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod reproject;
