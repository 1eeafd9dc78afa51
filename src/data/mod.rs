/// Data layer: records, file reading, attribute extraction, filtering, merging.
///
/// Architecture:
/// ```text
///   *.nc / *.ds
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  DatasetReader → attributes, variables, series
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ extract   │  attributes → DatasetRecord (source, period, variable_id)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  Descriptor → matching records
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  merge    │  per-file Series → CombinedSeries along time
///   └──────────┘
/// ```

pub mod extract;
pub mod filter;
pub mod loader;
pub mod merge;
pub mod model;
pub mod time;
