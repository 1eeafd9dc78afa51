//! Read-only heuristic tables and the runtime configuration of a [`Catalog`].
//!
//! [`Catalog`]: crate::Catalog

/// Physical variable codes recognized when tagging files, in match order.
/// When several match, the last one wins.
pub const RECOGNIZED_VARIABLES: &[&str] = &["pr", "psl", "tas", "tasmax", "tasmin"];

/// Extensions of files picked up by a directory scan.
pub const DATASET_EXTENSIONS: &[&str] = &["nc", "ds"];

/// Name of the index sidecar written inside a scanned directory.
pub const CACHE_FILE_NAME: &str = "index.bin";

/// Dimension merged series are concatenated along.
pub const TIME_DIMENSION: &str = "time";

/// Synthetic axis distinguishing the files of a merged series.
pub const FILE_AXIS: &str = "n";

/// Short prefixes used in titles for long regional model names.
pub const SOURCE_PREFIXES: &[(&str, &str)] = &[("HCLIM43-ALADIN", "HC")];

pub fn source_prefix(source_id: &str) -> Option<&'static str> {
    SOURCE_PREFIXES
        .iter()
        .find(|(sid, _)| *sid == source_id)
        .map(|(_, prefix)| *prefix)
}

// ---------------------------------------------------------------------------
// Analysis regions
// ---------------------------------------------------------------------------

/// A rectangular analysis region in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
    pub lon: (f64, f64),
    pub lat: (f64, f64),
}

impl Region {
    /// Whether a point lies inside the region (bounds inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon.0 && lon <= self.lon.1 && lat >= self.lat.0 && lat <= self.lat.1
    }
}

pub const REGIONS: &[Region] = &[
    Region { code: "BI", name: "British Isles", lon: (-10.0, 2.0), lat: (50.0, 59.0) },
    Region { code: "IP", name: "Iberian Peninsula", lon: (-10.0, 3.0), lat: (36.0, 44.0) },
    Region { code: "FR", name: "France", lon: (-5.0, 5.0), lat: (44.0, 50.0) },
    Region { code: "ME", name: "Mid-Europe", lon: (2.0, 16.0), lat: (48.0, 55.0) },
    Region { code: "SC", name: "Scandinavia", lon: (5.0, 30.0), lat: (55.0, 70.0) },
    Region { code: "AL", name: "Alps", lon: (5.0, 15.0), lat: (44.0, 48.0) },
    Region { code: "MD", name: "Mediterranean", lon: (3.0, 25.0), lat: (36.0, 44.0) },
    Region { code: "EA", name: "Eastern Europe", lon: (16.0, 30.0), lat: (44.0, 55.0) },
];

pub fn region(code: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.code == code)
}

// ---------------------------------------------------------------------------
// CatalogConfig
// ---------------------------------------------------------------------------

/// Runtime knobs of a catalog. Defaults mirror the constants above.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// File name of the index sidecar inside each scanned directory.
    pub cache_file_name: String,
    /// Extensions (without dot) of dataset files.
    pub extensions: Vec<String>,
    /// Recognized variable codes in match order.
    pub variables: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_file_name: CACHE_FILE_NAME.to_string(),
            extensions: DATASET_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            variables: RECOGNIZED_VARIABLES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CatalogConfig {
    /// Defaults overridden by `CLIMATE_CATALOG_CACHE` (sidecar file name) and
    /// `CLIMATE_CATALOG_VARIABLES` (comma-separated codes).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(name) = lookup("CLIMATE_CATALOG_CACHE") {
            let name = name.trim();
            if !name.is_empty() {
                cfg.cache_file_name = name.to_string();
            }
        }
        if let Some(list) = lookup("CLIMATE_CATALOG_VARIABLES") {
            let vars: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            if !vars.is_empty() {
                cfg.variables = vars;
            }
        }
        cfg
    }
}
