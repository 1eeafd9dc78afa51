//! Index and query directories of climate-model output.
//!
//! A [`Catalog`] scans a directory of `.nc` / `.ds` files, derives a
//! [`DatasetRecord`] per file (canonical source identifier, period bounds,
//! physical variable), caches the resulting [`Index`] in a sidecar file and
//! reads the series of files matching a [`Descriptor`], optionally merged
//! along time.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use climate_catalog::{AttrValue, Catalog, Descriptor, Selection};
//!
//! fn main() -> anyhow::Result<()> {
//!     let catalog = Catalog::default();
//!     let dir = Path::new("data/cmip6");
//!
//!     let index = catalog.load_or_build(dir, None, false)?.into_value();
//!     catalog.write_cache(dir, &index)?;
//!
//!     let mut desc = Descriptor::new();
//!     desc.insert("variable_id".into(), AttrValue::from("pr"));
//!     let outcome = catalog.select(dir, &desc, &["pr"], true, Some(&index))?;
//!     for warning in &outcome.warnings {
//!         eprintln!("{warning}");
//!     }
//!     if let Selection::Merged(series) = outcome.value {
//!         println!("{} files, {} steps", series.n(), series.time.len());
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod cache;
mod catalog;
pub mod config;
pub mod data;
mod error;
pub mod executor;

pub use catalog::{Catalog, Selection};
pub use config::CatalogConfig;
pub use data::filter::Descriptor;
pub use data::loader::{DatasetReader, DsReader, TimeMode, VariableMeta};
pub use data::model::{
    AttrValue, Attributes, CombinedSeries, DatasetRecord, Index, Series, Variable,
};
pub use error::{CatalogError, FileWarning, Outcome, Result};
pub use executor::{Executor, ExtractTask, Extraction, TaskHandle, WorkerPool};
