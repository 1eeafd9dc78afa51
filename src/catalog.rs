use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache;
use crate::config::{CatalogConfig, FILE_AXIS, TIME_DIMENSION};
use crate::data::extract::extract;
use crate::data::filter::{Descriptor, matching};
use crate::data::loader::{DatasetReader, DsReader, TimeMode};
use crate::data::merge::{Layouts, merge};
use crate::data::model::{CombinedSeries, DatasetRecord, Index, Series};
use crate::error::{CatalogError, FileWarning, Outcome, Result};
use crate::executor::{Executor, Extraction};

/// Data returned by [`Catalog::select`].
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// All matching files merged along time.
    Merged(CombinedSeries),
    /// One series per matching file, in index order.
    Separate(Vec<Series>),
}

/// Indexes dataset directories and reads series out of them.
#[derive(Clone)]
pub struct Catalog {
    reader: Arc<dyn DatasetReader>,
    config: Arc<CatalogConfig>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DsReader)
    }
}

impl Catalog {
    pub fn new(reader: impl DatasetReader + 'static) -> Self {
        Self {
            reader: Arc::new(reader),
            config: Arc::new(CatalogConfig::default()),
        }
    }

    pub fn with_config(mut self, config: CatalogConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Location of the index sidecar for `dir`.
    pub fn cache_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.config.cache_file_name)
    }

    /// Derive the record of a single file.
    pub fn extract(&self, path: &Path) -> Result<DatasetRecord> {
        extract(self.reader.as_ref(), &self.config.variables, path)
    }

    /// Dataset files directly inside `dir`, sorted by name.
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let wanted = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| self.config.extensions.iter().any(|x| x == ext));
            if wanted && path.is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names.into_iter().map(|name| dir.join(name)).collect())
    }

    /// Scan `dir` and extract every dataset file.
    ///
    /// Files that fail are skipped and reported in the outcome's warnings.
    pub fn build(&self, dir: &Path, executor: Option<&dyn Executor>) -> Result<Outcome<Index>> {
        let files = self.list_files(dir)?;

        let results: Vec<Extraction> = match executor {
            Some(ex) => {
                let handles: Vec<_> = files
                    .iter()
                    .map(|path| {
                        let reader = Arc::clone(&self.reader);
                        let config = Arc::clone(&self.config);
                        let path = path.clone();
                        ex.submit(Box::new(move || {
                            extract(reader.as_ref(), &config.variables, &path)
                        }))
                    })
                    .collect();
                handles.into_iter().map(|h| h.result()).collect()
            }
            None => files.iter().map(|path| self.extract(path)).collect(),
        };

        let mut records = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        for (path, result) in files.iter().zip(results) {
            match result {
                Ok(mut record) => {
                    record.filename = path.clone();
                    records.push(record);
                }
                Err(e) => warnings.push(FileWarning::emit(path, e)),
            }
        }

        log::info!(
            "indexed {} of {} files in {}",
            records.len(),
            files.len(),
            dir.display()
        );
        Ok(Outcome::new(Index::new(records), warnings))
    }

    /// Return the cached index of `dir`, building it when the cache is absent,
    /// unreadable, or `force` is set.
    ///
    /// A freshly built index is not written back; see [`Catalog::write_cache`].
    pub fn load_or_build(
        &self,
        dir: &Path,
        executor: Option<&dyn Executor>,
        force: bool,
    ) -> Result<Outcome<Index>> {
        if !force {
            let path = self.cache_path(dir);
            match cache::read(&path) {
                Ok(index) => {
                    log::debug!("loaded {} records from {}", index.len(), path.display());
                    return Ok(Outcome::new(index, Vec::new()));
                }
                Err(e) => log::debug!("cache miss for {}: {e}", path.display()),
            }
        }
        self.build(dir, executor)
    }

    /// Persist `index` as the sidecar of `dir`.
    pub fn write_cache(&self, dir: &Path, index: &Index) -> Result<PathBuf> {
        let path = self.cache_path(dir);
        cache::write(&path, index)?;
        log::info!("wrote {} records to {}", index.len(), path.display());
        Ok(path)
    }

    /// Delete the sidecar of `dir`. Returns whether one existed.
    pub fn clear_cache(&self, dir: &Path) -> Result<bool> {
        Ok(cache::remove(&self.cache_path(dir))?)
    }

    /// Read `variables` from every indexed file matching `descriptor`.
    ///
    /// Uses `index` when given, otherwise the cached index of `dir`. Files that
    /// cannot be read, or whose series cannot join the merge, are skipped and
    /// reported in the outcome's warnings.
    pub fn select(
        &self,
        dir: &Path,
        descriptor: &Descriptor,
        variables: &[&str],
        merge_files: bool,
        index: Option<&Index>,
    ) -> Result<Outcome<Selection>> {
        let mut warnings = Vec::new();
        let loaded;
        let index = match index {
            Some(index) => index,
            None => {
                let outcome = self.load_or_build(dir, None, false)?;
                warnings.extend(outcome.warnings);
                loaded = outcome.value;
                &loaded
            }
        };

        let mut series = Vec::new();
        for record in matching(index, descriptor) {
            match self
                .reader
                .read_data(&record.filename, variables, TimeMode::JulianDate)
            {
                Ok(mut s) => {
                    s.filename = Some(record.filename.clone());
                    series.push(s);
                }
                Err(e) => warnings.push(FileWarning::emit(
                    &record.filename,
                    CatalogError::read(&record.filename, e),
                )),
            }
        }

        let selection = if merge_files {
            let mut layouts = Layouts::new(TIME_DIMENSION);
            series.retain(|s| match layouts.admit(s) {
                Ok(()) => true,
                Err(e) => {
                    let file = s.filename.as_deref().unwrap_or(dir);
                    warnings.push(FileWarning::emit(file, e));
                    false
                }
            });
            Selection::Merged(merge(series, TIME_DIMENSION, FILE_AXIS)?)
        } else {
            Selection::Separate(series)
        };
        Ok(Outcome::new(selection, warnings))
    }
}
