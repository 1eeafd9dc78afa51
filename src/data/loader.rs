use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value as JsonValue};

use super::model::{AttrValue, Attributes, Series, Variable};
use super::time::to_julian_date;
use crate::config::TIME_DIMENSION;

// ---------------------------------------------------------------------------
// Reader capability
// ---------------------------------------------------------------------------

/// How the time axis is returned by [`DatasetReader::read_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    /// Stored values, untouched.
    Raw,
    /// Julian dates decoded from the axis' `units` and `calendar`.
    JulianDate,
}

/// Header information about one variable of a file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableMeta {
    pub dims: Vec<String>,
    pub attributes: Attributes,
}

/// Access to dataset files. Implementations must be usable from worker threads.
pub trait DatasetReader: Send + Sync {
    /// Global attributes of the file.
    fn read_attributes(&self, path: &Path) -> Result<Attributes>;

    /// Variables of the file with their metadata, keyed by name.
    fn read_variables(&self, path: &Path) -> Result<BTreeMap<String, VariableMeta>>;

    /// The requested variables plus the time axis.
    fn read_data(&self, path: &Path, variables: &[&str], time: TimeMode) -> Result<Series>;
}

// ---------------------------------------------------------------------------
// Built-in reader
// ---------------------------------------------------------------------------

/// Reader for the JSON rendering of the ds format.
///
/// ```json
/// {
///   ".": {
///     ".": { "source_id": "EC-Earth3", "period": "1980-2010" },
///     "time": { ".dims": ["time"], "units": "days since 1970-01-01" },
///     "tas": { ".dims": ["time"], "units": "K" }
///   },
///   "time": [0, 31],
///   "tas": [271.3, 272.0]
/// }
/// ```
///
/// netCDF files need an external [`DatasetReader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DsReader;

impl DsReader {
    /// Parse a file into its top-level JSON object. Dispatch by extension.
    fn load(&self, path: &Path) -> Result<Map<String, JsonValue>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "ds" | "json" => load_json(path),
            "nc" => bail!("netCDF files require an external reader"),
            other => bail!("Unsupported file extension: .{other}"),
        }
    }
}

impl DatasetReader for DsReader {
    fn read_attributes(&self, path: &Path) -> Result<Attributes> {
        let root = self.load(path)?;
        let meta = metadata_object(&root)?;
        match meta.get(".") {
            Some(JsonValue::Object(attrs)) => Ok(json_to_attributes(attrs)),
            Some(_) => bail!("global attributes are not a JSON object"),
            None => Ok(Attributes::new()),
        }
    }

    fn read_variables(&self, path: &Path) -> Result<BTreeMap<String, VariableMeta>> {
        let root = self.load(path)?;
        variable_metas(metadata_object(&root)?)
    }

    fn read_data(&self, path: &Path, variables: &[&str], time: TimeMode) -> Result<Series> {
        let root = self.load(path)?;
        let metas = variable_metas(metadata_object(&root)?)?;

        let time_var = read_variable(&root, &metas, TIME_DIMENSION)?;
        if time_var.shape.len() != 1 {
            bail!("'{TIME_DIMENSION}' must be one-dimensional");
        }
        let time_values = match time {
            TimeMode::Raw => time_var.values,
            TimeMode::JulianDate => {
                let units = time_var
                    .attributes
                    .get("units")
                    .and_then(AttrValue::as_str)
                    .context("time axis has no units")?;
                let calendar = time_var.attributes.get("calendar").and_then(AttrValue::as_str);
                to_julian_date(&time_var.values, units, calendar)?
            }
        };

        let mut out = BTreeMap::new();
        for &name in variables {
            if name == TIME_DIMENSION {
                continue;
            }
            out.insert(name.to_string(), read_variable(&root, &metas, name)?);
        }

        Ok(Series {
            filename: None,
            time: time_values,
            variables: out,
        })
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Map<String, JsonValue>> {
    let text = std::fs::read_to_string(path).context("reading ds file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    match root {
        JsonValue::Object(map) => Ok(map),
        _ => bail!("Expected top-level JSON object"),
    }
}

fn metadata_object(root: &Map<String, JsonValue>) -> Result<&Map<String, JsonValue>> {
    root.get(".")
        .and_then(JsonValue::as_object)
        .context("missing '.' metadata object")
}

fn variable_metas(meta: &Map<String, JsonValue>) -> Result<BTreeMap<String, VariableMeta>> {
    let mut out = BTreeMap::new();
    for (name, value) in meta {
        if name == "." {
            continue;
        }
        let obj = value
            .as_object()
            .with_context(|| format!("metadata of '{name}' is not a JSON object"))?;
        let dims = match obj.get(".dims") {
            Some(JsonValue::Array(dims)) => dims
                .iter()
                .map(|d| {
                    d.as_str()
                        .map(str::to_string)
                        .with_context(|| format!("'{name}': dimension name is not a string"))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => bail!("'{name}': '.dims' is not an array"),
            None => Vec::new(),
        };
        let attributes = obj
            .iter()
            .filter(|(k, _)| !k.starts_with('.'))
            .map(|(k, v)| (k.clone(), json_to_attr(v)))
            .collect();
        out.insert(name.clone(), VariableMeta { dims, attributes });
    }
    Ok(out)
}

fn read_variable(
    root: &Map<String, JsonValue>,
    metas: &BTreeMap<String, VariableMeta>,
    name: &str,
) -> Result<Variable> {
    let meta = metas
        .get(name)
        .with_context(|| format!("variable '{name}' not found"))?;
    let data = root
        .get(name)
        .with_context(|| format!("variable '{name}' has no data"))?;

    let mut shape = Vec::new();
    let mut values = Vec::new();
    flatten(data, 0, &mut shape, &mut values).with_context(|| format!("variable '{name}'"))?;

    if meta.dims.len() != shape.len() {
        bail!(
            "variable '{name}' has {} dimensions but {} are declared in '.dims'",
            shape.len(),
            meta.dims.len()
        );
    }

    Ok(Variable {
        dims: meta.dims.clone(),
        shape,
        values,
        attributes: meta.attributes.clone(),
    })
}

/// Flatten nested JSON arrays row-major, recording the shape on first visit
/// of each depth and rejecting ragged input.
fn flatten(
    value: &JsonValue,
    depth: usize,
    shape: &mut Vec<usize>,
    out: &mut Vec<f64>,
) -> Result<()> {
    match value {
        JsonValue::Array(items) => {
            if shape.len() == depth {
                if !out.is_empty() {
                    bail!("ragged array");
                }
                shape.push(items.len());
            } else if shape.len() < depth || shape[depth] != items.len() {
                bail!("ragged array");
            }
            for item in items {
                flatten(item, depth + 1, shape, out)?;
            }
            Ok(())
        }
        JsonValue::Number(n) if shape.len() == depth => {
            out.push(n.as_f64().unwrap_or(f64::NAN));
            Ok(())
        }
        JsonValue::Null if shape.len() == depth => {
            out.push(f64::NAN);
            Ok(())
        }
        JsonValue::Number(_) | JsonValue::Null => bail!("ragged array"),
        other => bail!("not a number: {other}"),
    }
}

fn json_to_attributes(obj: &Map<String, JsonValue>) -> Attributes {
    obj.iter()
        .map(|(k, v)| (k.clone(), json_to_attr(v)))
        .collect()
}

fn json_to_attr(val: &JsonValue) -> AttrValue {
    match val {
        JsonValue::String(s) => AttrValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttrValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                AttrValue::Float(f)
            } else {
                AttrValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => AttrValue::Bool(*b),
        JsonValue::Array(items) => AttrValue::List(items.iter().map(json_to_attr).collect()),
        other => AttrValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, doc: &JsonValue) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }

    fn sample() -> JsonValue {
        json!({
            ".": {
                ".": {"source_id": "EC-Earth3", "period": "1980-2010", "realization": 1},
                "time": {".dims": ["time"], "units": "days since 1970-01-01", "calendar": "standard"},
                "tas_mean": {".dims": ["time"], "units": "K"},
                "grid": {".dims": ["time", "cell"]}
            },
            "time": [0, 1, 2],
            "tas_mean": [271.0, null, 273.5],
            "grid": [[1, 2], [3, 4], [5, 6]]
        })
    }

    #[test]
    fn reads_attributes_and_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.ds", &sample());

        let attrs = DsReader.read_attributes(&path).unwrap();
        assert_eq!(attrs["source_id"], AttrValue::from("EC-Earth3"));
        assert_eq!(attrs["realization"], AttrValue::Integer(1));

        let vars = DsReader.read_variables(&path).unwrap();
        assert_eq!(vars.keys().collect::<Vec<_>>(), vec!["grid", "tas_mean", "time"]);
        assert_eq!(vars["tas_mean"].attributes["units"], AttrValue::from("K"));
    }

    #[test]
    fn reads_data_with_julian_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.ds", &sample());

        let series = DsReader
            .read_data(&path, &["tas_mean", "grid"], TimeMode::JulianDate)
            .unwrap();
        assert_eq!(series.time, vec![2_440_587.5, 2_440_588.5, 2_440_589.5]);
        let tas = &series.variables["tas_mean"];
        assert_eq!(tas.shape, vec![3]);
        assert!(tas.values[1].is_nan());
        let grid = &series.variables["grid"];
        assert_eq!(grid.shape, vec![3, 2]);
        assert_eq!(grid.values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let raw = DsReader.read_data(&path, &[], TimeMode::Raw).unwrap();
        assert_eq!(raw.time, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn missing_variable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.ds", &sample());
        assert!(DsReader.read_data(&path, &["pr"], TimeMode::Raw).is_err());
    }

    #[test]
    fn undeclared_or_mismatched_dims_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample();
        doc["."]["tas_mean"] = json!({"units": "K"});
        doc["."]["grid"] = json!({".dims": ["time"]});
        let path = write(dir.path(), "a.ds", &doc);

        let err = DsReader
            .read_data(&path, &["tas_mean"], TimeMode::Raw)
            .unwrap_err();
        assert!(format!("{err:#}").contains("'.dims'"));
        assert!(DsReader.read_data(&path, &["grid"], TimeMode::Raw).is_err());
    }

    #[test]
    fn ragged_arrays_are_rejected() {
        let mut value = Vec::new();
        let mut shape = Vec::new();
        let ragged = json!([[1, 2], [3]]);
        assert!(flatten(&ragged, 0, &mut shape, &mut value).is_err());
    }

    #[test]
    fn netcdf_needs_external_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.nc");
        std::fs::write(&path, b"CDF\x01").unwrap();
        let err = DsReader.read_attributes(&path).unwrap_err();
        assert!(err.to_string().contains("external reader"));
    }
}
