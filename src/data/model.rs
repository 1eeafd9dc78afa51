use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::source_prefix;

// ---------------------------------------------------------------------------
// AttrValue – a single global or variable attribute
// ---------------------------------------------------------------------------

/// A dynamically-typed attribute value as found in dataset file headers.
/// Using `BTreeMap` / `BTreeSet` downstream so `AttrValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Array-valued attribute (e.g. `valid_range`).
    List(Vec<AttrValue>),
}

/// Global attributes of one file: attribute name → value.
pub type Attributes = BTreeMap<String, AttrValue>;

// -- Manual Eq/Ord so we can put AttrValue in BTreeSet --

impl Eq for AttrValue {}

impl PartialOrd for AttrValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttrValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use AttrValue::*;
        fn discriminant(v: &AttrValue) -> u8 {
            match v {
                Bool(_) => 0,
                Integer(_) => 1,
                Float(_) => 2,
                String(_) => 3,
                List(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for AttrValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AttrValue::String(s) => s.hash(state),
            AttrValue::Integer(i) => i.hash(state),
            AttrValue::Float(f) => f.to_bits().hash(state),
            AttrValue::Bool(b) => b.hash(state),
            AttrValue::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) => write!(f, "{s}"),
            AttrValue::Integer(i) => write!(f, "{i}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Integer(i)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl AttrValue {
    /// The string payload, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Guess a typed value from free text (command line `key=value` pairs).
    pub fn infer(s: &str) -> AttrValue {
        if let Ok(i) = s.parse::<i64>() {
            return AttrValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return AttrValue::Float(f);
        }
        if s == "true" || s == "false" {
            return AttrValue::Bool(s == "true");
        }
        AttrValue::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// DatasetRecord – one indexed file
// ---------------------------------------------------------------------------

/// Derived and passthrough metadata of a single dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Path the file was read from (directory-prefixed).
    pub filename: PathBuf,
    /// Canonical model/experiment/realization identifier.
    pub source: String,
    /// Start of the `period` attribute, when present.
    pub start_year: Option<i64>,
    /// End of the `period` attribute, when present.
    pub end_year: Option<i64>,
    /// Recognized physical variable contained in the file.
    pub variable_id: Option<String>,
    /// Every global attribute of the file, verbatim.
    pub attributes: Attributes,
}

impl DatasetRecord {
    /// Look up a field of the record viewed as one flat mapping.
    ///
    /// Derived fields shadow passthrough attributes of the same name. An unset
    /// optional derived field leaves the passthrough attribute visible.
    pub fn field(&self, key: &str) -> Option<Cow<'_, AttrValue>> {
        let derived = match key {
            "filename" => Some(AttrValue::String(
                self.filename.to_string_lossy().into_owned(),
            )),
            "source" => Some(AttrValue::String(self.source.clone())),
            "start_year" => self.start_year.map(AttrValue::Integer),
            "end_year" => self.end_year.map(AttrValue::Integer),
            "variable_id" => self.variable_id.clone().map(AttrValue::String),
            _ => None,
        };
        match derived {
            Some(v) => Some(Cow::Owned(v)),
            None => self.attributes.get(key).map(Cow::Borrowed),
        }
    }

    fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttrValue::as_str)
    }

    /// Short human-readable title for the model chain that produced the file.
    pub fn source_title(&self) -> Option<String> {
        let sid = self.attr_str("source_id");
        match self.attr_str("driving_source_id") {
            None | Some("REAN") => sid.map(str::to_string),
            Some(did @ ("OBS" | "ENS")) => Some(did.to_string()),
            Some(did) => {
                let sid = sid?;
                let prefix = source_prefix(sid).unwrap_or(sid);
                Some(format!("{prefix}/{did}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Index – the ordered collection of records for one directory
// ---------------------------------------------------------------------------

/// Records of one directory in file listing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    records: Vec<DatasetRecord>,
}

impl Index {
    pub fn new(records: Vec<DatasetRecord>) -> Self {
        Index { records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DatasetRecord> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DatasetRecord> {
        self.records.iter()
    }

    /// Sorted set of the distinct values one field takes across the index.
    pub fn distinct_values(&self, key: &str) -> BTreeSet<AttrValue> {
        self.records
            .iter()
            .filter_map(|r| r.field(key).map(Cow::into_owned))
            .collect()
    }
}

impl FromIterator<DatasetRecord> for Index {
    fn from_iter<I: IntoIterator<Item = DatasetRecord>>(iter: I) -> Self {
        Index::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a DatasetRecord;
    type IntoIter = std::slice::Iter<'a, DatasetRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Variable / Series – data read back from files
// ---------------------------------------------------------------------------

/// An n-dimensional numeric variable stored row-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variable {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
    pub attributes: Attributes,
}

impl Variable {
    /// Number of elements per step of the leading dimension.
    pub fn trailing_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }
}

/// The requested variables of one file plus its time axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    /// File the series was read from, attached by the selector.
    pub filename: Option<PathBuf>,
    /// Time axis, normalized to Julian dates in time-aware reads.
    pub time: Vec<f64>,
    pub variables: BTreeMap<String, Variable>,
}

/// Several series merged along their time dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinedSeries {
    /// Dimension the series were concatenated along.
    pub dimension: String,
    /// Name of the synthetic axis distinguishing the merged files.
    pub axis: String,
    pub time: Vec<f64>,
    /// Position in `filenames` of the file each time step came from.
    pub file_index: Vec<usize>,
    pub filenames: Vec<PathBuf>,
    pub variables: BTreeMap<String, Variable>,
}

impl CombinedSeries {
    /// Size of the file axis.
    pub fn n(&self) -> usize {
        self.filenames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attrs: &[(&str, AttrValue)]) -> DatasetRecord {
        DatasetRecord {
            filename: PathBuf::from("dir/a.nc"),
            source: "M_hist_r1".to_string(),
            start_year: None,
            end_year: None,
            variable_id: None,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn strict_equality_between_variants() {
        assert_ne!(AttrValue::Integer(1), AttrValue::Float(1.0));
        assert_ne!(AttrValue::from("1"), AttrValue::Integer(1));
        assert_eq!(AttrValue::from("tas"), AttrValue::String("tas".into()));
    }

    #[test]
    fn infer_guesses_types() {
        assert_eq!(AttrValue::infer("1980"), AttrValue::Integer(1980));
        assert_eq!(AttrValue::infer("0.5"), AttrValue::Float(0.5));
        assert_eq!(AttrValue::infer("true"), AttrValue::Bool(true));
        assert_eq!(AttrValue::infer("pr"), AttrValue::from("pr"));
    }

    #[test]
    fn display_renders_lists() {
        let v = AttrValue::List(vec![AttrValue::Integer(1), AttrValue::from("x")]);
        assert_eq!(v.to_string(), "[1, x]");
    }

    #[test]
    fn derived_fields_shadow_attributes() {
        let mut r = record(&[("variable_id", AttrValue::from("psl"))]);
        assert_eq!(
            r.field("variable_id").as_deref(),
            Some(&AttrValue::from("psl"))
        );
        r.variable_id = Some("tas".into());
        assert_eq!(
            r.field("variable_id").as_deref(),
            Some(&AttrValue::from("tas"))
        );
        assert_eq!(r.field("start_year"), None);
        assert_eq!(
            r.field("filename").as_deref(),
            Some(&AttrValue::from("dir/a.nc"))
        );
    }

    #[test]
    fn source_title_variants() {
        let r = record(&[("source_id", AttrValue::from("ERA5"))]);
        assert_eq!(r.source_title().as_deref(), Some("ERA5"));

        let r = record(&[
            ("source_id", AttrValue::from("E-OBS")),
            ("driving_source_id", AttrValue::from("OBS")),
        ]);
        assert_eq!(r.source_title().as_deref(), Some("OBS"));

        let r = record(&[
            ("source_id", AttrValue::from("HCLIM43-ALADIN")),
            ("driving_source_id", AttrValue::from("EC-Earth3")),
        ]);
        assert_eq!(r.source_title().as_deref(), Some("HC/EC-Earth3"));
    }

    #[test]
    fn distinct_values_collects_sorted() {
        let mut a = record(&[]);
        a.source = "b".into();
        let mut b = record(&[]);
        b.source = "a".into();
        let c = a.clone();
        let index = Index::new(vec![a, b, c]);
        let sources: Vec<_> = index.distinct_values("source").into_iter().collect();
        assert_eq!(sources, vec![AttrValue::from("a"), AttrValue::from("b")]);
    }
}
