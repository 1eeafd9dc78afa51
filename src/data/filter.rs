use std::collections::BTreeMap;

use super::model::{AttrValue, DatasetRecord, Index};

// ---------------------------------------------------------------------------
// Descriptor: exact-match selection over record fields
// ---------------------------------------------------------------------------

/// Field name → required value. Every entry must match (logical AND).
pub type Descriptor = BTreeMap<String, AttrValue>;

/// Whether a record passes a descriptor.
///
/// A record passes when, for every descriptor entry:
/// * the record has the field (derived or passthrough), and
/// * the field's value equals the entry's value exactly (no coercion).
///
/// An empty descriptor passes every record.
pub fn matches(record: &DatasetRecord, descriptor: &Descriptor) -> bool {
    descriptor
        .iter()
        .all(|(key, wanted)| record.field(key).is_some_and(|v| *v == *wanted))
}

/// Records of `index` passing `descriptor`, in index order.
pub fn matching<'a>(index: &'a Index, descriptor: &Descriptor) -> Vec<&'a DatasetRecord> {
    index
        .iter()
        .filter(|record| matches(record, descriptor))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn record(name: &str, attrs: &[(&str, AttrValue)]) -> DatasetRecord {
        DatasetRecord {
            filename: PathBuf::from(name),
            source: "M_hist_r1".into(),
            start_year: Some(1980),
            end_year: Some(2010),
            variable_id: Some("pr".into()),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn descriptor(pairs: &[(&str, AttrValue)]) -> Descriptor {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn conjunctive_and_strict() {
        let both = record("a", &[("a", 1i64.into()), ("b", 2i64.into()), ("extra", "x".into())]);
        let missing_b = record("b", &[("a", 1i64.into())]);
        let wrong_b = record("c", &[("a", 1i64.into()), ("b", 3i64.into())]);
        let float_b = record("d", &[("a", 1i64.into()), ("b", 2.0f64.into())]);
        let index = Index::new(vec![both, missing_b, wrong_b, float_b]);

        let desc = descriptor(&[("a", 1i64.into()), ("b", 2i64.into())]);
        let names: Vec<_> = matching(&index, &desc)
            .iter()
            .map(|r| r.filename.clone())
            .collect();
        assert_eq!(names, vec![PathBuf::from("a")]);
    }

    #[test]
    fn derived_fields_are_filterable() {
        let r = record("a", &[]);
        assert!(matches(&r, &descriptor(&[("variable_id", "pr".into())])));
        assert!(matches(&r, &descriptor(&[("start_year", 1980i64.into())])));
        assert!(!matches(&r, &descriptor(&[("start_year", "1980".into())])));
        assert!(matches(&r, &Descriptor::new()));
    }
}
