use std::collections::BTreeMap;
use std::path::Path;

use super::loader::{DatasetReader, VariableMeta};
use super::model::{AttrValue, Attributes, DatasetRecord};
use crate::error::{CatalogError, Result};

/// Read one file's header and derive its index record.
pub fn extract(
    reader: &dyn DatasetReader,
    recognized: &[String],
    path: &Path,
) -> Result<DatasetRecord> {
    let attributes = reader
        .read_attributes(path)
        .map_err(|e| CatalogError::read(path, e))?;
    let variables = reader
        .read_variables(path)
        .map_err(|e| CatalogError::read(path, e))?;

    let source = source_name(&attributes)?;
    let (start_year, end_year) = match attributes.get("period") {
        Some(period) => {
            let (start, end) = parse_period(period)?;
            (Some(start), Some(end))
        }
        None => (None, None),
    };
    let variable_id = detect_variable(recognized, &variables).map(str::to_string);

    Ok(DatasetRecord {
        filename: path.to_path_buf(),
        source,
        start_year,
        end_year,
        variable_id,
        attributes,
    })
}

fn required(a: &Attributes, key: &str) -> Result<String> {
    a.get(key)
        .map(AttrValue::to_string)
        .ok_or_else(|| CatalogError::MissingAttribute(key.to_string()))
}

fn preferred(a: &Attributes, key: &str, fallback: &str) -> Option<String> {
    a.get(key).or_else(|| a.get(fallback)).map(AttrValue::to_string)
}

/// Canonical source identifier of a file.
///
/// Regional simulations (those carrying `domain_id`) are identified by the full
/// downscaling chain; global ones by model, experiment and variant.
pub fn source_name(a: &Attributes) -> Result<String> {
    let parts = if a.contains_key("domain_id") {
        let experiment = preferred(a, "driving_experiment_id", "experiment_id")
            .map(|e| e.to_lowercase())
            .unwrap_or_else(|| "None".to_string());
        vec![
            required(a, "domain_id")?,
            required(a, "driving_source_id")?,
            experiment,
            required(a, "driving_variant_label")?,
            preferred(a, "institution_id", "institute_id")
                .ok_or_else(|| CatalogError::MissingAttribute("institution_id".into()))?,
            required(a, "source_id")?,
            a.get("version_realization")
                .map(AttrValue::to_string)
                .unwrap_or_else(|| "v1-r1".to_string()),
            required(a, "frequency")?,
        ]
    } else {
        vec![
            required(a, "source_id")?,
            required(a, "experiment_id")?.to_lowercase(),
            preferred(a, "variant_label", "driving_variant_label")
                .ok_or_else(|| CatalogError::MissingAttribute("variant_label".into()))?,
        ]
    };
    Ok(parts.join("_"))
}

/// Parse a `"<start>-<end>"` period into its two years.
pub fn parse_period(period: &AttrValue) -> Result<(i64, i64)> {
    let malformed = || CatalogError::MalformedPeriod(period.to_string());
    let text = period.as_str().ok_or_else(malformed)?;
    let (start, end) = text.split_once('-').ok_or_else(malformed)?;
    let start = start.trim().parse().map_err(|_| malformed())?;
    let end = end.trim().parse().map_err(|_| malformed())?;
    Ok((start, end))
}

/// The last recognized code present as `<code>`, `<code>_mean` or
/// `<code>_mean_ts` among the file's variables.
pub fn detect_variable<'a>(
    recognized: &'a [String],
    variables: &BTreeMap<String, VariableMeta>,
) -> Option<&'a str> {
    let mut found = None;
    for code in recognized {
        let code = code.as_str();
        if variables.contains_key(code)
            || variables.contains_key(&format!("{code}_mean"))
            || variables.contains_key(&format!("{code}_mean_ts"))
        {
            found = Some(code);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RECOGNIZED_VARIABLES;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttrValue::from(*v)))
            .collect()
    }

    fn vars(names: &[&str]) -> BTreeMap<String, VariableMeta> {
        names
            .iter()
            .map(|n| (n.to_string(), VariableMeta::default()))
            .collect()
    }

    fn recognized() -> Vec<String> {
        RECOGNIZED_VARIABLES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn global_source_name() {
        let a = attrs(&[
            ("source_id", "EC-Earth3"),
            ("experiment_id", "SSP585"),
            ("variant_label", "r1i1p1f1"),
        ]);
        assert_eq!(source_name(&a).unwrap(), "EC-Earth3_ssp585_r1i1p1f1");
        assert_eq!(source_name(&a).unwrap(), source_name(&a.clone()).unwrap());
    }

    #[test]
    fn global_source_falls_back_to_driving_variant() {
        let a = attrs(&[
            ("source_id", "ERA5"),
            ("experiment_id", "Reanalysis"),
            ("driving_variant_label", "r0"),
        ]);
        assert_eq!(source_name(&a).unwrap(), "ERA5_reanalysis_r0");
    }

    #[test]
    fn regional_source_name() {
        let mut a = attrs(&[
            ("domain_id", "EUR-12"),
            ("driving_source_id", "EC-Earth3-Veg"),
            ("driving_experiment_id", "Historical"),
            ("experiment_id", "evaluation"),
            ("driving_variant_label", "r1i1p1f1"),
            ("institute_id", "SMHI"),
            ("source_id", "RCA4"),
            ("frequency", "mon"),
        ]);
        assert_eq!(
            source_name(&a).unwrap(),
            "EUR-12_EC-Earth3-Veg_historical_r1i1p1f1_SMHI_RCA4_v1-r1_mon"
        );

        a.insert("institution_id".into(), AttrValue::from("DMI"));
        a.insert("version_realization".into(), AttrValue::from("v2-r1"));
        a.remove("driving_experiment_id");
        assert_eq!(
            source_name(&a).unwrap(),
            "EUR-12_EC-Earth3-Veg_evaluation_r1i1p1f1_DMI_RCA4_v2-r1_mon"
        );

        a.remove("experiment_id");
        assert_eq!(
            source_name(&a).unwrap(),
            "EUR-12_EC-Earth3-Veg_None_r1i1p1f1_DMI_RCA4_v2-r1_mon"
        );
    }

    #[test]
    fn missing_required_attribute() {
        let a = attrs(&[("source_id", "M"), ("variant_label", "r1")]);
        match source_name(&a) {
            Err(CatalogError::MissingAttribute(name)) => assert_eq!(name, "experiment_id"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_string_components_are_rendered() {
        let mut a = attrs(&[("source_id", "M"), ("experiment_id", "X")]);
        a.insert("variant_label".into(), AttrValue::Integer(3));
        assert_eq!(source_name(&a).unwrap(), "M_x_3");
    }

    #[test]
    fn period_parsing() {
        assert_eq!(parse_period(&AttrValue::from("1980-2010")).unwrap(), (1980, 2010));
        assert!(matches!(
            parse_period(&AttrValue::from("garbage")),
            Err(CatalogError::MalformedPeriod(_))
        ));
        assert!(parse_period(&AttrValue::from("1980-")).is_err());
        assert!(parse_period(&AttrValue::Integer(1980)).is_err());
    }

    #[test]
    fn mean_variants_are_detected() {
        let r = recognized();
        assert_eq!(detect_variable(&r, &vars(&["time", "tas_mean"])), Some("tas"));
        assert_eq!(detect_variable(&r, &vars(&["pr_mean_ts"])), Some("pr"));
        assert_eq!(detect_variable(&r, &vars(&["time", "lat"])), None);
    }

    #[test]
    fn last_match_wins() {
        let r = recognized();
        assert_eq!(
            detect_variable(&r, &vars(&["tasmin", "pr", "tas"])),
            Some("tasmin")
        );
    }
}
