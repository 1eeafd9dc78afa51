use std::collections::BTreeMap;

use super::model::{CombinedSeries, Series, Variable};
use crate::error::{CatalogError, Result};

/// Variable layouts fixed by the series admitted so far to one merge.
///
/// A series that passes [`Layouts::admit`] can be merged with every series
/// admitted before it.
#[derive(Debug, Clone)]
pub struct Layouts {
    dim: String,
    seen: BTreeMap<String, (Vec<String>, Vec<usize>)>,
}

impl Layouts {
    /// Empty layout set for a merge along `dim`.
    pub fn new(dim: &str) -> Self {
        Layouts {
            dim: dim.to_string(),
            seen: BTreeMap::new(),
        }
    }

    /// Check `series` on its own and against the layouts admitted so far,
    /// then record the layouts of the variables it introduces.
    pub fn admit(&mut self, series: &Series) -> Result<()> {
        for (name, var) in &series.variables {
            let skip = check_variable(name, var, series.time.len(), &self.dim)?;
            if let Some((dims, shape)) = self.seen.get(name) {
                if *dims != var.dims || shape.get(skip..) != var.shape.get(skip..) {
                    return Err(CatalogError::Merge(format!(
                        "'{name}' has dims {dims:?} {shape:?} in one file and {:?} {:?} in another",
                        var.dims, var.shape
                    )));
                }
            }
        }
        for (name, var) in &series.variables {
            self.seen
                .entry(name.clone())
                .or_insert_with(|| (var.dims.clone(), var.shape.clone()));
        }
        Ok(())
    }
}

/// Consistency of one variable with itself and its series' time axis.
/// Returns how many leading axes may differ between series.
fn check_variable(name: &str, var: &Variable, steps: usize, dim: &str) -> Result<usize> {
    if var.dims.len() != var.shape.len() {
        return Err(CatalogError::Merge(format!(
            "'{name}' declares {} dimensions but has shape {:?}",
            var.dims.len(),
            var.shape
        )));
    }
    if var.values.len() != var.shape.iter().product::<usize>() {
        return Err(CatalogError::Merge(format!(
            "'{name}' holds {} values but has shape {:?}",
            var.values.len(),
            var.shape
        )));
    }
    match var.dims.iter().position(|d| d == dim) {
        Some(0) if var.shape[0] == steps => Ok(1),
        Some(0) => Err(CatalogError::Merge(format!(
            "'{name}' has {} steps but the {dim} axis has {steps}",
            var.shape[0]
        ))),
        Some(_) => Err(CatalogError::Merge(format!(
            "'{dim}' is not the leading dimension of '{name}'"
        ))),
        None => Ok(0),
    }
}

/// Merge per-file series along `dim`, adding a `new_axis` that tells the
/// originating files apart.
///
/// Variables led by `dim` are concatenated along it. Variables without `dim`
/// are stacked along `new_axis`. A variable missing from a series is filled
/// with `NaN` for that series' block.
pub fn merge(series: Vec<Series>, dim: &str, new_axis: &str) -> Result<CombinedSeries> {
    let mut layouts = Layouts::new(dim);
    for s in &series {
        layouts.admit(s)?;
    }

    let mut combined = CombinedSeries {
        dimension: dim.to_string(),
        axis: new_axis.to_string(),
        ..Default::default()
    };

    {
        // First occurrence of each variable fixes its layout.
        let mut templates: BTreeMap<&str, &Variable> = BTreeMap::new();
        for s in &series {
            for (name, var) in &s.variables {
                templates.entry(name.as_str()).or_insert(var);
            }
        }

        for (name, template) in templates {
            let merged = if template.dims.first().map(String::as_str) == Some(dim) {
                concat_along(&series, name, template)
            } else {
                stack_along(&series, name, template, new_axis)
            };
            combined.variables.insert(name.to_string(), merged);
        }
    }

    for (k, s) in series.into_iter().enumerate() {
        combined.file_index.extend(std::iter::repeat(k).take(s.time.len()));
        combined.time.extend(s.time);
        combined.filenames.push(s.filename.unwrap_or_default());
    }

    Ok(combined)
}

fn concat_along(series: &[Series], name: &str, template: &Variable) -> Variable {
    let trailing = template.trailing_len();
    let mut values = Vec::new();
    let mut steps = 0;

    for s in series {
        let len = s.time.len();
        match s.variables.get(name) {
            Some(var) => values.extend_from_slice(&var.values),
            None => values.extend(std::iter::repeat(f64::NAN).take(len * trailing)),
        }
        steps += len;
    }

    let mut shape = template.shape.clone();
    shape[0] = steps;
    Variable {
        dims: template.dims.clone(),
        shape,
        values,
        attributes: template.attributes.clone(),
    }
}

fn stack_along(series: &[Series], name: &str, template: &Variable, new_axis: &str) -> Variable {
    let size: usize = template.shape.iter().product();
    let mut values = Vec::with_capacity(size * series.len());

    for s in series {
        match s.variables.get(name) {
            Some(var) => values.extend_from_slice(&var.values),
            None => values.extend(std::iter::repeat(f64::NAN).take(size)),
        }
    }

    let mut dims = vec![new_axis.to_string()];
    dims.extend(template.dims.iter().cloned());
    let mut shape = vec![series.len()];
    shape.extend_from_slice(&template.shape);
    Variable {
        dims,
        shape,
        values,
        attributes: template.attributes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn var(dims: &[&str], shape: &[usize], values: &[f64]) -> Variable {
        Variable {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            shape: shape.to_vec(),
            values: values.to_vec(),
            attributes: Default::default(),
        }
    }

    fn series(name: &str, time: &[f64], vars: Vec<(&str, Variable)>) -> Series {
        Series {
            filename: Some(PathBuf::from(name)),
            time: time.to_vec(),
            variables: vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    #[test]
    fn concatenates_disjoint_ranges() {
        let a = series("a.ds", &[1.0, 2.0], vec![("pr", var(&["time"], &[2], &[0.1, 0.2]))]);
        let b = series(
            "b.ds",
            &[3.0, 4.0, 5.0],
            vec![("pr", var(&["time"], &[3], &[0.3, 0.4, 0.5]))],
        );

        let m = merge(vec![a, b], "time", "n").unwrap();
        assert_eq!(m.n(), 2);
        assert_eq!(m.time, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(m.file_index, vec![0, 0, 1, 1, 1]);
        assert_eq!(m.filenames, vec![PathBuf::from("a.ds"), PathBuf::from("b.ds")]);
        assert_eq!(m.variables["pr"].shape, vec![5]);
        assert_eq!(m.variables["pr"].values, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn overlapping_ranges_stay_distinguishable() {
        let a = series("a", &[1.0], vec![("tas", var(&["time"], &[1], &[270.0]))]);
        let b = series("b", &[1.0], vec![("tas", var(&["time"], &[1], &[280.0]))]);
        let m = merge(vec![a, b], "time", "n").unwrap();
        assert_eq!(m.time, vec![1.0, 1.0]);
        assert_eq!(m.file_index, vec![0, 1]);
    }

    #[test]
    fn stacks_static_variables_and_fills_gaps() {
        let a = series(
            "a",
            &[1.0],
            vec![
                ("height", var(&[], &[], &[2.0])),
                ("tas", var(&["time", "cell"], &[1, 2], &[1.0, 2.0])),
            ],
        );
        let b = series("b", &[2.0, 3.0], vec![]);

        let m = merge(vec![a, b], "time", "n").unwrap();
        let height = &m.variables["height"];
        assert_eq!(height.dims, vec!["n"]);
        assert_eq!(height.shape, vec![2]);
        assert_eq!(height.values[0], 2.0);
        assert!(height.values[1].is_nan());

        let tas = &m.variables["tas"];
        assert_eq!(tas.shape, vec![3, 2]);
        assert_eq!(tas.values.len(), 6);
        assert!(tas.values[2..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rejects_inconsistent_layouts() {
        let a = series("a", &[1.0], vec![("tas", var(&["time", "x"], &[1, 2], &[1.0, 2.0]))]);
        let b = series("b", &[1.0], vec![("tas", var(&["time", "x"], &[1, 3], &[1.0, 2.0, 3.0]))]);
        assert!(matches!(
            merge(vec![a, b], "time", "n"),
            Err(CatalogError::Merge(_))
        ));

        let c = series("c", &[1.0], vec![("v", var(&["x", "time"], &[1, 1], &[1.0]))]);
        assert!(merge(vec![c], "time", "n").is_err());

        let d = series("d", &[1.0, 2.0], vec![("v", var(&["time"], &[1], &[1.0]))]);
        assert!(merge(vec![d], "time", "n").is_err());
    }

    #[test]
    fn admit_rejects_only_the_inconsistent_series() {
        let good = series("a", &[1.0, 2.0], vec![("pr", var(&["time"], &[2], &[0.1, 0.2]))]);
        let too_long = series(
            "b",
            &[3.0, 4.0],
            vec![("pr", var(&["time"], &[3], &[0.3, 0.4, 0.5]))],
        );
        let undeclared = series("c", &[5.0, 6.0], vec![("pr", var(&[], &[2], &[0.5, 0.6]))]);
        let short_values = series("d", &[7.0], vec![("pr", var(&["time"], &[1], &[]))]);
        let later = series("e", &[8.0], vec![("pr", var(&["time"], &[1], &[0.8]))]);

        let mut layouts = Layouts::new("time");
        assert!(layouts.admit(&good).is_ok());
        assert!(layouts.admit(&too_long).is_err());
        assert!(layouts.admit(&undeclared).is_err());
        assert!(layouts.admit(&short_values).is_err());
        assert!(layouts.admit(&later).is_ok());

        let m = merge(vec![good, later], "time", "n").unwrap();
        assert_eq!(m.variables["pr"].values, vec![0.1, 0.2, 0.8]);
    }

    #[test]
    fn rejected_series_leaves_no_layout_behind() {
        let bad = series(
            "a",
            &[1.0],
            vec![
                ("height", var(&[], &[], &[2.0])),
                ("tas", var(&["time"], &[2], &[1.0, 2.0])),
            ],
        );
        let good = series("b", &[1.0], vec![("height", var(&["x"], &[1], &[3.0]))]);

        let mut layouts = Layouts::new("time");
        assert!(layouts.admit(&bad).is_err());
        assert!(layouts.admit(&good).is_ok());
    }

    #[test]
    fn empty_input() {
        let m = merge(Vec::new(), "time", "n").unwrap();
        assert_eq!(m.n(), 0);
        assert!(m.time.is_empty());
    }
}
