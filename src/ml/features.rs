use crate::config::ColumnLayout;
use crate::structs::{Comparison, ComparisonData, CsvData, Label, Result, VipError};
use linfa::Dataset;
use ndarray::{Array1, Array2, Axis};

/// Minimum samples per label, leave-one-out needs both classes in every fold
pub const MIN_SAMPLES_PER_LABEL: usize = 2;

/// Numeric view of a dataset table, validated once and reused for every comparison
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    feature_names: Vec<String>,
    values: Array2<f64>,
    sample_ids: Vec<String>,
    groups: Vec<String>,
    subgroups: Vec<String>,
}

impl FeatureBuilder {
    /// Validate the table against the column layout and parse every feature value
    ///
    /// # Errors
    /// Returns `VipError::Schema` if a metadata column is absent, no feature
    /// column remains, or a feature cell is not a number
    pub fn new(table: &CsvData, layout: &ColumnLayout) -> Result<Self> {
        let missing: Vec<&str> = layout
            .metadata
            .iter()
            .filter(|name| table.column_index(name).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(VipError::Schema(format!(
                "metadata column(s) not in dataset: {}",
                missing.join(", ")
            )));
        }

        let feature_cols: Vec<usize> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !layout.metadata.contains(h))
            .map(|(i, _)| i)
            .collect();
        if feature_cols.is_empty() {
            return Err(VipError::Schema("no feature columns in dataset".into()));
        }

        let mut values = Array2::zeros((table.row_count(), feature_cols.len()));
        for (row_idx, row) in table.rows.iter().enumerate() {
            for (j, &col_idx) in feature_cols.iter().enumerate() {
                let cell = row.get(col_idx).map_or("", |s| s.trim());
                values[[row_idx, j]] = cell.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                    VipError::Schema(format!(
                        "non-numeric value '{cell}' in feature column '{}' at row {}",
                        table.headers[col_idx],
                        row_idx + 1
                    ))
                })?;
            }
        }

        let column = |name: &str| -> Vec<String> {
            table
                .column_index(name)
                .and_then(|i| table.column(i))
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect()
        };

        Ok(Self {
            feature_names: feature_cols.iter().map(|&i| table.headers[i].clone()).collect(),
            values,
            sample_ids: column(&layout.sample_id),
            groups: column(&layout.group),
            subgroups: column(&layout.subgroup),
        })
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    /// Retained row indices and their labels, in table order
    #[must_use]
    pub fn select(&self, comparison: &Comparison) -> Vec<(usize, Label)> {
        self.groups
            .iter()
            .zip(&self.subgroups)
            .enumerate()
            .filter_map(|(i, (g, s))| comparison.label_for(g, s).map(|label| (i, label)))
            .collect()
    }

    /// Feature matrix and label vector for one comparison
    ///
    /// # Errors
    /// Returns `VipError::InsufficientData` if fewer than two labels remain or
    /// a label has fewer than two samples
    pub fn build(&self, comparison: &Comparison) -> Result<ComparisonData> {
        let selected = self.select(comparison);

        let positive = selected.iter().filter(|(_, l)| *l == Label::Positive).count();
        let negative = selected.len() - positive;
        if positive == 0 || negative == 0 {
            return Err(VipError::InsufficientData(format!(
                "'{}' needs two labels, found {positive} '{}' and {negative} '{}' samples",
                comparison.name, comparison.positive, comparison.negative
            )));
        }
        for (count, label) in [(positive, &comparison.positive), (negative, &comparison.negative)] {
            if count < MIN_SAMPLES_PER_LABEL {
                return Err(VipError::InsufficientData(format!(
                    "'{}' has {count} sample(s) labelled '{label}', at least {MIN_SAMPLES_PER_LABEL} required",
                    comparison.name
                )));
            }
        }

        let rows: Vec<usize> = selected.iter().map(|(i, _)| *i).collect();
        let records = self.values.select(Axis(0), &rows);
        let targets: Array1<usize> = selected
            .iter()
            .map(|(_, l)| usize::from(*l == Label::Positive))
            .collect();

        Ok(ComparisonData {
            dataset: Dataset::new(records, targets).with_feature_names(self.feature_names.clone()),
            positive: comparison.positive.clone(),
            negative: comparison.negative.clone(),
            sample_ids: rows.iter().map(|&i| self.sample_ids[i].clone()).collect(),
        })
    }
}
