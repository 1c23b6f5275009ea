//! Analysis configuration, loaded from an optional YAML file

use crate::structs::{ReferencePanel, Result, Scaling, VipError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which dataset columns carry metadata and how groups are labelled
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnLayout {
    pub sample_id: String,
    pub group: String,
    pub subgroup: String,
    /// Every column excluded from the feature matrix
    pub metadata: Vec<String>,
    /// Negative label of the global comparison
    pub control_group: Option<String>,
    /// Sub-group left out of the one-vs-rest family
    pub baseline_subgroup: String,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            sample_id: "SampleID".into(),
            group: "Group".into(),
            subgroup: "Subgroup".into(),
            metadata: vec!["SampleID".into(), "Group".into(), "Subgroup".into()],
            control_group: None,
            baseline_subgroup: "CTRL".into(),
        }
    }
}

/// Parameters of the OPLS-DA fit
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub scaling: Scaling,
    /// Cross-validation folds, `None` for leave-one-out
    pub cv_folds: Option<usize>,
    pub max_orthogonal: usize,
    pub min_q2_improvement: f64,
    pub permutations: usize,
    pub seed: u64,
    /// Wall-clock budget per comparison
    pub fit_budget_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scaling: Scaling::Standard,
            cv_folds: None,
            max_orthogonal: 9,
            min_q2_improvement: 0.01,
            permutations: 20,
            seed: 123,
            fit_budget_secs: None,
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn fit_budget(&self) -> Option<Duration> {
        self.fit_budget_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    pub enabled: bool,
    /// TrueType font for titles and labels, system fonts are probed otherwise
    pub font_path: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_path: None,
        }
    }
}

/// Top-level configuration for a batch run
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub columns: ColumnLayout,
    pub reference_panel: Vec<String>,
    pub output_dir: PathBuf,
    pub model: ModelConfig,
    pub charts: ChartConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            columns: ColumnLayout::default(),
            reference_panel: Vec::new(),
            output_dir: PathBuf::from("vip_output"),
            model: ModelConfig::default(),
            charts: ChartConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load and validate a YAML config file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid YAML for this
    /// schema, or fails validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document
    ///
    /// # Errors
    /// Returns error on invalid YAML or failed validation
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    ///
    /// # Errors
    /// Returns `VipError::Config` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        let cols = &self.columns;
        for (role, name) in [
            ("sample_id", &cols.sample_id),
            ("group", &cols.group),
            ("subgroup", &cols.subgroup),
        ] {
            if name.trim().is_empty() {
                return Err(VipError::Config(format!("columns.{role} is empty")));
            }
            if !cols.metadata.contains(name) {
                return Err(VipError::Config(format!(
                    "columns.metadata must list the {role} column '{name}'"
                )));
            }
        }

        if let Some(folds) = self.model.cv_folds {
            if folds < 2 {
                return Err(VipError::Config(format!(
                    "model.cv_folds must be at least 2, got {folds}"
                )));
            }
        }
        let threshold = self.model.min_q2_improvement;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(VipError::Config(
                "model.min_q2_improvement must be a non-negative number".into(),
            ));
        }

        Ok(())
    }

    /// Reference panel from the inline list plus an optional one-name-per-line file
    ///
    /// # Errors
    /// Returns error if the panel file cannot be read
    pub fn reference_panel(&self, extra: Option<&Path>) -> Result<ReferencePanel> {
        let mut names = self.reference_panel.clone();
        if let Some(path) = extra {
            let content = std::fs::read_to_string(path)?;
            names.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string),
            );
        }
        Ok(ReferencePanel::new(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.model.cv_folds, None);
        assert_eq!(config.model.max_orthogonal, 9);
        assert_eq!(config.columns.baseline_subgroup, "CTRL");
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r"
columns:
  group: Status
  metadata: [SampleID, Status, Subgroup, Age]
  control_group: Healthy
reference_panel: [APOA1, CRP]
model:
  scaling: pareto
  cv_folds: 7
";
        let config = AnalysisConfig::from_yaml(yaml).expect("parse");
        assert_eq!(config.columns.group, "Status");
        assert_eq!(config.columns.sample_id, "SampleID");
        assert_eq!(config.columns.control_group.as_deref(), Some("Healthy"));
        assert_eq!(config.model.scaling, Scaling::Pareto);
        assert_eq!(config.model.cv_folds, Some(7));
        assert_eq!(config.model.permutations, 20);
        assert!(config.charts.enabled);
    }

    #[test]
    fn test_metadata_must_cover_roles() {
        let yaml = "columns:\n  metadata: [SampleID, Group]\n";
        let err = AnalysisConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, VipError::Config(msg) if msg.contains("Subgroup")));
    }

    #[test]
    fn test_rejects_single_fold() {
        let err = AnalysisConfig::from_yaml("model:\n  cv_folds: 1\n").unwrap_err();
        assert!(matches!(err, VipError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = AnalysisConfig::from_yaml("modle:\n  seed: 1\n").unwrap_err();
        assert!(matches!(err, VipError::Yaml(_)));
    }

    #[test]
    fn test_panel_file_merged() {
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(b"# curated\nALB\n\nCRP\n").expect("write");

        let config = AnalysisConfig {
            reference_panel: vec!["APOA1".into()],
            ..AnalysisConfig::default()
        };
        let panel = config.reference_panel(Some(file.path())).expect("panel");

        assert_eq!(panel.len(), 3);
        assert!(panel.contains("ALB"));
        assert!(panel.contains("APOA1"));
        assert!(!panel.contains("# curated"));
    }
}
