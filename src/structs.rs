//! Consolidated public types for the vipr crate
//!
//! This module contains the data model shared by the analysis stages. Behaviour
//! lives next to the stage that owns it (`csv_reader`, `ml::*`).

use linfa::Dataset;
use ndarray::{Array1, Ix1};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use crate::error::{Result, VipError};

// ============================================================================
// Dataset Types
// ============================================================================

/// Represents a parsed CSV/TSV file with headers and rows
#[derive(Debug, Clone)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvData {
    /// Get number of rows
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get number of columns
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.headers.len()
    }

    /// Get column index by name
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Get a column as a vector of strings
    ///
    /// Short rows yield an empty cell so the result stays row-aligned.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Vec<&str>> {
        if index >= self.headers.len() {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map_or("", |s| s.trim()))
                .collect(),
        )
    }
}

// ============================================================================
// Comparison Types
// ============================================================================

/// Which side of a comparison a sample falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Positive,
    Negative,
}

/// The three comparison families
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonKind {
    /// Top-level group column, all samples
    Global,
    /// Two sub-group values against each other
    Pairwise { first: String, second: String },
    /// One sub-group against the pooled non-baseline rest
    OneVsRest { target: String, baseline: String },
}

impl ComparisonKind {
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Pairwise { .. } => "pairwise",
            Self::OneVsRest { .. } => "one-vs-rest",
        }
    }
}

/// One binary comparison to fit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Unique, filename-safe identity
    pub name: String,
    pub kind: ComparisonKind,
    pub positive: String,
    pub negative: String,
}

/// Feature matrix and label vector for a single comparison
#[derive(Debug, Clone)]
pub struct ComparisonData {
    /// Records are the retained samples, targets are 1 (positive) / 0 (negative)
    pub dataset: Dataset<f64, usize, Ix1>,
    pub positive: String,
    pub negative: String,
    pub sample_ids: Vec<String>,
}

impl ComparisonData {
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.dataset.records.nrows()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.dataset.records.ncols()
    }

    /// Samples per label as `(positive, negative)`
    #[must_use]
    pub fn class_counts(&self) -> (usize, usize) {
        let positive = self.dataset.targets.iter().filter(|&&t| t == 1).count();
        (positive, self.n_samples() - positive)
    }
}

// ============================================================================
// Model Types
// ============================================================================

/// Column scaling applied before projection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    /// Mean-centre only
    Center,
    /// Mean-centre, divide by the square root of the standard deviation
    Pareto,
    /// Mean-centre, divide by the standard deviation
    #[default]
    Standard,
}

/// One predictive latent component of a fitted model
#[derive(Debug, Clone)]
pub struct PredictiveComponent {
    /// Unit-norm weight vector
    pub weight: Array1<f64>,
    /// Loading vector on the orthogonally filtered features
    pub loading: Array1<f64>,
    /// Sum of squares of the scaled response explained by this component
    pub ssy: f64,
}

/// Quality summary of a fitted model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelQuality {
    #[serde(rename = "pre")]
    pub predictive: usize,
    #[serde(rename = "ort")]
    pub orthogonal: usize,
    #[serde(rename = "R2X(cum)")]
    pub r2x_cum: f64,
    #[serde(rename = "R2X(pred)")]
    pub r2x_predictive: f64,
    #[serde(rename = "R2X(orth)")]
    pub r2x_orthogonal: f64,
    #[serde(rename = "R2Y(cum)")]
    pub r2y_cum: f64,
    #[serde(rename = "Q2(cum)")]
    pub q2_cum: f64,
    #[serde(rename = "RMSEE")]
    pub rmsee: f64,
    #[serde(rename = "pR2Y")]
    pub p_r2y: Option<f64>,
    #[serde(rename = "pQ2")]
    pub p_q2: Option<f64>,
    pub samples: usize,
    pub features: usize,
}

/// A fitted OPLS-DA model for exactly one comparison
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub feature_names: Vec<String>,
    pub predictive: Vec<PredictiveComponent>,
    pub n_orthogonal: usize,
    pub scaling: Scaling,
    /// Cross-validated Q² for every candidate orthogonal count that was evaluated
    pub q2_path: Vec<f64>,
    pub quality: ModelQuality,
}

impl FittedModel {
    #[must_use]
    pub fn n_predictive(&self) -> usize {
        self.predictive.len()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

// ============================================================================
// Ranking Types
// ============================================================================

/// A feature and its importance score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeature {
    #[serde(rename = "Feature")]
    pub feature: String,
    #[serde(rename = "VIP")]
    pub score: f64,
}

/// Features sorted by descending score, ties in original column order
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub(crate) entries: Vec<RankedFeature>,
}

impl Ranking {
    #[must_use]
    pub fn entries(&self) -> &[RankedFeature] {
        &self.entries
    }

    /// The first `k` entries (fewer if the ranking is shorter)
    #[must_use]
    pub fn top(&self, k: usize) -> &[RankedFeature] {
        &self.entries[..k.min(self.entries.len())]
    }
}

/// A ranked feature flagged against the reference panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightedFeature {
    pub feature: String,
    pub score: f64,
    pub highlight: bool,
}

/// Curated feature names used to flag rankings
#[derive(Debug, Clone, Default)]
pub struct ReferencePanel {
    names: HashSet<String>,
}

impl ReferencePanel {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .map(|s: String| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, feature: &str) -> bool {
        self.names.contains(feature)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// Batch Types
// ============================================================================

/// Outcome of one successful comparison
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub name: String,
    pub family: &'static str,
    pub positive: String,
    pub negative: String,
    pub positive_samples: usize,
    pub negative_samples: usize,
    pub quality: ModelQuality,
    pub top_features: Vec<HighlightedFeature>,
}

/// A comparison that could not be completed
#[derive(Debug)]
pub struct ComparisonFailure {
    pub comparison: String,
    pub error: VipError,
}

/// Result of a full batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<ComparisonSummary>,
    pub failures: Vec<ComparisonFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the comparisons that failed, in run order
    #[must_use]
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.comparison.as_str()).collect()
    }
}
