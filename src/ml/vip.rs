//! Variable importance in projection and feature ranking

use crate::structs::{
    FittedModel, HighlightedFeature, PredictiveComponent, RankedFeature, Ranking, ReferencePanel,
};
use ndarray::Array1;

/// VIP score per feature from the predictive components
///
/// Each component contributes its squared normalised loadings weighted by the
/// response sum of squares it explains. Scores satisfy mean(VIP²) = 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn vip_scores(components: &[PredictiveComponent], n_features: usize) -> Array1<f64> {
    let total_ssy: f64 = components.iter().map(|c| c.ssy).sum();
    if components.is_empty() || !(total_ssy > 0.0) {
        return Array1::zeros(n_features);
    }

    let mut weighted = Array1::<f64>::zeros(n_features);
    for component in components {
        let norm_sq = component.loading.dot(&component.loading);
        if norm_sq > 0.0 {
            weighted.scaled_add(component.ssy / norm_sq, &component.loading.mapv(|l| l * l));
        }
    }

    weighted.mapv(|v| (n_features as f64 * v / total_ssy).sqrt())
}

impl Ranking {
    /// Rank the model's features by VIP, descending
    #[must_use]
    pub fn from_model(model: &FittedModel) -> Self {
        let scores = vip_scores(&model.predictive, model.n_features());
        Self::from_scores(&model.feature_names, scores.as_slice().unwrap_or(&[]))
    }

    /// Sort `(name, score)` pairs descending; equal scores keep input order
    #[must_use]
    pub fn from_scores(names: &[String], scores: &[f64]) -> Self {
        let mut entries: Vec<RankedFeature> = names
            .iter()
            .zip(scores)
            .map(|(name, &score)| RankedFeature {
                feature: name.clone(),
                score,
            })
            .collect();
        // Vec::sort_by is stable
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { entries }
    }
}

/// Flag each ranked feature that belongs to the reference panel
#[must_use]
pub fn annotate(slice: &[RankedFeature], panel: &ReferencePanel) -> Vec<HighlightedFeature> {
    slice
        .iter()
        .map(|entry| HighlightedFeature {
            feature: entry.feature.clone(),
            score: entry.score,
            highlight: panel.contains(&entry.feature),
        })
        .collect()
}
