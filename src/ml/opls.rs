//! OPLS-DA: partial least squares discriminant analysis with orthogonal
//! signal correction, for a single binary response.
//!
//! The filter follows the NIPALS formulation for one response: the predictive
//! weight is fixed by X'y, and each orthogonal component removes the part of
//! the current predictive loading that is orthogonal to that weight. Orthogonal
//! scores are uncorrelated with y, so X'y (and the weight) never changes while
//! filtering.

use crate::config::ModelConfig;
use crate::ml::stats::{explained_fraction, sum_of_squares, Scaler};
use crate::structs::{
    FittedModel, ModelQuality, PredictiveComponent, Result, Scaling, VipError,
};
use linfa::traits::Fit;
use linfa::Dataset;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Ix1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Relative magnitude below which a direction is treated as exhausted
const TOLERANCE: f64 = 1e-10;

/// Hyperparameters of an OPLS-DA fit
#[derive(Debug, Clone, PartialEq)]
pub struct OplsDaParams {
    scaling: Scaling,
    cv_folds: Option<usize>,
    max_orthogonal: usize,
    min_q2_improvement: f64,
    permutations: usize,
    seed: u64,
    budget: Option<Duration>,
}

impl Default for OplsDaParams {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for OplsDaParams {
    fn from(config: &ModelConfig) -> Self {
        Self::new()
            .scaling(config.scaling)
            .cv_folds(config.cv_folds)
            .max_orthogonal(config.max_orthogonal)
            .min_q2_improvement(config.min_q2_improvement)
            .permutations(config.permutations)
            .seed(config.seed)
            .budget(config.fit_budget())
    }
}

impl OplsDaParams {
    /// Plain PLS-DA: no orthogonal components, leave-one-out, no permutations
    #[must_use]
    pub fn new() -> Self {
        Self {
            scaling: Scaling::default(),
            cv_folds: None,
            max_orthogonal: 0,
            min_q2_improvement: 0.0,
            permutations: 0,
            seed: 0,
            budget: None,
        }
    }

    #[must_use]
    pub fn scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Fold count for cross-validation, `None` for leave-one-out
    #[must_use]
    pub fn cv_folds(mut self, folds: Option<usize>) -> Self {
        self.cv_folds = folds;
        self
    }

    #[must_use]
    pub fn max_orthogonal(mut self, max: usize) -> Self {
        self.max_orthogonal = max;
        self
    }

    #[must_use]
    pub fn min_q2_improvement(mut self, threshold: f64) -> Self {
        self.min_q2_improvement = threshold;
        self
    }

    /// Number of response permutations for the significance test, 0 disables it
    #[must_use]
    pub fn permutations(mut self, permutations: usize) -> Self {
        self.permutations = permutations;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Wall-clock budget for one fit, including cross-validation and permutations
    #[must_use]
    pub fn budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    fn fold_count(&self, n_samples: usize) -> Result<usize> {
        let folds = self.cv_folds.unwrap_or(n_samples);
        if folds < 2 || folds > n_samples {
            return Err(VipError::ModelFit(format!(
                "cannot run {folds}-fold cross-validation on {n_samples} samples"
            )));
        }
        Ok(folds)
    }

    /// Cross-validated Q² for 0..=`max_orthogonal` orthogonal components
    ///
    /// The returned path is shorter when some fold could not extract every
    /// requested component.
    fn cross_validate(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        max_orthogonal: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<f64>> {
        let n = x.nrows();
        let folds = self.fold_count(n)?;

        let mut levels = max_orthogonal + 1;
        let mut predicted = vec![Array1::<f64>::zeros(n); levels];

        for fold in 0..folds {
            check_deadline(deadline)?;

            let (train, test): (Vec<usize>, Vec<usize>) = (0..n).partition(|i| i % folds != fold);
            let train_y = y.select(Axis(0), &train);
            if train_y.iter().all(|&v| (v - train_y[0]).abs() < f64::EPSILON) {
                return Err(VipError::ModelFit(format!(
                    "cross-validation fold {} trains on a single class",
                    fold + 1
                )));
            }

            let fold_predictions = predict_held_out(
                x.select(Axis(0), &train).view(),
                train_y.view(),
                x.select(Axis(0), &test).view(),
                self.scaling,
                levels - 1,
            )?;
            levels = levels.min(fold_predictions.len());

            for (level, values) in fold_predictions.iter().take(levels).enumerate() {
                for (k, &row) in test.iter().enumerate() {
                    predicted[level][row] = values[k];
                }
            }
        }

        let q2: Vec<f64> = predicted[..levels]
            .iter()
            .map(|pred| explained_fraction(y, pred.view()))
            .collect();

        if q2.iter().any(|v| !v.is_finite()) {
            return Err(VipError::ModelFit(
                "cross-validated Q² is not finite".into(),
            ));
        }
        Ok(q2)
    }

    /// Fit on every sample with a fixed number of orthogonal components
    #[allow(clippy::cast_precision_loss)]
    fn fit_full(&self, x: ArrayView2<f64>, y: ArrayView1<f64>, n_orthogonal: usize) -> Result<FullFit> {
        let x_scaler = Scaler::fit(x, self.scaling);
        let y_scaler = Scaler::fit_vector(y, self.scaling);
        let mut filter = OplsFilter::new(x_scaler.transform(x), y_scaler.transform_vector(y))?;
        for _ in 0..n_orthogonal {
            filter.extract_orthogonal()?;
        }
        let predictive = filter.predictive()?;

        let ssx = filter.ssx;
        let residual = &filter.x - &outer(&predictive.scores, &predictive.loading);
        let r2x_cum = 1.0 - sum_of_squares(residual.view()) / ssx;
        let r2x_predictive =
            predictive.scores.dot(&predictive.scores) * predictive.loading.dot(&predictive.loading) / ssx;
        let r2x_orthogonal = filter
            .orthogonal
            .iter()
            .map(|c| c.scores.dot(&c.scores) * c.loading.dot(&c.loading))
            .sum::<f64>()
            / ssx;

        let fitted_scaled = &predictive.scores * predictive.coefficient;
        let ssy_total = filter.y.dot(&filter.y);
        let ssy_residual = sum_of_squares((&filter.y - &fitted_scaled).view());
        let r2y = 1.0 - ssy_residual / ssy_total;

        let fitted = y_scaler.inverse_vector(fitted_scaled.view());
        let sse: f64 = y.iter().zip(&fitted).map(|(a, b)| (a - b).powi(2)).sum();
        let rmsee = (sse / (y.len() - 1) as f64).sqrt();

        Ok(FullFit {
            component: PredictiveComponent {
                weight: filter.weight,
                loading: predictive.loading,
                ssy: ssy_total - ssy_residual,
            },
            r2x_cum,
            r2x_predictive,
            r2x_orthogonal,
            r2y,
            rmsee,
        })
    }

    /// Permutation p-values for R2Y and Q², refitting with the selected model size
    fn permutation_test(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        n_orthogonal: usize,
        observed: (f64, f64),
        deadline: Option<Instant>,
    ) -> Result<(Option<f64>, Option<f64>)> {
        if self.permutations == 0 {
            return Ok((None, None));
        }

        let (r2y, q2) = observed;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut shuffled = y.to_vec();
        let (mut succeeded, mut r2y_hits, mut q2_hits) = (0usize, 0usize, 0usize);

        for round in 0..self.permutations {
            check_deadline(deadline)?;
            shuffled.shuffle(&mut rng);
            let y_perm = Array1::from(shuffled.clone());

            let outcome = self.fit_full(x, y_perm.view(), n_orthogonal).and_then(|full| {
                let path = self.cross_validate(x, y_perm.view(), n_orthogonal, deadline)?;
                Ok((full.r2y, path))
            });
            match outcome {
                Ok((perm_r2y, path)) if path.len() > n_orthogonal => {
                    succeeded += 1;
                    r2y_hits += usize::from(perm_r2y >= r2y);
                    q2_hits += usize::from(path[n_orthogonal] >= q2);
                }
                Ok(_) => log::debug!("permutation {} could not reach {n_orthogonal} orthogonal components", round + 1),
                Err(e) => log::debug!("permutation {} skipped: {e}", round + 1),
            }
        }

        if succeeded == 0 {
            return Ok((None, None));
        }
        #[allow(clippy::cast_precision_loss)]
        let p_value = |hits: usize| (1 + hits) as f64 / (1 + succeeded) as f64;
        Ok((Some(p_value(r2y_hits)), Some(p_value(q2_hits))))
    }
}

impl Fit<Array2<f64>, Array1<usize>, VipError> for OplsDaParams {
    type Object = FittedModel;

    /// Fit one predictive component, choosing the orthogonal count by
    /// cross-validated Q²
    fn fit(&self, dataset: &Dataset<f64, usize, Ix1>) -> Result<FittedModel> {
        let deadline = self.budget.map(|b| Instant::now() + b);
        let x = dataset.records.view();
        let y: Array1<f64> = dataset.targets.mapv(|t| if t == 0 { 0.0 } else { 1.0 });
        let (n, p) = x.dim();

        if p == 0 {
            return Err(VipError::ModelFit("no features to project".into()));
        }
        if y.len() != n {
            return Err(VipError::ModelFit(format!(
                "{n} samples but {} labels",
                y.len()
            )));
        }

        let folds = self.fold_count(n)?;
        let smallest_train = n - n.div_ceil(folds);
        let cap = self
            .max_orthogonal
            .min(p - 1)
            .min(smallest_train.saturating_sub(2));

        let q2_path = self.cross_validate(x, y.view(), cap, deadline)?;
        let n_orthogonal = select_orthogonal(&q2_path, self.min_q2_improvement);
        log::debug!("Q² by orthogonal components: {q2_path:?}, selected {n_orthogonal}");

        let full = self.fit_full(x, y.view(), n_orthogonal)?;
        let q2 = q2_path[n_orthogonal];
        let (p_r2y, p_q2) =
            self.permutation_test(x, y.view(), n_orthogonal, (full.r2y, q2), deadline)?;

        Ok(FittedModel {
            feature_names: dataset.feature_names(),
            predictive: vec![full.component],
            n_orthogonal,
            scaling: self.scaling,
            quality: ModelQuality {
                predictive: 1,
                orthogonal: n_orthogonal,
                r2x_cum: full.r2x_cum,
                r2x_predictive: full.r2x_predictive,
                r2x_orthogonal: full.r2x_orthogonal,
                r2y_cum: full.r2y,
                q2_cum: q2,
                rmsee: full.rmsee,
                p_r2y,
                p_q2,
                samples: n,
                features: p,
            },
            q2_path,
        })
    }
}

/// Smallest orthogonal count after which Q² stops improving by at least `min_improvement`
#[must_use]
pub fn select_orthogonal(q2_path: &[f64], min_improvement: f64) -> usize {
    let mut chosen = 0;
    while chosen + 1 < q2_path.len() && q2_path[chosen + 1] - q2_path[chosen] >= min_improvement {
        chosen += 1;
    }
    chosen
}

fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(limit) if Instant::now() >= limit => Err(VipError::ModelFit(
            "fit exceeded its time budget".into(),
        )),
        _ => Ok(()),
    }
}

/// Predict held-out responses (original units) at every filter level up to `max_orthogonal`
fn predict_held_out(
    train_x: ArrayView2<f64>,
    train_y: ArrayView1<f64>,
    test_x: ArrayView2<f64>,
    scaling: Scaling,
    max_orthogonal: usize,
) -> Result<Vec<Array1<f64>>> {
    let x_scaler = Scaler::fit(train_x, scaling);
    let y_scaler = Scaler::fit_vector(train_y, scaling);
    let mut filter = OplsFilter::new(x_scaler.transform(train_x), y_scaler.transform_vector(train_y))?;
    let mut test = x_scaler.transform(test_x);

    let mut predictions = Vec::with_capacity(max_orthogonal + 1);
    for level in 0..=max_orthogonal {
        if level > 0 {
            match filter.extract_orthogonal() {
                Ok(component) => component.deflate(&mut test),
                Err(e) => {
                    log::debug!("stopping at {} orthogonal components: {e}", level - 1);
                    break;
                }
            }
        }
        let predictive = match filter.predictive() {
            Ok(predictive) => predictive,
            Err(_) if level > 0 => break,
            Err(e) => return Err(e),
        };
        let scaled = test.dot(&filter.weight) * predictive.coefficient;
        predictions.push(y_scaler.inverse_vector(scaled.view()));
    }
    Ok(predictions)
}

struct FullFit {
    component: PredictiveComponent,
    r2x_cum: f64,
    r2x_predictive: f64,
    r2x_orthogonal: f64,
    r2y: f64,
    rmsee: f64,
}

#[derive(Debug, Clone)]
struct OrthogonalComponent {
    weight: Array1<f64>,
    loading: Array1<f64>,
    scores: Array1<f64>,
}

impl OrthogonalComponent {
    /// Remove this component from rows scaled like the training data
    fn deflate(&self, x: &mut Array2<f64>) {
        let scores = x.dot(&self.weight);
        *x -= &outer(&scores, &self.loading);
    }
}

struct Predictive {
    scores: Array1<f64>,
    loading: Array1<f64>,
    coefficient: f64,
}

/// Scaled training data being filtered of response-orthogonal variation
struct OplsFilter {
    x: Array2<f64>,
    y: Array1<f64>,
    weight: Array1<f64>,
    orthogonal: Vec<OrthogonalComponent>,
    /// Total sum of squares of the scaled, unfiltered features
    ssx: f64,
}

impl OplsFilter {
    fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self> {
        let ssx = sum_of_squares(x.view());
        let ssy = y.dot(&y);
        if !(ssy > 0.0) {
            return Err(VipError::ModelFit("response has no variance".into()));
        }

        let covariance = x.t().dot(&y);
        let norm = covariance.dot(&covariance).sqrt();
        // Cauchy-Schwarz bound: |X'y| <= |X| |y|
        if !(ssx > 0.0) || norm <= TOLERANCE * (ssx * ssy).sqrt() {
            return Err(VipError::ModelFit(
                "features carry no covariance with the response, no predictive component can be extracted"
                    .into(),
            ));
        }

        Ok(Self {
            x,
            y,
            weight: covariance / norm,
            orthogonal: Vec::new(),
            ssx,
        })
    }

    fn predictive(&self) -> Result<Predictive> {
        let scores = self.x.dot(&self.weight);
        let tt = scores.dot(&scores);
        if tt <= TOLERANCE * self.ssx {
            return Err(VipError::ModelFit(format!(
                "predictive scores vanished after {} orthogonal components",
                self.orthogonal.len()
            )));
        }
        Ok(Predictive {
            loading: self.x.t().dot(&scores) / tt,
            coefficient: self.y.dot(&scores) / tt,
            scores,
        })
    }

    fn extract_orthogonal(&mut self) -> Result<&OrthogonalComponent> {
        let level = self.orthogonal.len() + 1;
        let loading = self.predictive()?.loading;

        let mut weight = &loading - &(&self.weight * self.weight.dot(&loading));
        let norm = weight.dot(&weight).sqrt();
        if norm <= 1e-8 * loading.dot(&loading).sqrt() {
            return Err(VipError::ModelFit(format!(
                "no variation left for orthogonal component {level}"
            )));
        }
        weight /= norm;

        let scores = self.x.dot(&weight);
        let tt = scores.dot(&scores);
        if tt <= TOLERANCE * self.ssx {
            return Err(VipError::ModelFit(format!(
                "orthogonal component {level} has vanishing scores"
            )));
        }
        let component_loading = self.x.t().dot(&scores) / tt;
        self.x -= &outer(&scores, &component_loading);

        self.orthogonal.push(OrthogonalComponent {
            weight,
            loading: component_loading,
            scores,
        });
        Ok(&self.orthogonal[level - 1])
    }
}

fn outer(scores: &Array1<f64>, loading: &Array1<f64>) -> Array2<f64> {
    scores
        .view()
        .insert_axis(Axis(1))
        .dot(&loading.view().insert_axis(Axis(0)))
}
