//! Column scaling and goodness-of-fit helpers

use crate::structs::Scaling;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Centring and scaling statistics learned from training rows
#[derive(Debug, Clone)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl Scaler {
    /// Learn column means and scales
    ///
    /// Columns without variance keep a scale of 1 so they centre to zero.
    #[must_use]
    pub fn fit(data: ArrayView2<f64>, scaling: Scaling) -> Self {
        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(data.ncols()));
        let sd = column_std(data, &mean);

        let scale = mean
            .iter()
            .zip(sd.iter())
            .map(|(m, &s)| {
                if !(s.is_finite() && s > f64::EPSILON * m.abs().max(1.0)) {
                    return 1.0;
                }
                match scaling {
                    Scaling::Center => 1.0,
                    Scaling::Pareto => s.sqrt(),
                    Scaling::Standard => s,
                }
            })
            .collect();

        Self { mean, scale }
    }

    /// Learn the scaling of a single response vector
    #[must_use]
    pub fn fit_vector(values: ArrayView1<f64>, scaling: Scaling) -> Self {
        Self::fit(values.insert_axis(Axis(1)), scaling)
    }

    #[must_use]
    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        (&data - &self.mean) / &self.scale
    }

    #[must_use]
    pub fn transform_vector(&self, values: ArrayView1<f64>) -> Array1<f64> {
        (&values - self.mean[0]) / self.scale[0]
    }

    /// Map a scaled response back to its original units
    #[must_use]
    pub fn inverse_vector(&self, values: ArrayView1<f64>) -> Array1<f64> {
        &values * self.scale[0] + self.mean[0]
    }
}

/// Sample standard deviation per column (n - 1 denominator)
#[allow(clippy::cast_precision_loss)]
fn column_std(data: ArrayView2<f64>, mean: &Array1<f64>) -> Array1<f64> {
    let n = data.nrows();
    if n < 2 {
        return Array1::zeros(data.ncols());
    }
    let centered = &data - mean;
    centered
        .map_axis(Axis(0), |col| col.dot(&col))
        .mapv(|ss| (ss / (n - 1) as f64).sqrt())
}

/// Sum of squared entries of any array view
#[must_use]
pub fn sum_of_squares<D: ndarray::Dimension>(values: ndarray::ArrayView<f64, D>) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Fraction of the response sum of squares (around its mean) left unexplained
/// by `predicted`, subtracted from one
#[must_use]
pub fn explained_fraction(observed: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let mean = observed.mean().unwrap_or(0.0);
    let total: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    let residual: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    1.0 - residual / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaling() {
        let data = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0]];
        let scaler = Scaler::fit(data.view(), Scaling::Standard);

        assert!((scaler.mean[0] - 2.0).abs() < 1e-12);
        assert!((scaler.scale[0] - 1.0).abs() < 1e-12);
        // Constant column keeps unit scale
        assert!((scaler.scale[1] - 1.0).abs() < 1e-12);

        let scaled = scaler.transform(data.view());
        assert!((scaled[[0, 0]] + 1.0).abs() < 1e-12);
        assert!(scaled.column(1).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_pareto_and_center() {
        let data = array![[0.0], [4.0], [8.0]];
        let pareto = Scaler::fit(data.view(), Scaling::Pareto);
        assert!((pareto.scale[0] - 2.0).abs() < 1e-12);

        let center = Scaler::fit(data.view(), Scaling::Center);
        assert!((center.scale[0] - 1.0).abs() < 1e-12);
        assert!((center.transform(data.view())[[2, 0]] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_vector_round_trip() {
        let y = array![0.0, 1.0, 1.0, 0.0];
        let scaler = Scaler::fit_vector(y.view(), Scaling::Standard);
        let scaled = scaler.transform_vector(y.view());
        assert!(scaled.sum().abs() < 1e-12);
        let back = scaler.inverse_vector(scaled.view());
        assert!((back[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_explained_fraction() {
        let y = array![1.0, 2.0, 3.0];
        assert!((explained_fraction(y.view(), y.view()) - 1.0).abs() < 1e-12);
        let flat = array![2.0, 2.0, 2.0];
        assert!(explained_fraction(y.view(), flat.view()).abs() < 1e-12);
    }

    #[test]
    fn test_sum_of_squares() {
        let m = array![[1.0, 2.0], [2.0, 0.0]];
        assert!((sum_of_squares(m.view()) - 9.0).abs() < 1e-12);
    }
}
