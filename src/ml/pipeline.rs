//! Batch driver: enumerate, build, fit, rank and emit every comparison

use crate::config::AnalysisConfig;
use crate::ml::comparisons;
use crate::ml::features::FeatureBuilder;
use crate::ml::opls::OplsDaParams;
use crate::ml::output::Emitter;
use crate::ml::vip::annotate;
use crate::structs::{
    BatchReport, Comparison, ComparisonFailure, ComparisonSummary, CsvData, FittedModel, Ranking,
    ReferencePanel, Result, VipError,
};
use linfa::traits::Fit;
use ndarray::{Array1, Array2};

/// Features listed per comparison in the batch summary
const SUMMARY_TOP: usize = 10;

/// Run every comparison with the built-in OPLS-DA fitter
///
/// # Errors
/// Returns error only for problems that affect the whole batch (schema or
/// enumeration). Per-comparison failures are collected in the report.
pub fn run_batch(
    table: &CsvData,
    panel: &ReferencePanel,
    config: &AnalysisConfig,
) -> Result<BatchReport> {
    let params = OplsDaParams::from(&config.model);
    run_batch_with(table, panel, config, &params)
}

/// Run every comparison with any fitter producing a `FittedModel`
///
/// # Errors
/// Returns error only for problems that affect the whole batch
pub fn run_batch_with<F>(
    table: &CsvData,
    panel: &ReferencePanel,
    config: &AnalysisConfig,
    fitter: &F,
) -> Result<BatchReport>
where
    F: Fit<Array2<f64>, Array1<usize>, VipError, Object = FittedModel>,
{
    let builder = FeatureBuilder::new(table, &config.columns)?;
    let comparisons = comparisons::enumerate(table, &config.columns)?;
    if config.charts.enabled {
        crate::ml::chart::init_font(config.charts.font_path.as_deref());
    }
    let emitter = Emitter::new(&config.output_dir, config.charts.enabled);

    log::info!(
        "{} samples x {} features, {} comparisons",
        builder.n_samples(),
        builder.feature_names().len(),
        comparisons.len()
    );

    let mut report = BatchReport::default();
    for (i, comparison) in comparisons.iter().enumerate() {
        log::info!(
            "[{}/{}] {} ({})",
            i + 1,
            comparisons.len(),
            comparison.name,
            comparison.kind.family()
        );

        match run_comparison(&builder, comparison, fitter, &emitter, panel) {
            Ok(summary) => {
                log::info!(
                    "  {}: ort={} R2Y={:.3} Q2={:.3}, top feature {}",
                    comparison.name,
                    summary.quality.orthogonal,
                    summary.quality.r2y_cum,
                    summary.quality.q2_cum,
                    summary
                        .top_features
                        .first()
                        .map_or("-", |f| f.feature.as_str())
                );
                report.completed.push(summary);
            }
            Err(error) if error.is_comparison_scoped() => {
                log::warn!("  {} skipped: {error}", comparison.name);
                report.failures.push(ComparisonFailure {
                    comparison: comparison.name.clone(),
                    error,
                });
            }
            Err(error) => return Err(error),
        }
    }

    Ok(report)
}

/// Build, fit, rank and emit a single comparison
fn run_comparison<F>(
    builder: &FeatureBuilder,
    comparison: &Comparison,
    fitter: &F,
    emitter: &Emitter,
    panel: &ReferencePanel,
) -> Result<ComparisonSummary>
where
    F: Fit<Array2<f64>, Array1<usize>, VipError, Object = FittedModel>,
{
    let data = builder.build(comparison)?;
    let (positive_samples, negative_samples) = data.class_counts();
    log::debug!("  samples: {}", data.sample_ids.join(", "));

    let model = fitter.fit(&data.dataset)?;
    log::debug!(
        "  {:?} scaling, Q² path {:?}, {} predictive + {} orthogonal",
        model.scaling,
        model.q2_path,
        model.n_predictive(),
        model.n_orthogonal
    );
    let ranking = Ranking::from_model(&model);

    emitter.emit(&comparison.name, &ranking, &model.quality, panel)?;

    Ok(ComparisonSummary {
        name: comparison.name.clone(),
        family: comparison.kind.family(),
        positive: data.positive,
        negative: data.negative,
        positive_samples,
        negative_samples,
        top_features: annotate(ranking.top(SUMMARY_TOP), panel),
        quality: model.quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChartConfig, ColumnLayout};
    use crate::ml::output::ranking_filename;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::{NamedTempFile, TempDir};

    /// Global Disease/Control with F1 separating them, sub-groups A, B, C and CTRL.
    /// Sub-group C has a single sample.
    fn create_test_csv() -> CsvData {
        let content = "SampleID,Group,Subgroup,F1,F2,F3,F4,F5\n\
            s01,Disease,A,10.0,1.0,7.0,2.5,6.0\n\
            s02,Disease,A,10.2,2.0,3.0,0.5,8.0\n\
            s03,Disease,B,9.9,3.0,5.0,1.5,7.0\n\
            s04,Disease,B,10.1,4.0,1.0,3.5,9.0\n\
            s05,Disease,C,9.8,5.0,9.0,4.5,5.0\n\
            s06,Control,CTRL,5.0,3.0,1.0,4.5,9.0\n\
            s07,Control,CTRL,5.1,1.0,9.0,2.5,5.0\n\
            s08,Control,CTRL,4.9,5.0,3.0,0.5,8.0\n\
            s09,Control,CTRL,5.2,2.0,7.0,3.5,6.0\n\
            s10,Control,CTRL,4.8,4.0,5.0,1.5,7.0";
        let mut file = NamedTempFile::new().expect("create");
        file.write_all(content.as_bytes()).expect("write");
        CsvData::from_file(file.path(), false).expect("parse")
    }

    fn config(output_dir: &Path) -> AnalysisConfig {
        let mut config = AnalysisConfig {
            columns: ColumnLayout {
                control_group: Some("Control".into()),
                ..ColumnLayout::default()
            },
            output_dir: output_dir.to_path_buf(),
            charts: ChartConfig {
                enabled: false,
                font_path: None,
            },
            ..AnalysisConfig::default()
        };
        config.model.permutations = 5;
        config
    }

    fn panel() -> ReferencePanel {
        ReferencePanel::new(["F1", "F4"])
    }

    #[test]
    fn test_end_to_end_separable_feature_first() {
        let dir = TempDir::new().expect("create temp dir");
        let report = run_batch(&create_test_csv(), &panel(), &config(dir.path())).expect("batch");

        let global = report
            .completed
            .iter()
            .find(|s| s.name == "Disease_vs_Control")
            .expect("global comparison completed");
        assert_eq!((global.positive_samples, global.negative_samples), (5, 5));
        assert_eq!(global.top_features[0].feature, "F1");
        assert!(global.top_features[0].highlight);

        let ranking = fs::read_to_string(dir.path().join(ranking_filename("Disease_vs_Control")))
            .expect("ranking table");
        let rows: Vec<(String, f64)> = ranking
            .lines()
            .skip(1)
            .map(|line| {
                let (name, score) = line.split_once(',').expect("two columns");
                (name.to_string(), score.parse().expect("score"))
            })
            .collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].0, "F1");
        let mean = rows.iter().map(|(_, s)| s).sum::<f64>() / 5.0;
        assert!(rows[0].1 > 1.5 * mean);
        for pair in rows.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert!(dir.path().join("ModelQuality_Disease_vs_Control.csv").exists());
    }

    #[test]
    fn test_insufficient_data_does_not_stop_batch() {
        let dir = TempDir::new().expect("create temp dir");
        let report = run_batch(&create_test_csv(), &panel(), &config(dir.path())).expect("batch");

        // Every comparison involving the single C sample as its own label fails
        let failed = report.failed_names();
        assert!(failed.contains(&"A_vs_C"));
        assert!(failed.contains(&"C_vs_Rest"));
        for failure in &report.failures {
            assert!(failure.error.is_comparison_scoped());
        }

        // Later comparisons still ran
        assert!(report.completed.iter().any(|s| s.name == "B_vs_CTRL"));
        assert!(!dir.path().join(ranking_filename("A_vs_C")).exists());

        // Every enumerated comparison is accounted for exactly once
        let layout = config(dir.path()).columns;
        let total = comparisons::enumerate(&create_test_csv(), &layout)
            .expect("enumerate")
            .len();
        assert_eq!(report.completed.len() + report.failures.len(), total);
    }

    #[test]
    fn test_runs_are_byte_identical() {
        let first = TempDir::new().expect("create temp dir");
        let second = TempDir::new().expect("create temp dir");
        let table = create_test_csv();

        let a = run_batch(&table, &panel(), &config(first.path())).expect("batch");
        let b = run_batch(&table, &panel(), &config(second.path())).expect("batch");

        assert_eq!(a.completed.len(), b.completed.len());
        for (x, y) in a.completed.iter().zip(&b.completed) {
            assert_eq!(x.top_features, y.top_features);
            assert_eq!(x.quality, y.quality);

            let file = ranking_filename(&x.name);
            let left = fs::read(first.path().join(&file)).expect("first ranking");
            let right = fs::read(second.path().join(&file)).expect("second ranking");
            assert_eq!(left, right);
        }
    }

    #[test]
    fn test_write_errors_are_reported() {
        let dir = TempDir::new().expect("create temp dir");
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, "file in the way").expect("write");

        let report = run_batch(&create_test_csv(), &panel(), &config(&blocker)).expect("batch");

        assert!(report.completed.is_empty());
        assert!(!report.is_success());
        assert!(report
            .failures
            .iter()
            .any(|f| f.comparison == "Disease_vs_Control" && matches!(f.error, VipError::Write(_))));
    }

    #[test]
    fn test_schema_error_is_fatal() {
        let dir = TempDir::new().expect("create temp dir");
        let mut cfg = config(dir.path());
        cfg.columns.metadata.push("Age".into());

        let err = run_batch(&create_test_csv(), &panel(), &cfg).unwrap_err();
        assert!(matches!(err, VipError::Schema(_)));
    }

    #[test]
    fn test_charts_written_when_enabled() {
        let dir = TempDir::new().expect("create temp dir");
        let mut cfg = config(dir.path());
        cfg.charts.enabled = true;

        let report = run_batch(&create_test_csv(), &panel(), &cfg).expect("batch");
        assert!(report.completed.iter().any(|s| s.name == "Disease_vs_Control"));
        assert!(dir.path().join("Top20_VIP_Disease_vs_Control.png").exists());
        assert!(dir.path().join("Top10_VIP_Disease_vs_Control.png").exists());
    }
}
