//! Per-comparison artifact writers

use crate::ml::chart;
use crate::ml::vip::annotate;
use crate::structs::{
    BatchReport, ComparisonSummary, ModelQuality, Ranking, ReferencePanel, Result, VipError,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Chart slice sizes, largest first
pub const TOP_SLICES: [usize; 2] = [20, 10];

/// Filename of the full ranking table
#[must_use]
pub fn ranking_filename(name: &str) -> String {
    format!("VIP_Ranking_{name}.csv")
}

/// Filename of the one-row quality table
#[must_use]
pub fn quality_filename(name: &str) -> String {
    format!("ModelQuality_{name}.csv")
}

/// Filename of a top-k bar chart
#[must_use]
pub fn chart_filename(name: &str, k: usize) -> String {
    format!("Top{k}_VIP_{name}.png")
}

/// Where and how artifacts are written
#[derive(Debug, Clone)]
pub struct Emitter {
    output_dir: PathBuf,
    charts: bool,
}

impl Emitter {
    #[must_use]
    pub fn new(output_dir: &Path, charts: bool) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            charts,
        }
    }

    /// Write every artifact of one comparison
    ///
    /// # Errors
    /// Returns `VipError::Write` naming the artifact that could not be written
    pub fn emit(
        &self,
        name: &str,
        ranking: &Ranking,
        quality: &ModelQuality,
        panel: &ReferencePanel,
    ) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            VipError::Write(format!(
                "cannot create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        write_ranking(&self.output_dir.join(ranking_filename(name)), ranking)?;
        write_quality(&self.output_dir.join(quality_filename(name)), quality)?;

        if self.charts {
            for k in TOP_SLICES {
                let bars = annotate(ranking.top(k), panel);
                let path = self.output_dir.join(chart_filename(name, k));
                chart::render_bar_chart(&path, &format!("Top {k} VIP: {name}"), &bars)?;
            }
        }
        Ok(())
    }
}

/// Write `VIP_Ranking_{name}.csv`: every feature with its score, descending
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_ranking(path: &Path, ranking: &Ranking) -> Result<()> {
    write_records(path, ranking.entries())
}

/// Write `ModelQuality_{name}.csv`: a header and a single row of metrics
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_quality(path: &Path, quality: &ModelQuality) -> Result<()> {
    write_records(path, std::slice::from_ref(quality))
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let to_write_error = |e: &dyn std::fmt::Display| {
        VipError::Write(format!("{}: {e}", path.display()))
    };

    let mut writer = csv::Writer::from_path(path).map_err(|e| to_write_error(&e))?;
    for record in records {
        writer.serialize(record).map_err(|e| to_write_error(&e))?;
    }
    writer.flush().map_err(|e| to_write_error(&e))?;
    Ok(())
}

/// Write `summary.json` - machine-readable batch overview
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_summary_json(output_dir: &Path, report: &BatchReport) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join("summary.json");

    let output = SummaryOutput {
        comparisons: &report.completed,
        failures: report
            .failures
            .iter()
            .map(|f| FailureEntry {
                comparison: &f.comparison,
                error: f.error.to_string(),
            })
            .collect(),
    };

    let json = serde_json::to_string_pretty(&output)?;
    fs::write(&path, json)?;
    Ok(path)
}

// JSON output structures

#[derive(Serialize)]
struct SummaryOutput<'a> {
    comparisons: &'a [ComparisonSummary],
    failures: Vec<FailureEntry<'a>>,
}

#[derive(Serialize)]
struct FailureEntry<'a> {
    comparison: &'a str,
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::ComparisonFailure;
    use tempfile::TempDir;

    fn quality() -> ModelQuality {
        ModelQuality {
            predictive: 1,
            orthogonal: 2,
            r2x_cum: 0.5,
            r2x_predictive: 0.3,
            r2x_orthogonal: 0.2,
            r2y_cum: 0.9,
            q2_cum: 0.75,
            rmsee: 0.125,
            p_r2y: Some(0.05),
            p_q2: None,
            samples: 12,
            features: 40,
        }
    }

    fn ranking() -> Ranking {
        Ranking::from_scores(
            &["P1".to_string(), "P2".to_string(), "P3".to_string()],
            &[0.5, 2.25, 1.0],
        )
    }

    #[test]
    fn test_filenames() {
        assert_eq!(ranking_filename("A_vs_B"), "VIP_Ranking_A_vs_B.csv");
        assert_eq!(quality_filename("A_vs_B"), "ModelQuality_A_vs_B.csv");
        assert_eq!(chart_filename("A_vs_B", 20), "Top20_VIP_A_vs_B.png");
        assert_eq!(chart_filename("A_vs_B", 10), "Top10_VIP_A_vs_B.png");
    }

    #[test]
    fn test_write_ranking() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("ranking.csv");
        write_ranking(&path, &ranking()).expect("write ranking");

        let content = fs::read_to_string(path).expect("read");
        assert_eq!(content, "Feature,VIP\nP2,2.25\nP3,1.0\nP1,0.5\n");
    }

    #[test]
    fn test_write_quality() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("quality.csv");
        write_quality(&path, &quality()).expect("write quality");

        let content = fs::read_to_string(path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "pre,ort,R2X(cum),R2X(pred),R2X(orth),R2Y(cum),Q2(cum),RMSEE,pR2Y,pQ2,samples,features"
        );
        assert_eq!(lines[1], "1,2,0.5,0.3,0.2,0.9,0.75,0.125,0.05,,12,40");
    }

    #[test]
    fn test_emit_tables_without_charts() {
        let dir = TempDir::new().expect("create temp dir");
        let out = dir.path().join("nested").join("out");
        let emitter = Emitter::new(&out, false);

        emitter
            .emit("X_vs_Rest", &ranking(), &quality(), &ReferencePanel::default())
            .expect("emit");

        assert!(out.join("VIP_Ranking_X_vs_Rest.csv").exists());
        assert!(out.join("ModelQuality_X_vs_Rest.csv").exists());
        assert!(!out.join("Top20_VIP_X_vs_Rest.png").exists());
    }

    #[test]
    fn test_emit_into_file_path_is_write_error() {
        let dir = TempDir::new().expect("create temp dir");
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, "not a directory").expect("write");

        let err = Emitter::new(&blocker, false)
            .emit("A_vs_B", &ranking(), &quality(), &ReferencePanel::default())
            .unwrap_err();
        assert!(matches!(err, VipError::Write(_)));
    }

    #[test]
    fn test_write_summary_json() {
        let dir = TempDir::new().expect("create temp dir");
        let report = BatchReport {
            completed: Vec::new(),
            failures: vec![ComparisonFailure {
                comparison: "B_vs_C".into(),
                error: VipError::InsufficientData("1 sample".into()),
            }],
        };
        let path = write_summary_json(dir.path(), &report).expect("write summary");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("json");
        assert_eq!(value["failures"][0]["comparison"], "B_vs_C");
        assert_eq!(value["comparisons"].as_array().map(Vec::len), Some(0));
    }
}
