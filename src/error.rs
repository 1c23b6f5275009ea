use thiserror::Error;

#[derive(Error, Debug)]
pub enum VipError {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("linfa error: {0}")]
    Linfa(#[from] linfa::error::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model fit error: {0}")]
    ModelFit(String),

    #[error("Write error: {0}")]
    Write(String),
}

impl VipError {
    /// Errors that belong to a single comparison and must not stop the batch
    #[must_use]
    pub const fn is_comparison_scoped(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData(_) | Self::ModelFit(_) | Self::Write(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_scope() {
        assert!(VipError::ModelFit("x".into()).is_comparison_scoped());
        assert!(VipError::InsufficientData("x".into()).is_comparison_scoped());
        assert!(VipError::Write("x".into()).is_comparison_scoped());
        assert!(!VipError::Schema("x".into()).is_comparison_scoped());
        assert!(!VipError::Config("x".into()).is_comparison_scoped());
    }

    #[test]
    fn test_display() {
        let e = VipError::InsufficientData("label 'A' has 1 sample".into());
        assert_eq!(e.to_string(), "Insufficient data: label 'A' has 1 sample");
    }
}
