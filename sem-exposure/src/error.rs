//! Erros de exposição e relatórios

use thiserror::Error;
use sem_dose::DoseError;

pub type ExposureResult<T> = Result<T, ExposureError>;
pub type ReportResult<T> = Result<T, ReportError>;

/// Erros do rastreador de exposição
#[derive(Debug, Error)]
pub enum ExposureError {
    #[error("Dose model error: {0}")]
    Dose(#[from] DoseError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Erros de exportação de relatório
#[derive(Debug, Error)]
pub enum ReportError {
    /// Formato sem exportador neste build
    #[error("Export format not available: {0}")]
    ExportUnavailable(String),

    #[error("Unknown report format: {0}")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_unavailable_display() {
        let err = ReportError::ExportUnavailable("xlsx".into());
        assert_eq!(err.to_string(), "Export format not available: xlsx");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ReportError = io.into();
        assert!(matches!(err, ReportError::Io(_)));
        let wrapped: ExposureError = err.into();
        assert!(wrapped.to_string().starts_with("Report error"));
    }
}
