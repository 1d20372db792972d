//! Erros do loop de controle e das preferências

use thiserror::Error;
use sem_dose::DoseError;
use sem_exposure::ReportError;

pub type ControlResult<T> = Result<T, ControlError>;
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Erros do loop de controle
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Configuration error: {0}")]
    Dose(#[from] DoseError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Operação recusada enquanto o volume está travado
    #[error("Rejected while volume is locked: {0}")]
    Locked(&'static str),

    #[error("Control loop is not running")]
    NotRunning,

    #[error("Control loop thread panicked")]
    ThreadPanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Erros de persistência de preferências
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sistema sem diretório de configuração por usuário
    #[error("No per-user configuration directory available")]
    NoConfigDir,

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for SettingsError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        SettingsError::LockPoisoned(err.to_string())
    }
}
