//! Erros do modelo de dose

use thiserror::Error;

pub type DoseResult<T> = Result<T, DoseError>;

/// Erros de configuração e cálculo de dose
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DoseError {
    /// Configuração rejeitada antes de ser aplicada
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    /// Valor não finito (NaN/inf) recebido
    #[error("Non-finite value for {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    /// Perfil de proteção desconhecido
    #[error("Unknown protection profile: {0}")]
    UnknownProfile(String),
}
