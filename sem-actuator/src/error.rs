//! Erros da camada de atuador

use thiserror::Error;

pub type ActuatorResult<T> = Result<T, ActuatorError>;

/// Erros de atuador
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    /// Backend de áudio indisponível (modo degradado)
    #[error("Audio backend unavailable")]
    Unavailable,

    /// Comando falhou (transitório)
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Lock poison
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl ActuatorError {
    /// Indisponibilidade é estado permanente; o resto é transitório
    pub fn is_transient(&self) -> bool {
        !matches!(self, ActuatorError::Unavailable)
    }
}

impl<T> From<std::sync::PoisonError<T>> for ActuatorError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ActuatorError::LockPoisoned(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ActuatorError::Unavailable.to_string(), "Audio backend unavailable");
        let err = ActuatorError::CommandFailed("endpoint lost".into());
        assert!(err.to_string().contains("endpoint lost"));
    }

    #[test]
    fn test_transient() {
        assert!(!ActuatorError::Unavailable.is_transient());
        assert!(ActuatorError::CommandFailed("x".into()).is_transient());
    }
}
