//! Tipos compartilhados de sessão

use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Modo de limitação automática
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Teto fixo calculado pela dose (mantém 10 min de folga)
    #[default]
    Prefixado,
    /// Redução gradual (Reserva ou Zona Segura)
    Dinamico,
}

impl Mode {
    /// Chave persistida
    pub fn key(&self) -> &'static str {
        match self {
            Mode::Prefixado => "prefixado",
            Mode::Dinamico => "dinamico",
        }
    }

    /// Nome de exibição
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Prefixado => "Fixed cap",
            Mode::Dinamico => "Dynamic",
        }
    }

    /// Texto explicativo do modo
    pub fn info(&self) -> &'static str {
        match self {
            Mode::Prefixado => {
                "Over the limit? Volume snaps to the safe level (keeps at least 10 min of headroom)."
            }
            Mode::Dinamico => {
                "Dynamic (reserve / safe zone): lowers volume gradually until headroom is kept or the level is green."
            }
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prefixado" | "prefixed" | "fixed" => Ok(Mode::Prefixado),
            "dinamico" | "dinâmico" | "dynamic" => Ok(Mode::Dinamico),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}
