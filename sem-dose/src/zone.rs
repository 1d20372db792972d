//! Zonas de risco por dose e por nível

use serde::{Deserialize, Serialize};

/// Zona de risco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskZone {
    /// Segura
    Safe,
    /// Atenção
    Caution,
    /// Perigo
    Danger,
}

impl RiskZone {
    /// Rótulo de exibição
    pub fn label(&self) -> &'static str {
        match self {
            RiskZone::Safe => "SAFE",
            RiskZone::Caution => "CAUTION",
            RiskZone::Danger => "DANGER",
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, RiskZone::Safe)
    }
}

impl std::fmt::Display for RiskZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Zona pela dose acumulada: `<0.5` segura, `<1.0` atenção, senão perigo
pub fn risk_zone_from_dose(dose: f64) -> RiskZone {
    if dose < 0.5 {
        RiskZone::Safe
    } else if dose < 1.0 {
        RiskZone::Caution
    } else {
        RiskZone::Danger
    }
}

/// Limiares de nível (dB) usados pela estratégia Zona Segura.
///
/// Os padrões seguem as cores do gauge: verde abaixo de 70 dB,
/// amarelo até 85 dB, vermelho a partir de 85 dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    /// Abaixo disto: zona segura
    pub comfortable_db: f64,
    /// A partir disto: perigo
    pub hazard_db: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            comfortable_db: 70.0,
            hazard_db: 85.0,
        }
    }
}

/// Zona pelo nível instantâneo
pub fn risk_zone_from_level(db: f64, thresholds: &LevelThresholds) -> RiskZone {
    if db < thresholds.comfortable_db {
        RiskZone::Safe
    } else if db < thresholds.hazard_db {
        RiskZone::Caution
    } else {
        RiskZone::Danger
    }
}
