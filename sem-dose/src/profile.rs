//! Perfis de proteção diária (NIOSH, OMS, personalizado)

use serde::{Deserialize, Serialize};
use crate::config::{Config, DEFAULT_BASE_TIME_SEC};
use crate::error::{DoseError, DoseResult};
use crate::model::allowed_seconds;

/// Perfil de proteção
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionProfile {
    /// Padrão ocupacional: 85 dB por 8h, troca 3 dB
    Niosh,
    /// Mais protetivo: 80 dB por 8h, troca 3 dB
    Oms,
    /// Mantém referência e taxa de troca atuais
    Custom,
}

impl ProtectionProfile {
    /// Todos os perfis, na ordem de exibição
    pub const ALL: [ProtectionProfile; 3] = [
        ProtectionProfile::Niosh,
        ProtectionProfile::Oms,
        ProtectionProfile::Custom,
    ];

    /// (ref_db, taxa de troca) do perfil, se fixos
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match self {
            ProtectionProfile::Niosh => Some((85.0, 3.0)),
            ProtectionProfile::Oms => Some((80.0, 3.0)),
            ProtectionProfile::Custom => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProtectionProfile::Niosh => "Occupational standard: 85 dB for 8h, 3 dB exchange rate.",
            ProtectionProfile::Oms => "More protective: 80 dB for 8h, 3 dB exchange rate.",
            ProtectionProfile::Custom => "Keeps the current reference and exchange rate. Daily base is always 8h.",
        }
    }

    /// Detecta o perfil correspondente a uma configuração
    pub fn detect(cfg: &Config) -> Self {
        let key = (round1(cfg.ref_db), round1(cfg.exchange_rate_db));
        Self::ALL
            .into_iter()
            .find(|p| p.parameters() == Some(key))
            .unwrap_or(ProtectionProfile::Custom)
    }

    /// Aplica o perfil sobre uma configuração. O tempo base volta sempre a 8h.
    pub fn apply(&self, cfg: &Config) -> Config {
        let mut out = *cfg;
        if let Some((ref_db, er)) = self.parameters() {
            out.ref_db = ref_db;
            out.exchange_rate_db = er;
        }
        out.base_time_sec = DEFAULT_BASE_TIME_SEC;
        out
    }
}

impl std::str::FromStr for ProtectionProfile {
    type Err = DoseError;

    fn from_str(s: &str) -> DoseResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "niosh" => Ok(ProtectionProfile::Niosh),
            "oms" | "who" => Ok(ProtectionProfile::Oms),
            "custom" => Ok(ProtectionProfile::Custom),
            other => Err(DoseError::UnknownProfile(other.to_string())),
        }
    }
}

/// Prévia do perfil: tempo permitido a 85 dB e a 90 dB
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePreview {
    pub allowed_at_85_sec: f64,
    pub allowed_at_90_sec: f64,
}

impl ProfilePreview {
    pub fn of(cfg: &Config) -> Self {
        Self {
            allowed_at_85_sec: allowed_seconds(85.0, cfg),
            allowed_at_90_sec: allowed_seconds(90.0, cfg),
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_profiles() {
        assert_eq!(ProtectionProfile::detect(&Config::default()), ProtectionProfile::Niosh);
        let cfg = Config { ref_db: 80.0, ..Config::default() };
        assert_eq!(ProtectionProfile::detect(&cfg), ProtectionProfile::Oms);
        let cfg = Config { ref_db: 82.0, ..Config::default() };
        assert_eq!(ProtectionProfile::detect(&cfg), ProtectionProfile::Custom);
    }

    #[test]
    fn test_apply_forces_base_time() {
        let cfg = Config { ref_db: 90.0, base_time_sec: 3600.0, ..Config::default() };
        let custom = ProtectionProfile::Custom.apply(&cfg);
        assert_eq!(custom.ref_db, 90.0);
        assert_eq!(custom.base_time_sec, DEFAULT_BASE_TIME_SEC);

        let oms = ProtectionProfile::Oms.apply(&cfg);
        assert_eq!(oms.ref_db, 80.0);
        assert_eq!(oms.exchange_rate_db, 3.0);
    }

    #[test]
    fn test_preview_oms() {
        let cfg = ProtectionProfile::Oms.apply(&Config::default());
        let p = ProfilePreview::of(&cfg);
        // 85 dB = 80 + 5 dB → 8h · 2^(-5/3)
        let expected = DEFAULT_BASE_TIME_SEC * 2f64.powf(-5.0 / 3.0);
        assert!((p.allowed_at_85_sec - expected).abs() < 1e-6);
        assert!(p.allowed_at_90_sec < p.allowed_at_85_sec);
    }

    #[test]
    fn test_parse_profile() {
        assert_eq!("NIOSH".parse::<ProtectionProfile>().unwrap(), ProtectionProfile::Niosh);
        assert_eq!("who".parse::<ProtectionProfile>().unwrap(), ProtectionProfile::Oms);
        assert!("osha".parse::<ProtectionProfile>().is_err());
    }
}
