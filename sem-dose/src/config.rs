//! Configuração do modelo de exposição

use serde::{Deserialize, Serialize};
use crate::error::{DoseError, DoseResult};

/// Tempo base diário padrão (8h)
pub const DEFAULT_BASE_TIME_SEC: f64 = 8.0 * 3600.0;

/// Menor faixa aceita entre `min_db` e `max_db`
pub const MIN_DB_SPAN: f64 = 10.0;

/// Configuração de exposição (imutável durante a sessão)
///
/// Define a escala linear volume%↔dB e o perfil diário
/// (nível de referência, tempo base e taxa de troca).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Nível em 0% de volume (limite inferior do gauge)
    pub min_db: f64,
    /// Nível em 100% de volume (limite superior do gauge)
    pub max_db: f64,
    /// Nível de referência onde vale o tempo base
    pub ref_db: f64,
    /// Tempo diário permitido em `ref_db` (segundos)
    pub base_time_sec: f64,
    /// Aumento em dB que divide o tempo permitido pela metade
    pub exchange_rate_db: f64,
    /// Piso usado sempre que o volume é reduzido à força
    pub min_enforced_volume: f64,
    /// Volume inicial ao abrir
    pub default_volume: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_db: 40.0,
            max_db: 95.0,
            ref_db: 85.0,
            base_time_sec: DEFAULT_BASE_TIME_SEC,
            exchange_rate_db: 3.0,
            min_enforced_volume: 5.0,
            default_volume: 30.0,
        }
    }
}

impl Config {
    /// Valida a configuração antes de aplicá-la
    pub fn validate(&self) -> DoseResult<()> {
        let fields = [
            ("min_db", self.min_db),
            ("max_db", self.max_db),
            ("ref_db", self.ref_db),
            ("base_time_sec", self.base_time_sec),
            ("exchange_rate_db", self.exchange_rate_db),
            ("min_enforced_volume", self.min_enforced_volume),
            ("default_volume", self.default_volume),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(DoseError::NonFinite { field, value });
            }
        }

        if self.max_db - self.min_db < MIN_DB_SPAN {
            return Err(DoseError::ConfigValidation(format!(
                "max_db must be at least {} dB above min_db (got {} and {})",
                MIN_DB_SPAN, self.min_db, self.max_db
            )));
        }

        if self.exchange_rate_db <= 0.0 {
            return Err(DoseError::ConfigValidation(format!(
                "exchange rate must be > 0 dB, got {}",
                self.exchange_rate_db
            )));
        }

        if self.base_time_sec <= 0.0 {
            return Err(DoseError::ConfigValidation(format!(
                "base time must be > 0 s, got {}",
                self.base_time_sec
            )));
        }

        for (name, v) in [
            ("min_enforced_volume", self.min_enforced_volume),
            ("default_volume", self.default_volume),
        ] {
            if !(0.0..=100.0).contains(&v) {
                return Err(DoseError::ConfigValidation(format!(
                    "{} must be between 0 and 100%, got {}",
                    name, v
                )));
            }
        }

        Ok(())
    }

    /// Retorna cópia validada
    pub fn validated(self) -> DoseResult<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Faixa dinâmica da escala (dB)
    pub fn span_db(&self) -> f64 {
        self.max_db - self.min_db
    }

    /// Texto curto do perfil diário, ex.: "85 dB / 8h (3 dB)"
    pub fn profile_text(&self) -> String {
        let hours = self.base_time_sec / 3600.0;
        let er = self.exchange_rate_db;
        let er_txt = if er.fract() == 0.0 {
            format!("{}", er as i64)
        } else {
            format!("{}", er)
        };
        format!("{:.0} dB / {}h ({} dB)", self.ref_db, hours, er_txt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_reject_small_span() {
        let cfg = Config { min_db: 60.0, max_db: 65.0, ..Config::default() };
        assert!(matches!(cfg.validate(), Err(DoseError::ConfigValidation(_))));
    }

    #[test]
    fn test_reject_exchange_rate() {
        let cfg = Config { exchange_rate_db: 0.0, ..Config::default() };
        assert!(cfg.validate().is_err());
        let cfg = Config { exchange_rate_db: -3.0, ..Config::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_reject_volumes_out_of_range() {
        let cfg = Config { min_enforced_volume: 101.0, ..Config::default() };
        assert!(cfg.validate().is_err());
        let cfg = Config { default_volume: -1.0, ..Config::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_reject_nan() {
        let cfg = Config { ref_db: f64::NAN, ..Config::default() };
        assert!(matches!(cfg.validate(), Err(DoseError::NonFinite { field: "ref_db", .. })));
    }

    #[test]
    fn test_profile_text() {
        assert_eq!(Config::default().profile_text(), "85 dB / 8h (3 dB)");
        let cfg = Config { exchange_rate_db: 2.5, ..Config::default() };
        assert_eq!(cfg.profile_text(), "85 dB / 8h (2.5 dB)");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"ref_db": 80.0}"#).unwrap();
        assert_eq!(cfg.ref_db, 80.0);
        assert_eq!(cfg.max_db, 95.0);
        assert_eq!(cfg.base_time_sec, DEFAULT_BASE_TIME_SEC);
    }
}
