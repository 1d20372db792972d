//! # 🔊 sem-dose — Modelo de Dose Sonora
//!
//! Converte volume de saída em nível efetivo (dB), nível em taxa de dose
//! e dose em zonas de risco, seguindo o modelo de energia igual com
//! taxa de troca (NIOSH: 85 dB / 8h / 3 dB).
//!
//! ## Fluxo
//!
//! ```text
//! volume %  ──level_from_percent──▶  dB  ──allowed_seconds──▶  tempo permitido
//!                                     │
//!                                     └──dose_rate_per_second──▶  dose/s · dt
//!
//! dose  ──prefixed_cap_percent──▶  teto de volume (Prefixado)
//! ```
//!
//! Todas as funções são puras: sem estado oculto.
//!
//! ## Exemplo
//!
//! ```rust
//! use sem_dose::{Config, allowed_seconds, level_from_percent};
//!
//! let cfg = Config::default();
//! let level = level_from_percent(50.0, &cfg);
//! assert!(allowed_seconds(level, &cfg) > cfg.base_time_sec);
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod profile;
pub mod zone;

pub use config::{Config, DEFAULT_BASE_TIME_SEC, MIN_DB_SPAN};
pub use error::{DoseError, DoseResult};
pub use format::{fmt_hms, round_pct_ui};
pub use model::{
    allowed_seconds, clamp_dt, dose_increment, dose_rate_per_second, level_from_percent,
    percent_from_level, prefixed_cap_percent, reached, DOSE_EPSILON, MAX_TICK_DT_SEC,
    RESERVE_TARGET_SEC,
};
pub use profile::{ProfilePreview, ProtectionProfile};
pub use zone::{risk_zone_from_dose, risk_zone_from_level, LevelThresholds, RiskZone};
