//! Modelo de dose (energia igual / taxa de troca)
//!
//! Funções puras que convertem volume% → nível (dB) → taxa de dose,
//! e o cálculo inverso do teto de volume do modo Prefixado.
//!
//! ```text
//! nível(p)      = min_db + (max_db - min_db) · p / 100
//! permitido(L)  = base · 2^(-(L - ref_db) / taxa_de_troca)
//! taxa(L)       = 1 / permitido(L)
//! ```

use crate::config::Config;

/// Folga mínima que o teto do Prefixado preserva (10 min)
pub const RESERVE_TARGET_SEC: f64 = 10.0 * 60.0;

/// Maior intervalo integrado por tick (absorve jitter e suspensão)
pub const MAX_TICK_DT_SEC: f64 = 1.0;

/// Guarda contra log2 de argumento não positivo
pub const LOG_ARG_EPSILON: f64 = 1e-9;

/// Tolerância para considerar um limiar de dose atingido
pub const DOSE_EPSILON: f64 = 1e-9;

/// Converte volume (%) para nível efetivo (dB). Não reaplica clamp.
pub fn level_from_percent(pct: f64, cfg: &Config) -> f64 {
    cfg.min_db + (cfg.max_db - cfg.min_db) * pct / 100.0
}

/// Inverso exato de [`level_from_percent`]. Pode sair de `[0, 100]`.
pub fn percent_from_level(db: f64, cfg: &Config) -> f64 {
    (db - cfg.min_db) / (cfg.max_db - cfg.min_db) * 100.0
}

/// Tempo diário permitido no nível `db` (segundos)
pub fn allowed_seconds(db: f64, cfg: &Config) -> f64 {
    cfg.base_time_sec * 2f64.powf(-(db - cfg.ref_db) / cfg.exchange_rate_db)
}

/// Taxa instantânea de acúmulo de dose (fração por segundo)
pub fn dose_rate_per_second(db: f64, cfg: &Config) -> f64 {
    1.0 / allowed_seconds(db, cfg)
}

/// Limita o intervalo de um tick a `[0, MAX_TICK_DT_SEC]`
pub fn clamp_dt(dt: f64) -> f64 {
    if dt.is_nan() {
        return 0.0;
    }
    dt.clamp(0.0, MAX_TICK_DT_SEC)
}

/// Incremento de dose de um tick, com `dt` já limitado
pub fn dose_increment(db: f64, dt: f64, cfg: &Config) -> f64 {
    dose_rate_per_second(db, cfg) * clamp_dt(dt)
}

/// Verifica se `value` atingiu `threshold` (com tolerância de ponto flutuante)
pub fn reached(value: f64, threshold: f64) -> bool {
    value >= threshold - DOSE_EPSILON
}

/// Teto de volume do modo Prefixado.
///
/// Maior nível cujo tempo restante ainda deixa [`RESERVE_TARGET_SEC`]
/// antes de esgotar a dose diária naquele nível.
///
/// - `None`: nenhum teto necessário (qualquer volume é seguro agora)
/// - `Some(0.0)`: mudo necessário
pub fn prefixed_cap_percent(dose: f64, cfg: &Config) -> Option<f64> {
    let remaining = (1.0 - dose) * cfg.base_time_sec;
    if remaining >= RESERVE_TARGET_SEC {
        return None;
    }

    let arg = (remaining / RESERVE_TARGET_SEC).max(LOG_ARG_EPSILON);
    let l_max = cfg.ref_db + cfg.exchange_rate_db * arg.log2();
    let cap = percent_from_level(l_max, cfg);

    if cap >= 100.0 {
        None
    } else if cap <= 0.0 {
        Some(0.0)
    } else {
        Some(cap)
    }
}
