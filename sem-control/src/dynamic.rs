//! Modo Dinâmico: máquina de histerese com redução gradual
//!
//! As duas estratégias (Reserva e Zona Segura) compartilham a mesma
//! máquina; só mudam o gatilho e o tamanho do passo.
//!
//! ```text
//!            gatilho                      ≥ adjust_interval
//!  Idle ─────────────────▶ Limiting ──────────────────────▶ decay(step)
//!   ▲  (teto = vol atual)     │
//!   │                         │ saída
//!   │   liberação contínua    ▼
//!   └──── ≥ release_delay ── Idle (teto mantido)
//! ```
//!
//! O teto só desce enquanto existe; é removido apenas depois que a
//! condição de liberação vale continuamente por `release_delay`.

use std::str::FromStr;
use serde::{Deserialize, Serialize};
use sem_actuator::{floor_quantize, quantize, DEFAULT_VOLUME_QUANTUM};
use sem_dose::RiskZone;
use crate::ui::Status;

/// Diferença mínima para aplicar um passo de redução
pub const MIN_DECAY_DELTA: f64 = 0.1;

/// Grade da redução gradual; não pode ser maior que o menor passo
pub const DECAY_QUANTUM: f64 = 0.5;

/// Estratégia do modo Dinâmico
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicStrategy {
    /// Mantém uma reserva de tempo restante
    #[default]
    Reserva,
    /// Reduz até o nível voltar à zona segura
    ZonaSegura,
}

impl DynamicStrategy {
    pub fn key(&self) -> &'static str {
        match self {
            DynamicStrategy::Reserva => "reserva",
            DynamicStrategy::ZonaSegura => "zona_segura",
        }
    }

    /// Implementação da estratégia
    pub fn limiter(&self) -> &'static dyn LimitStrategy {
        match self {
            DynamicStrategy::Reserva => &ReservaStrategy,
            DynamicStrategy::ZonaSegura => &ZonaSeguraStrategy,
        }
    }
}

impl std::fmt::Display for DynamicStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DynamicStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reserva" | "reserve" => Ok(DynamicStrategy::Reserva),
            "zona_segura" | "zona-segura" | "safe_zone" | "safe-zone" => Ok(DynamicStrategy::ZonaSegura),
            other => Err(format!("unknown dynamic strategy: {}", other)),
        }
    }
}

/// Parâmetros do modo Dinâmico
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicTuning {
    /// Fração do tempo permitido usada como reserva alvo
    pub reserve_fraction: f64,
    pub reserve_min_sec: f64,
    pub reserve_max_sec: f64,
    /// Meia largura da banda de histerese (s)
    pub hysteresis_sec: f64,
    pub step_small: f64,
    pub step_medium: f64,
    pub step_large: f64,
    /// Intervalo mínimo entre passos de redução (s)
    pub adjust_interval_sec: f64,
    /// Tempo contínuo na condição de liberação antes de remover o teto (s)
    pub release_delay_sec: f64,
    /// Quantum do volume (pontos %)
    pub volume_quantum: f64,
    /// Grade do volume reduzido (pontos %)
    pub decay_quantum: f64,
}

impl Default for DynamicTuning {
    fn default() -> Self {
        Self {
            reserve_fraction: 0.10,
            reserve_min_sec: 600.0,
            reserve_max_sec: 1200.0,
            hysteresis_sec: 90.0,
            step_small: 0.5,
            step_medium: 1.0,
            step_large: 2.0,
            adjust_interval_sec: 0.6,
            release_delay_sec: 20.0,
            volume_quantum: DEFAULT_VOLUME_QUANTUM,
            decay_quantum: DECAY_QUANTUM,
        }
    }
}

impl DynamicTuning {
    /// Reserva alvo: `clamp(fração · permitido, min, max)`
    pub fn reserve_target(&self, allowed_sec: f64) -> f64 {
        (self.reserve_fraction * allowed_sec).clamp(self.reserve_min_sec, self.reserve_max_sec)
    }

    /// Banda `[alvo - h, alvo + h]`
    pub fn band(&self, allowed_sec: f64) -> (f64, f64) {
        let target = self.reserve_target(allowed_sec);
        (target - self.hysteresis_sec, target + self.hysteresis_sec)
    }
}

/// Estado transitório (um por ativação de modo)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicState {
    pub limiting_active: bool,
    pub decay_active: bool,
    pub ceiling_pct: Option<f64>,
    pub upper_ok_since: Option<f64>,
    pub last_adjust_ts: Option<f64>,
}

impl DynamicState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Rebaixa o teto (nunca sobe)
    pub fn lower_ceiling(&mut self, pct: f64) {
        self.ceiling_pct = Some(match self.ceiling_pct {
            Some(c) => c.min(pct),
            None => pct,
        });
    }
}

/// Observação usada pelas estratégias
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyInput {
    pub ema_remaining_sec: f64,
    pub allowed_sec: f64,
    /// Último nível observado (dB)
    pub level_db: f64,
    pub level_zone: RiskZone,
}

/// Gatilho e passo de uma estratégia do modo Dinâmico
pub trait LimitStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entrar em limitação?
    fn should_engage(&self, input: &StrategyInput, tuning: &DynamicTuning) -> bool;

    /// Sair da limitação?
    fn should_exit(&self, input: &StrategyInput, tuning: &DynamicTuning) -> bool;

    /// Condição que, contínua por `release_delay`, remove o teto
    fn release_holds(&self, input: &StrategyInput, tuning: &DynamicTuning) -> bool;

    /// Tamanho do passo de redução
    fn step(&self, input: &StrategyInput, tuning: &DynamicTuning) -> f64;

    /// Status exibido enquanto limita
    fn limiting_status(&self) -> Status;
}

/// Reserva: mantém o tempo restante (EMA) acima da banda
#[derive(Debug, Clone, Copy, Default)]
pub struct ReservaStrategy;

impl LimitStrategy for ReservaStrategy {
    fn name(&self) -> &'static str {
        "reserva"
    }

    fn should_engage(&self, input: &StrategyInput, tuning: &DynamicTuning) -> bool {
        let (lower, _) = tuning.band(input.allowed_sec);
        input.ema_remaining_sec < lower
    }

    fn should_exit(&self, input: &StrategyInput, tuning: &DynamicTuning) -> bool {
        let (_, upper) = tuning.band(input.allowed_sec);
        input.ema_remaining_sec > upper
    }

    fn release_holds(&self, input: &StrategyInput, tuning: &DynamicTuning) -> bool {
        self.should_exit(input, tuning)
    }

    fn step(&self, input: &StrategyInput, tuning: &DynamicTuning) -> f64 {
        let deficit = tuning.reserve_target(input.allowed_sec) - input.ema_remaining_sec;
        if deficit < 60.0 {
            tuning.step_small
        } else if deficit < 300.0 {
            tuning.step_medium
        } else {
            tuning.step_large
        }
    }

    fn limiting_status(&self) -> Status {
        Status::AutoLimiting
    }
}

/// Zona Segura: reduz enquanto o nível estiver fora da zona segura
#[derive(Debug, Clone, Copy, Default)]
pub struct ZonaSeguraStrategy;

impl LimitStrategy for ZonaSeguraStrategy {
    fn name(&self) -> &'static str {
        "zona_segura"
    }

    fn should_engage(&self, input: &StrategyInput, _tuning: &DynamicTuning) -> bool {
        !input.level_zone.is_safe()
    }

    fn should_exit(&self, input: &StrategyInput, _tuning: &DynamicTuning) -> bool {
        input.level_zone.is_safe()
    }

    fn release_holds(&self, input: &StrategyInput, _tuning: &DynamicTuning) -> bool {
        input.level_zone.is_safe()
    }

    fn step(&self, input: &StrategyInput, tuning: &DynamicTuning) -> f64 {
        if input.level_db < 90.0 {
            tuning.step_small
        } else if input.level_db < 95.0 {
            tuning.step_medium
        } else {
            tuning.step_large
        }
    }

    fn limiting_status(&self) -> Status {
        Status::AutoLimitingSafeZone
    }
}

/// Contexto de um passo da máquina
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicContext {
    pub volume_pct: f64,
    pub min_enforced: f64,
    pub softlock_enabled: bool,
    /// Relógio monotônico (s)
    pub now: f64,
}

/// Resultado de um passo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicOutcome {
    /// Novo volume, quando houve redução
    pub volume: Option<f64>,
    pub status: Status,
}

/// Avança a máquina de histerese um tick
pub fn step_dynamic(
    state: &mut DynamicState,
    strategy: &dyn LimitStrategy,
    input: &StrategyInput,
    ctx: &DynamicContext,
    tuning: &DynamicTuning,
) -> DynamicOutcome {
    if !state.limiting_active && strategy.should_engage(input, tuning) {
        state.limiting_active = true;
        if ctx.softlock_enabled {
            state.lower_ceiling(quantize(ctx.volume_pct, tuning.volume_quantum));
            state.upper_ok_since = None;
        }
        tracing::debug!(strategy = strategy.name(), volume = ctx.volume_pct, "dynamic limiting engaged");
    } else if state.limiting_active && strategy.should_exit(input, tuning) {
        state.limiting_active = false;
        tracing::debug!(strategy = strategy.name(), "dynamic limiting released");
    }

    if state.limiting_active {
        let mut volume = None;
        let due = state
            .last_adjust_ts
            .map(|ts| ctx.now - ts >= tuning.adjust_interval_sec)
            .unwrap_or(true);
        if due {
            let step = strategy.step(input, tuning);
            let target = ctx
                .min_enforced
                .max(floor_quantize(ctx.volume_pct - step, tuning.decay_quantum));
            if ctx.volume_pct - target >= MIN_DECAY_DELTA - 1e-9 {
                state.decay_active = true;
                if ctx.softlock_enabled {
                    state.lower_ceiling(target);
                }
                volume = Some(target);
            }
            state.last_adjust_ts = Some(ctx.now);
        }
        return DynamicOutcome {
            volume,
            status: strategy.limiting_status(),
        };
    }

    state.decay_active = false;
    if ctx.softlock_enabled {
        if strategy.release_holds(input, tuning) {
            match state.upper_ok_since {
                None => state.upper_ok_since = Some(ctx.now),
                Some(since) if ctx.now - since >= tuning.release_delay_sec => {
                    if state.ceiling_pct.take().is_some() {
                        tracing::debug!(strategy = strategy.name(), "dynamic ceiling released");
                    }
                }
                Some(_) => {}
            }
        } else {
            state.upper_ok_since = None;
        }
    }
    DynamicOutcome {
        volume: None,
        status: Status::Normal,
    }
}
