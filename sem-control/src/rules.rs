//! Regras dos modos (Prefixado / Dinâmico) e filtro do slider

use sem_actuator::quantize;
use sem_dose::{
    prefixed_cap_percent, reached, risk_zone_from_level, Config, LevelThresholds,
};
use sem_exposure::Mode;
use crate::dynamic::{
    step_dynamic, DynamicContext, DynamicState, DynamicStrategy, DynamicTuning, StrategyInput,
};
use crate::lock::LockReason;
use crate::ui::Status;

/// Margem acima do teto do Prefixado antes de ajustar
pub const CAP_MARGIN: f64 = 0.1;

/// Margem acima do teto do soft-lock para o slider
pub const SLIDER_CEILING_MARGIN: f64 = 0.01;

/// Flags de preferência que afetam as regras
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleFlags {
    pub hard_lock_enabled: bool,
    pub lock_on_autoadjust: bool,
    pub softlock_enabled: bool,
    pub strategy: DynamicStrategy,
}

impl Default for RuleFlags {
    fn default() -> Self {
        Self {
            hard_lock_enabled: true,
            lock_on_autoadjust: true,
            softlock_enabled: true,
            strategy: DynamicStrategy::Reserva,
        }
    }
}

/// Observação de um tick para as regras
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInput<'a> {
    pub mode: Mode,
    pub cfg: &'a Config,
    pub flags: RuleFlags,
    pub volume_pct: f64,
    pub session_dose: f64,
    pub ema_remaining_sec: f64,
    pub allowed_sec: f64,
    pub level_db: f64,
    pub locked: bool,
    pub now: f64,
}

/// Decisão das regras
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuleDecision {
    pub volume: Option<f64>,
    pub lock: Option<(f64, LockReason)>,
    pub status: Option<Status>,
}

/// Veredito para uma mudança de slider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SliderVerdict {
    /// Travado: volta ao alvo
    Locked(f64),
    /// Subida durante redução dinâmica: restaura o volume atual
    Rejected(f64),
    /// Acima do teto do soft-lock: força o teto
    Ceiling(f64),
    /// Acima do teto do Prefixado: ajusta (e talvez trava)
    Capped { volume: f64, lock: bool },
    Accepted(f64),
}

/// Motor de regras dos modos
#[derive(Debug, Clone, Default)]
pub struct ModeRuleEngine {
    tuning: DynamicTuning,
    thresholds: LevelThresholds,
}

impl ModeRuleEngine {
    pub fn new(tuning: DynamicTuning, thresholds: LevelThresholds) -> Self {
        Self { tuning, thresholds }
    }

    pub fn tuning(&self) -> &DynamicTuning {
        &self.tuning
    }

    pub fn thresholds(&self) -> &LevelThresholds {
        &self.thresholds
    }

    /// Avalia as regras do modo ativo para um tick.
    ///
    /// Sem efeito quando travado ou com a sessão esgotada.
    pub fn evaluate(&self, dynamic: &mut DynamicState, input: &RuleInput<'_>) -> RuleDecision {
        if input.locked || reached(input.session_dose, 1.0) {
            return RuleDecision::default();
        }
        match input.mode {
            Mode::Prefixado => self.evaluate_prefixado(input),
            Mode::Dinamico => self.evaluate_dinamico(dynamic, input),
        }
    }

    fn evaluate_prefixado(&self, input: &RuleInput<'_>) -> RuleDecision {
        match prefixed_cap_percent(input.session_dose, input.cfg) {
            Some(cap) if input.volume_pct > cap + CAP_MARGIN => {
                let safe = input.cfg.min_enforced_volume.max(cap);
                let lock = (input.flags.hard_lock_enabled && input.flags.lock_on_autoadjust)
                    .then_some((safe, LockReason::SafetyAdjustment));
                RuleDecision {
                    volume: Some(safe),
                    lock,
                    status: Some(Status::AdjustedForSafety),
                }
            }
            _ => RuleDecision {
                status: Some(Status::Normal),
                ..Default::default()
            },
        }
    }

    fn evaluate_dinamico(&self, dynamic: &mut DynamicState, input: &RuleInput<'_>) -> RuleDecision {
        let strategy_input = StrategyInput {
            ema_remaining_sec: input.ema_remaining_sec,
            allowed_sec: input.allowed_sec,
            level_db: input.level_db,
            level_zone: risk_zone_from_level(input.level_db, &self.thresholds),
        };
        let ctx = DynamicContext {
            volume_pct: input.volume_pct,
            min_enforced: input.cfg.min_enforced_volume,
            softlock_enabled: input.flags.softlock_enabled,
            now: input.now,
        };
        let outcome = step_dynamic(
            dynamic,
            input.flags.strategy.limiter(),
            &strategy_input,
            &ctx,
            &self.tuning,
        );
        RuleDecision {
            volume: outcome.volume,
            lock: None,
            status: Some(outcome.status),
        }
    }

    /// Filtra uma mudança de volume vinda do slider
    #[allow(clippy::too_many_arguments)]
    pub fn check_slider(
        &self,
        requested: f64,
        current: f64,
        mode: Mode,
        dynamic: &DynamicState,
        locked_target: Option<f64>,
        session_dose: f64,
        cfg: &Config,
        flags: &RuleFlags,
    ) -> SliderVerdict {
        if let Some(target) = locked_target {
            return SliderVerdict::Locked(target);
        }
        let v = quantize(requested, self.tuning.volume_quantum);
        if dynamic.decay_active && v > current + SLIDER_CEILING_MARGIN {
            return SliderVerdict::Rejected(current);
        }
        if flags.softlock_enabled {
            if let Some(ceiling) = dynamic.ceiling_pct {
                if v > ceiling + SLIDER_CEILING_MARGIN {
                    return SliderVerdict::Ceiling(ceiling);
                }
            }
        }
        if mode == Mode::Prefixado {
            if let Some(cap) = prefixed_cap_percent(session_dose, cfg) {
                if v > cap + CAP_MARGIN {
                    return SliderVerdict::Capped {
                        volume: cfg.min_enforced_volume.max(cap),
                        lock: flags.hard_lock_enabled && flags.lock_on_autoadjust,
                    };
                }
            }
        }
        SliderVerdict::Accepted(v)
    }
}
