//! Máquina de travamento de volume
//!
//! ```text
//!             sessão 100% │ diário 100% │ ajuste Prefixado
//!  Unlocked ──────────────┴─────────────┴──────────────────▶ Locked
//!     ▲                                                        │
//!     └──────────────────── reset explícito ───────────────────┘
//! ```
//!
//! Travamento é pegajoso: um segundo pedido enquanto travado é ignorado.

use serde::{Deserialize, Serialize};

/// Motivo do travamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    SessionLimit,
    DailyLimit,
    SafetyAdjustment,
}

impl LockReason {
    pub fn label(&self) -> &'static str {
        match self {
            LockReason::SessionLimit => "session limit",
            LockReason::DailyLimit => "daily limit",
            LockReason::SafetyAdjustment => "safety adjustment",
        }
    }
}

impl std::fmt::Display for LockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Estado de travamento. `target_pct` existe sse travado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LockState {
    locked: bool,
    target_pct: Option<f64>,
    reason: Option<LockReason>,
}

impl LockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn target(&self) -> Option<f64> {
        self.target_pct
    }

    pub fn reason(&self) -> Option<LockReason> {
        self.reason
    }

    /// Trava em `max(min_enforced, target)`.
    ///
    /// Retorna `false` (sem efeito) se já estiver travado.
    pub fn engage(&mut self, target_pct: f64, min_enforced: f64, reason: LockReason) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        self.target_pct = Some(min_enforced.max(target_pct));
        self.reason = Some(reason);
        true
    }

    /// Destrava (reset de sessão). Retorna se estava travado.
    pub fn release(&mut self) -> bool {
        let was = self.locked;
        *self = Self::default();
        was
    }

    /// Volume permitido: o alvo quando travado, senão o pedido
    pub fn permitted(&self, requested: f64) -> f64 {
        self.target_pct.unwrap_or(requested)
    }
}
