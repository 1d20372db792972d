//! # 🛡️ sem-control — Loop de Controle de Exposição
//!
//! Máquina de estados que limita o volume de saída para manter a dose
//! sonora dentro do orçamento diário.
//!
//! ## Componentes
//!
//! | Módulo     | Responsabilidade                                           |
//! |------------|------------------------------------------------------------|
//! | `lock`     | Travamento pegajoso (sessão, diário, ajuste de segurança)  |
//! | `dynamic`  | Histerese do modo Dinâmico (Reserva / Zona Segura)         |
//! | `rules`    | Regras por modo e filtro do slider                         |
//! | `monitor`  | `ControlLoop`: tick, sincronização, histórico, thread      |
//! | `ui`       | Fila de comandos para a apresentação                       |
//! | `settings` | Preferências JSON por usuário                              |
//! | `clock`    | Relógio real e manual                                      |
//!
//! ## Threads
//!
//! ```text
//! ┌──────────────┐  ControlCommand  ┌─────────────┐  UiCommand  ┌──────────────┐
//! │ apresentação │ ───────────────▶ │ ControlLoop │ ──────────▶ │ apresentação │
//! └──────────────┘                  └──────┬──────┘  (~20 ms)   └──────────────┘
//!                                          │ SharedTarget
//!                                          ▼
//!                                   VolumeEnforcer
//! ```
//!
//! O `ControlLoop` é o único escritor do estado de exposição, do
//! travamento e do estado Dinâmico.

pub mod clock;
pub mod dynamic;
pub mod error;
pub mod lock;
pub mod monitor;
pub mod rules;
pub mod settings;
pub mod types;
pub mod ui;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dynamic::{
    step_dynamic, DynamicContext, DynamicOutcome, DynamicState, DynamicStrategy, DynamicTuning,
    LimitStrategy, ReservaStrategy, StrategyInput, ZonaSeguraStrategy, DECAY_QUANTUM,
    MIN_DECAY_DELTA,
};
pub use error::{ControlError, ControlResult, SettingsError, SettingsResult};
pub use lock::{LockReason, LockState};
pub use monitor::{ControlLoop, MonitorHandle};
pub use rules::{ModeRuleEngine, RuleDecision, RuleFlags, RuleInput, SliderVerdict};
pub use settings::{JsonSettingsStore, MemorySettingsStore, Preferences, SettingsStore};
pub use types::{ControlCommand, LoopTiming, SettingsUpdate};
pub use ui::{ui_channel, Status, Tone, UiCommand, UiReceiver, UiSender, UI_PUMP_INTERVAL};

#[cfg(test)]
mod tests;
