//! # 🎚️ sem-actuator — Atuador de Volume
//!
//! Interface do atuador de volume de saída, um backend simulado e o
//! enforcer que segura o volume no alvo enquanto há travamento.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌──────────────────┐  SharedTarget   ┌──────────────────┐
//! │   ControlLoop    │ ──────────────▶ │  VolumeEnforcer  │ (~14 Hz)
//! │  (escrita/alvo)  │                 │  (leitura/alvo)  │
//! └────────┬─────────┘                 └────────┬─────────┘
//!          │ set/get                           │ set/get
//!          ▼                                   ▼
//!     ┌─────────────────────────────────────────────┐
//!     │          AudioActuator (trait)              │
//!     │  available() · get_percent() · set_percent()│
//!     └─────────────────────────────────────────────┘
//! ```
//!
//! Indisponibilidade do backend é um modo degradado permanente:
//! nenhuma tentativa de enforcement é feita.
//!
//! ## Exemplo
//!
//! ```rust
//! use std::sync::Arc;
//! use sem_actuator::{AudioActuator, SimulatedVolume, VolumeEnforcer};
//!
//! let vol = SimulatedVolume::new(70.0);
//! let mut enforcer = VolumeEnforcer::new(Arc::new(vol.clone()));
//! enforcer.start(|| 5.0);
//! enforcer.stop();
//! ```

pub mod enforcer;
pub mod error;
pub mod types;
pub mod volume;

pub use enforcer::{enforce_once, EnforcerConfig, VolumeEnforcer};
pub use error::{ActuatorError, ActuatorResult};
pub use types::{clamp_percent, floor_quantize, quantize, SharedTarget, DEFAULT_VOLUME_QUANTUM};
pub use volume::{AudioActuator, SimulatedState, SimulatedVolume};
