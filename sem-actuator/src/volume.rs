//! Interface do atuador de volume e implementação simulada

use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use crate::error::{ActuatorError, ActuatorResult};
use crate::types::clamp_percent;

/// Atuador de volume de saída (ex.: mixer do sistema operacional).
///
/// Chamadas usam `&self`: implementações guardam estado com mutabilidade
/// interior, pois o loop de controle e o enforcer compartilham o atuador.
pub trait AudioActuator: Send + Sync + std::fmt::Debug {
    /// Nome do backend (para logs)
    fn name(&self) -> &str {
        "audio"
    }

    /// Backend disponível?
    fn available(&self) -> bool;

    /// Volume atual (%)
    fn get_percent(&self) -> ActuatorResult<f64>;

    /// Define volume (%), limitado a `[0, 100]`
    fn set_percent(&self, pct: f64) -> ActuatorResult<()>;
}

/// Estado interno do atuador simulado
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedState {
    /// Volume atual (%)
    pub current_pct: f64,
    /// Backend disponível
    pub available: bool,
    /// Total de escritas recebidas
    pub writes: u64,
    /// Próximas N chamadas falham (erro transitório)
    pub pending_failures: u32,
}

impl Default for SimulatedState {
    fn default() -> Self {
        Self {
            current_pct: 30.0,
            available: true,
            writes: 0,
            pending_failures: 0,
        }
    }
}

/// Atuador de volume simulado (sem hardware).
///
/// Clones compartilham o mesmo estado, permitindo que testes e o harness
/// simulem um usuário mexendo no controle do sistema.
#[derive(Debug, Clone, Default)]
pub struct SimulatedVolume {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedVolume {
    /// Cria atuador disponível no volume inicial
    pub fn new(initial_pct: f64) -> Self {
        let state = SimulatedState {
            current_pct: clamp_percent(initial_pct),
            ..SimulatedState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Cria atuador indisponível
    pub fn unavailable() -> Self {
        let state = SimulatedState {
            available: false,
            ..SimulatedState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Mudança externa de volume (ex.: usuário no mixer do sistema)
    pub fn nudge(&self, pct: f64) -> ActuatorResult<()> {
        let mut state = self.state.lock()?;
        state.current_pct = clamp_percent(pct);
        Ok(())
    }

    /// Liga/desliga o backend
    pub fn set_available(&self, available: bool) -> ActuatorResult<()> {
        self.state.lock()?.available = available;
        Ok(())
    }

    /// Faz as próximas `n` chamadas falharem
    pub fn fail_next(&self, n: u32) -> ActuatorResult<()> {
        self.state.lock()?.pending_failures = n;
        Ok(())
    }

    /// Cópia do estado
    pub fn snapshot(&self) -> ActuatorResult<SimulatedState> {
        Ok(self.state.lock()?.clone())
    }

    fn take_failure(state: &mut SimulatedState) -> ActuatorResult<()> {
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(ActuatorError::CommandFailed("simulated transient failure".into()));
        }
        Ok(())
    }
}

impl AudioActuator for SimulatedVolume {
    fn name(&self) -> &str {
        "simulated"
    }

    fn available(&self) -> bool {
        self.state.lock().map(|s| s.available).unwrap_or(false)
    }

    fn get_percent(&self) -> ActuatorResult<f64> {
        let mut state = self.state.lock()?;
        if !state.available {
            return Err(ActuatorError::Unavailable);
        }
        Self::take_failure(&mut state)?;
        Ok(state.current_pct)
    }

    fn set_percent(&self, pct: f64) -> ActuatorResult<()> {
        let mut state = self.state.lock()?;
        if !state.available {
            return Err(ActuatorError::Unavailable);
        }
        Self::take_failure(&mut state)?;
        state.current_pct = clamp_percent(pct);
        state.writes += 1;
        Ok(())
    }
}
