//! Enforcer de volume travado
//!
//! Thread independente que força o atuador para o alvo enquanto um
//! travamento está ativo, desfazendo mudanças externas de volume.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use crate::error::ActuatorResult;
use crate::volume::AudioActuator;

/// Configuração do enforcer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnforcerConfig {
    /// Intervalo entre verificações (~14 Hz)
    pub interval: Duration,
    /// Diferença tolerada antes de reescrever o volume (pontos %)
    pub deadband: f64,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(70),
            deadband: 0.5,
        }
    }
}

/// Um passo de enforcement. Retorna `true` se o volume foi reescrito.
pub fn enforce_once(
    actuator: &dyn AudioActuator,
    target: f64,
    deadband: f64,
) -> ActuatorResult<bool> {
    let current = actuator.get_percent()?;
    if (current - target).abs() > deadband {
        actuator.set_percent(target)?;
        return Ok(true);
    }
    Ok(false)
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Mantém o volume travado em um alvo lido de um callback
pub struct VolumeEnforcer {
    actuator: Arc<dyn AudioActuator>,
    config: EnforcerConfig,
    worker: Option<Worker>,
}

impl std::fmt::Debug for VolumeEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeEnforcer")
            .field("actuator", &self.actuator.name())
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl VolumeEnforcer {
    pub fn new(actuator: Arc<dyn AudioActuator>) -> Self {
        Self::with_config(actuator, EnforcerConfig::default())
    }

    pub fn with_config(actuator: Arc<dyn AudioActuator>, config: EnforcerConfig) -> Self {
        Self {
            actuator,
            config,
            worker: None,
        }
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Thread de enforcement ativa?
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    /// Inicia o enforcer. Não faz nada se já estiver rodando.
    ///
    /// `target` retorna o alvo vivo (alvo do travamento ou último volume).
    pub fn start<F>(&mut self, target: F) -> bool
    where
        F: Fn() -> f64 + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        // worker anterior já terminou; descarta
        self.worker = None;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let actuator = Arc::clone(&self.actuator);
        let config = self.config;

        let spawned = thread::Builder::new()
            .name("sem-volume-enforcer".into())
            .spawn(move || {
                tracing::debug!(interval_ms = config.interval.as_millis() as u64, "enforcer started");
                loop {
                    if actuator.available() {
                        let goal = target();
                        match enforce_once(actuator.as_ref(), goal, config.deadband) {
                            Ok(true) => tracing::trace!(target_pct = goal, "volume reasserted"),
                            Ok(false) => {}
                            Err(e) => tracing::trace!(error = %e, "enforcer step failed"),
                        }
                    }
                    match stop_rx.recv_timeout(config.interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("enforcer stopped");
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker { stop: stop_tx, handle });
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not spawn volume enforcer");
                false
            }
        }
    }

    /// Sinaliza parada e aguarda a thread sair
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop.try_send(());
            drop(worker.stop);
            if worker.handle.join().is_err() {
                tracing::warn!("volume enforcer thread panicked");
            }
        }
    }
}

impl Drop for VolumeEnforcer {
    fn drop(&mut self) {
        self.stop();
    }
}
