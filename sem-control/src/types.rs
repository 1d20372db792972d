//! Comandos e temporização do loop de controle

use std::path::PathBuf;
use std::time::Duration;
use sem_dose::Config;
use sem_exposure::{Mode, ReportFormat, DEFAULT_CHART_WINDOW_SEC};
use crate::dynamic::DynamicStrategy;
use crate::settings::Preferences;

/// Temporização do loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    /// Período normal do tick
    pub tick: Duration,
    /// Período pausado
    pub paused_tick: Duration,
    /// Período pausado e travado
    pub paused_locked_tick: Duration,
    /// Sincronização com o volume do sistema (s)
    pub sync_interval_sec: f64,
    /// Amostragem do histórico (s)
    pub history_interval_sec: f64,
    /// Redesenho do gráfico (s)
    pub chart_interval_sec: f64,
    pub chart_window_sec: f64,
    /// Período do enforcer de travamento
    pub enforcer_interval: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            paused_tick: Duration::from_millis(200),
            paused_locked_tick: Duration::from_millis(100),
            sync_interval_sec: 0.5,
            history_interval_sec: 1.0,
            chart_interval_sec: 0.8,
            chart_window_sec: DEFAULT_CHART_WINDOW_SEC,
            enforcer_interval: Duration::from_millis(70),
        }
    }
}

/// Ajustes vindos do diálogo de configurações
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsUpdate {
    pub cfg: Config,
    pub hard_lock_enabled: bool,
    pub lock_on_autoadjust: bool,
    pub dynamic_strategy: DynamicStrategy,
    pub dynamic_softlock_enabled: bool,
}

impl From<&Preferences> for SettingsUpdate {
    fn from(prefs: &Preferences) -> Self {
        Self {
            cfg: prefs.cfg,
            hard_lock_enabled: prefs.hard_lock_enabled,
            lock_on_autoadjust: prefs.lock_on_autoadjust,
            dynamic_strategy: prefs.dynamic_strategy,
            dynamic_softlock_enabled: prefs.dynamic_softlock_enabled,
        }
    }
}

/// Comandos de entrada do loop de controle
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Slider movido pelo usuário
    SetVolume(f64),
    SetMode(Mode),
    TogglePause,
    ResetSession,
    ApplySettings(SettingsUpdate),
    ExportReport { format: ReportFormat, path: PathBuf },
}
