//! Fila de comandos de UI
//!
//! O loop de controle nunca toca a camada de apresentação: ele empilha
//! [`UiCommand`]s num canal sem limite que um único consumidor drena no
//! seu próprio ritmo (~20 ms).

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use sem_dose::RiskZone;
use sem_exposure::{ChartPoint, ExposureAlert, Mode};
use crate::lock::LockReason;

/// Intervalo de drenagem do consumidor
pub const UI_PUMP_INTERVAL: Duration = Duration::from_millis(20);

/// Tom de cor semântico
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    Success,
    Warning,
    Error,
}

impl Tone {
    /// Tom da zona de risco
    pub fn for_zone(zone: RiskZone) -> Self {
        match zone {
            RiskZone::Safe => Tone::Success,
            RiskZone::Caution => Tone::Warning,
            RiskZone::Danger => Tone::Error,
        }
    }

    /// Tom do rótulo de dose diária (80% aviso, 100% erro)
    pub fn for_daily_percent(pct: f64) -> Self {
        if pct >= 100.0 {
            Tone::Error
        } else if pct >= 80.0 {
            Tone::Warning
        } else {
            Tone::Neutral
        }
    }
}

/// Status geral exibido
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Normal,
    Paused,
    AdjustedForSafety,
    AutoLimiting,
    AutoLimitingSafeZone,
    Locked(LockReason),
}

impl Status {
    pub fn text(&self) -> String {
        match self {
            Status::Normal => "Status: normal".to_string(),
            Status::Paused => "Status: paused".to_string(),
            Status::AdjustedForSafety => "Status: adjusted for safety".to_string(),
            Status::AutoLimiting => "Status: auto-limiting".to_string(),
            Status::AutoLimitingSafeZone => "Status: auto-limiting (to safe zone)".to_string(),
            Status::Locked(reason) => format!("Status: locked ({})", reason),
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Status::Normal => Tone::Neutral,
            Status::Paused | Status::AdjustedForSafety => Tone::Warning,
            Status::AutoLimiting | Status::AutoLimitingSafeZone => Tone::Warning,
            Status::Locked(_) => Tone::Error,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// Comando para a camada de apresentação
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    SetGauge { level_db: f64, dose: f64 },
    SetStatus(Status),
    SetSlider(f64),
    /// Rótulo do volume (inteiro arredondado)
    SetVolumeLabel(i64),
    SetSliderTone(Tone),
    SetZoneBadge { zone: RiskZone, tone: Tone },
    SetTimes { allowed_sec: f64, at_level_sec: f64 },
    /// `None` exibe `--:--:--`
    SetRemaining(Option<f64>),
    SetDailyDose { percent: f64, tone: Tone },
    SetControlsEnabled(bool),
    SetMode(Mode),
    DrawChart(Vec<ChartPoint>),
    Alert(ExposureAlert),
    Notice { title: String, message: String },
}

impl UiCommand {
    pub fn notice(title: impl Into<String>, message: impl Into<String>) -> Self {
        UiCommand::Notice {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Lado produtor (loop de controle). Nunca bloqueia.
#[derive(Debug, Clone)]
pub struct UiSender {
    tx: Sender<UiCommand>,
}

impl UiSender {
    /// Envia; consumidor desconectado é ignorado
    pub fn send(&self, cmd: UiCommand) {
        let _ = self.tx.send(cmd);
    }

    /// Produtor sem consumidor (modo headless sem apresentação)
    pub fn detached() -> Self {
        let (tx, _rx) = unbounded();
        Self { tx }
    }
}

/// Lado consumidor (apresentação)
#[derive(Debug)]
pub struct UiReceiver {
    rx: Receiver<UiCommand>,
}

impl UiReceiver {
    /// Retira tudo que está pendente
    pub fn drain(&self) -> Vec<UiCommand> {
        self.rx.try_iter().collect()
    }

    /// Espera até `timeout` pelo próximo comando
    pub fn recv_timeout(&self, timeout: Duration) -> Option<UiCommand> {
        match self.rx.recv_timeout(timeout) {
            Ok(cmd) => Some(cmd),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Cria a fila de UI
pub fn ui_channel() -> (UiSender, UiReceiver) {
    let (tx, rx) = unbounded();
    (UiSender { tx }, UiReceiver { rx })
}
