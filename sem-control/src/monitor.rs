//! Loop de controle
//!
//! Escritor único do estado de exposição, travamento e modo Dinâmico.
//!
//! ```text
//!  ControlCommand ──▶ ┌─────────────────────────────┐ ──▶ UiCommand (fila)
//!   (slider, modo,    │ ControlLoop::tick (200 ms)  │
//!    pausa, reset)    │  trava · dose · regras ·    │ ──▶ AudioActuator
//!                     │  alertas · sync · histórico │
//!                     └──────────────┬──────────────┘
//!                                    │ SharedTarget
//!                                    ▼
//!                             VolumeEnforcer (70 ms)
//! ```

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender, TryRecvError};
use sem_actuator::{
    clamp_percent, quantize, ActuatorError, AudioActuator, EnforcerConfig, SharedTarget,
    VolumeEnforcer,
};
use sem_dose::{clamp_dt, level_from_percent, round_pct_ui, Config};
use sem_exposure::{
    export_to_path, ExposureAlert, ExposureTick, ExposureTracker, HistoryLog, HistorySample,
    Mode, ReportContext, ReportFormat, SummaryStats, MAX_HISTORY,
};
use crate::clock::Clock;
use crate::dynamic::DynamicState;
use crate::error::{ControlError, ControlResult};
use crate::lock::{LockReason, LockState};
use crate::rules::{ModeRuleEngine, RuleDecision, RuleFlags, RuleInput, SliderVerdict};
use crate::settings::{Preferences, SettingsStore};
use crate::types::{ControlCommand, LoopTiming, SettingsUpdate};
use crate::ui::{Status, Tone, UiCommand, UiSender};

/// Diferença de volume tolerada contra o alvo travado (tick)
const LOCK_TOLERANCE: f64 = 0.1;

/// Diferença tolerada entre escrita e leitura do atuador
const READBACK_TOLERANCE: f64 = 0.5;

/// Mudança externa mínima adotada pela sincronização
const EXTERNAL_CHANGE_MIN: f64 = 1.0;

/// Diferença que faz o startup adotar o volume do sistema
const STARTUP_ADOPT_MIN: f64 = 2.0;

/// Loop de controle de exposição
pub struct ControlLoop {
    prefs: Preferences,
    volume_pct: f64,
    paused: bool,
    tracker: ExposureTracker,
    lock: LockState,
    dynamic: DynamicState,
    rules: ModeRuleEngine,
    history: HistoryLog,
    timing: LoopTiming,
    actuator: Arc<dyn AudioActuator>,
    enforcer: VolumeEnforcer,
    target: SharedTarget,
    ui: UiSender,
    clock: Arc<dyn Clock>,
    store: Box<dyn SettingsStore>,
    session_start: f64,
    last_update: f64,
    last_sync: Option<f64>,
    last_history: Option<f64>,
    last_chart: Option<f64>,
    actuator_warned: bool,
}

impl ControlLoop {
    /// Carrega preferências, semeia o volume e sincroniza com o sistema
    pub fn new(
        actuator: Arc<dyn AudioActuator>,
        store: Box<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
        ui: UiSender,
    ) -> Self {
        Self::with_parts(actuator, store, clock, ui, LoopTiming::default(), ModeRuleEngine::default())
    }

    pub fn with_parts(
        actuator: Arc<dyn AudioActuator>,
        store: Box<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
        ui: UiSender,
        timing: LoopTiming,
        rules: ModeRuleEngine,
    ) -> Self {
        let prefs = store.load();
        let now = clock.now();
        let volume_pct = clamp_percent(prefs.volume);
        let enforcer = VolumeEnforcer::with_config(
            Arc::clone(&actuator),
            EnforcerConfig {
                interval: timing.enforcer_interval,
                ..EnforcerConfig::default()
            },
        );

        let mut this = Self {
            tracker: ExposureTracker::starting_on(clock.today()),
            prefs,
            volume_pct,
            paused: false,
            lock: LockState::new(),
            dynamic: DynamicState::default(),
            rules,
            history: HistoryLog::new(MAX_HISTORY, timing.chart_window_sec),
            timing,
            actuator,
            enforcer,
            target: SharedTarget::new(volume_pct),
            ui,
            clock,
            store,
            session_start: now,
            last_update: now,
            last_sync: None,
            last_history: None,
            last_chart: None,
            actuator_warned: false,
        };
        this.startup();
        this
    }

    fn startup(&mut self) {
        self.ui.send(UiCommand::SetMode(self.prefs.mode));
        if self.actuator.available() {
            match self.actuator.get_percent() {
                Ok(sys) if (sys - self.volume_pct).abs() > STARTUP_ADOPT_MIN => {
                    tracing::debug!(system = sys, stored = self.volume_pct, "adopting system volume");
                    self.set_volume(clamp_percent(sys));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "initial volume read failed"),
            }
        } else {
            self.notice_unavailable();
        }
        self.show_volume(self.volume_pct);
        self.ui.send(UiCommand::SetStatus(Status::Normal));
        tracing::info!(
            mode = %self.prefs.mode,
            volume = self.volume_pct,
            profile = %self.prefs.cfg.profile_text(),
            "control loop ready"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACESSO
    // ═══════════════════════════════════════════════════════════════════════

    pub fn volume_pct(&self) -> f64 {
        self.volume_pct
    }

    pub fn mode(&self) -> Mode {
        self.prefs.mode
    }

    pub fn config(&self) -> &Config {
        &self.prefs.cfg
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn lock_state(&self) -> &LockState {
        &self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn dynamic_state(&self) -> &DynamicState {
        &self.dynamic
    }

    pub fn tracker(&self) -> &ExposureTracker {
        &self.tracker
    }

    /// Acesso direto ao rastreador (restauração de estado)
    pub fn tracker_mut(&mut self) -> &mut ExposureTracker {
        &mut self.tracker
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn timing(&self) -> &LoopTiming {
        &self.timing
    }

    pub fn enforcer_running(&self) -> bool {
        self.enforcer.is_running()
    }

    fn flags(&self) -> RuleFlags {
        RuleFlags {
            hard_lock_enabled: self.prefs.hard_lock_enabled,
            lock_on_autoadjust: self.prefs.lock_on_autoadjust,
            softlock_enabled: self.prefs.dynamic_softlock_enabled,
            strategy: self.prefs.dynamic_strategy,
        }
    }

    fn quantum(&self) -> f64 {
        self.rules.tuning().volume_quantum
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TICK
    // ═══════════════════════════════════════════════════════════════════════

    /// Executa um tick e retorna o intervalo até o próximo
    pub fn tick(&mut self) -> Duration {
        if let Some(target) = self.lock.target() {
            if (self.volume_pct - target).abs() > LOCK_TOLERANCE {
                self.set_volume(target);
                self.show_volume(target);
            }
            self.apply_to_actuator();
        }

        let now = self.clock.now();
        let dt = clamp_dt(now - self.last_update);
        self.last_update = now;

        if self.tracker.roll_day(self.clock.today()) {
            self.ui.send(UiCommand::notice("New day", "Daily dose reset."));
        }

        let cfg = self.prefs.cfg;
        let level_db = level_from_percent(self.volume_pct, &cfg);

        if self.paused {
            self.ui.send(UiCommand::SetGauge {
                level_db,
                dose: self.tracker.session_dose(),
            });
            self.ui.send(UiCommand::SetStatus(Status::Paused));
            self.apply_to_actuator();
            return if self.lock.is_locked() {
                self.timing.paused_locked_tick
            } else {
                self.timing.paused_tick
            };
        }

        let tick = self.tracker.advance(level_db, self.volume_pct, dt, &cfg);
        if tick.session_limit_reached && self.prefs.hard_lock_enabled {
            self.engage_lock(cfg.min_enforced_volume, LockReason::SessionLimit);
        }

        let input = RuleInput {
            mode: self.prefs.mode,
            cfg: &cfg,
            flags: self.flags(),
            volume_pct: self.volume_pct,
            session_dose: self.tracker.session_dose(),
            ema_remaining_sec: tick.ema_remaining_sec,
            allowed_sec: tick.allowed_sec,
            level_db: self.tracker.last_level_db().unwrap_or(level_db),
            locked: self.lock.is_locked(),
            now,
        };
        let decision = self.rules.evaluate(&mut self.dynamic, &input);
        self.apply_decision(decision);

        for alert in &tick.alerts {
            self.raise_alert(*alert);
        }

        self.push_tick_ui(&tick);
        self.sync_actuator(now);
        self.record_history(now, &tick);
        self.timing.tick
    }

    fn apply_decision(&mut self, decision: RuleDecision) {
        if let Some(volume) = decision.volume {
            self.set_volume(volume);
            self.show_volume(volume);
            self.apply_to_actuator();
        }
        if let Some(status) = decision.status {
            self.ui.send(UiCommand::SetStatus(status));
        }
        if let Some((target, reason)) = decision.lock {
            self.engage_lock(target, reason);
        }
    }

    fn raise_alert(&mut self, alert: ExposureAlert) {
        if alert.is_critical() {
            tracing::warn!(?alert, "{}", alert.message());
        } else {
            tracing::info!(?alert, "{}", alert.message());
        }
        self.ui.send(UiCommand::Alert(alert));
        if alert.requests_lock() && self.prefs.hard_lock_enabled {
            let reason = match alert {
                ExposureAlert::DailyBlock => LockReason::DailyLimit,
                _ => LockReason::SessionLimit,
            };
            self.engage_lock(self.prefs.cfg.min_enforced_volume, reason);
        }
    }

    fn push_tick_ui(&self, tick: &ExposureTick) {
        let zone_tone = Tone::for_zone(tick.zone);
        let daily_pct = self.tracker.daily_percent();
        self.ui.send(UiCommand::SetGauge {
            level_db: tick.level_db,
            dose: self.tracker.session_dose(),
        });
        self.ui.send(UiCommand::SetZoneBadge {
            zone: tick.zone,
            tone: zone_tone,
        });
        self.ui.send(UiCommand::SetTimes {
            allowed_sec: tick.allowed_sec,
            at_level_sec: self.tracker.time_at_current_level(),
        });
        self.ui.send(UiCommand::SetRemaining(Some(tick.ema_remaining_sec)));
        self.ui.send(UiCommand::SetSliderTone(zone_tone));
        self.ui.send(UiCommand::SetVolumeLabel(round_pct_ui(self.volume_pct)));
        self.ui.send(UiCommand::SetDailyDose {
            percent: daily_pct,
            tone: Tone::for_daily_percent(daily_pct),
        });
    }

    fn record_history(&mut self, now: f64, tick: &ExposureTick) {
        if self
            .last_history
            .is_none_or(|t| now - t >= self.timing.history_interval_sec)
        {
            self.last_history = Some(now);
            self.history.push(HistorySample {
                timestamp: self.clock.local_now(),
                session_time_offset: now - self.session_start,
                mode: self.prefs.mode,
                volume_pct: self.volume_pct,
                level_db: tick.level_db,
                session_dose: self.tracker.session_dose(),
                zone: tick.zone,
                daily_dose: self.tracker.daily_dose(),
            });
        }
        if self
            .last_chart
            .is_none_or(|t| now - t >= self.timing.chart_interval_sec)
        {
            self.last_chart = Some(now);
            self.ui.send(UiCommand::DrawChart(self.history.chart_points()));
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // VOLUME E ATUADOR
    // ═══════════════════════════════════════════════════════════════════════

    fn set_volume(&mut self, pct: f64) {
        self.volume_pct = clamp_percent(pct);
        self.target.set(self.lock.permitted(self.volume_pct));
    }

    fn show_volume(&self, pct: f64) {
        self.ui.send(UiCommand::SetSlider(pct));
        self.ui.send(UiCommand::SetVolumeLabel(round_pct_ui(pct)));
    }

    /// Valor escrito no atuador: alvo exato quando travado, senão quantizado
    fn actuator_value(&self) -> f64 {
        match self.lock.target() {
            Some(target) => target,
            None => quantize(self.volume_pct, self.quantum()),
        }
    }

    fn notice_unavailable(&mut self) {
        if self.actuator_warned {
            return;
        }
        self.actuator_warned = true;
        tracing::warn!(backend = self.actuator.name(), "audio actuator unavailable, slider-only control");
        self.ui.send(UiCommand::notice(
            "System volume control",
            "System volume cannot be controlled or locked; only the slider is active.",
        ));
    }

    /// Escreve o volume, relê e adota a leitura se divergir
    fn apply_to_actuator(&mut self) {
        if !self.actuator.available() {
            self.notice_unavailable();
            return;
        }
        let written = self.actuator_value();
        let result = self
            .actuator
            .set_percent(written)
            .and_then(|_| self.actuator.get_percent());
        match result {
            Ok(raw) => {
                let sys = quantize(raw, self.quantum());
                let expected = quantize(written, self.quantum());
                if (sys - expected).abs() > READBACK_TOLERANCE {
                    self.set_volume(sys);
                    self.show_volume(sys);
                }
            }
            Err(ActuatorError::Unavailable) => self.notice_unavailable(),
            Err(e) => tracing::debug!(error = %e, "actuator write failed"),
        }
    }

    /// Sincroniza com mudanças externas do volume do sistema
    fn sync_actuator(&mut self, now: f64) {
        if !self.actuator.available() {
            return;
        }
        if self
            .last_sync
            .is_some_and(|t| now - t < self.timing.sync_interval_sec)
        {
            return;
        }
        self.last_sync = Some(now);

        let raw = match self.actuator.get_percent() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "actuator sync read failed");
                return;
            }
        };
        let mut sys = quantize(raw, self.quantum());

        if self.prefs.dynamic_softlock_enabled {
            if let Some(ceiling) = self.dynamic.ceiling_pct {
                // o atuador só enxerga o teto já quantizado
                if sys > quantize(ceiling, self.quantum()) + READBACK_TOLERANCE {
                    self.set_volume(ceiling);
                    self.show_volume(ceiling);
                    self.apply_to_actuator();
                    sys = ceiling;
                }
            }
        }

        if let Some(target) = self.lock.target() {
            if (raw - target).abs() > READBACK_TOLERANCE {
                self.set_volume(target);
                self.show_volume(target);
                self.apply_to_actuator();
            }
            return;
        }

        if self.dynamic.decay_active && sys > self.volume_pct + 0.01 {
            sys = self.volume_pct;
        }
        if (sys - self.volume_pct).abs() > EXTERNAL_CHANGE_MIN {
            tracing::debug!(from = self.volume_pct, to = sys, "adopting external volume change");
            self.set_volume(sys);
            self.show_volume(sys);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TRAVAMENTO
    // ═══════════════════════════════════════════════════════════════════════

    fn engage_lock(&mut self, target: f64, reason: LockReason) {
        if !self
            .lock
            .engage(target, self.prefs.cfg.min_enforced_volume, reason)
        {
            return;
        }
        let locked_at = self.lock.permitted(target);
        self.set_volume(locked_at);
        self.ui.send(UiCommand::SetControlsEnabled(false));
        self.show_volume(locked_at);
        self.apply_to_actuator();
        self.ui.send(UiCommand::SetStatus(Status::Locked(reason)));

        let target = self.target.clone();
        self.enforcer.start(move || target.get());
        tracing::info!(target = locked_at, %reason, "volume locked");
    }

    fn release_lock(&mut self) {
        if !self.lock.release() {
            return;
        }
        self.enforcer.stop();
        self.target.set(self.volume_pct);
        self.ui.send(UiCommand::SetControlsEnabled(true));
        tracing::info!("volume unlocked");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMANDOS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn handle_command(&mut self, cmd: ControlCommand) -> ControlResult<()> {
        match cmd {
            ControlCommand::SetVolume(pct) => {
                self.on_slider(pct);
                Ok(())
            }
            ControlCommand::SetMode(mode) => self.switch_mode(mode),
            ControlCommand::TogglePause => self.toggle_pause(),
            ControlCommand::ResetSession => {
                self.reset_session();
                Ok(())
            }
            ControlCommand::ApplySettings(update) => self.apply_settings(update),
            ControlCommand::ExportReport { format, path } => {
                match self.export_report(format, &path) {
                    Ok(_) => {
                        self.ui.send(UiCommand::notice(
                            "Report saved",
                            format!("Report exported to {}", path.display()),
                        ));
                        Ok(())
                    }
                    Err(e) => {
                        self.ui.send(UiCommand::notice("Report not saved", e.to_string()));
                        Err(e)
                    }
                }
            }
        }
    }

    /// Mudança de volume vinda do slider
    pub fn on_slider(&mut self, requested: f64) {
        let verdict = self.rules.check_slider(
            requested,
            self.volume_pct,
            self.prefs.mode,
            &self.dynamic,
            self.lock.target(),
            self.tracker.session_dose(),
            &self.prefs.cfg,
            &self.flags(),
        );
        match verdict {
            SliderVerdict::Locked(target) | SliderVerdict::Ceiling(target) => {
                self.set_volume(target);
                self.show_volume(target);
                self.apply_to_actuator();
            }
            SliderVerdict::Rejected(current) => {
                self.show_volume(current);
            }
            SliderVerdict::Capped { volume, lock } => {
                self.set_volume(volume);
                self.show_volume(volume);
                self.apply_to_actuator();
                self.ui.send(UiCommand::SetStatus(Status::AdjustedForSafety));
                if lock {
                    self.engage_lock(volume, LockReason::SafetyAdjustment);
                }
            }
            SliderVerdict::Accepted(volume) => {
                self.set_volume(volume);
                self.ui.send(UiCommand::SetVolumeLabel(round_pct_ui(volume)));
                self.apply_to_actuator();
            }
        }
    }

    /// Troca de modo: zera estado transitório, preserva a dose
    pub fn switch_mode(&mut self, mode: Mode) -> ControlResult<()> {
        if self.lock.is_locked() {
            return Err(ControlError::Locked("mode switch"));
        }
        self.reset_mode_state(mode);
        self.ui.send(UiCommand::SetStatus(Status::Normal));
        tracing::info!(%mode, "mode switched");
        Ok(())
    }

    fn reset_mode_state(&mut self, mode: Mode) {
        self.prefs.mode = mode;
        self.dynamic.reset();
        self.tracker.reset_level_timer();
        self.ui.send(UiCommand::SetMode(mode));
    }

    pub fn toggle_pause(&mut self) -> ControlResult<()> {
        if self.lock.is_locked() {
            return Err(ControlError::Locked("pause"));
        }
        self.paused = !self.paused;
        let status = if self.paused { Status::Paused } else { Status::Normal };
        self.ui.send(UiCommand::SetStatus(status));
        tracing::debug!(paused = self.paused, "pause toggled");
        Ok(())
    }

    /// Reinicia a sessão: dose, alertas, histórico e travamento
    pub fn reset_session(&mut self) {
        let now = self.clock.now();
        self.tracker.reset_session();
        self.history.clear();
        self.session_start = now;
        self.last_update = now;
        self.last_history = None;
        self.last_chart = None;
        self.dynamic.reset();
        self.release_lock();
        self.ui.send(UiCommand::SetStatus(Status::Normal));
        self.ui.send(UiCommand::SetRemaining(None));
        self.ui.send(UiCommand::notice("Session reset", "Dose and history were reset."));
        tracing::info!(daily_dose = self.tracker.daily_dose(), "session reset");
    }

    /// Aplica configurações validadas e as persiste
    pub fn apply_settings(&mut self, update: SettingsUpdate) -> ControlResult<()> {
        let cfg = match update.cfg.validated() {
            Ok(cfg) => cfg,
            Err(e) => {
                self.ui.send(UiCommand::notice("Invalid settings", e.to_string()));
                return Err(e.into());
            }
        };
        self.prefs.cfg = cfg;
        self.prefs.hard_lock_enabled = update.hard_lock_enabled;
        self.prefs.lock_on_autoadjust = update.lock_on_autoadjust;
        self.prefs.dynamic_strategy = update.dynamic_strategy;
        self.prefs.dynamic_softlock_enabled = update.dynamic_softlock_enabled;
        self.reset_mode_state(self.prefs.mode);
        tracing::info!(profile = %cfg.profile_text(), strategy = %update.dynamic_strategy, "settings applied");
        self.save_preferences();
        Ok(())
    }

    /// Exporta o histórico da sessão
    pub fn export_report(&self, format: ReportFormat, path: &Path) -> ControlResult<SummaryStats> {
        let samples = self.history.to_vec();
        let ctx = ReportContext {
            cfg: &self.prefs.cfg,
            generated_at: self.clock.local_now(),
        };
        Ok(export_to_path(format, &samples, &ctx, path)?)
    }

    fn save_preferences(&mut self) {
        self.prefs.volume = self.volume_pct;
        if let Err(e) = self.store.save(&self.prefs) {
            tracing::warn!(error = %e, "failed to save settings");
        }
    }

    /// Para o enforcer e salva as preferências
    pub fn shutdown(&mut self) {
        self.enforcer.stop();
        self.save_preferences();
        tracing::info!("control loop stopped");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // THREAD
    // ═══════════════════════════════════════════════════════════════════════

    /// Roda o loop numa thread própria
    pub fn spawn(mut self) -> ControlResult<MonitorHandle> {
        let (cmd_tx, cmd_rx) = unbounded::<ControlCommand>();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("sem-control-loop".into())
            .spawn(move || {
                'run: loop {
                    loop {
                        match cmd_rx.try_recv() {
                            Ok(cmd) => {
                                if let Err(e) = self.handle_command(cmd) {
                                    tracing::debug!(error = %e, "command rejected");
                                }
                            }
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => break 'run,
                        }
                    }
                    let wait = self.tick();
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                self.shutdown();
                self
            })?;

        Ok(MonitorHandle {
            commands: cmd_tx,
            stop: stop_tx,
            handle,
        })
    }
}

/// Handle do loop rodando em thread
pub struct MonitorHandle {
    commands: Sender<ControlCommand>,
    stop: Sender<()>,
    handle: JoinHandle<ControlLoop>,
}

impl MonitorHandle {
    pub fn send(&self, cmd: ControlCommand) -> ControlResult<()> {
        self.commands.send(cmd).map_err(|_| ControlError::NotRunning)
    }

    pub fn set_volume(&self, pct: f64) -> ControlResult<()> {
        self.send(ControlCommand::SetVolume(pct))
    }

    pub fn set_mode(&self, mode: Mode) -> ControlResult<()> {
        self.send(ControlCommand::SetMode(mode))
    }

    pub fn toggle_pause(&self) -> ControlResult<()> {
        self.send(ControlCommand::TogglePause)
    }

    pub fn reset_session(&self) -> ControlResult<()> {
        self.send(ControlCommand::ResetSession)
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Sinaliza parada, aguarda o encerramento e devolve o loop
    pub fn stop(self) -> ControlResult<ControlLoop> {
        let _ = self.stop.try_send(());
        drop(self.stop);
        self.handle.join().map_err(|_| ControlError::ThreadPanicked)
    }
}
