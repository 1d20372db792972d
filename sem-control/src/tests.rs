//! Integration tests for sem-control

use crate::*;
use chrono::{NaiveDate, NaiveDateTime};
use sem_actuator::{AudioActuator, SimulatedVolume};
use sem_dose::{percent_from_level, Config};
use sem_exposure::{ExposureAlert, Mode, ReportError, ReportFormat};
use std::sync::Arc;
use std::time::Duration;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

struct Rig {
    ctl: ControlLoop,
    vol: SimulatedVolume,
    clock: ManualClock,
    ui: UiReceiver,
    store: MemorySettingsStore,
}

impl Rig {
    fn new(prefs: Preferences, system_pct: f64) -> Self {
        Self::with(prefs, SimulatedVolume::new(system_pct), at(2026, 4, 10, 10, 0, 0))
    }

    fn with(prefs: Preferences, vol: SimulatedVolume, start: NaiveDateTime) -> Self {
        let clock = ManualClock::new(start);
        let (tx, rx) = ui_channel();
        let store = MemorySettingsStore::with(prefs);
        let ctl = ControlLoop::new(
            Arc::new(vol.clone()),
            Box::new(store.clone()),
            Arc::new(clock.clone()),
            tx,
        );
        Self { ctl, vol, clock, ui: rx, store }
    }

    fn step(&mut self, dt: f64) -> Duration {
        self.clock.advance(dt);
        self.ctl.tick()
    }

    fn statuses(&self) -> Vec<Status> {
        self.ui
            .drain()
            .into_iter()
            .filter_map(|c| match c {
                UiCommand::SetStatus(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn notices(&self) -> Vec<String> {
        self.ui
            .drain()
            .into_iter()
            .filter_map(|c| match c {
                UiCommand::Notice { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }
}

fn prefs(mode: Mode, volume: f64) -> Preferences {
    Preferences {
        mode,
        volume,
        ..Default::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STARTUP
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_startup_adopts_distant_system_volume() {
    let rig = Rig::new(prefs(Mode::Prefixado, 30.0), 50.0);
    assert_eq!(rig.ctl.volume_pct(), 50.0);

    let rig = Rig::new(prefs(Mode::Prefixado, 30.0), 31.0);
    assert_eq!(rig.ctl.volume_pct(), 30.0);
}

#[test]
fn test_unavailable_actuator_single_notice() {
    let mut rig = Rig::with(
        prefs(Mode::Prefixado, 30.0),
        SimulatedVolume::unavailable(),
        at(2026, 4, 10, 10, 0, 0),
    );
    for _ in 0..5 {
        rig.ctl.on_slider(40.0);
        rig.step(0.2);
    }
    let notices = rig.notices();
    assert_eq!(notices.iter().filter(|t| *t == "System volume control").count(), 1);
    // modo degradado: só o slider
    assert_eq!(rig.ctl.volume_pct(), 40.0);
}

#[test]
fn test_actuator_failures_are_swallowed() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 30.0), 30.0);
    rig.vol.fail_next(1).unwrap();

    assert!(rig.ctl.handle_command(ControlCommand::SetVolume(40.0)).is_ok());
    assert_eq!(rig.vol.get_percent().unwrap(), 30.0);
    rig.step(0.2);

    // a próxima escrita chega ao sistema
    assert!(rig.ctl.handle_command(ControlCommand::SetVolume(44.0)).is_ok());
    assert_eq!(rig.vol.get_percent().unwrap(), 44.0);
    assert_eq!(rig.ctl.volume_pct(), 44.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// LOCK
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_session_limit_locks_at_min_enforced() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 81.8), 81.8);
    rig.ctl.tracker_mut().set_doses(1.0 - 1e-6, 0.2);
    rig.step(1.0);

    assert!(rig.ctl.is_locked());
    assert_eq!(rig.ctl.lock_state().reason(), Some(LockReason::SessionLimit));
    assert_eq!(rig.ctl.lock_state().target(), Some(5.0));
    assert_eq!(rig.ctl.volume_pct(), 5.0);
    assert_eq!(rig.vol.get_percent().unwrap(), 5.0);
    assert!(rig.ctl.enforcer_running());

    let cmds = rig.ui.drain();
    assert!(cmds.contains(&UiCommand::SetControlsEnabled(false)));
    assert!(cmds.contains(&UiCommand::SetStatus(Status::Locked(LockReason::SessionLimit))));
    assert!(cmds.contains(&UiCommand::Alert(ExposureAlert::Session100)));
    rig.ctl.shutdown();
}

#[test]
fn test_lock_is_sticky() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 81.8), 81.8);
    rig.ctl.tracker_mut().set_doses(1.0 - 1e-6, 0.2);
    rig.step(1.0);
    assert!(rig.ctl.is_locked());

    rig.ctl.on_slider(80.0);
    assert_eq!(rig.ctl.volume_pct(), 5.0);

    assert!(matches!(
        rig.ctl.handle_command(ControlCommand::SetMode(Mode::Dinamico)),
        Err(ControlError::Locked(_))
    ));
    assert!(matches!(
        rig.ctl.handle_command(ControlCommand::TogglePause),
        Err(ControlError::Locked(_))
    ));
    assert_eq!(rig.ctl.mode(), Mode::Prefixado);
    assert!(!rig.ctl.is_paused());

    // mudança externa é desfeita no próximo tick
    rig.vol.nudge(70.0).unwrap();
    for _ in 0..10 {
        rig.step(0.2);
        assert_eq!(rig.ctl.volume_pct(), 5.0);
    }
    assert_eq!(rig.vol.get_percent().unwrap(), 5.0);
    assert_eq!(rig.ctl.lock_state().reason(), Some(LockReason::SessionLimit));
    rig.ctl.shutdown();
}

#[test]
fn test_daily_limit_lock() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 50.0), 50.0);
    rig.ctl.tracker_mut().set_doses(0.1, 1.0 - 1e-6);
    rig.step(1.0);
    assert_eq!(rig.ctl.lock_state().reason(), Some(LockReason::DailyLimit));
    assert_eq!(rig.ctl.volume_pct(), 5.0);
    rig.ctl.shutdown();
}

#[test]
fn test_no_lock_without_hard_lock() {
    let p = Preferences {
        hard_lock_enabled: false,
        ..prefs(Mode::Prefixado, 50.0)
    };
    let mut rig = Rig::new(p, 50.0);
    rig.ctl.tracker_mut().set_doses(0.1, 1.0 - 1e-6);
    rig.step(1.0);
    assert!(!rig.ctl.is_locked());
    assert!(!rig.ctl.enforcer_running());
}

#[test]
fn test_reset_session_unlocks() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 81.8), 81.8);
    rig.ctl.tracker_mut().set_doses(1.0 - 1e-6, 0.2);
    rig.step(1.0);
    assert!(rig.ctl.is_locked());
    rig.ui.drain();

    rig.ctl.handle_command(ControlCommand::ResetSession).unwrap();
    assert!(!rig.ctl.is_locked());
    assert!(!rig.ctl.enforcer_running());
    assert_eq!(rig.ctl.tracker().session_dose(), 0.0);
    assert!(rig.ctl.tracker().daily_dose() > 0.2);
    assert!(rig.ctl.history().is_empty());

    let cmds = rig.ui.drain();
    assert!(cmds.contains(&UiCommand::SetControlsEnabled(true)));
    assert!(cmds.contains(&UiCommand::SetRemaining(None)));

    // volume volta a ser livre
    rig.ctl.on_slider(30.0);
    assert_eq!(rig.ctl.volume_pct(), 30.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// PREFIXADO
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_prefixado_cap_snaps_and_locks() {
    let cfg = Config::default();
    let mut rig = Rig::new(prefs(Mode::Prefixado, 90.0), 90.0);
    rig.ctl.tracker_mut().set_doses(0.99, 0.5);
    rig.step(0.2);

    let volume = rig.ctl.volume_pct();
    assert!(volume < percent_from_level(85.0, &cfg));
    assert!(volume > cfg.min_enforced_volume);
    assert_eq!(rig.ctl.lock_state().reason(), Some(LockReason::SafetyAdjustment));

    let statuses = rig.statuses();
    let adjusted = statuses.iter().position(|s| *s == Status::AdjustedForSafety).unwrap();
    let locked = statuses
        .iter()
        .position(|s| *s == Status::Locked(LockReason::SafetyAdjustment))
        .unwrap();
    assert!(adjusted < locked);
    rig.ctl.shutdown();
}

#[test]
fn test_safety_lock_holds_cap_after_session_limit() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 90.0), 90.0);
    rig.ctl.tracker_mut().set_doses(0.99, 0.5);
    rig.step(0.2);
    let cap = rig.ctl.volume_pct();
    assert_eq!(rig.ctl.lock_state().reason(), Some(LockReason::SafetyAdjustment));

    // a trava já existente não é redirecionada para o mínimo imposto
    rig.ctl.tracker_mut().set_doses(1.0 - 1e-6, 0.5);
    for _ in 0..5 {
        rig.step(0.2);
    }
    assert!(rig.ctl.tracker().session_dose() >= 1.0);
    assert_eq!(rig.ctl.lock_state().reason(), Some(LockReason::SafetyAdjustment));
    assert_eq!(rig.ctl.lock_state().target(), Some(cap));
    assert_eq!(rig.ctl.volume_pct(), cap);
    assert!(cap > Config::default().min_enforced_volume);
    rig.ctl.shutdown();
}

#[test]
fn test_prefixado_cap_without_autolock() {
    let p = Preferences {
        lock_on_autoadjust: false,
        ..prefs(Mode::Prefixado, 90.0)
    };
    let mut rig = Rig::new(p, 90.0);
    rig.ctl.tracker_mut().set_doses(0.99, 0.5);
    rig.step(0.2);
    assert!(rig.ctl.volume_pct() < 80.0);
    assert!(!rig.ctl.is_locked());

    // slider acima do teto volta ao teto
    let capped = rig.ctl.volume_pct();
    rig.ctl.on_slider(100.0);
    assert!((rig.ctl.volume_pct() - capped).abs() < 0.5);
    assert!(!rig.ctl.is_locked());
}

// ═══════════════════════════════════════════════════════════════════════════
// DINÂMICO
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_reserva_decays_and_ratchets_ceiling() {
    let mut rig = Rig::new(prefs(Mode::Dinamico, 90.0), 90.0);
    rig.ctl.tracker_mut().set_doses(0.95, 0.5);

    rig.step(0.25);
    assert!(rig.ctl.dynamic_state().limiting_active);
    assert_eq!(rig.ctl.volume_pct(), 88.0);
    assert_eq!(rig.ctl.dynamic_state().ceiling_pct, Some(88.0));

    let mut prev = rig.ctl.volume_pct();
    for _ in 0..5 {
        rig.step(0.25);
        assert!(rig.ctl.volume_pct() <= prev);
        prev = rig.ctl.volume_pct();
    }
    assert_eq!(rig.ctl.volume_pct(), 86.0);
    assert_eq!(rig.ctl.dynamic_state().ceiling_pct, Some(86.0));
    assert!(rig.ctl.dynamic_state().decay_active);
    assert!(rig.statuses().contains(&Status::AutoLimiting));

    // subida recusada durante a redução; descida aceita
    rig.ctl.on_slider(96.0);
    assert_eq!(rig.ctl.volume_pct(), 86.0);
    rig.ctl.on_slider(80.0);
    assert_eq!(rig.ctl.volume_pct(), 80.0);
}

#[test]
fn test_external_increase_pulled_back_while_limiting() {
    let mut rig = Rig::new(prefs(Mode::Dinamico, 90.0), 90.0);
    rig.ctl.tracker_mut().set_doses(0.95, 0.5);
    rig.step(0.25);
    let ceiling = rig.ctl.dynamic_state().ceiling_pct.unwrap();

    rig.vol.nudge(100.0).unwrap();
    rig.step(0.25);
    rig.step(0.25);
    assert!(rig.ctl.volume_pct() <= ceiling);
    assert!(rig.vol.get_percent().unwrap() <= ceiling);
}

#[test]
fn test_zona_segura_limits_until_safe() {
    let p = Preferences {
        dynamic_strategy: DynamicStrategy::ZonaSegura,
        ..prefs(Mode::Dinamico, 70.0)
    };
    let mut rig = Rig::new(p, 70.0);
    // 70% = 78.5 dB: zona de atenção
    rig.step(0.25);
    assert!(rig.ctl.dynamic_state().limiting_active);
    // passo pequeno fora da grade do atuador
    assert_eq!(rig.ctl.volume_pct(), 69.5);
    assert_eq!(rig.vol.get_percent().unwrap(), 70.0);
    assert!(rig.statuses().contains(&Status::AutoLimitingSafeZone));

    for _ in 0..200 {
        rig.step(0.25);
    }
    // abaixo de 70 dB (54.5%) o limitador desliga
    assert!(rig.ctl.volume_pct() <= 56.0);
    assert!(!rig.ctl.dynamic_state().limiting_active);
    assert!(!rig.ctl.dynamic_state().decay_active);
}

#[test]
fn test_mode_switch_resets_transient_state_keeps_dose() {
    let mut rig = Rig::new(prefs(Mode::Dinamico, 90.0), 90.0);
    rig.ctl.tracker_mut().set_doses(0.95, 0.5);
    rig.step(0.25);
    assert!(rig.ctl.dynamic_state().ceiling_pct.is_some());
    let dose = rig.ctl.tracker().session_dose();

    rig.ctl.handle_command(ControlCommand::SetMode(Mode::Prefixado)).unwrap();
    assert_eq!(rig.ctl.mode(), Mode::Prefixado);
    assert_eq!(*rig.ctl.dynamic_state(), DynamicState::default());
    assert_eq!(rig.ctl.tracker().session_dose(), dose);
    assert_eq!(rig.ctl.tracker().time_at_current_level(), 0.0);
}

#[test]
fn test_reserve_target_clamps() {
    let tuning = DynamicTuning::default();
    assert_eq!(tuning.reserve_target(3_600.0), 600.0);
    assert_eq!(tuning.reserve_target(28_800.0 * 8.0), 1_200.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// PAUSE, ROLLOVER, HISTORY
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_pause_freezes_dose() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 60.0), 60.0);
    rig.step(0.2);
    rig.ctl.handle_command(ControlCommand::TogglePause).unwrap();
    let dose = rig.ctl.tracker().session_dose();
    let history = rig.ctl.history().len();

    for _ in 0..10 {
        let wait = rig.step(0.2);
        assert_eq!(wait, rig.ctl.timing().paused_tick);
    }
    assert_eq!(rig.ctl.tracker().session_dose(), dose);
    assert_eq!(rig.ctl.history().len(), history);
    assert!(rig.statuses().contains(&Status::Paused));

    rig.ctl.handle_command(ControlCommand::TogglePause).unwrap();
    rig.step(0.2);
    assert!(rig.ctl.tracker().session_dose() > dose);
}

#[test]
fn test_day_rollover_resets_once() {
    let mut rig = Rig::with(
        prefs(Mode::Prefixado, 30.0),
        SimulatedVolume::new(30.0),
        at(2026, 4, 10, 23, 59, 59),
    );
    rig.ctl.tracker_mut().set_doses(0.4, 0.6);
    rig.step(0.5);
    assert!(rig.ctl.tracker().daily_dose() > 0.6);

    rig.step(1.0);
    assert!(rig.ctl.tracker().daily_dose() < 0.01);
    assert!(rig.ctl.tracker().session_dose() < 0.01);
    assert_eq!(rig.ctl.tracker().state().alerts, sem_exposure::AlertFlags::default());

    rig.step(1.0);
    let new_day = rig.notices().iter().filter(|t| *t == "New day").count();
    assert_eq!(new_day, 1);
}

#[test]
fn test_history_sampled_every_second() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 40.0), 40.0);
    for _ in 0..10 {
        rig.step(0.25);
    }
    let offsets: Vec<f64> = rig
        .ctl
        .history()
        .iter()
        .map(|s| s.session_time_offset)
        .collect();
    assert_eq!(offsets, vec![0.25, 1.25, 2.25]);

    let charts = rig
        .ui
        .drain()
        .into_iter()
        .filter(|c| matches!(c, UiCommand::DrawChart(_)))
        .count();
    assert_eq!(charts, 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// SETTINGS & REPORTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_shutdown_saves_preferences() {
    let mut rig = Rig::new(prefs(Mode::Dinamico, 30.0), 30.0);
    rig.ctl.on_slider(44.0);
    rig.ctl.shutdown();
    let stored = rig.store.stored().unwrap().unwrap();
    assert_eq!(stored.volume, 44.0);
    assert_eq!(stored.mode, Mode::Dinamico);
}

#[test]
fn test_apply_settings_validates() {
    let mut rig = Rig::new(prefs(Mode::Prefixado, 30.0), 30.0);
    let mut update = SettingsUpdate::from(rig.ctl.preferences());

    update.cfg.exchange_rate_db = 0.0;
    assert!(matches!(
        rig.ctl.handle_command(ControlCommand::ApplySettings(update)),
        Err(ControlError::Dose(_))
    ));
    assert_eq!(rig.ctl.config().exchange_rate_db, 3.0);
    assert!(rig.notices().contains(&"Invalid settings".to_string()));

    update.cfg.exchange_rate_db = 3.0;
    update.cfg.ref_db = 80.0;
    update.dynamic_strategy = DynamicStrategy::ZonaSegura;
    rig.ctl.handle_command(ControlCommand::ApplySettings(update)).unwrap();
    assert_eq!(rig.ctl.config().ref_db, 80.0);
    let stored = rig.store.stored().unwrap().unwrap();
    assert_eq!(stored.cfg.ref_db, 80.0);
    assert_eq!(stored.dynamic_strategy, DynamicStrategy::ZonaSegura);
}

#[test]
fn test_export_report_command() {
    let dir = tempfile::tempdir().unwrap();
    let mut rig = Rig::new(prefs(Mode::Prefixado, 40.0), 40.0);
    for _ in 0..10 {
        rig.step(0.5);
    }
    let path = dir.path().join("session.csv");
    rig.ctl
        .handle_command(ControlCommand::ExportReport {
            format: ReportFormat::Csv,
            path: path.clone(),
        })
        .unwrap();
    assert!(path.exists());
    assert!(rig.notices().contains(&"Report saved".to_string()));

    let err = rig
        .ctl
        .export_report(ReportFormat::Xlsx, &dir.path().join("session.xlsx"));
    assert!(matches!(
        err,
        Err(ControlError::Report(ReportError::ExportUnavailable(_)))
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// THREAD
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_spawned_loop_processes_commands_and_stops() {
    let vol = SimulatedVolume::new(30.0);
    let store = MemorySettingsStore::with(prefs(Mode::Prefixado, 30.0));
    let (tx, _rx) = ui_channel();
    let ctl = ControlLoop::new(
        Arc::new(vol.clone()),
        Box::new(store.clone()),
        Arc::new(SystemClock::new()),
        tx,
    );
    let handle = ctl.spawn().unwrap();
    assert!(handle.is_running());
    handle.set_volume(40.0).unwrap();
    std::thread::sleep(Duration::from_millis(400));

    let ctl = handle.stop().unwrap();
    assert_eq!(ctl.volume_pct(), 40.0);
    assert_eq!(vol.get_percent().unwrap(), 40.0);
    assert_eq!(store.stored().unwrap().unwrap().volume, 40.0);
    assert!(!ctl.history().is_empty());
}
