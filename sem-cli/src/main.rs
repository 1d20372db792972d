//! SEM - Sound Exposure Monitor
//! Headless harness: simulated sessions, dose queries and stored settings

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use colored::*;
use sem_actuator::SimulatedVolume;
use sem_control::{
    ui_channel, ControlLoop, DynamicStrategy, JsonSettingsStore, ManualClock, MemorySettingsStore,
    Preferences, SettingsStore, Status, SystemClock, Tone, UiCommand, UiReceiver,
    UI_PUMP_INTERVAL,
};
use sem_dose::{
    allowed_seconds, fmt_hms, level_from_percent, percent_from_level, prefixed_cap_percent,
    Config, ProfilePreview, ProtectionProfile,
};
use sem_exposure::{Mode, ReportFormat};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sem")]
#[command(author = "Silvano Neto <dev@silvanoneto.com>")]
#[command(version = "2026.1.16")]
#[command(about = "SEM - Sound Exposure Monitor", long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "SEM_SETTINGS", value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a headless session against a simulated system volume
    Run(RunArgs),

    /// Show the allowed daily time at a sound level
    Allowed {
        /// Sound level in dB
        #[arg(value_name = "DB", allow_negative_numbers = true)]
        db: f64,
    },

    /// Show the fixed-cap volume ceiling for a session dose
    Cap {
        /// Session dose as a fraction (0.0 - 1.0)
        #[arg(value_name = "DOSE")]
        dose: f64,
    },

    /// Show or change the stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Session length in seconds
    #[arg(short, long, default_value_t = 60.0, env = "SEM_DURATION")]
    duration: f64,

    /// Starting volume in percent (defaults to the stored volume)
    #[arg(short, long)]
    volume: Option<f64>,

    /// Exposure mode (prefixado | dinamico)
    #[arg(short, long, env = "SEM_MODE")]
    mode: Option<Mode>,

    /// Session dose already accumulated (fraction)
    #[arg(long, default_value_t = 0.0)]
    session_dose: f64,

    /// Daily dose already accumulated (fraction)
    #[arg(long, default_value_t = 0.0)]
    daily_dose: f64,

    /// Follow the wall clock instead of simulated time
    #[arg(long)]
    realtime: bool,

    /// Export the session report to this file
    #[arg(short, long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Report format (csv | jsonl)
    #[arg(long, default_value = "csv")]
    format: ReportFormat,

    /// Keep settings in memory only
    #[arg(long)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the stored settings
    Show,

    /// Change individual settings
    Set(ConfigSet),

    /// Apply a protection profile (niosh | oms | custom)
    Profile {
        #[arg(value_name = "PROFILE")]
        profile: ProtectionProfile,
    },

    /// Restore the default settings
    Reset,
}

#[derive(Args, Default)]
struct ConfigSet {
    /// Level at which the daily base time applies (dB)
    #[arg(long)]
    ref_db: Option<f64>,

    /// dB increase that halves the allowed time
    #[arg(long)]
    exchange_rate: Option<f64>,

    /// Daily allowed time at the reference level (seconds)
    #[arg(long)]
    base_time: Option<f64>,

    /// Level mapped to 0% volume (dB)
    #[arg(long, allow_negative_numbers = true)]
    min_db: Option<f64>,

    /// Level mapped to 100% volume (dB)
    #[arg(long)]
    max_db: Option<f64>,

    /// Volume enforced while locked (percent)
    #[arg(long)]
    min_volume: Option<f64>,

    #[arg(long)]
    mode: Option<Mode>,

    /// Dynamic strategy (reserva | zona_segura)
    #[arg(long)]
    strategy: Option<DynamicStrategy>,

    /// Lock the volume when a dose limit is reached
    #[arg(long)]
    hard_lock: Option<bool>,

    /// Lock after a fixed-cap safety adjustment
    #[arg(long)]
    lock_on_autoadjust: Option<bool>,

    /// Keep the dynamic ceiling between limiting episodes
    #[arg(long)]
    softlock: Option<bool>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sem=info,sem_control=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let store = open_store(cli.settings)?;
    match cli.command {
        Commands::Run(args) => run_command(store, args),
        Commands::Allowed { db } => allowed_command(&store, db),
        Commands::Cap { dose } => cap_command(&store, dose),
        Commands::Config { action } => config_command(&store, action),
    }
}

fn open_store(path: Option<PathBuf>) -> Result<JsonSettingsStore> {
    match path {
        Some(path) => Ok(JsonSettingsStore::new(path)),
        None => JsonSettingsStore::default_location().context("cannot locate the settings directory"),
    }
}

// ============================================================================
// Session
// ============================================================================

fn run_command(store: JsonSettingsStore, args: RunArgs) -> Result<()> {
    if !args.duration.is_finite() || args.duration <= 0.0 {
        bail!("duration must be a positive number of seconds");
    }
    for (name, dose) in [("session dose", args.session_dose), ("daily dose", args.daily_dose)] {
        if !dose.is_finite() || dose < 0.0 {
            bail!("{name} must be a non-negative fraction");
        }
    }

    let mut prefs = store.load();
    if let Some(volume) = args.volume {
        prefs.volume = volume;
    }
    if let Some(mode) = args.mode {
        prefs.mode = mode;
    }

    let store: Box<dyn SettingsStore> = if args.ephemeral {
        Box::new(MemorySettingsStore::with(prefs.clone()))
    } else {
        store.save(&prefs).context("cannot save settings")?;
        Box::new(store)
    };

    println!(
        "{} {} session, {} at {:.0}%, profile {}",
        "Starting".green().bold(),
        prefs.mode.label().cyan(),
        fmt_hms(args.duration),
        prefs.volume,
        prefs.cfg.profile_text().cyan()
    );

    let actuator = Arc::new(SimulatedVolume::new(prefs.volume));
    let (ui_tx, ui_rx) = ui_channel();
    let mut printer = EventPrinter::default();

    let ctl = if args.realtime {
        let mut ctl = ControlLoop::new(actuator, store, Arc::new(SystemClock::new()), ui_tx);
        ctl.tracker_mut().set_doses(args.session_dose, args.daily_dose);
        let handle = ctl.spawn()?;
        let deadline = Instant::now() + Duration::from_secs_f64(args.duration);
        while Instant::now() < deadline && handle.is_running() {
            if let Some(cmd) = ui_rx.recv_timeout(UI_PUMP_INTERVAL) {
                printer.show(cmd);
            }
        }
        let ctl = handle.stop()?;
        printer.pump(&ui_rx);
        ctl
    } else {
        let clock = ManualClock::new(Local::now().naive_local());
        let mut ctl = ControlLoop::new(actuator, store, Arc::new(clock.clone()), ui_tx);
        ctl.tracker_mut().set_doses(args.session_dose, args.daily_dose);
        let mut elapsed = 0.0;
        let mut wait = ctl.timing().tick;
        while elapsed < args.duration {
            let step = wait.as_secs_f64();
            clock.advance(step);
            elapsed += step;
            wait = ctl.tick();
            printer.pump(&ui_rx);
        }
        ctl.shutdown();
        printer.pump(&ui_rx);
        ctl
    };

    print_session(&ctl);

    if let Some(path) = args.report {
        let stats = ctl
            .export_report(args.format, &path)
            .with_context(|| format!("cannot export report to {}", path.display()))?;
        println!();
        println!("{} {}", "Report".green().bold(), path.display().to_string().cyan());
        println!("  {:<16} {}", "points", stats.points);
        println!("  {:<16} {}", "total time", fmt_hms(stats.total_time_sec));
        println!("  {:<16} {:.1} dB", "average level", stats.avg_db);
        println!("  {:<16} {:.1} dB", "peak level", stats.peak_db);
        println!("  {:<16} {:.0}%", "peak volume", stats.peak_volume_pct);
        println!("  {:<16} {:.1}%", "max dose", stats.max_dose * 100.0);
        println!("  {:<16} {}", "time to 50%", fmt_optional(stats.time_to_50_sec));
        println!("  {:<16} {}", "time to 100%", fmt_optional(stats.time_to_100_sec));
    }
    Ok(())
}

fn print_session(ctl: &ControlLoop) {
    let cfg = ctl.config();
    let tracker = ctl.tracker();
    println!();
    println!("{}", "Session".bold());
    println!("  {:<16} {}", "mode", ctl.mode().label());
    println!(
        "  {:<16} {:.0}% ({:.1} dB)",
        "volume",
        ctl.volume_pct(),
        level_from_percent(ctl.volume_pct(), cfg)
    );
    println!("  {:<16} {:.1}%", "session dose", tracker.session_dose() * 100.0);
    println!("  {:<16} {:.1}%", "daily dose", tracker.daily_percent());
    match ctl.lock_state().reason() {
        Some(reason) => println!("  {:<16} {}", "lock", reason.label().red()),
        None => println!("  {:<16} {}", "lock", "none".green()),
    }
    println!("  {:<16} {}", "samples", ctl.history().len());
}

fn fmt_optional(secs: Option<f64>) -> String {
    secs.map(fmt_hms).unwrap_or_else(|| "-".into())
}

/// Imprime a fila de UI como eventos de terminal
#[derive(Default)]
struct EventPrinter {
    last_status: Option<Status>,
}

impl EventPrinter {
    fn pump(&mut self, rx: &UiReceiver) {
        for cmd in rx.drain() {
            self.show(cmd);
        }
    }

    fn show(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::SetStatus(status) if self.last_status != Some(status) => {
                self.last_status = Some(status);
                println!("{}", paint(&status.text(), status.tone()));
            }
            UiCommand::Alert(alert) => {
                let title = if alert.is_critical() {
                    alert.title().red().bold()
                } else {
                    alert.title().yellow().bold()
                };
                println!("{} {}", title, alert.message());
            }
            UiCommand::Notice { title, message } => {
                println!("{} {}", format!("{title}:").cyan().bold(), message);
            }
            UiCommand::SetControlsEnabled(false) => println!("{}", "Controls locked".red()),
            UiCommand::SetControlsEnabled(true) => println!("{}", "Controls unlocked".green()),
            _ => {}
        }
    }
}

fn paint(text: &str, tone: Tone) -> ColoredString {
    match tone {
        Tone::Neutral => text.normal(),
        Tone::Success => text.green(),
        Tone::Warning => text.yellow(),
        Tone::Error => text.red().bold(),
    }
}

// ============================================================================
// Dose queries
// ============================================================================

fn allowed_command(store: &JsonSettingsStore, db: f64) -> Result<()> {
    if !db.is_finite() {
        bail!("level must be a finite number");
    }
    let cfg = store.load().cfg;
    let allowed = allowed_seconds(db, &cfg);
    println!(
        "{:.1} dB {} {} ({})",
        db,
        "allowed".bold(),
        fmt_hms(allowed).cyan(),
        cfg.profile_text()
    );
    Ok(())
}

fn cap_command(store: &JsonSettingsStore, dose: f64) -> Result<()> {
    if !dose.is_finite() || !(0.0..=1.0).contains(&dose) {
        bail!("dose must be a fraction between 0 and 1");
    }
    let cfg = store.load().cfg;
    match prefixed_cap_percent(dose, &cfg) {
        None => println!("{:.1}% dose: {}", dose * 100.0, "no cap needed".green()),
        Some(cap) if cap <= 0.0 => println!("{:.1}% dose: {}", dose * 100.0, "mute".red().bold()),
        Some(cap) => println!(
            "{:.1}% dose: cap {} ({:.1} dB)",
            dose * 100.0,
            format!("{cap:.1}%").yellow().bold(),
            level_from_percent(cap, &cfg)
        ),
    }
    println!(
        "  85 dB is {:.1}% volume",
        percent_from_level(85.0, &cfg)
    );
    Ok(())
}

// ============================================================================
// Settings
// ============================================================================

fn config_command(store: &JsonSettingsStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let prefs = store.load();
            println!("{} {}", "Settings".bold(), store.path().display().to_string().cyan());
            println!("{}", serde_json::to_string_pretty(&prefs)?);
            println!(
                "{} {} ({})",
                "Profile".bold(),
                profile_name(ProtectionProfile::detect(&prefs.cfg)),
                prefs.cfg.profile_text()
            );
        }
        ConfigAction::Set(set) => {
            let prefs = apply_set(store.load(), &set)?;
            store.save(&prefs).context("cannot save settings")?;
            println!("{} {}", "Saved".green().bold(), prefs.cfg.profile_text());
        }
        ConfigAction::Profile { profile } => {
            let mut prefs = store.load();
            prefs.cfg = profile.apply(&prefs.cfg).validated()?;
            store.save(&prefs).context("cannot save settings")?;
            let preview = ProfilePreview::of(&prefs.cfg);
            println!("{} {}", "Profile".green().bold(), profile_name(profile));
            println!("  {}", profile.description());
            println!("  {:<10} {}", "85 dB", fmt_hms(preview.allowed_at_85_sec));
            println!("  {:<10} {}", "90 dB", fmt_hms(preview.allowed_at_90_sec));
        }
        ConfigAction::Reset => {
            store.save(&Preferences::default()).context("cannot save settings")?;
            println!("{} defaults restored", "Reset".green().bold());
        }
    }
    Ok(())
}

/// Aplica as opções de `config set`; a configuração resultante é validada
fn apply_set(mut prefs: Preferences, set: &ConfigSet) -> Result<Preferences> {
    let mut cfg: Config = prefs.cfg;
    if let Some(v) = set.ref_db {
        cfg.ref_db = v;
    }
    if let Some(v) = set.exchange_rate {
        cfg.exchange_rate_db = v;
    }
    if let Some(v) = set.base_time {
        cfg.base_time_sec = v;
    }
    if let Some(v) = set.min_db {
        cfg.min_db = v;
    }
    if let Some(v) = set.max_db {
        cfg.max_db = v;
    }
    if let Some(v) = set.min_volume {
        cfg.min_enforced_volume = v;
    }
    prefs.cfg = cfg.validated()?;

    if let Some(mode) = set.mode {
        prefs.mode = mode;
    }
    if let Some(strategy) = set.strategy {
        prefs.dynamic_strategy = strategy;
    }
    if let Some(v) = set.hard_lock {
        prefs.hard_lock_enabled = v;
    }
    if let Some(v) = set.lock_on_autoadjust {
        prefs.lock_on_autoadjust = v;
    }
    if let Some(v) = set.softlock {
        prefs.dynamic_softlock_enabled = v;
    }
    Ok(prefs)
}

fn profile_name(profile: ProtectionProfile) -> &'static str {
    match profile {
        ProtectionProfile::Niosh => "NIOSH",
        ProtectionProfile::Oms => "OMS",
        ProtectionProfile::Custom => "Custom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "sem", "run", "--duration", "120", "--mode", "dinamico", "--format", "jsonl",
            "--ephemeral",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.duration, 120.0);
                assert_eq!(args.mode, Some(Mode::Dinamico));
                assert_eq!(args.format, ReportFormat::Jsonl);
                assert!(args.ephemeral);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from([
            "sem", "config", "set", "--ref-db", "80", "--strategy", "zona_segura", "--hard-lock",
            "false",
        ])
        .unwrap();
        match cli.command {
            Commands::Config { action: ConfigAction::Set(set) } => {
                assert_eq!(set.ref_db, Some(80.0));
                assert_eq!(set.strategy, Some(DynamicStrategy::ZonaSegura));
                assert_eq!(set.hard_lock, Some(false));
            }
            _ => panic!("expected config set"),
        }
    }

    #[test]
    fn test_apply_set_rejects_invalid_config() {
        let set = ConfigSet {
            exchange_rate: Some(0.0),
            ..Default::default()
        };
        assert!(apply_set(Preferences::default(), &set).is_err());

        let set = ConfigSet {
            ref_db: Some(80.0),
            softlock: Some(false),
            ..Default::default()
        };
        let prefs = apply_set(Preferences::default(), &set).unwrap();
        assert_eq!(prefs.cfg.ref_db, 80.0);
        assert!(!prefs.dynamic_softlock_enabled);
        assert_eq!(ProtectionProfile::detect(&prefs.cfg), ProtectionProfile::Oms);
    }
}
