//! Preferências persistidas
//!
//! Um registro JSON por usuário em `<config_dir>/sem-monitor/settings.json`.
//! Arquivo ausente ou corrompido carrega os padrões; campos inválidos são
//! substituídos um a um.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sem_dose::Config;
use sem_exposure::Mode;
use crate::dynamic::DynamicStrategy;
use crate::error::{SettingsError, SettingsResult};

/// Diretório da aplicação dentro do diretório de configuração
pub const APP_DIR_NAME: &str = "sem-monitor";

/// Nome do arquivo de preferências
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Preferências do usuário
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub mode: Mode,
    /// Último volume (%)
    pub volume: f64,
    pub cfg: Config,
    pub hard_lock_enabled: bool,
    pub lock_on_autoadjust: bool,
    pub dynamic_strategy: DynamicStrategy,
    pub dynamic_softlock_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        let cfg = Config::default();
        Self {
            mode: Mode::Prefixado,
            volume: cfg.default_volume,
            cfg,
            hard_lock_enabled: true,
            lock_on_autoadjust: true,
            dynamic_strategy: DynamicStrategy::Reserva,
            dynamic_softlock_enabled: true,
        }
    }
}

impl Preferences {
    /// Lê campo a campo, mantendo o padrão onde o valor falta ou é inválido
    pub fn from_value(value: &Value) -> Self {
        let mut prefs = Preferences::default();

        if let Some(cfg) = value.get("cfg").filter(|v| v.is_object()) {
            prefs.cfg = config_from_value(cfg);
        }

        let flag = |key: &str| value.get(key).and_then(Value::as_bool).unwrap_or(true);
        prefs.hard_lock_enabled = flag("hard_lock_enabled");
        prefs.lock_on_autoadjust = flag("lock_on_autoadjust");
        prefs.dynamic_softlock_enabled = flag("dynamic_softlock_enabled");

        prefs.dynamic_strategy = value
            .get("dynamic_strategy")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        prefs.mode = value
            .get("mode")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        prefs.volume = value
            .get("volume")
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .map(sem_actuator::clamp_percent)
            .unwrap_or(prefs.cfg.default_volume);

        prefs
    }
}

/// Aplica os campos guardados um a um sobre o padrão; um campo que torne a
/// configuração inválida é descartado e os demais permanecem
fn config_from_value(cfg: &Value) -> Config {
    let setters: [(&str, fn(&mut Config, f64)); 7] = [
        ("min_db", |c, v| c.min_db = v),
        ("max_db", |c, v| c.max_db = v),
        ("ref_db", |c, v| c.ref_db = v),
        ("base_time_sec", |c, v| c.base_time_sec = v),
        ("exchange_rate_db", |c, v| c.exchange_rate_db = v),
        ("min_enforced_volume", |c, v| c.min_enforced_volume = v),
        ("default_volume", |c, v| c.default_volume = v),
    ];

    let mut out = Config::default();
    for (key, set) in setters {
        let Some(v) = cfg.get(key).and_then(Value::as_f64) else {
            continue;
        };
        let mut candidate = out;
        set(&mut candidate, v);
        match candidate.validate() {
            Ok(()) => out = candidate,
            Err(e) => tracing::warn!(field = key, error = %e, "stored config field rejected"),
        }
    }
    out
}

/// Armazenamento de preferências
pub trait SettingsStore: Send {
    /// Carrega; nunca falha (padrões em caso de problema)
    fn load(&self) -> Preferences;

    fn save(&self, prefs: &Preferences) -> SettingsResult<()>;
}

/// Preferências em arquivo JSON
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Local padrão por usuário
    pub fn default_location() -> SettingsResult<Self> {
        let base = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(base.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_value(&self) -> SettingsResult<Value> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Preferences {
        if !self.path.exists() {
            return Preferences::default();
        }
        match self.read_value() {
            Ok(value) => Preferences::from_value(&value),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to load settings, using defaults");
                Preferences::default()
            }
        }
    }

    fn save(&self, prefs: &Preferences) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(prefs)?;
        fs::write(&self.path, text)?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// Preferências em memória (testes e modo sem disco)
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<Option<Preferences>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(prefs: Preferences) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(prefs))),
        }
    }

    /// Último registro salvo
    pub fn stored(&self) -> SettingsResult<Option<Preferences>> {
        Ok(self.inner.lock()?.clone())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Preferences {
        self.inner
            .lock()
            .ok()
            .and_then(|g| g.clone())
            .unwrap_or_default()
    }

    fn save(&self, prefs: &Preferences) -> SettingsResult<()> {
        *self.inner.lock()? = Some(prefs.clone());
        Ok(())
    }
}
