//! Rastreador de exposição
//!
//! Integra a taxa de dose a cada tick, mantém o timer de nível, a média
//! móvel exponencial do tempo restante e os alertas de sessão/diários.
//!
//! ```text
//! tick(L, vol, dt) ─▶ timer de nível ─▶ dose += taxa(L)·dt ─▶ restante ─▶ EMA ─▶ alertas
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sem_dose::{
    allowed_seconds, clamp_dt, dose_rate_per_second, reached, risk_zone_from_dose, round_pct_ui,
    Config, RiskZone,
};

/// Peso da observação nova na EMA do tempo restante
pub const EMA_ALPHA: f64 = 0.25;

/// Mudança de nível (dB) que reinicia o timer "tempo neste volume"
pub const TIMER_EPSILON_DB: f64 = 1.0;

/// Teto da dose diária (1000%)
pub const MAX_DAILY_DOSE: f64 = 10.0;

/// Dose diária que dispara o aviso (80%)
pub const DAILY_WARNING_DOSE: f64 = 0.8;

/// Parâmetros do rastreador
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerTuning {
    pub ema_alpha: f64,
    pub timer_epsilon_db: f64,
}

impl Default for TrackerTuning {
    fn default() -> Self {
        Self {
            ema_alpha: EMA_ALPHA,
            timer_epsilon_db: TIMER_EPSILON_DB,
        }
    }
}

/// Alertas de exposição (cada um dispara no máximo uma vez)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureAlert {
    /// Sessão atingiu 50%
    Session50,
    /// Sessão atingiu 100%
    Session100,
    /// Dose diária entre 80% e 100%
    DailyWarning,
    /// Dose diária atingiu 100%
    DailyBlock,
}

impl ExposureAlert {
    pub fn title(&self) -> &'static str {
        match self {
            ExposureAlert::Session50 => "Attention",
            ExposureAlert::Session100 => "Critical risk",
            ExposureAlert::DailyWarning => "Daily attention",
            ExposureAlert::DailyBlock => "Daily block",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ExposureAlert::Session50 => "You reached 50% of the daily dose.",
            ExposureAlert::Session100 => "Daily dose limit exceeded!",
            ExposureAlert::DailyWarning => "Daily dose at or above 80%.",
            ExposureAlert::DailyBlock => "Daily dose reached 100%. Minimum volume enforced.",
        }
    }

    /// Alerta que pede travamento (com hard-lock ligado)
    pub fn requests_lock(&self) -> bool {
        matches!(self, ExposureAlert::Session100 | ExposureAlert::DailyBlock)
    }

    /// Alerta de erro (vs. aviso)
    pub fn is_critical(&self) -> bool {
        self.requests_lock()
    }
}

/// Flags de alertas já disparados
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFlags {
    pub session_50: bool,
    pub session_100: bool,
    pub daily_warning: bool,
    pub daily_block: bool,
}

/// Estado de exposição (sessão + dia)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureState {
    /// Dose da sessão em `[0, 1]`
    pub session_dose: f64,
    /// Dose diária em `[0, 10]`
    pub daily_dose: f64,
    /// Segundos desde a última mudança de nível
    pub time_at_current_level: f64,
    pub alerts: AlertFlags,
    /// Dia de calendário em cache
    pub day: Option<NaiveDate>,
    /// EMA do tempo restante (None até a primeira observação)
    pub ema_remaining_sec: Option<f64>,
    last_level_db: Option<f64>,
    last_volume_key: Option<i64>,
}

/// Resultado de um tick
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureTick {
    pub level_db: f64,
    pub increment: f64,
    pub allowed_sec: f64,
    pub remaining_sec: f64,
    pub ema_remaining_sec: f64,
    /// Zona pela dose da sessão
    pub zone: RiskZone,
    /// Sessão em 100% neste tick (gatilho de travamento)
    pub session_limit_reached: bool,
    /// Alertas disparados neste tick, na ordem: diários, depois sessão
    pub alerts: Vec<ExposureAlert>,
}

/// Rastreador de exposição (escritor único: o loop de controle)
#[derive(Debug, Clone, Default)]
pub struct ExposureTracker {
    state: ExposureState,
    tuning: TrackerTuning,
}

impl ExposureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tuning(tuning: TrackerTuning) -> Self {
        Self {
            state: ExposureState::default(),
            tuning,
        }
    }

    /// Rastreador com o dia já em cache (sem rollover no primeiro tick)
    pub fn starting_on(day: NaiveDate) -> Self {
        let mut tracker = Self::new();
        tracker.state.day = Some(day);
        tracker
    }

    pub fn state(&self) -> &ExposureState {
        &self.state
    }

    pub fn tuning(&self) -> &TrackerTuning {
        &self.tuning
    }

    pub fn session_dose(&self) -> f64 {
        self.state.session_dose
    }

    pub fn daily_dose(&self) -> f64 {
        self.state.daily_dose
    }

    pub fn time_at_current_level(&self) -> f64 {
        self.state.time_at_current_level
    }

    pub fn ema_remaining_sec(&self) -> Option<f64> {
        self.state.ema_remaining_sec
    }

    /// Último nível observado pelo timer
    pub fn last_level_db(&self) -> Option<f64> {
        self.state.last_level_db
    }

    /// Sessão esgotada?
    pub fn session_exhausted(&self) -> bool {
        reached(self.state.session_dose, 1.0)
    }

    /// Dose diária em porcentagem
    pub fn daily_percent(&self) -> f64 {
        self.state.daily_dose * 100.0
    }

    /// Define doses diretamente (restauração e cenários)
    pub fn set_doses(&mut self, session: f64, daily: f64) {
        self.state.session_dose = session.clamp(0.0, 1.0);
        self.state.daily_dose = daily.clamp(0.0, MAX_DAILY_DOSE);
    }

    /// Avança um tick
    pub fn advance(&mut self, level_db: f64, volume_pct: f64, dt: f64, cfg: &Config) -> ExposureTick {
        let dt = clamp_dt(dt);
        self.observe_level(level_db, volume_pct);

        let increment = dose_rate_per_second(level_db, cfg) * dt;
        let st = &mut self.state;
        st.session_dose = (st.session_dose + increment).min(1.0);
        st.daily_dose = (st.daily_dose + increment).min(MAX_DAILY_DOSE);

        let session_limit_reached = reached(st.session_dose, 1.0);
        if session_limit_reached {
            st.session_dose = 1.0;
            st.time_at_current_level = 0.0;
        } else {
            st.time_at_current_level += dt;
        }

        let allowed_sec = allowed_seconds(level_db, cfg);
        let remaining_sec = if session_limit_reached {
            0.0
        } else {
            (1.0 - st.session_dose) * allowed_sec
        };
        let ema = match st.ema_remaining_sec {
            None => remaining_sec,
            Some(prev) => self.tuning.ema_alpha * remaining_sec + (1.0 - self.tuning.ema_alpha) * prev,
        };
        st.ema_remaining_sec = Some(ema);

        let alerts = self.collect_alerts();

        ExposureTick {
            level_db,
            increment,
            allowed_sec,
            remaining_sec,
            ema_remaining_sec: ema,
            zone: risk_zone_from_dose(self.state.session_dose),
            session_limit_reached,
            alerts,
        }
    }

    fn observe_level(&mut self, level_db: f64, volume_pct: f64) {
        let key = round_pct_ui(volume_pct);
        let st = &mut self.state;
        match st.last_level_db {
            None => {
                st.last_level_db = Some(level_db);
                st.last_volume_key = Some(key);
            }
            Some(last) => {
                let changed_db = (level_db - last).abs() >= self.tuning.timer_epsilon_db;
                let changed_pct = st.last_volume_key != Some(key);
                if changed_db || changed_pct {
                    st.last_level_db = Some(level_db);
                    st.last_volume_key = Some(key);
                    st.time_at_current_level = 0.0;
                }
            }
        }
    }

    fn collect_alerts(&mut self) -> Vec<ExposureAlert> {
        let st = &mut self.state;
        let mut fired = Vec::new();

        let daily_full = reached(st.daily_dose, 1.0);
        if !st.alerts.daily_warning && reached(st.daily_dose, DAILY_WARNING_DOSE) && !daily_full {
            st.alerts.daily_warning = true;
            fired.push(ExposureAlert::DailyWarning);
        }
        if !st.alerts.daily_block && daily_full {
            st.alerts.daily_block = true;
            fired.push(ExposureAlert::DailyBlock);
        }
        if !st.alerts.session_50 && reached(st.session_dose, 0.5) {
            st.alerts.session_50 = true;
            fired.push(ExposureAlert::Session50);
        }
        if !st.alerts.session_100 && reached(st.session_dose, 1.0) {
            st.alerts.session_100 = true;
            fired.push(ExposureAlert::Session100);
        }
        fired
    }

    /// Virada de dia. Retorna `true` uma única vez por transição.
    ///
    /// Zera dose diária, dose de sessão e todos os alertas. A primeira
    /// chamada apenas grava o dia.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        let st = &mut self.state;
        match st.day {
            Some(day) if day == today => false,
            None => {
                st.day = Some(today);
                false
            }
            Some(_) => {
                st.day = Some(today);
                st.daily_dose = 0.0;
                st.session_dose = 0.0;
                st.alerts = AlertFlags::default();
                tracing::info!(day = %today, "day rollover: daily dose reset");
                true
            }
        }
    }

    /// Reinicia a sessão. A dose diária é preservada.
    pub fn reset_session(&mut self) {
        let st = &mut self.state;
        st.session_dose = 0.0;
        st.alerts.session_50 = false;
        st.alerts.session_100 = false;
        st.ema_remaining_sec = None;
        self.reset_level_timer();
    }

    /// Zera o timer de nível (troca de modo e reset)
    pub fn reset_level_timer(&mut self) {
        let st = &mut self.state;
        st.time_at_current_level = 0.0;
        st.last_level_db = None;
        st.last_volume_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_zero_dt_no_increment() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        let tick = t.advance(85.0, 81.8, 0.0, &cfg);
        assert_eq!(tick.increment, 0.0);
        assert_eq!(t.session_dose(), 0.0);
    }

    #[test]
    fn test_dt_clamped_to_one_second() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        let tick = t.advance(85.0, 81.8, 30.0, &cfg);
        assert!((tick.increment - 1.0 / 28_800.0).abs() < 1e-15);
    }

    #[test]
    fn test_ema_seeded_then_smoothed() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        let first = t.advance(85.0, 81.8, 1.0, &cfg);
        assert_eq!(first.ema_remaining_sec, first.remaining_sec);

        // nível alto: restante cai, EMA fica entre os dois
        let second = t.advance(95.0, 100.0, 1.0, &cfg);
        assert!(second.ema_remaining_sec < first.ema_remaining_sec);
        assert!(second.ema_remaining_sec > second.remaining_sec);
        let expected = 0.25 * second.remaining_sec + 0.75 * first.ema_remaining_sec;
        assert!((second.ema_remaining_sec - expected).abs() < 1e-9);
    }

    #[test]
    fn test_level_timer() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        t.advance(70.0, 54.0, 1.0, &cfg);
        t.advance(70.0, 54.0, 1.0, &cfg);
        assert_eq!(t.time_at_current_level(), 2.0);

        // mudança de 0.5 dB com mesmo % arredondado: timer continua
        t.advance(70.5, 54.2, 1.0, &cfg);
        assert_eq!(t.time_at_current_level(), 3.0);

        // mudança >= 1 dB: timer reinicia
        t.advance(72.0, 58.0, 1.0, &cfg);
        assert_eq!(t.time_at_current_level(), 1.0);
    }

    #[test]
    fn test_alerts_fire_once() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        t.set_doses(0.49999, 0.0);
        let tick = t.advance(85.0, 81.8, 1.0, &cfg);
        assert!(tick.alerts.contains(&ExposureAlert::Session50));
        let tick = t.advance(85.0, 81.8, 1.0, &cfg);
        assert!(tick.alerts.is_empty());
    }

    #[test]
    fn test_daily_warning_between_80_and_100() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        t.set_doses(0.0, 0.85);
        let tick = t.advance(40.0, 0.0, 1.0, &cfg);
        assert_eq!(tick.alerts, vec![ExposureAlert::DailyWarning]);

        let mut t = ExposureTracker::new();
        t.set_doses(0.0, 1.2);
        let tick = t.advance(40.0, 0.0, 1.0, &cfg);
        assert_eq!(tick.alerts, vec![ExposureAlert::DailyBlock]);
        assert!(tick.alerts[0].requests_lock());
    }

    #[test]
    fn test_session_limit_snaps_and_zeroes_timer() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        t.set_doses(1.0 - 1e-12, 0.0);
        let tick = t.advance(85.0, 81.8, 0.0, &cfg);
        assert!(tick.session_limit_reached);
        assert_eq!(t.session_dose(), 1.0);
        assert_eq!(tick.remaining_sec, 0.0);
        assert_eq!(t.time_at_current_level(), 0.0);
    }

    #[test]
    fn test_roll_day_first_call_seeds() {
        let mut t = ExposureTracker::new();
        t.set_doses(0.3, 0.3);
        assert!(!t.roll_day(day(2026, 3, 1)));
        assert_eq!(t.session_dose(), 0.3);
    }

    #[test]
    fn test_reset_session_keeps_daily() {
        let cfg = Config::default();
        let mut t = ExposureTracker::new();
        t.set_doses(0.7, 0.9);
        t.advance(85.0, 81.8, 1.0, &cfg);
        t.reset_session();
        assert_eq!(t.session_dose(), 0.0);
        assert!(t.daily_dose() > 0.9);
        assert_eq!(t.ema_remaining_sec(), None);
        assert!(!t.state().alerts.session_50);
        assert!(t.state().alerts.daily_warning);
    }
}
