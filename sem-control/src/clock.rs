//! Relógio do loop de controle

use std::sync::{Arc, Mutex};
use std::time::Instant;
use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime};

/// Fonte de tempo
pub trait Clock: Send + Sync {
    /// Segundos monotônicos (origem arbitrária)
    fn now(&self) -> f64;

    /// Data/hora local (timestamps e chave de dia)
    fn local_now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

/// Relógio real
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug)]
struct ManualInner {
    elapsed: f64,
    start: NaiveDateTime,
}

/// Relógio manual para testes e simulação acelerada. Clones compartilham o tempo.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualInner { elapsed: 0.0, start })),
        }
    }

    /// Avança `seconds`
    pub fn advance(&self, seconds: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.elapsed += seconds.max(0.0);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.inner.lock().map(|i| i.elapsed).unwrap_or(0.0)
    }

    fn local_now(&self) -> NaiveDateTime {
        match self.inner.lock() {
            Ok(inner) => {
                inner.start + ChronoDuration::milliseconds((inner.elapsed * 1000.0).round() as i64)
            }
            Err(_) => NaiveDateTime::MIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_crosses_midnight() {
        let start = NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        let shared = clock.clone();
        assert_eq!(clock.today(), start.date());
        shared.advance(90.0);
        assert_eq!(clock.now(), 90.0);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 5, 2).unwrap());
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
