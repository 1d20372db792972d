//! Histórico da sessão (~1 Hz) e janela do gráfico

use std::collections::VecDeque;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sem_dose::RiskZone;
use crate::types::Mode;

/// Máximo de amostras mantidas (FIFO)
pub const MAX_HISTORY: usize = 50_000;

/// Janela padrão do gráfico (segundos)
pub const DEFAULT_CHART_WINDOW_SEC: f64 = 120.0;

/// Margem extra mantida antes da janela do gráfico
const CHART_MARGIN_SEC: f64 = 2.0;

/// Amostra do histórico
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    /// Hora local da amostra
    pub timestamp: NaiveDateTime,
    /// Segundos desde o início da sessão
    pub session_time_offset: f64,
    pub mode: Mode,
    pub volume_pct: f64,
    pub level_db: f64,
    pub session_dose: f64,
    /// Zona pela dose da sessão
    pub zone: RiskZone,
    pub daily_dose: f64,
}

/// Ponto do gráfico: (t, nível, dose)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub t: f64,
    pub level_db: f64,
    pub dose: f64,
}

/// Log limitado de amostras + pontos da janela do gráfico
#[derive(Debug, Clone)]
pub struct HistoryLog {
    samples: VecDeque<HistorySample>,
    capacity: usize,
    chart: VecDeque<ChartPoint>,
    chart_window_sec: f64,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(MAX_HISTORY, DEFAULT_CHART_WINDOW_SEC)
    }
}

impl HistoryLog {
    pub fn new(capacity: usize, chart_window_sec: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: capacity.max(1),
            chart: VecDeque::new(),
            chart_window_sec,
        }
    }

    /// Anexa amostra, descartando as mais antigas acima da capacidade
    pub fn push(&mut self, sample: HistorySample) {
        let t = sample.session_time_offset;
        self.chart.push_back(ChartPoint {
            t,
            level_db: sample.level_db,
            dose: sample.session_dose,
        });
        let cutoff = t - self.chart_window_sec - CHART_MARGIN_SEC;
        while self.chart.front().is_some_and(|p| p.t < cutoff) {
            self.chart.pop_front();
        }

        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn chart_window_sec(&self) -> f64 {
        self.chart_window_sec
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    pub fn last(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    /// Cópia das amostras (para exportação fora do loop)
    pub fn to_vec(&self) -> Vec<HistorySample> {
        self.samples.iter().cloned().collect()
    }

    /// Pontos da janela do gráfico
    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.chart.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.chart.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(t: f64, level_db: f64, dose: f64) -> HistorySample {
        let base = NaiveDate::from_ymd_opt(2026, 1, 16)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        HistorySample {
            timestamp: base + chrono::Duration::milliseconds((t * 1000.0) as i64),
            session_time_offset: t,
            mode: Mode::Prefixado,
            volume_pct: 50.0,
            level_db,
            session_dose: dose,
            zone: sem_dose::risk_zone_from_dose(dose),
            daily_dose: dose,
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut log = HistoryLog::new(3, 120.0);
        for i in 0..5 {
            log.push(sample(i as f64, 60.0, 0.0));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().next().unwrap().session_time_offset, 2.0);
        assert_eq!(log.last().unwrap().session_time_offset, 4.0);
    }

    #[test]
    fn test_chart_window_prunes() {
        let mut log = HistoryLog::new(1000, 10.0);
        for i in 0..30 {
            log.push(sample(i as f64, 60.0, 0.0));
        }
        let points = log.chart_points();
        // cutoff = 29 - 10 - 2 = 17
        assert_eq!(points.first().unwrap().t, 17.0);
        assert_eq!(points.len(), 13);
        assert_eq!(log.len(), 30);
    }

    #[test]
    fn test_clear() {
        let mut log = HistoryLog::default();
        log.push(sample(0.0, 60.0, 0.0));
        log.clear();
        assert!(log.is_empty());
        assert!(log.chart_points().is_empty());
        assert_eq!(log.capacity(), MAX_HISTORY);
    }
}
