//! # 📈 sem-exposure — Rastreamento de Exposição
//!
//! Dose de sessão e diária, timer de nível, EMA do tempo restante,
//! alertas, virada de dia, histórico da sessão e relatórios.
//!
//! ## Ciclo
//!
//! ```text
//!            ┌──────────────────────────────────────┐
//!  tick ───▶ │ ExposureTracker::advance(L, vol, dt) │ ──▶ ExposureTick
//!            └──────────────────┬───────────────────┘      (alertas, EMA,
//!                               │ ~1 Hz                      limite)
//!                               ▼
//!                      ┌─────────────────┐     ┌───────────────────┐
//!                      │   HistoryLog    │ ──▶ │  ReportExporter   │
//!                      │ (FIFO, 50 000)  │     │  CSV · JSONL      │
//!                      └─────────────────┘     └───────────────────┘
//! ```
//!
//! ## Exemplo
//!
//! ```rust
//! use sem_dose::Config;
//! use sem_exposure::ExposureTracker;
//!
//! let cfg = Config::default();
//! let mut tracker = ExposureTracker::new();
//! let tick = tracker.advance(85.0, 81.8, 1.0, &cfg);
//! assert!(tick.increment > 0.0);
//! ```

pub mod error;
pub mod history;
pub mod report;
pub mod tracker;
pub mod types;

pub use error::{ExposureError, ExposureResult, ReportError, ReportResult};
pub use history::{ChartPoint, HistoryLog, HistorySample, DEFAULT_CHART_WINDOW_SEC, MAX_HISTORY};
pub use report::{
    export_to_path, exporter_for, CsvExporter, JsonlExporter, ReportContext, ReportExporter,
    ReportFormat, ReportRecord, SummaryStats, REPORT_COLUMNS,
};
pub use tracker::{
    AlertFlags, ExposureAlert, ExposureState, ExposureTick, ExposureTracker, TrackerTuning,
    DAILY_WARNING_DOSE, EMA_ALPHA, MAX_DAILY_DOSE, TIMER_EPSILON_DB,
};
pub use types::Mode;
