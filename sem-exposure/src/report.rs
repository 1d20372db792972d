//! Relatório da sessão: estatísticas e exportadores
//!
//! Formatos: CSV e JSONL. Planilha (xlsx) não é gerada por este crate e
//! é recusada com [`ReportError::ExportUnavailable`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sem_dose::{reached, Config};
use crate::error::{ReportError, ReportResult};
use crate::history::HistorySample;
use crate::types::Mode;

// ═══════════════════════════════════════════════════════════════════════════
// ESTATÍSTICAS
// ═══════════════════════════════════════════════════════════════════════════

/// Resumo da sessão
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub points: usize,
    pub total_time_sec: f64,
    /// Média ponderada pelo tempo: `Σ L_i·dt_i / Σ dt_i`
    pub avg_db: f64,
    pub peak_db: f64,
    pub peak_volume_pct: f64,
    pub max_dose: f64,
    /// Tempo de sessão até 50% da dose
    pub time_to_50_sec: Option<f64>,
    /// Tempo de sessão até 100% da dose
    pub time_to_100_sec: Option<f64>,
}

impl SummaryStats {
    /// Calcula o resumo com diferenças progressivas: cada amostra pesa o
    /// intervalo até a próxima e a última não contribui com duração.
    /// Picos, dose máxima e tempos até 50/100% incluem a última amostra.
    pub fn from_history<'a, I>(history: I) -> Self
    where
        I: IntoIterator<Item = &'a HistorySample>,
    {
        let samples: Vec<&HistorySample> = history.into_iter().collect();
        let mut stats = SummaryStats {
            points: samples.len(),
            ..Default::default()
        };
        if samples.is_empty() {
            return stats;
        }

        let mut weighted = 0.0;
        for pair in samples.windows(2) {
            let (cur, next) = (pair[0], pair[1]);
            let dt = (next.session_time_offset - cur.session_time_offset).max(0.0);
            stats.total_time_sec += dt;
            weighted += cur.level_db * dt;
        }

        let mut peak_db = f64::NEG_INFINITY;
        let mut peak_vol = f64::NEG_INFINITY;
        for s in &samples {
            peak_db = peak_db.max(s.level_db);
            peak_vol = peak_vol.max(s.volume_pct);
            stats.max_dose = stats.max_dose.max(s.session_dose);
            if stats.time_to_50_sec.is_none() && reached(s.session_dose, 0.5) {
                stats.time_to_50_sec = Some(s.session_time_offset);
            }
            if stats.time_to_100_sec.is_none() && reached(s.session_dose, 1.0) {
                stats.time_to_100_sec = Some(s.session_time_offset);
            }
        }
        stats.peak_db = peak_db;
        stats.peak_volume_pct = peak_vol;
        stats.avg_db = if stats.total_time_sec > 0.0 {
            weighted / stats.total_time_sec
        } else {
            0.0
        };
        stats
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FORMATOS
// ═══════════════════════════════════════════════════════════════════════════

/// Formato do relatório
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Jsonl,
    Xlsx,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Jsonl => "jsonl",
            ReportFormat::Xlsx => "xlsx",
        }
    }

    /// Nome de arquivo padrão (`sound_report_YYYYmmdd_HHMMSS.ext`)
    pub fn default_file_name(&self, now: NaiveDateTime) -> String {
        format!("sound_report_{}.{}", now.format("%Y%m%d_%H%M%S"), self.extension())
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "jsonl" | "ndjson" => Ok(ReportFormat::Jsonl),
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Contexto do relatório
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub cfg: &'a Config,
    pub generated_at: NaiveDateTime,
}

/// Exportador de relatório
pub trait ReportExporter {
    fn format(&self) -> ReportFormat;

    /// Exportador utilizável neste build?
    fn available(&self) -> bool {
        true
    }

    /// Escreve tabela de amostras + resumo
    fn write_report(
        &self,
        history: &[HistorySample],
        ctx: &ReportContext<'_>,
        out: &mut dyn Write,
    ) -> ReportResult<()>;
}

/// Exportador para o formato pedido
pub fn exporter_for(format: ReportFormat) -> ReportResult<Box<dyn ReportExporter>> {
    match format {
        ReportFormat::Csv => Ok(Box::new(CsvExporter)),
        ReportFormat::Jsonl => Ok(Box::new(JsonlExporter)),
        ReportFormat::Xlsx => Err(ReportError::ExportUnavailable(format.to_string())),
    }
}

/// Exporta para arquivo, recusando formatos indisponíveis antes de criar o arquivo
pub fn export_to_path(
    format: ReportFormat,
    history: &[HistorySample],
    ctx: &ReportContext<'_>,
    path: &Path,
) -> ReportResult<SummaryStats> {
    let exporter = exporter_for(format)?;
    if !exporter.available() {
        return Err(ReportError::ExportUnavailable(format.to_string()));
    }
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    exporter.write_report(history, ctx, &mut out)?;
    out.flush()?;
    tracing::info!(path = %path.display(), points = history.len(), %format, "report exported");
    Ok(SummaryStats::from_history(history))
}

/// Texto do perfil diário (`85 dB / 8h (3 dB)`)
fn profile_line(cfg: &Config) -> String {
    cfg.profile_text()
}

// ═══════════════════════════════════════════════════════════════════════════
// CSV
// ═══════════════════════════════════════════════════════════════════════════

/// Colunas da tabela
pub const REPORT_COLUMNS: [&str; 8] = [
    "timestamp_iso",
    "t_session_s",
    "mode",
    "volume_pct",
    "level_db",
    "dose",
    "zone",
    "daily_dose",
];

/// Linha da tabela CSV (uma por amostra)
#[derive(Debug, Serialize)]
struct CsvRow {
    timestamp_iso: String,
    t_session_s: String,
    mode: Mode,
    volume_pct: i64,
    level_db: String,
    dose: String,
    zone: &'static str,
    daily_dose: String,
}

impl From<&HistorySample> for CsvRow {
    fn from(s: &HistorySample) -> Self {
        Self {
            timestamp_iso: s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            t_session_s: format!("{:.1}", s.session_time_offset),
            mode: s.mode,
            volume_pct: s.volume_pct.round() as i64,
            level_db: format!("{:.2}", s.level_db),
            dose: format!("{:.4}", s.session_dose),
            zone: s.zone.label(),
            daily_dose: format!("{:.4}", s.daily_dose),
        }
    }
}

/// Exportador CSV: tabela de amostras, linha em branco, `metric,value`
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl ReportExporter for CsvExporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }

    fn write_report(
        &self,
        history: &[HistorySample],
        ctx: &ReportContext<'_>,
        out: &mut dyn Write,
    ) -> ReportResult<()> {
        let mut table = csv_writer(&mut *out);
        table.write_record(REPORT_COLUMNS)?;
        for s in history {
            table.serialize(CsvRow::from(s))?;
        }
        table.flush()?;
        drop(table);

        writeln!(out)?;
        let mut summary = csv_writer(&mut *out);
        summary.write_record(["metric", "value"])?;
        write_metric(
            &mut summary,
            "generated_at",
            ctx.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        )?;
        write_metric(&mut summary, "daily_profile", profile_line(ctx.cfg))?;
        if history.is_empty() {
            write_metric(&mut summary, "note", "no data in session")?;
        } else {
            let stats = SummaryStats::from_history(history);
            write_metric(&mut summary, "points", stats.points.to_string())?;
            write_metric(&mut summary, "total_time", sem_dose::fmt_hms(stats.total_time_sec))?;
            write_metric(&mut summary, "avg_db", format!("{:.2}", stats.avg_db))?;
            write_metric(&mut summary, "peak_db", format!("{:.2}", stats.peak_db))?;
            write_metric(&mut summary, "peak_volume_pct", format!("{:.0}", stats.peak_volume_pct))?;
            write_metric(&mut summary, "max_dose", format!("{:.2}%", stats.max_dose * 100.0))?;
            write_metric(&mut summary, "time_to_50", fmt_optional(stats.time_to_50_sec))?;
            write_metric(&mut summary, "time_to_100", fmt_optional(stats.time_to_100_sec))?;
        }
        summary.flush()?;
        Ok(())
    }
}

/// Writer CSV sem cabeçalho automático (as colunas são escritas à parte)
fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

fn write_metric<W: Write>(
    w: &mut csv::Writer<W>,
    name: &str,
    value: impl AsRef<str>,
) -> ReportResult<()> {
    w.write_record([name, value.as_ref()])?;
    Ok(())
}

fn fmt_optional(seconds: Option<f64>) -> String {
    seconds.map(sem_dose::fmt_hms).unwrap_or_else(|| "-".to_string())
}

// ═══════════════════════════════════════════════════════════════════════════
// JSONL
// ═══════════════════════════════════════════════════════════════════════════

/// Registro JSONL do relatório
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReportRecord {
    /// Cabeçalho
    Meta {
        generated_at: NaiveDateTime,
        profile: String,
        config: Config,
        points: usize,
    },
    /// Amostra do histórico
    Sample(HistorySample),
    /// Resumo final
    Summary(SummaryStats),
}

/// Exportador JSONL: `meta`, uma linha `sample` por amostra, `summary`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlExporter;

impl ReportExporter for JsonlExporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Jsonl
    }

    fn write_report(
        &self,
        history: &[HistorySample],
        ctx: &ReportContext<'_>,
        out: &mut dyn Write,
    ) -> ReportResult<()> {
        let meta = ReportRecord::Meta {
            generated_at: ctx.generated_at,
            profile: profile_line(ctx.cfg),
            config: *ctx.cfg,
            points: history.len(),
        };
        write_record(out, &meta)?;
        for s in history {
            write_record(out, &ReportRecord::Sample(s.clone()))?;
        }
        write_record(out, &ReportRecord::Summary(SummaryStats::from_history(history)))?;
        Ok(())
    }
}

fn write_record(out: &mut dyn Write, record: &ReportRecord) -> ReportResult<()> {
    let line = serde_json::to_string(record)?;
    writeln!(out, "{}", line)?;
    Ok(())
}
