//! Formatação para exibição

/// Formata segundos como `HH:MM:SS` (valores negativos viram zero)
pub fn fmt_hms(seconds: f64) -> String {
    let s = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    let h = s / 3600;
    let m = (s % 3600) / 60;
    let sec = s % 60;
    format!("{:02}:{:02}:{:02}", h, m, sec)
}

/// Volume arredondado para exibição (inteiro mais próximo)
pub fn round_pct_ui(pct: f64) -> i64 {
    pct.round() as i64
}
