//! Tipos de volume compartilhados

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Quantum padrão do volume (pontos percentuais)
pub const DEFAULT_VOLUME_QUANTUM: f64 = 2.0;

/// Limita volume a `[0, 100]`
pub fn clamp_percent(pct: f64) -> f64 {
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0)
}

/// Arredonda para o múltiplo de `quantum` mais próximo, em `[0, 100]`
pub fn quantize(pct: f64, quantum: f64) -> f64 {
    let q = if quantum > 0.0 { quantum } else { 1.0 };
    clamp_percent((pct / q).round() * q)
}

/// Arredonda para baixo até o múltiplo de `quantum`, em `[0, 100]`
pub fn floor_quantize(pct: f64, quantum: f64) -> f64 {
    let q = if quantum > 0.0 { quantum } else { 1.0 };
    // tolerância para valores já no grid (ex.: 27.999999)
    clamp_percent(((pct / q) + 1e-9).floor() * q)
}

/// Alvo de volume compartilhado entre o loop de controle (escrita)
/// e o enforcer (leitura)
#[derive(Debug, Clone, Default)]
pub struct SharedTarget {
    bits: Arc<AtomicU64>,
}

impl SharedTarget {
    pub fn new(pct: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(pct.to_bits())),
        }
    }

    pub fn set(&self, pct: f64) {
        self.bits.store(pct.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
