use anyhow::{bail, Result};
use std::ops::Index;

/// Dirichlet prior concentrations over the mixture components.
///
/// Every entry must be finite and strictly positive so that the expected
/// counts N_k stay in the domain of the digamma function.
#[derive(Debug, Clone, PartialEq)]
pub struct Prior {
    alpha: Vec<f64>,
}

impl Prior {
    pub fn new(alpha: Vec<f64>) -> Result<Self> {
        if alpha.is_empty() {
            bail!("Prior must have at least one concentration parameter");
        }
        for &a in &alpha {
            if !a.is_finite() || a <= 0.0 {
                bail!("Prior concentrations must be finite and strictly positive, got {}", a);
            }
        }
        Ok(Prior { alpha })
    }

    /// A symmetric prior with all K concentrations equal to `value`.
    pub fn symmetric(k: usize, value: f64) -> Result<Self> {
        if k == 0 {
            bail!("Prior must have at least one concentration parameter");
        }
        Self::new(vec![value; k])
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.alpha
    }

    /// Total concentration Σ_k α0_k.
    pub fn sum(&self) -> f64 {
        self.alpha.iter().sum()
    }
}

impl Index<usize> for Prior {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.alpha[index]
    }
}
