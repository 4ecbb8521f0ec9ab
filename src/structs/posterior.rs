use faer::Mat;

use super::weights::Weights;
use crate::routines::math::logsumexp;

/// The log-space posterior responsibilities γ produced by the optimizer.
///
/// Column n is the log-probability of observation n under each component,
/// so after normalization exp(γ[:, n]) sums to one. Entries routinely reach
/// −100 and below for components the observation rules out.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    matrix: Mat<f64>,
}

impl Posterior {
    pub fn matrix(&self) -> &Mat<f64> {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut Mat<f64> {
        &mut self.matrix
    }

    pub fn n_components(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_obs(&self) -> usize {
        self.matrix.ncols()
    }

    /// Mixture proportions implied by the responsibilities.
    ///
    /// Each component's share is its expected observation count
    /// Σ_n exp(γ[k,n] + log_times_observed[n]), normalized over components.
    /// The reduction stays in log space until the final division.
    pub fn weights(&self, log_times_observed: &[f64]) -> Weights {
        let k = self.matrix.nrows();
        let n = self.matrix.ncols();
        let mut row = vec![0.0; n];
        let mut log_abundances = vec![0.0; k];
        for i in 0..k {
            for j in 0..n {
                row[j] = self.matrix.get(i, j) + log_times_observed[j];
            }
            log_abundances[i] = logsumexp(&row);
        }
        let log_total = logsumexp(&log_abundances);
        let abundances = log_abundances
            .iter()
            .map(|la| (la - log_total).exp())
            .collect();
        Weights::from_vec(abundances)
    }
}

impl From<Mat<f64>> for Posterior {
    fn from(matrix: Mat<f64>) -> Self {
        Posterior { matrix }
    }
}
