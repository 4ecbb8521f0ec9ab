//! Numerical kernels for the RCG iteration.
//!
//! All kernels operate on K×N log-space matrices with one column per
//! observation. Shapes are validated once by the drivers; the kernels
//! themselves only debug-assert agreement.

use faer::Mat;

use crate::routines::math::{digamma, ln_gamma, KahanSum};

/// In-place column-wise log-sum-exp normalization.
///
/// After the call every column of `gamma` is a valid log-probability
/// vector: logsumexp over the rows of each column is zero.
pub fn logsumexp(gamma: &mut Mat<f64>) {
    let mut discard = vec![0.0; gamma.ncols()];
    logsumexp_with_max(gamma, &mut discard);
}

/// Column-wise log-sum-exp normalization that also returns the per-column
/// maximum used for stabilization.
///
/// The maxima are needed by [`revert_step`] to undo the normalization when
/// the bound regresses. Subtracting the column max before exponentiating is
/// mandatory: the entries commonly reach −100 and below.
pub fn logsumexp_with_max(gamma: &mut Mat<f64>, oldm: &mut [f64]) {
    let k = gamma.nrows();
    let n = gamma.ncols();
    debug_assert_eq!(oldm.len(), n);
    for j in 0..n {
        let mut m = f64::NEG_INFINITY;
        for i in 0..k {
            m = m.max(*gamma.get(i, j));
        }
        let mut sum = 0.0;
        for i in 0..k {
            sum += (gamma.get(i, j) - m).exp();
        }
        let total = m + sum.ln();
        for i in 0..k {
            *gamma.get_mut(i, j) -= total;
        }
        oldm[j] = m;
    }
}

/// Undo the last normalization by adding the stored column maxima back.
pub fn revert_step(gamma: &mut Mat<f64>, oldm: &[f64]) {
    let k = gamma.nrows();
    let n = gamma.ncols();
    debug_assert_eq!(oldm.len(), n);
    for j in 0..n {
        for i in 0..k {
            *gamma.get_mut(i, j) += oldm[j];
        }
    }
}

/// Negative natural gradient of the bound on the product-of-simplices
/// manifold, written into `step`. Returns the squared gradient norm under
/// the Fisher metric diag(exp(γ)).
///
/// The Euclidean gradient ψ(N_k) + logl − γ is projected onto the tangent
/// space of each column's simplex by subtracting the responsibility-weighted
/// column mean.
pub fn mixt_negnatgrad(
    gamma: &Mat<f64>,
    n_k: &[f64],
    logl: &Mat<f64>,
    step: &mut Mat<f64>,
) -> f64 {
    let k = gamma.nrows();
    let n = gamma.ncols();
    debug_assert_eq!(n_k.len(), k);
    debug_assert_eq!((logl.nrows(), logl.ncols()), (k, n));
    for i in 0..k {
        let psi_nk = digamma(n_k[i]);
        for j in 0..n {
            *step.get_mut(i, j) = psi_nk + logl.get(i, j) - gamma.get(i, j);
        }
    }
    for j in 0..n {
        let mut colmean = 0.0;
        for i in 0..k {
            colmean += gamma.get(i, j).exp() * step.get(i, j);
        }
        for i in 0..k {
            *step.get_mut(i, j) -= colmean;
        }
    }
    let mut norm = 0.0;
    for i in 0..k {
        for j in 0..n {
            norm += gamma.get(i, j).exp() * step.get(i, j) * step.get(i, j);
        }
    }
    norm
}

/// out[k] = Σ_n exp(m[k,n] + v[n]).
///
/// The inputs are bounded (γ ≤ 0 after normalization and the log-counts are
/// finite), so the accumulation runs directly without rescaling.
pub fn exp_right_multiply(m: &Mat<f64>, v: &[f64], out: &mut [f64]) {
    let k = m.nrows();
    let n = m.ncols();
    debug_assert_eq!(v.len(), n);
    debug_assert_eq!(out.len(), k);
    for i in 0..k {
        out[i] = 0.0;
        for j in 0..n {
            out[i] += (m.get(i, j) + v[j]).exp();
        }
    }
}

/// N_k[k] += α0_k.
pub fn add_alpha0_to_nk(alpha0: &[f64], n_k: &mut [f64]) {
    debug_assert_eq!(alpha0.len(), n_k.len());
    for (nk, a) in n_k.iter_mut().zip(alpha0.iter()) {
        *nk += a;
    }
}

/// Expected count of each component: Σ_n exp(γ[k,n] + log_times[n]) + α0_k.
pub fn update_n_k(gamma: &Mat<f64>, log_times_observed: &[f64], alpha0: &[f64], n_k: &mut [f64]) {
    exp_right_multiply(gamma, log_times_observed, n_k);
    add_alpha0_to_nk(alpha0, n_k);
}

/// The observation-dependent part of the evidence lower bound, added into
/// `bound`.
///
/// Sums over whatever columns the caller holds, so under the parallel
/// partitioning each rank contributes its slab and the partials are summed
/// with an all-reduce. `n_k` must be the full-length expected counts.
pub fn elbo_data_partial(
    logl: &Mat<f64>,
    gamma: &Mat<f64>,
    log_times_observed: &[f64],
    n_k: &[f64],
    bound: &mut f64,
) {
    let k = gamma.nrows();
    let n = gamma.ncols();
    debug_assert_eq!((logl.nrows(), logl.ncols()), (k, n));
    debug_assert_eq!(log_times_observed.len(), n);
    debug_assert_eq!(n_k.len(), k);
    let mut acc = KahanSum::new();
    for i in 0..k {
        let psi_nk = digamma(n_k[i]);
        for j in 0..n {
            acc.add(
                (gamma.get(i, j) + log_times_observed[j]).exp()
                    * (logl.get(i, j) + psi_nk - gamma.get(i, j)),
            );
        }
    }
    *bound += acc.value();
}

/// The posterior-count part of the bound, Σ_k (α0_k − N_k)·ψ(N_k) + ln Γ(N_k),
/// added into `bound`.
///
/// Depends only on the full-length `n_k`, so in the parallel driver every
/// rank adds it once after the bound all-reduce.
pub fn elbo_nk_terms(alpha0: &[f64], n_k: &[f64], bound: &mut f64) {
    debug_assert_eq!(alpha0.len(), n_k.len());
    let mut acc = KahanSum::new();
    for i in 0..alpha0.len() {
        acc.add((alpha0[i] - n_k[i]) * digamma(n_k[i]));
        acc.add(ln_gamma(n_k[i]));
    }
    *bound += acc.value();
}

/// The full data- and γ-dependent part of the evidence lower bound, added
/// into `bound`.
///
/// The expectation E[ln θ_k] contributes ψ(N_k) inside the data term and its
/// prior/entropy counterpart (α0_k − N_k)·ψ(N_k) outside; the two cancel
/// exactly, keeping the accepted bound sequence non-decreasing. The constant
/// prior term from [`calc_bound_const`] is added by the caller.
pub fn elbo_rcg_mat(
    logl: &Mat<f64>,
    gamma: &Mat<f64>,
    log_times_observed: &[f64],
    alpha0: &[f64],
    n_k: &[f64],
    bound: &mut f64,
) {
    elbo_data_partial(logl, gamma, log_times_observed, n_k, bound);
    elbo_nk_terms(alpha0, n_k, bound);
}

/// The γ-independent part of the bound.
///
/// With C = Σ_n exp(log_times_observed[n]) and A = Σ_k α0_k this is
/// ln Γ(A) − Σ_k ln Γ(α0_k) − ln Γ(A + C); the last term is the constant
/// value of −ln Γ(Σ_k N_k), since Σ_k N_k = A + C at every iteration.
pub fn calc_bound_const(log_times_observed: &[f64], alpha0: &[f64]) -> f64 {
    let mut counts_sum = 0.0;
    for &lt in log_times_observed {
        counts_sum += lt.exp();
    }
    let mut alpha0_sum = 0.0;
    let mut lgamma_alpha0_sum = 0.0;
    for &a in alpha0 {
        alpha0_sum += a;
        lgamma_alpha0_sum += ln_gamma(a);
    }
    ln_gamma(alpha0_sum) - lgamma_alpha0_sum - ln_gamma(alpha0_sum + counts_sum)
}
