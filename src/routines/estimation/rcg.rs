//! Serial Riemannian conjugate gradient optimizer for the mixture weights.

use anyhow::{bail, Result};
use faer::Mat;

use crate::routines::estimation::kernels::{
    calc_bound_const, elbo_rcg_mat, logsumexp, logsumexp_with_max, mixt_negnatgrad, revert_step,
    update_n_k,
};
use crate::structs::logl::Logl;
use crate::structs::posterior::Posterior;
use crate::structs::prior::Prior;

pub(crate) fn validate_inputs(
    logl: &Logl,
    log_times_observed: &[f64],
    alpha0: &Prior,
) -> Result<()> {
    let k = logl.n_components();
    let n = logl.n_obs();
    if k == 0 || n == 0 {
        bail!("Log-likelihood matrix must have at least one row and one column");
    }
    if alpha0.len() != k {
        bail!(
            "Prior has {} concentrations but the log-likelihood matrix has {} components",
            alpha0.len(),
            k
        );
    }
    if log_times_observed.len() != n {
        bail!(
            "Got {} log-counts for {} observations",
            log_times_observed.len(),
            n
        );
    }
    for &lt in log_times_observed {
        if !lt.is_finite() {
            bail!("Log-counts must be finite, got {}", lt);
        }
    }
    for i in 0..k {
        for j in 0..n {
            if !logl.matrix().get(i, j).is_finite() {
                bail!("Log-likelihood matrix must have finite entries");
            }
        }
    }
    Ok(())
}

/// Maximize the evidence lower bound over the log-space responsibilities γ
/// with Fletcher–Reeves conjugate gradient steps on the product of simplices.
///
/// `bound_const` is the γ-independent part of the bound from
/// [`calc_bound_const`]; the caller computes it once so the parallel driver
/// can broadcast a single value. Returns the normalized posterior and the
/// final bound. A step that regresses the bound is reverted and the momentum
/// reset, so the reported bound never decreases across accepted iterations;
/// running out of iterations is not an error.
pub fn rcg_optl_mat(
    logl: &Logl,
    log_times_observed: &[f64],
    alpha0: &Prior,
    bound_const: f64,
    tol: f64,
    maxiters: usize,
) -> Result<(Posterior, f64)> {
    validate_inputs(logl, log_times_observed, alpha0)?;
    if !(tol > 0.0) {
        bail!("Convergence tolerance must be positive, got {}", tol);
    }
    let n_groups = logl.n_components();
    let n_obs = logl.n_obs();

    let mut gamma_z = Mat::from_fn(n_groups, n_obs, |_, _| (1.0 / n_groups as f64).ln());
    let mut step = Mat::zeros(n_groups, n_obs);

    // oldstep, oldm and oldnorm are needed to revert the ascent step when the
    // bound regresses.
    let mut oldstep: Mat<f64> = Mat::zeros(n_groups, n_obs);
    let mut oldm = vec![0.0; n_obs];
    let mut oldnorm = 1.0;

    let mut bound = -100000.0;
    let mut didreset = false;

    let mut n_k = vec![0.0; n_groups];
    update_n_k(&gamma_z, log_times_observed, alpha0.as_slice(), &mut n_k);

    for iter in 0..maxiters {
        let newnorm = mixt_negnatgrad(&gamma_z, &n_k, logl.matrix(), &mut step);
        if !newnorm.is_finite() {
            bail!("Gradient norm is not finite at iteration {}", iter);
        }
        let beta_fr = newnorm / oldnorm;
        oldnorm = newnorm;

        if didreset {
            for i in 0..n_groups {
                for j in 0..n_obs {
                    *oldstep.get_mut(i, j) = 0.0;
                }
            }
        } else if beta_fr > 0.0 {
            for i in 0..n_groups {
                for j in 0..n_obs {
                    *oldstep.get_mut(i, j) *= beta_fr;
                    *step.get_mut(i, j) += oldstep.get(i, j);
                }
            }
        }
        didreset = false;

        for i in 0..n_groups {
            for j in 0..n_obs {
                *gamma_z.get_mut(i, j) += step.get(i, j);
            }
        }

        logsumexp_with_max(&mut gamma_z, &mut oldm);
        update_n_k(&gamma_z, log_times_observed, alpha0.as_slice(), &mut n_k);

        let oldbound = bound;
        bound = bound_const;
        elbo_rcg_mat(
            logl.matrix(),
            &gamma_z,
            log_times_observed,
            alpha0.as_slice(),
            &n_k,
            &mut bound,
        );
        if !bound.is_finite() {
            bail!("Bound is not finite at iteration {}", iter);
        }

        if bound < oldbound {
            didreset = true;
            revert_step(&mut gamma_z, &oldm);
            if beta_fr > 0.0 {
                for i in 0..n_groups {
                    for j in 0..n_obs {
                        *gamma_z.get_mut(i, j) -= oldstep.get(i, j);
                    }
                }
            }
            logsumexp_with_max(&mut gamma_z, &mut oldm);
            update_n_k(&gamma_z, log_times_observed, alpha0.as_slice(), &mut n_k);
            bound = bound_const;
            elbo_rcg_mat(
                logl.matrix(),
                &gamma_z,
                log_times_observed,
                alpha0.as_slice(),
                &n_k,
                &mut bound,
            );
        } else {
            for i in 0..n_groups {
                for j in 0..n_obs {
                    *oldstep.get_mut(i, j) = *step.get(i, j);
                }
            }
        }

        if iter % 5 == 0 {
            tracing::info!("  iter: {}, bound: {}, |g|: {}", iter, bound, newnorm);
        }

        if bound - oldbound < tol && !didreset {
            logsumexp(&mut gamma_z);
            return Ok((Posterior::from(gamma_z), bound));
        }
    }
    logsumexp(&mut gamma_z);
    Ok((Posterior::from(gamma_z), bound))
}

/// Convenience wrapper that derives `bound_const` itself.
pub fn rcg_optl(
    logl: &Logl,
    log_times_observed: &[f64],
    alpha0: &Prior,
    tol: f64,
    maxiters: usize,
) -> Result<(Posterior, f64)> {
    validate_inputs(logl, log_times_observed, alpha0)?;
    let bound_const = calc_bound_const(log_times_observed, alpha0.as_slice());
    rcg_optl_mat(logl, log_times_observed, alpha0, bound_const, tol, maxiters)
}
