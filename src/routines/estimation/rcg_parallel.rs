//! Data-parallel Riemannian conjugate gradient optimizer.
//!
//! The observation columns are split into contiguous slabs of equal width,
//! one per rank; each rank holds full rows of its slab. Column-wise
//! normalization is local to the owning rank, so the per-iteration
//! collectives reduce to three sums: the gradient norm, the expected counts
//! N_k, and the bound. The decisions taken from those scalars (β, the
//! revert branch, convergence) are therefore identical on every rank.

use anyhow::{bail, Result};
use faer::Mat;

use crate::routines::comm::Communicator;
use crate::routines::estimation::kernels::{
    add_alpha0_to_nk, calc_bound_const, elbo_data_partial, elbo_nk_terms, exp_right_multiply,
    logsumexp, logsumexp_with_max, mixt_negnatgrad, revert_step,
};
use crate::routines::estimation::rcg::validate_inputs;
use crate::structs::logl::Logl;
use crate::structs::posterior::Posterior;
use crate::structs::prior::Prior;

const ROOT: usize = 0;

/// Pack a K×W column block into a contiguous column-major buffer, the
/// layout the scatter/gather collectives exchange slabs in.
fn pack_columns(m: &Mat<f64>, buf: &mut Vec<f64>) {
    buf.clear();
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            buf.push(*m.get(i, j));
        }
    }
}

/// Maximize the bound over γ with the observation columns partitioned
/// across the ranks of `comm`.
///
/// Rank 0 supplies the full log-likelihood matrix and log-counts in `input`;
/// the other ranks pass `None` and receive their slab through the initial
/// scatter. The returned posterior is the full normalized matrix on rank 0
/// and this rank's slab elsewhere; the bound is identical on every rank.
pub fn rcg_optl_par<C: Communicator>(
    comm: &C,
    input: Option<(&Logl, &[f64])>,
    alpha0: &Prior,
    tol: f64,
    maxiters: usize,
) -> Result<(Posterior, f64)> {
    let rank = comm.rank();
    let size = comm.size();

    // Validation happens before the first collective; the broadcast dims
    // double as the verdict so the other ranks can fail in step too.
    let mut dims = [0u64; 2];
    let mut root_error = None;
    if rank == ROOT {
        match input {
            Some((logl, log_times_observed)) => {
                if let Err(e) = validate_inputs(logl, log_times_observed, alpha0) {
                    root_error = Some(e);
                } else if logl.n_obs() % size != 0 {
                    root_error = Some(anyhow::anyhow!(
                        "Observation count {} is not divisible by the {} ranks",
                        logl.n_obs(),
                        size
                    ));
                } else {
                    dims = [logl.n_components() as u64, logl.n_obs() as u64];
                }
            }
            None => root_error = Some(anyhow::anyhow!("Rank 0 must supply the input matrices")),
        }
    }
    if !(tol > 0.0) {
        bail!("Convergence tolerance must be positive, got {}", tol);
    }
    comm.broadcast_u64(&mut dims, ROOT);
    if let Some(e) = root_error {
        return Err(e);
    }
    if dims[0] == 0 {
        bail!("Input rejected on rank 0");
    }
    let n_groups = dims[0] as usize;
    let n_obs = dims[1] as usize;
    let width = n_obs / size;
    let n_values = n_groups * width;

    // Scatter the log counts and the log-likelihood column slabs.
    let mut log_times_observed = vec![0.0; width];
    let mut send = Vec::new();
    if rank == ROOT {
        let (_, full) = input.unwrap();
        send.extend_from_slice(full);
    }
    comm.scatter(&send, &mut log_times_observed, ROOT);

    let mut recv = vec![0.0; n_values];
    if rank == ROOT {
        let (logl_full, _) = input.unwrap();
        pack_columns(logl_full.matrix(), &mut send);
    }
    comm.scatter(&send, &mut recv, ROOT);
    let logl = Mat::from_fn(n_groups, width, |i, j| recv[j * n_groups + i]);

    // The bound constant covers the full data, so it comes from the
    // unpartitioned log counts.
    let mut bound_const_buf = [0.0];
    if rank == ROOT {
        let (_, full) = input.unwrap();
        bound_const_buf[0] = calc_bound_const(full, alpha0.as_slice());
    }
    comm.broadcast(&mut bound_const_buf, ROOT);
    let bound_const = bound_const_buf[0];

    let mut gamma_z = Mat::from_fn(n_groups, width, |_, _| (1.0 / n_groups as f64).ln());
    let mut step: Mat<f64> = Mat::zeros(n_groups, width);
    let mut oldstep: Mat<f64> = Mat::zeros(n_groups, width);
    let mut oldm = vec![0.0; width];
    let mut oldnorm = 1.0;

    let mut bound = -100000.0;
    let mut didreset = false;

    let mut n_k = vec![0.0; n_groups];
    exp_right_multiply(&gamma_z, &log_times_observed, &mut n_k);
    comm.all_reduce_sum_vec(&mut n_k);
    add_alpha0_to_nk(alpha0.as_slice(), &mut n_k);

    for iter in 0..maxiters {
        let newnorm_partial = mixt_negnatgrad(&gamma_z, &n_k, &logl, &mut step);
        let newnorm = comm.all_reduce_sum(newnorm_partial);
        if !newnorm.is_finite() {
            bail!("Gradient norm is not finite at iteration {}", iter);
        }
        let beta_fr = newnorm / oldnorm;
        oldnorm = newnorm;

        if didreset {
            for i in 0..n_groups {
                for j in 0..width {
                    *oldstep.get_mut(i, j) = 0.0;
                }
            }
        } else if beta_fr > 0.0 {
            for i in 0..n_groups {
                for j in 0..width {
                    *oldstep.get_mut(i, j) *= beta_fr;
                    *step.get_mut(i, j) += oldstep.get(i, j);
                }
            }
        }
        didreset = false;

        for i in 0..n_groups {
            for j in 0..width {
                *gamma_z.get_mut(i, j) += step.get(i, j);
            }
        }

        // Every column lives wholly on one rank, so the normalization and
        // the maxima it stores stay local.
        logsumexp_with_max(&mut gamma_z, &mut oldm);

        exp_right_multiply(&gamma_z, &log_times_observed, &mut n_k);
        comm.all_reduce_sum_vec(&mut n_k);
        add_alpha0_to_nk(alpha0.as_slice(), &mut n_k);

        let oldbound = bound;
        let mut bound_partial = 0.0;
        elbo_data_partial(&logl, &gamma_z, &log_times_observed, &n_k, &mut bound_partial);
        bound = comm.all_reduce_sum(bound_partial) + bound_const;
        elbo_nk_terms(alpha0.as_slice(), &n_k, &mut bound);
        if !bound.is_finite() {
            bail!("Bound is not finite at iteration {}", iter);
        }

        if bound < oldbound {
            didreset = true;
            revert_step(&mut gamma_z, &oldm);
            if beta_fr > 0.0 {
                for i in 0..n_groups {
                    for j in 0..width {
                        *gamma_z.get_mut(i, j) -= oldstep.get(i, j);
                    }
                }
            }
            logsumexp_with_max(&mut gamma_z, &mut oldm);

            exp_right_multiply(&gamma_z, &log_times_observed, &mut n_k);
            comm.all_reduce_sum_vec(&mut n_k);
            add_alpha0_to_nk(alpha0.as_slice(), &mut n_k);

            let mut bound_partial = 0.0;
            elbo_data_partial(&logl, &gamma_z, &log_times_observed, &n_k, &mut bound_partial);
            bound = comm.all_reduce_sum(bound_partial) + bound_const;
            elbo_nk_terms(alpha0.as_slice(), &n_k, &mut bound);
        } else {
            for i in 0..n_groups {
                for j in 0..width {
                    *oldstep.get_mut(i, j) = *step.get(i, j);
                }
            }
        }

        if iter % 5 == 0 && rank == ROOT {
            tracing::info!("  iter: {}, bound: {}, |g|: {}", iter, bound, newnorm);
        }

        // bound and didreset come from reduced scalars, so all ranks agree.
        if bound - oldbound < tol && !didreset {
            break;
        }
    }

    logsumexp(&mut gamma_z);
    pack_columns(&gamma_z, &mut send);
    let mut gathered = if rank == ROOT {
        vec![0.0; n_groups * n_obs]
    } else {
        Vec::new()
    };
    comm.gather(&send, &mut gathered, ROOT);
    if rank == ROOT {
        let full = Mat::from_fn(n_groups, n_obs, |i, j| gathered[j * n_groups + i]);
        Ok((Posterior::from(full), bound))
    } else {
        Ok((Posterior::from(gamma_z), bound))
    }
}
