// Numerical kernels shared by the serial and parallel drivers
pub mod kernels;
// Serial optimizer
pub mod rcg;
// Data-parallel optimizer
pub mod rcg_parallel;

use anyhow::Result;

use crate::routines::comm::SingleComm;
use crate::routines::settings::{Algorithm, Settings};
use crate::structs::logl::Logl;
use crate::structs::posterior::Posterior;
use crate::structs::prior::Prior;
use crate::structs::weights::Weights;

/// Estimate the mixture component weights from precomputed log-likelihoods.
///
/// Runs the optimizer selected in `settings` with its tolerance, iteration
/// budget and symmetric prior, then reduces the posterior to the component
/// proportions. The parallel driver runs over the one-process communicator
/// here; multi-process runs construct their communicator and call
/// [`rcg_parallel::rcg_optl_par`] directly.
pub fn estimate_weights(
    logl: &Logl,
    log_times_observed: &[f64],
    settings: &Settings,
) -> Result<(Posterior, Weights)> {
    let alpha0 = Prior::symmetric(logl.n_components(), settings.config().alpha0)?;
    let (posterior, bound) = match settings.config().algorithm {
        Algorithm::Rcg => rcg::rcg_optl(
            logl,
            log_times_observed,
            &alpha0,
            settings.config().tol,
            settings.config().maxiters,
        )?,
        Algorithm::RcgParallel => rcg_parallel::rcg_optl_par(
            &SingleComm,
            Some((logl, log_times_observed)),
            &alpha0,
            settings.config().tol,
            settings.config().maxiters,
        )?,
    };
    tracing::info!(
        "Estimated weights for {} components from {} observations, bound: {}",
        logl.n_components(),
        logl.n_obs(),
        bound
    );
    let weights = posterior.weights(log_times_observed);
    Ok((posterior, weights))
}
