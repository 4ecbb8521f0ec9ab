//! Estimation of mixture-model component weights from precomputed
//! log-likelihoods, using Riemannian conjugate gradient ascent on a
//! variational lower bound.
//!
//! The input is a dense K×N matrix of per-observation log-likelihoods
//! ([`structs::logl::Logl`]) together with the log-multiplicity of each
//! observation. The optimizer returns the log-space posterior
//! responsibilities ([`structs::posterior::Posterior`]), from which the
//! mixture proportions ([`structs::weights::Weights`]) are derived.
//!
//! Two drivers are provided: [`routines::estimation::rcg::rcg_optl_mat`]
//! for a single process, and [`routines::estimation::rcg_parallel::rcg_optl_par`]
//! which runs the same iteration partitioned by observation over a
//! [`routines::comm::Communicator`].

pub mod routines;
pub mod structs;

pub mod prelude {
    pub use crate::routines::comm::{Communicator, SingleComm};
    pub use crate::routines::estimation::estimate_weights;
    pub use crate::routines::estimation::rcg::rcg_optl_mat;
    pub use crate::routines::estimation::rcg_parallel::rcg_optl_par;
    pub use crate::routines::logger::setup_log;
    pub use crate::routines::settings::{Algorithm, Settings};
    pub use crate::structs::logl::Logl;
    pub use crate::structs::posterior::Posterior;
    pub use crate::structs::prior::Prior;
    pub use crate::structs::weights::Weights;
}
