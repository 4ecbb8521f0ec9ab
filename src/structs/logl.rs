use faer::Mat;
use faer_ext::IntoFaer;
use ndarray::{Array2, ArrayView2};

/// The precomputed log-likelihoods of the observations under each mixture
/// component.
///
/// Row k holds log p(x_n | component k) for every observation n, so the
/// matrix is K×N with one column per observation. The matrix is a constant
/// input to the optimizer and is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Logl {
    matrix: Mat<f64>,
}

impl Logl {
    pub fn new() -> Self {
        Logl { matrix: Mat::new() }
    }

    pub fn matrix(&self) -> &Mat<f64> {
        &self.matrix
    }

    /// Number of mixture components K.
    pub fn n_components(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of observations N.
    pub fn n_obs(&self) -> usize {
        self.matrix.ncols()
    }
}

impl Default for Logl {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Mat<f64>> for Logl {
    fn from(matrix: Mat<f64>) -> Self {
        Logl { matrix }
    }
}

impl From<Array2<f64>> for Logl {
    fn from(array: Array2<f64>) -> Self {
        let matrix = array.view().into_faer().to_owned();
        Logl { matrix }
    }
}

impl From<&Array2<f64>> for Logl {
    fn from(array: &Array2<f64>) -> Self {
        let matrix = array.view().into_faer().to_owned();
        Logl { matrix }
    }
}

impl From<ArrayView2<'_, f64>> for Logl {
    fn from(array_view: ArrayView2<'_, f64>) -> Self {
        let matrix = array_view.into_faer().to_owned();
        Logl { matrix }
    }
}
