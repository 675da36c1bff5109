//! Trained model parameters and their text serialization.

pub mod codec;

use ndarray::{Array1, Array2};

pub use codec::{read_model, write_model, ModelFileError, Section};

/// Parameters of the basis functions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelParameters {
    /// Per basis function.
    pub basis_function_log_relevances: Array1<f64>,
    /// Per basis function.
    pub uncertainty_basis_weights: Array1<f64>,
    /// Per basis function.
    pub uncertainty_basis_log_relevances: Array1<f64>,
    pub log_uncertainty_constant: f64,
    /// basis × feature.
    pub basis_function_positions: Array2<f64>,
    /// One feature × feature matrix per basis function.
    pub basis_function_covariances: Vec<Array2<f64>>,
}

/// A trained model as exchanged with the regression engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub feature_mean: Array1<f64>,
    pub feature_sigma: Array1<f64>,
    pub output_mean: f64,
    /// Per basis function.
    pub model_weights: Array1<f64>,
    /// Per basis function.
    pub model_input_prior: Array1<f64>,
    /// basis × basis.
    pub model_inv_covariance: Array2<f64>,
    pub parameters: ModelParameters,
}

impl Model {
    /// Zero-filled model with containers sized for `nfeature` features and
    /// `nbasis` basis functions.
    pub fn zeros(nfeature: usize, nbasis: usize) -> Self {
        Self {
            feature_mean: Array1::zeros(nfeature),
            feature_sigma: Array1::zeros(nfeature),
            output_mean: 0.0,
            model_weights: Array1::zeros(nbasis),
            model_input_prior: Array1::zeros(nbasis),
            model_inv_covariance: Array2::zeros((nbasis, nbasis)),
            parameters: ModelParameters {
                basis_function_log_relevances: Array1::zeros(nbasis),
                uncertainty_basis_weights: Array1::zeros(nbasis),
                uncertainty_basis_log_relevances: Array1::zeros(nbasis),
                log_uncertainty_constant: 0.0,
                basis_function_positions: Array2::zeros((nbasis, nfeature)),
                basis_function_covariances: vec![Array2::zeros((nfeature, nfeature)); nbasis],
            },
        }
    }

    /// Replace every basis-indexed container with a zero-filled one sized
    /// for `nbasis` basis functions.
    pub fn resize_basis(&mut self, nbasis: usize) {
        let nfeature = self.num_features();
        self.model_weights = Array1::zeros(nbasis);
        self.model_input_prior = Array1::zeros(nbasis);
        self.model_inv_covariance = Array2::zeros((nbasis, nbasis));
        let params = &mut self.parameters;
        params.basis_function_log_relevances = Array1::zeros(nbasis);
        params.uncertainty_basis_weights = Array1::zeros(nbasis);
        params.uncertainty_basis_log_relevances = Array1::zeros(nbasis);
        params.basis_function_positions = Array2::zeros((nbasis, nfeature));
        params.basis_function_covariances = vec![Array2::zeros((nfeature, nfeature)); nbasis];
    }

    pub fn num_features(&self) -> usize {
        self.feature_mean.len()
    }

    pub fn num_basis_functions(&self) -> usize {
        self.model_weights.len()
    }
}

/// A model together with the band names of its features, as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredModel {
    pub bands: Vec<String>,
    pub model: Model,
}
