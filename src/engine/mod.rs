//! Interface to the regression engine.
//!
//! Ingestion hands numeric matrices to a [`Regressor`] and gets a [`Model`]
//! or a [`Prediction`] back. The engine's own optimisation is opaque here.

pub mod reference;
pub mod settings;

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::model::Model;
use settings::{
    CovarianceType, EngineSettings, NormalizationScheme, OptimizationFlags, OutputUncertaintyType,
    PriorMeanFunction, WeightingScheme,
};

pub use reference::ReferenceEngine;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no trained model: call fit or load_model first")]
    NotTrained,

    #[error("input has {found} features, model expects {expected}")]
    FeatureMismatch { found: usize, expected: usize },

    #[error("{0}")]
    Numerical(String),
}

/// Training inputs. `input_error` has the shape of `input` when present;
/// `weight` has one entry per row when present.
#[derive(Debug, Clone, Copy)]
pub struct TrainingData<'a> {
    pub input: ArrayView2<'a, f64>,
    pub input_error: Option<ArrayView2<'a, f64>>,
    pub output: ArrayView1<'a, f64>,
    pub weight: Option<ArrayView1<'a, f64>>,
}

/// Per-row prediction with its variance decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub value: Array1<f64>,
    pub uncertainty: Array1<f64>,
    pub variance_train_density: Array1<f64>,
    pub variance_train_noise: Array1<f64>,
    pub variance_input_noise: Array1<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// A regression engine as seen by the pipeline.
pub trait Regressor {
    fn configure(&mut self, settings: &EngineSettings, flags: &OptimizationFlags);

    /// Train on `data`. `hint` seeds the optimisation when given.
    fn fit(&mut self, data: TrainingData<'_>, hint: Option<&Model>) -> Result<(), EngineError>;

    /// The trained (or loaded) model.
    fn model(&self) -> Option<&Model>;

    fn load_model(&mut self, model: Model) -> Result<(), EngineError>;

    fn predict(
        &self,
        input: ArrayView2<'_, f64>,
        input_error: Option<ArrayView2<'_, f64>>,
    ) -> Result<Prediction, EngineError>;

    fn num_features(&self) -> usize {
        self.model().map_or(0, Model::num_features)
    }

    fn num_basis_functions(&self) -> usize {
        self.model().map_or(0, Model::num_basis_functions)
    }

    fn covariance_type(&self) -> CovarianceType;
    fn prior_mean_function(&self) -> PriorMeanFunction;
    fn weighting_scheme(&self) -> WeightingScheme;
    fn normalization_scheme(&self) -> NormalizationScheme;
    fn output_uncertainty_type(&self) -> OutputUncertaintyType;
}
