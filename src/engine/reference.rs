//! A compact regression engine so the pipeline runs end to end.
//!
//! Inputs are optionally whitened, the prior mean is a constant, and the
//! response is a weighted sum of Gaussian basis functions centred on seeded
//! training rows. Each basis function's matrix in the model is used as the
//! precision of its Gaussian. Weights come from one ridge-regularised
//! weighted least-squares solve, the inverse normal matrix is kept as the
//! model's inverse covariance, and the noise level is the weighted residual
//! variance. There is no iterative optimisation: `MAX_ITER`, `TOLERANCE` and
//! friends are accepted but unused.

use faer::linalg::solvers::Solve;
use faer::{Mat, Side};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::settings::{
    CovarianceType, EngineSettings, NormalizationScheme, OptimizationFlags, OutputUncertaintyType,
    PriorMeanFunction, WeightingScheme,
};
use super::{EngineError, Prediction, Regressor, TrainingData};
use crate::model::Model;
use crate::rng::SimpleRng;

#[derive(Debug, Clone, Default)]
pub struct ReferenceEngine {
    settings: EngineSettings,
    flags: OptimizationFlags,
    model: Option<Model>,
    custom_weights: bool,
}

impl ReferenceEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Scheme weight of each row; NaN outputs get weight 0.
    fn scheme_weights(&self, output: ArrayView1<'_, f64>) -> Array1<f64> {
        match self.settings.weighting_scheme {
            WeightingScheme::Uniform | WeightingScheme::Custom => output.mapv(|_| 1.0),
            WeightingScheme::OneOverOnePlusOutput => output.mapv(|y| 1.0 / (1.0 + y)),
            WeightingScheme::Balanced => {
                let bin = self.settings.balanced_weighting_bin;
                let min = output.iter().copied().filter(|v| v.is_finite()).fold(f64::INFINITY, f64::min);
                let bins = output.mapv(|y| ((y - min) / bin).floor());

                let mut counts = std::collections::HashMap::new();
                for b in bins.iter().filter(|b| b.is_finite()) {
                    *counts.entry(*b as i64).or_insert(0usize) += 1;
                }
                let max_count = counts.values().copied().max().unwrap_or(1) as f64;
                bins.mapv(|b| match counts.get(&(b as i64)) {
                    Some(&c) if b.is_finite() => {
                        (max_count / c as f64).min(self.settings.balanced_weighting_max_weight)
                    }
                    _ => 0.0,
                })
            }
        }
    }
}

impl Regressor for ReferenceEngine {
    fn configure(&mut self, settings: &EngineSettings, flags: &OptimizationFlags) {
        self.settings = settings.clone();
        self.flags = flags.clone();
        if self.settings.prior_mean == PriorMeanFunction::LinearPreprocess
            || self.settings.prior_mean == PriorMeanFunction::LinearMarginalize
        {
            log::warn!("linear prior mean functions are fitted as a constant by the reference engine");
        }
    }

    fn fit(&mut self, data: TrainingData<'_>, hint: Option<&Model>) -> Result<(), EngineError> {
        let (nrow, nfeature) = data.input.dim();
        if data.output.len() != nrow {
            return Err(EngineError::Numerical(format!(
                "output has {} rows, input has {nrow}",
                data.output.len()
            )));
        }

        let scheme = self.scheme_weights(data.output);
        let rows: Vec<usize> = (0..nrow)
            .filter(|&i| {
                data.output[i].is_finite()
                    && scheme[i].is_finite()
                    && scheme[i] > 0.0
                    && data.input.row(i).iter().all(|v| v.is_finite())
                    && data.weight.map_or(true, |w| w[i].is_finite() && w[i] > 0.0)
            })
            .collect();
        if rows.is_empty() {
            return Err(EngineError::Numerical(
                "no training row has a finite output, finite features and a positive weight".into(),
            ));
        }
        self.custom_weights = data.weight.is_some();

        let w: Array1<f64> = rows
            .iter()
            .map(|&i| scheme[i] * data.weight.map_or(1.0, |wt| wt[i]))
            .collect();
        let wsum = w.sum();

        let (feature_mean, feature_sigma) = match self.settings.normalization_scheme {
            NormalizationScheme::Natural => (Array1::zeros(nfeature), Array1::ones(nfeature)),
            NormalizationScheme::Whiten => column_stats(data.input, &rows),
        };
        let output_mean = match self.settings.prior_mean {
            PriorMeanFunction::Zero => 0.0,
            _ => rows.iter().zip(w.iter()).map(|(&i, wi)| wi * data.output[i]).sum::<f64>() / wsum,
        };

        let x = Array2::from_shape_fn((rows.len(), nfeature), |(r, j)| {
            (data.input[[rows[r], j]] - feature_mean[j]) / feature_sigma[j]
        });
        let y: Array1<f64> = rows.iter().map(|&i| data.output[i] - output_mean).collect();

        let mut model = Model::zeros(nfeature, 0);
        model.feature_mean = feature_mean;
        model.feature_sigma = feature_sigma;
        model.output_mean = output_mean;

        match hint.filter(|h| h.num_features() == nfeature) {
            Some(h) => {
                log::info!("starting from the {} basis functions of the hint model", h.num_basis_functions());
                model.resize_basis(h.num_basis_functions());
                model.parameters.basis_function_positions = h.parameters.basis_function_positions.clone();
                model.parameters.basis_function_covariances = h.parameters.basis_function_covariances.clone();
                model.parameters.basis_function_log_relevances =
                    h.parameters.basis_function_log_relevances.clone();
            }
            None => {
                let nbasis = self.settings.num_bf.min(rows.len());
                model.resize_basis(nbasis);

                let mut order: Vec<usize> = (0..rows.len()).collect();
                SimpleRng::new(self.settings.bf_position_seed).shuffle(&mut order);
                let precision = 1.0 / nfeature.max(1) as f64;
                for (b, &r) in order.iter().take(nbasis).enumerate() {
                    model.parameters.basis_function_positions.row_mut(b).assign(&x.row(r));
                    model.parameters.basis_function_covariances[b] =
                        Array2::eye(nfeature) * precision;
                }
            }
        }

        if self.settings.fuzzing {
            let mut rng = SimpleRng::new(self.settings.fuzzing_seed);
            model
                .parameters
                .basis_function_positions
                .mapv_inplace(|p| p + rng.gauss(0.0, 0.01));
        }

        let nbasis = model.num_basis_functions();
        let phi = design_matrix(&model, x.view());
        let wphi = &phi * &w.view().insert_axis(Axis(1));

        let mut normal = phi.t().dot(&wphi);
        for b in 0..nbasis {
            normal[[b, b]] += model.parameters.basis_function_log_relevances[b].exp();
        }
        let rhs = wphi.t().dot(&y);

        let (weights, inverse) = solve_normal(&normal, rhs.view())?;
        model.model_weights = weights;
        model.model_inv_covariance = inverse;
        model.model_input_prior = Array1::ones(nbasis);

        let residual = &y - &phi.dot(&model.model_weights);
        let noise = (&w * &residual.mapv(|r| r * r)).sum() / wsum;
        model.parameters.log_uncertainty_constant = noise.max(f64::EPSILON).ln();

        log::info!(
            "fitted {nbasis} basis functions on {} of {nrow} training rows (threads: {})",
            rows.len(),
            self.flags.max_threads
        );
        self.model = Some(model);
        Ok(())
    }

    fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    fn load_model(&mut self, model: Model) -> Result<(), EngineError> {
        if let Some(j) = model.feature_sigma.iter().position(|s| !(s.is_finite() && *s != 0.0)) {
            return Err(EngineError::Numerical(format!("feature {j} has an invalid sigma")));
        }
        self.model = Some(model);
        Ok(())
    }

    fn predict(
        &self,
        input: ArrayView2<'_, f64>,
        input_error: Option<ArrayView2<'_, f64>>,
    ) -> Result<Prediction, EngineError> {
        let model = self.model.as_ref().ok_or(EngineError::NotTrained)?;
        let nfeature = model.num_features();
        if input.ncols() != nfeature {
            return Err(EngineError::FeatureMismatch {
                found: input.ncols(),
                expected: nfeature,
            });
        }

        let n = input.nrows();
        let mut out = Prediction {
            value: Array1::from_elem(n, f64::NAN),
            uncertainty: Array1::from_elem(n, f64::NAN),
            variance_train_density: Array1::from_elem(n, f64::NAN),
            variance_train_noise: Array1::from_elem(n, f64::NAN),
            variance_input_noise: Array1::from_elem(n, f64::NAN),
        };

        let params = &model.parameters;
        let log_noise = params.log_uncertainty_constant;

        for i in 0..n {
            let raw = input.row(i);
            if raw.iter().any(|v| !v.is_finite()) {
                continue;
            }
            let x = (&raw - &model.feature_mean) / &model.feature_sigma;

            let mut phi = Array1::<f64>::zeros(model.num_basis_functions());
            let mut grad = Array1::<f64>::zeros(nfeature);
            for (b, phi_b) in phi.iter_mut().enumerate() {
                let diff = &x - &params.basis_function_positions.row(b);
                let pdiff = params.basis_function_covariances[b].dot(&diff);
                *phi_b = (-0.5 * diff.dot(&pdiff)).exp();
                grad.scaled_add(-model.model_weights[b] * *phi_b, &pdiff);
            }

            out.value[i] = model.output_mean + phi.dot(&model.model_weights);
            if !self.settings.predict_error {
                continue;
            }

            let density = phi.dot(&model.model_inv_covariance.dot(&phi)) * log_noise.exp();
            let train_noise = match self.settings.output_error_type {
                OutputUncertaintyType::Uniform => log_noise.exp(),
                OutputUncertaintyType::InputDependent => {
                    (log_noise + phi.dot(&params.uncertainty_basis_weights)).exp()
                }
            };
            let input_noise = match input_error {
                Some(err) => grad
                    .iter()
                    .zip(model.feature_sigma.iter())
                    .zip(err.row(i).iter())
                    .map(|((g, s), e)| (g / s * e).powi(2))
                    .sum(),
                None => 0.0,
            };

            out.variance_train_density[i] = density;
            out.variance_train_noise[i] = train_noise;
            out.variance_input_noise[i] = input_noise;
            out.uncertainty[i] = (density + train_noise + input_noise).sqrt();
        }

        Ok(out)
    }

    fn covariance_type(&self) -> CovarianceType {
        self.settings.covariance
    }

    fn prior_mean_function(&self) -> PriorMeanFunction {
        self.settings.prior_mean
    }

    fn weighting_scheme(&self) -> WeightingScheme {
        if self.custom_weights {
            WeightingScheme::Custom
        } else {
            self.settings.weighting_scheme
        }
    }

    fn normalization_scheme(&self) -> NormalizationScheme {
        self.settings.normalization_scheme
    }

    fn output_uncertainty_type(&self) -> OutputUncertaintyType {
        self.settings.output_error_type
    }
}

// -- Numerical helpers --

/// Mean and standard deviation of each column over `rows`; zero spreads
/// become 1.
fn column_stats(input: ArrayView2<'_, f64>, rows: &[usize]) -> (Array1<f64>, Array1<f64>) {
    let subset = input.select(Axis(0), rows);
    let mean = subset.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(input.ncols()));
    let sigma = subset
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
    (mean, sigma)
}

/// Basis activations, rows × basis functions.
fn design_matrix(model: &Model, x: ArrayView2<'_, f64>) -> Array2<f64> {
    let params = &model.parameters;
    Array2::from_shape_fn((x.nrows(), model.num_basis_functions()), |(r, b)| {
        let diff = &x.row(r) - &params.basis_function_positions.row(b);
        let pdiff = params.basis_function_covariances[b].dot(&diff);
        (-0.5 * diff.dot(&pdiff)).exp()
    })
}

fn array_to_faer(array: &Array2<f64>) -> Mat<f64> {
    let (rows, cols) = array.dim();
    Mat::from_fn(rows, cols, |i, j| array[[i, j]])
}

fn faer_to_array(mat: &Mat<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Solve the symmetric positive definite system `normal · w = rhs` through
/// an LLT factorisation; returns `w` and `normal⁻¹`.
fn solve_normal(
    normal: &Array2<f64>,
    rhs: ArrayView1<'_, f64>,
) -> Result<(Array1<f64>, Array2<f64>), EngineError> {
    let n = normal.nrows();
    if n == 0 {
        return Ok((Array1::zeros(0), Array2::zeros((0, 0))));
    }

    let a = array_to_faer(normal);
    let llt = a.as_ref().llt(Side::Lower).map_err(|err| {
        EngineError::Numerical(format!("normal matrix is not positive definite: {err:?}"))
    })?;

    let b = Mat::from_fn(n, 1, |i, _| rhs[i]);
    let weights = llt.solve(b.as_ref());
    let inverse = llt.solve(Mat::<f64>::identity(n, n).as_ref());

    Ok((
        Array1::from_shape_fn(n, |i| weights[(i, 0)]),
        faer_to_array(&inverse),
    ))
}
