use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Enumerated engine options
// ---------------------------------------------------------------------------

/// Shape of the per-basis-function covariance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CovarianceType {
    GlobalLength,
    VariableLength,
    GlobalDiagonal,
    VariableDiagonal,
    GlobalCovariance,
    VariableCovariance,
}

impl CovarianceType {
    /// Short code used in the literature (GPGL, GPVC, ...).
    pub fn code(self) -> &'static str {
        match self {
            CovarianceType::GlobalLength => "GPGL",
            CovarianceType::VariableLength => "GPVL",
            CovarianceType::GlobalDiagonal => "GPGD",
            CovarianceType::VariableDiagonal => "GPVD",
            CovarianceType::GlobalCovariance => "GPGC",
            CovarianceType::VariableCovariance => "GPVC",
        }
    }
}

impl fmt::Display for CovarianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CovarianceType::GlobalLength => "GLOBAL_LENGTH",
            CovarianceType::VariableLength => "VARIABLE_LENGTH",
            CovarianceType::GlobalDiagonal => "GLOBAL_DIAGONAL",
            CovarianceType::VariableDiagonal => "VARIABLE_DIAGONAL",
            CovarianceType::GlobalCovariance => "GLOBAL_COVARIANCE",
            CovarianceType::VariableCovariance => "VARIABLE_COVARIANCE",
        })
    }
}

/// Prior mean function subtracted from the output before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriorMeanFunction {
    Zero,
    ConstantPreprocess,
    LinearPreprocess,
    LinearMarginalize,
}

impl fmt::Display for PriorMeanFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriorMeanFunction::Zero => "ZERO",
            PriorMeanFunction::ConstantPreprocess => "CONSTANT_PREPROCESS",
            PriorMeanFunction::LinearPreprocess => "LINEAR_PREPROCESS",
            PriorMeanFunction::LinearMarginalize => "LINEAR_MARGINALIZE",
        })
    }
}

/// How training rows are weighted in the likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeightingScheme {
    Uniform,
    OneOverOnePlusOutput,
    Balanced,
    /// Weights taken from the training catalog's weight column. Not
    /// selectable from a parameter file.
    Custom,
}

impl fmt::Display for WeightingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeightingScheme::Uniform => "UNIFORM",
            WeightingScheme::OneOverOnePlusOutput => "ONE_OVER_ONE_PLUS_OUTPUT",
            WeightingScheme::Balanced => "BALANCED",
            WeightingScheme::Custom => "CUSTOM",
        })
    }
}

/// Input normalization applied before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NormalizationScheme {
    Natural,
    Whiten,
}

impl fmt::Display for NormalizationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NormalizationScheme::Natural => "NATURAL",
            NormalizationScheme::Whiten => "WHITEN",
        })
    }
}

/// How the training sample is split into training and validation sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainValidationSplitMethod {
    Random,
    Sequential,
}

/// Model for the output noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputUncertaintyType {
    Uniform,
    InputDependent,
}

impl fmt::Display for OutputUncertaintyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputUncertaintyType::Uniform => "UNIFORM",
            OutputUncertaintyType::InputDependent => "INPUT_DEPENDENT",
        })
    }
}

// ---------------------------------------------------------------------------
// EngineSettings – tunables forwarded to the regression engine
// ---------------------------------------------------------------------------

/// Engine tunables read from the parameter file. Ingestion never looks at
/// these; they are handed to [`super::Regressor::configure`] as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSettings {
    pub verbose: bool,
    pub num_bf: usize,
    pub covariance: CovarianceType,
    pub prior_mean: PriorMeanFunction,
    pub weighting_scheme: WeightingScheme,
    pub normalization_scheme: NormalizationScheme,
    pub valid_sample_method: TrainValidationSplitMethod,
    pub output_error_type: OutputUncertaintyType,
    pub balanced_weighting_bin: f64,
    pub balanced_weighting_max_weight: f64,
    pub train_valid_ratio: f64,
    pub valid_sample_seed: u64,
    pub bf_position_seed: u64,
    pub fuzzing: bool,
    pub fuzzing_seed: u64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub grad_tolerance: f64,
    pub predict_error: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            num_bf: 100,
            covariance: CovarianceType::VariableCovariance,
            prior_mean: PriorMeanFunction::ConstantPreprocess,
            weighting_scheme: WeightingScheme::Uniform,
            normalization_scheme: NormalizationScheme::Whiten,
            valid_sample_method: TrainValidationSplitMethod::Random,
            output_error_type: OutputUncertaintyType::InputDependent,
            balanced_weighting_bin: 0.1,
            balanced_weighting_max_weight: 1000.0,
            train_valid_ratio: 0.5,
            valid_sample_seed: 42,
            bf_position_seed: 55,
            fuzzing: false,
            fuzzing_seed: 42,
            max_iter: 200,
            tolerance: 1e-9,
            grad_tolerance: 1e-5,
            predict_error: true,
        }
    }
}

/// Threading switches for the engine's optimizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationFlags {
    pub max_threads: usize,
    pub enable_multithreading: bool,
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self {
            max_threads: 1,
            enable_multithreading: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covariance_name_and_code_are_separate() {
        let cov = CovarianceType::GlobalDiagonal;
        assert_eq!(cov.to_string(), "GLOBAL_DIAGONAL");
        assert_eq!(cov.code(), "GPGD");
        assert_eq!(format!("{cov} ({})", cov.code()), "GLOBAL_DIAGONAL (GPGD)");
    }
}
