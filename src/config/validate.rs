//! Cross-field checks run once all keys have been parsed.

use std::path::Path;

use super::{Config, ConfigError};
use crate::data::transform::InputTransform;

/// Upper bound on `N_THREAD`.
pub const MAX_THREADS: usize = 100;

/// Validate a fully parsed configuration.
///
/// Only the "reuse model" rule touches the filesystem (existence of the model
/// file, and only when no training catalog is given).
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let opts = &config.options;

    if config.optim.max_threads > MAX_THREADS {
        return Err(ConfigError::TooManyThreads(config.optim.max_threads));
    }

    if opts.training_catalog.is_empty()
        && !(opts.reuse_model && Path::new(&opts.model_file).exists())
    {
        return Err(ConfigError::NoTrainingSource);
    }

    if opts.training_catalog.is_empty() && opts.prediction_catalog.is_empty() {
        return Err(ConfigError::NothingToDo);
    }

    if opts.use_errors
        && (opts.flux_column_prefix.is_empty()
            || opts.error_column_prefix.is_empty()
            || opts.flux_column_prefix.eq_ignore_ascii_case(&opts.error_column_prefix))
    {
        return Err(ConfigError::AmbiguousErrorColumns);
    }

    if opts.output_catalog == opts.training_catalog {
        return Err(ConfigError::OutputOverwrites {
            path: opts.output_catalog.clone(),
            target: "training catalog",
        });
    }

    if opts.output_catalog == opts.prediction_catalog {
        return Err(ConfigError::OutputOverwrites {
            path: opts.output_catalog.clone(),
            target: "prediction input catalog",
        });
    }

    if opts.save_model && opts.output_catalog == opts.model_file {
        return Err(ConfigError::OutputOverwrites {
            path: opts.output_catalog.clone(),
            target: "output model",
        });
    }

    if opts.reuse_model && opts.use_model_as_hint {
        return Err(ConfigError::ConflictingModelReuse);
    }

    if InputTransform::from_selector(&opts.transform_inputs).is_none() {
        return Err(ConfigError::UnknownTransform(opts.transform_inputs.clone()));
    }

    Ok(())
}
