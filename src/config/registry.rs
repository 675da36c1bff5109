use std::collections::HashMap;
use std::sync::OnceLock;

use super::value::ConfigValue;
use super::Config;

// ---------------------------------------------------------------------------
// Key registry: key name → typed setter / renderer
// ---------------------------------------------------------------------------

/// One recognised parameter. `set` returns the expected type name when the
/// raw value cannot be converted.
pub(crate) struct ConfigKey {
    pub name: &'static str,
    pub set: fn(&mut Config, &str) -> Result<(), &'static str>,
    pub render: fn(&Config) -> String,
}

pub(crate) struct Registry {
    keys: Vec<ConfigKey>,
    index: HashMap<&'static str, usize>,
}

impl Registry {
    /// Look up a (lower-case) key name.
    pub fn get(&self, name: &str) -> Option<&ConfigKey> {
        self.index.get(name).map(|&i| &self.keys[i])
    }

    /// All keys, in declaration order.
    pub fn keys(&self) -> &[ConfigKey] {
        &self.keys
    }
}

fn assign<T: ConfigValue>(slot: &mut T, raw: &str) -> Result<(), &'static str> {
    *slot = T::parse_config(raw).ok_or(T::TYPE_NAME)?;
    Ok(())
}

macro_rules! key {
    ($name:literal => $($field:ident).+) => {
        ConfigKey {
            name: $name,
            set: |cfg, raw| assign(&mut cfg.$($field).+, raw),
            render: |cfg| cfg.$($field).+.render_config(),
        }
    };
}

fn build() -> Registry {
    let keys = vec![
        key!("training_catalog" => options.training_catalog),
        key!("prediction_catalog" => options.prediction_catalog),
        key!("output_catalog" => options.output_catalog),
        key!("model_file" => options.model_file),
        key!("save_model" => options.save_model),
        key!("reuse_model" => options.reuse_model),
        key!("use_model_as_hint" => options.use_model_as_hint),
        key!("output_column" => options.output_column),
        key!("weight_column" => options.weight_column),
        key!("flux_column_prefix" => options.flux_column_prefix),
        key!("error_column_prefix" => options.error_column_prefix),
        key!("use_errors" => options.use_errors),
        key!("output_min" => options.output_min),
        key!("output_max" => options.output_max),
        key!("transform_inputs" => options.transform_inputs),
        key!("bands" => options.bands_regex),
        key!("verbose" => engine.verbose),
        key!("num_bf" => engine.num_bf),
        key!("covariance" => engine.covariance),
        key!("prior_mean" => engine.prior_mean),
        key!("weighting_scheme" => engine.weighting_scheme),
        key!("normalization_scheme" => engine.normalization_scheme),
        key!("valid_sample_method" => engine.valid_sample_method),
        key!("output_error_type" => engine.output_error_type),
        key!("balanced_weighting_bin" => engine.balanced_weighting_bin),
        key!("balanced_weighting_max_weight" => engine.balanced_weighting_max_weight),
        key!("train_valid_ratio" => engine.train_valid_ratio),
        key!("valid_sample_seed" => engine.valid_sample_seed),
        key!("bf_position_seed" => engine.bf_position_seed),
        key!("fuzzing" => engine.fuzzing),
        key!("fuzzing_seed" => engine.fuzzing_seed),
        key!("max_iter" => engine.max_iter),
        key!("tolerance" => engine.tolerance),
        key!("grad_tolerance" => engine.grad_tolerance),
        key!("predict_error" => engine.predict_error),
        key!("n_thread" => optim.max_threads),
    ];

    let index = keys.iter().enumerate().map(|(i, k)| (k.name, i)).collect();
    Registry { keys, index }
}

/// The process-wide registry, built on first use.
pub(crate) fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(build)
}
