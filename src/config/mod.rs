/// Configuration layer: parameter file → typed settings.
///
/// ```text
///   gpz.param
///       │   key = value lines, '#' comments
///       ▼
///   ┌──────────┐
///   │ registry  │  key → typed setter (value.rs parsers)
///   └──────────┘
///       │
///       ▼
///   ┌──────────┐
///   │ validate  │  cross-field rules
///   └──────────┘
///       │
///       ▼
///   Config { options, engine, optim }
/// ```
pub mod registry;
pub mod validate;
pub mod value;

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::settings::{EngineSettings, OptimizationFlags};
use registry::registry;

pub use validate::validate_config;

/// Default name of the prediction output catalog.
pub const DEFAULT_OUTPUT_CATALOG: &str = "gpz.cat";
/// Default name of the model file.
pub const DEFAULT_MODEL_FILE: &str = "gpz_model.dat";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not open param file '{}'", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ill formed line {line} in configuration file: '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("could not parse value of parameter {key}: could not convert '{value}' into {type_name}")]
    InvalidValue {
        key: String,
        value: String,
        type_name: &'static str,
    },

    #[error("asking for more than 100 threads ({0}) is asking for trouble, please double check the value of N_THREAD")]
    TooManyThreads(usize),

    #[error("a training catalog or a trained model is needed before predictions can be made: specify TRAINING_CATALOG, or set REUSE_MODEL=1 and provide a valid MODEL_FILE")]
    NoTrainingSource,

    #[error("no training or prediction catalog provided, nothing to do: specify TRAINING_CATALOG or PREDICTION_CATALOG")]
    NothingToDo,

    #[error("impossible to identify error columns: FLUX_COLUMN_PREFIX and ERROR_COLUMN_PREFIX must be non-empty and different, or set USE_ERRORS=0")]
    AmbiguousErrorColumns,

    #[error("the chosen output catalog file name ({path}) would overwrite the {target}")]
    OutputOverwrites { path: String, target: &'static str },

    #[error("cannot set both REUSE_MODEL=1 and USE_MODEL_AS_HINT=1")]
    ConflictingModelReuse,

    #[error("unknown input transformation '{0}'")]
    UnknownTransform(String),
}

// ---------------------------------------------------------------------------
// Options – ingestion / serialization settings
// ---------------------------------------------------------------------------

/// Settings that drive catalog ingestion and model persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Options {
    pub training_catalog: String,
    pub prediction_catalog: String,
    pub output_catalog: String,
    pub model_file: String,

    pub save_model: bool,
    pub reuse_model: bool,
    pub use_model_as_hint: bool,

    pub output_column: String,
    pub weight_column: String,
    pub flux_column_prefix: String,
    pub error_column_prefix: String,
    pub use_errors: bool,
    /// Band-matching regular expressions, in declaration order (`BANDS`).
    pub bands_regex: Vec<String>,
    pub output_min: f64,
    pub output_max: f64,
    pub transform_inputs: String,

    /// Canonical band list, once established by a model file or a catalog.
    /// Empty until then.
    pub bands: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            training_catalog: String::new(),
            prediction_catalog: String::new(),
            output_catalog: DEFAULT_OUTPUT_CATALOG.to_string(),
            model_file: DEFAULT_MODEL_FILE.to_string(),
            save_model: true,
            reuse_model: true,
            use_model_as_hint: false,
            output_column: "z_spec".to_string(),
            weight_column: String::new(),
            flux_column_prefix: "F".to_string(),
            error_column_prefix: "E".to_string(),
            use_errors: true,
            bands_regex: Vec::new(),
            output_min: f64::NEG_INFINITY,
            output_max: f64::INFINITY,
            transform_inputs: String::new(),
            bands: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config – everything read from a parameter file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    pub options: Options,
    pub engine: EngineSettings,
    pub optim: OptimizationFlags,
}

/// A configuration together with the keys it did not recognise.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub config: Config,
    /// Keys not found in the registry, lower-cased, in file order.
    pub unknown_keys: Vec<String>,
}

impl Config {
    /// Fill in defaults for settings left blank and derive dependent flags.
    pub fn apply_defaults(&mut self) {
        if self.options.output_catalog.is_empty() {
            self.options.output_catalog = DEFAULT_OUTPUT_CATALOG.to_string();
        }
        if self.options.model_file.is_empty() {
            self.options.model_file = DEFAULT_MODEL_FILE.to_string();
        }
        self.optim.enable_multithreading = self.optim.max_threads > 1;
    }

    /// Render every registered parameter as `KEY = value` lines that
    /// [`parse_config`] reads back to the same settings.
    pub fn to_param_string(&self) -> String {
        registry()
            .keys()
            .iter()
            .map(|key| format!("{} = {}\n", key.name.to_uppercase(), (key.render)(self)))
            .collect()
    }
}

/// Parse parameter file text. Unknown keys are collected, not rejected.
pub fn parse_config(text: &str) -> Result<ParsedConfig, ConfigError> {
    let mut config = Config::default();
    let mut unknown_keys = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::MalformedLine {
                line: idx + 1,
                content: line.trim().to_string(),
            });
        };

        let key = key.trim().to_lowercase();
        let value = value.trim();

        match registry().get(&key) {
            Some(entry) => {
                (entry.set)(&mut config, value).map_err(|type_name| ConfigError::InvalidValue {
                    key: key.clone(),
                    value: value.to_string(),
                    type_name,
                })?;
            }
            None => unknown_keys.push(key),
        }
    }

    Ok(ParsedConfig {
        config,
        unknown_keys,
    })
}

/// Read, parse and validate a parameter file. Unknown keys are logged and
/// kept on the result.
pub fn load_config(path: impl AsRef<Path>) -> Result<ParsedConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let ParsedConfig {
        mut config,
        unknown_keys,
    } = parse_config(&text)?;

    for key in &unknown_keys {
        log::warn!("unknown parameter '{}'", key.to_uppercase());
    }

    config.apply_defaults();
    validate_config(&config)?;

    if let Ok(json) = serde_json::to_string_pretty(&config) {
        log::debug!("resolved configuration: {json}");
    }

    Ok(ParsedConfig {
        config,
        unknown_keys,
    })
}
