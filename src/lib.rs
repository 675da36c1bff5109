//! Catalog ingestion and model persistence for sparse Gaussian-process
//! photometric regression.
//!
//! ```text
//!  gpz.param ──► config ──► Config { Options, EngineSettings, OptimizationFlags }
//!                               │
//!  *.cat ──► data::loader ──────┤  header → resolver → DataSet
//!                               ▼
//!                         engine::Regressor  (fit / predict / load)
//!                               │
//!  gpz_model.dat ◄──► model::codec            data::writer ──► gpz.cat
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod model;
pub mod rng;
pub mod run;

/// Package version, fixed at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short commit hash of the build, empty outside a git checkout.
pub const GIT_HASH: &str = env!("GPZ_GIT_HASH");

/// Version string including the build identifier when there is one.
pub fn version_string() -> String {
    if GIT_HASH.is_empty() {
        VERSION.to_string()
    } else {
        format!("{VERSION}-{GIT_HASH}")
    }
}
