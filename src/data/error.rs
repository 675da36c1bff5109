//! Errors raised while resolving or reading a catalog.

use std::io;
use std::path::PathBuf;

use super::loader::ReadStage;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("could not open {which} catalog '{}'", path.display())]
    Open {
        which: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error in '{}' during {stage}", path.display())]
    Read {
        path: PathBuf,
        stage: ReadStage,
        #[source]
        source: io::Error,
    },

    #[error("could not write output catalog '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("missing header in '{}': the header line must start with # and list the column names", path.display())]
    MissingHeader { path: PathBuf },

    #[error("could not find {kind} column '{name}'")]
    MissingColumn { kind: &'static str, name: String },

    #[error("invalid band pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no columns matching the feature selection (BANDS={}); available columns: {}", patterns.join(","), available.join(","))]
    NoFeatures {
        patterns: Vec<String>,
        available: Vec<String>,
    },

    #[error("mismatch of bands between {first} [{}] and {second} [{}]", first_bands.join(", "), second_bands.join(", "))]
    BandMismatch {
        first: &'static str,
        first_bands: Vec<String>,
        second: &'static str,
        second_bands: Vec<String>,
    },

    #[error("line {line} has {found} columns while header has {expected}")]
    ColumnCount {
        line: usize,
        found: usize,
        expected: usize,
    },

    #[error("could not read {what} ({column}) from line {line}: must be a floating point number, got '{value}'")]
    InvalidNumber {
        what: &'static str,
        column: String,
        line: usize,
        value: String,
    },

    #[error("'{}' gained rows between the count pass and the data pass", path.display())]
    RowCountChanged { path: PathBuf },

    #[error("unknown input transformation '{0}'")]
    UnknownTransform(String),
}
