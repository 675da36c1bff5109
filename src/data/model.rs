use std::fmt;
use std::ops::Index;

use ndarray::{Array1, Array2};

use super::resolver::ResolveWarning;

// ---------------------------------------------------------------------------
// CatalogMode – which side of the pipeline a catalog feeds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMode {
    /// Output (and optional weight) columns are required.
    Training,
    /// An optional `id` column is carried through to the output catalog.
    Prediction,
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CatalogMode::Training => "training",
            CatalogMode::Prediction => "prediction",
        })
    }
}

// ---------------------------------------------------------------------------
// Header – lower-cased column names of a catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    /// Build a header from a comment line. The leading `#` is optional here;
    /// returns `None` when no column name remains.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let line = line.strip_prefix('#').unwrap_or(line);
        let columns: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
        if columns.is_empty() {
            None
        } else {
            Some(Self { columns })
        }
    }

    /// Index of the column with this name (case-insensitive).
    pub fn position(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.columns.iter().position(|c| *c == name)
    }

    pub fn names(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Index<usize> for Header {
    type Output = str;

    fn index(&self, idx: usize) -> &str {
        &self.columns[idx]
    }
}

// ---------------------------------------------------------------------------
// ColumnMapping – resolved roles of the header columns
// ---------------------------------------------------------------------------

/// A feature column and, when errors are used, its uncertainty column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureColumn {
    pub value: usize,
    pub error: Option<usize>,
}

/// Column roles for one catalog. `features[i]` is the column of `bands[i]`;
/// both are ordered by band name.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub output: Option<usize>,
    pub weight: Option<usize>,
    pub id: Option<usize>,
    pub features: Vec<FeatureColumn>,
    /// Canonical band list: prefix-stripped names, sorted.
    pub bands: Vec<String>,
    /// Non-fatal problems met during resolution (already logged).
    pub warnings: Vec<ResolveWarning>,
}

impl ColumnMapping {
    pub fn num_features(&self) -> usize {
        self.features.len()
    }
}

// ---------------------------------------------------------------------------
// DataSet – numeric content of a catalog
// ---------------------------------------------------------------------------

/// Matrices and vectors read from a catalog. All share the same row count;
/// invalid cells hold NaN, rows are never dropped.
#[derive(Debug, Clone)]
pub struct DataSet {
    /// rows × features.
    pub input: Array2<f64>,
    /// Same shape as `input`; present when errors are used.
    pub input_error: Option<Array2<f64>>,
    /// Training catalogs only.
    pub output: Option<Array1<f64>>,
    /// Training catalogs with a weight column only.
    pub weight: Option<Array1<f64>>,
    /// Prediction catalogs with an `id` column only.
    pub ids: Option<Vec<String>>,
}

impl DataSet {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.input.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.input.nrows() == 0
    }

    pub fn num_features(&self) -> usize {
        self.input.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_lower_cased_and_stripped() {
        let header = Header::parse_line("#  ID F_g\tE_g  ").unwrap();
        assert_eq!(header.names(), ["id", "f_g", "e_g"]);
        assert_eq!(header.position("F_G"), Some(1));
        assert_eq!(&header[2], "e_g");
        assert!(Header::parse_line("#   ").is_none());
    }
}
