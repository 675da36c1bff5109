/// Data layer: catalog types, column resolution, loading, transforms, output.
///
/// Architecture:
/// ```text
///  *.cat  (whitespace-delimited, '#' header line)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  header scan → count pass → data pass
///   └──────────┘
///        │  header
///        ▼
///   ┌──────────┐
///   │ resolver  │  output / weight / id columns, band ↔ error pairs
///   └──────────┘
///        │  ColumnMapping
///        ▼
///   ┌──────────┐
///   │  DataSet  │  input, input_error, output, weight (NaN = invalid cell)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ transform │  optional flux → luptitude
///   └──────────┘
///
///  predictions ──► writer ──► output catalog
/// ```

pub mod error;
pub mod loader;
pub mod model;
pub mod resolver;
pub mod transform;
pub mod writer;

pub use error::CatalogError;
pub use loader::{read_catalog, read_header, Catalog};
pub use model::{CatalogMode, ColumnMapping, DataSet, FeatureColumn, Header};
pub use resolver::{resolve_columns, ResolveWarning};
