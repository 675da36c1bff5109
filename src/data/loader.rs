use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::{Array1, Array2};

use super::error::CatalogError;
use super::model::{CatalogMode, ColumnMapping, DataSet, Header};
use super::resolver::resolve_columns;
use super::transform::InputTransform;
use crate::config::Options;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Stages of a catalog read. Any failure aborts the read; no partially
/// filled [`DataSet`] is ever returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    HeaderScan,
    CountPass,
    DataPass,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadStage::HeaderScan => "header scan",
            ReadStage::CountPass => "row count pass",
            ReadStage::DataPass => "data pass",
        })
    }
}

/// Everything learned from one catalog file.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub header: Header,
    pub mapping: ColumnMapping,
    pub data: DataSet,
}

/// Read a whitespace-delimited catalog.
///
/// Layout:
/// ```text
/// # id  f_g   f_r   e_g   e_r   z_spec
/// 1     12.3  14.1  0.4   0.5   0.31
/// ```
/// The first non-empty comment line is the header; every other non-comment
/// line is a row with exactly one token per header column.
pub fn read_catalog(path: &Path, opts: &Options, mode: CatalogMode) -> Result<Catalog, CatalogError> {
    let header = read_header(path, mode)?;
    let mapping = resolve_columns(&header, opts, mode)?;
    let nrow = count_rows(path, mode)?;

    let mut data = read_rows(path, opts, mode, &header, &mapping, nrow)?;

    let transform = InputTransform::from_selector(&opts.transform_inputs)
        .ok_or_else(|| CatalogError::UnknownTransform(opts.transform_inputs.clone()))?;
    transform.apply(&mut data.input, data.input_error.as_mut());

    log::info!(
        "read {} rows with {} features from {mode} catalog '{}'",
        data.len(),
        data.num_features(),
        path.display()
    );

    Ok(Catalog {
        header,
        mapping,
        data,
    })
}

// ---------------------------------------------------------------------------
// Header scan
// ---------------------------------------------------------------------------

/// Find the first comment line that names at least one column.
pub fn read_header(path: &Path, mode: CatalogMode) -> Result<Header, CatalogError> {
    for line in open_lines(path, mode, ReadStage::HeaderScan)? {
        let (_, line) = line?;
        let line = line.trim();
        if !line.starts_with('#') {
            continue;
        }
        if let Some(header) = Header::parse_line(line) {
            return Ok(header);
        }
    }

    Err(CatalogError::MissingHeader {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Count pass
// ---------------------------------------------------------------------------

fn count_rows(path: &Path, mode: CatalogMode) -> Result<usize, CatalogError> {
    let mut nrow = 0;
    for line in open_lines(path, mode, ReadStage::CountPass)? {
        let (_, line) = line?;
        if is_data_line(&line) {
            nrow += 1;
        }
    }
    Ok(nrow)
}

// ---------------------------------------------------------------------------
// Data pass
// ---------------------------------------------------------------------------

fn read_rows(
    path: &Path,
    opts: &Options,
    mode: CatalogMode,
    header: &Header,
    mapping: &ColumnMapping,
    nrow: usize,
) -> Result<DataSet, CatalogError> {
    let nfeature = mapping.num_features();

    let mut input = Array2::<f64>::zeros((nrow, nfeature));
    let mut input_error = opts
        .use_errors
        .then(|| Array2::<f64>::zeros((nrow, nfeature)));
    let mut output = mapping.output.map(|_| Array1::<f64>::zeros(nrow));
    let mut weight = mapping.weight.map(|_| Array1::<f64>::zeros(nrow));
    let mut ids = mapping.id.map(|_| Vec::with_capacity(nrow));

    let mut row = 0;
    for line in open_lines(path, mode, ReadStage::DataPass)? {
        let (lineno, line) = line?;
        if !is_data_line(&line) {
            continue;
        }

        if row >= nrow {
            return Err(CatalogError::RowCountChanged {
                path: path.to_path_buf(),
            });
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != header.len() {
            return Err(CatalogError::ColumnCount {
                line: lineno,
                found: tokens.len(),
                expected: header.len(),
            });
        }

        if let (Some(ids), Some(col)) = (ids.as_mut(), mapping.id) {
            ids.push(tokens[col].to_string());
        }

        for (k, feature) in mapping.features.iter().enumerate() {
            let value = parse_field(&tokens, header, feature.value, lineno, "feature")?;
            input[[row, k]] = value;

            if let (Some(errors), Some(col)) = (input_error.as_mut(), feature.error) {
                let error = parse_field(&tokens, header, col, lineno, "feature uncertainty")?;
                errors[[row, k]] = error;

                if !value.is_finite() || !error.is_finite() || error < 0.0 {
                    input[[row, k]] = f64::NAN;
                    errors[[row, k]] = f64::NAN;
                }
            } else if !value.is_finite() {
                input[[row, k]] = f64::NAN;
            }
        }

        if let (Some(output), Some(col)) = (output.as_mut(), mapping.output) {
            let value = parse_field(&tokens, header, col, lineno, "output")?;
            output[row] = if value < opts.output_min || value > opts.output_max {
                f64::NAN
            } else {
                value
            };
        }

        if let (Some(weight), Some(col)) = (weight.as_mut(), mapping.weight) {
            weight[row] = parse_field(&tokens, header, col, lineno, "weight")?;
        }

        row += 1;
    }

    if row != nrow {
        return Err(CatalogError::RowCountChanged {
            path: path.to_path_buf(),
        });
    }

    Ok(DataSet {
        input,
        input_error,
        output,
        weight,
        ids,
    })
}

// -- Line helpers --

fn is_data_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

/// Open `path` and iterate over `(1-based line number, line)`.
fn open_lines(
    path: &Path,
    mode: CatalogMode,
    stage: ReadStage,
) -> Result<impl Iterator<Item = Result<(usize, String), CatalogError>> + '_, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Open {
        which: mode.to_string(),
        path: path.to_path_buf(),
        source,
    })?;

    Ok(BufReader::new(file)
        .lines()
        .enumerate()
        .map(move |(idx, line)| {
            line.map(|l| (idx + 1, l)).map_err(|source| CatalogError::Read {
                path: path.to_path_buf(),
                stage,
                source,
            })
        }))
}

fn parse_field(
    tokens: &[&str],
    header: &Header,
    col: usize,
    line: usize,
    what: &'static str,
) -> Result<f64, CatalogError> {
    tokens[col]
        .parse::<f64>()
        .map_err(|_| CatalogError::InvalidNumber {
            what,
            column: header[col].to_string(),
            line,
            value: tokens[col].to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn catalog(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn options() -> Options {
        Options {
            training_catalog: "train.cat".into(),
            bands_regex: vec!["f_.".into()],
            ..Options::default()
        }
    }

    const TRAINING: &str = "\

#  id  F_g  F_r  E_g  E_r  z_spec
1  10.0  20.0  1.0  2.0  0.5
2  nan   21.0  1.0  2.0  0.7

3  12.0  22.0  -1.0 2.0  9.0
# trailing comment
4  13.0  inf   1.0  2.0  0.1
";

    #[test]
    fn reads_training_catalog_with_sentinels() {
        let file = catalog(TRAINING);
        let mut opts = options();
        opts.output_max = 5.0;

        let cat = read_catalog(file.path(), &opts, CatalogMode::Training).unwrap();
        let data = &cat.data;
        assert_eq!(cat.header.len(), 6);
        assert_eq!(cat.mapping.bands, vec!["g", "r"]);
        assert_eq!(data.len(), 4);

        let err = data.input_error.as_ref().unwrap();
        assert_eq!(data.input[[0, 0]], 10.0);
        assert_eq!(err[[0, 1]], 2.0);

        // non-finite feature: value and error flagged
        assert!(data.input[[1, 0]].is_nan());
        assert!(err[[1, 0]].is_nan());
        assert_eq!(data.input[[1, 1]], 21.0);

        // negative error: value and error flagged
        assert!(data.input[[2, 0]].is_nan());
        assert!(err[[2, 0]].is_nan());

        assert!(data.input[[3, 1]].is_nan());
        assert!(err[[3, 1]].is_nan());

        // output outside [min, max] flagged, row kept
        let output = data.output.as_ref().unwrap();
        assert_eq!(output.len(), 4);
        assert!(output[2].is_nan());
        assert_eq!(output[3], 0.1);

        assert!(data.weight.is_none());
        assert!(data.ids.is_none());
    }

    #[test]
    fn luptitude_transform_runs_after_sentinels() {
        let file = catalog(TRAINING);
        let mut opts = options();
        opts.transform_inputs = "flux_to_luptitude".into();

        let cat = read_catalog(file.path(), &opts, CatalogMode::Training).unwrap();
        let data = &cat.data;
        let err = data.input_error.as_ref().unwrap();
        let k = 2.5 / std::f64::consts::LN_10;

        // band g: valid errors are 1.0 (rows 0 and 3) once the negative one is flagged
        let b: f64 = 1.0;
        let x: f64 = 10.0 / (2.0 * b);
        assert!((data.input[[0, 0]] + k * (x.asinh() + b.ln())).abs() < 1e-12);
        assert!((err[[0, 0]] - k / (1.0 + x * x).sqrt() / (2.0 * b)).abs() < 1e-12);

        // flagged cells stay flagged
        assert!(data.input[[1, 0]].is_nan() && err[[1, 0]].is_nan());
        assert!(data.input[[2, 0]].is_nan() && err[[2, 0]].is_nan());
        assert!(data.input[[3, 1]].is_nan() && err[[3, 1]].is_nan());

        // band r: every error is 2.0
        let b: f64 = 2.0;
        let x: f64 = 21.0 / (2.0 * b);
        assert!((data.input[[1, 1]] + k * (x.asinh() + b.ln())).abs() < 1e-12);
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn header_loses_a_single_comment_marker() {
        let file = catalog("## note F_g\n1 2 3\n");
        let header = read_header(file.path(), CatalogMode::Prediction).unwrap();
        assert_eq!(header.names(), ["#", "note", "f_g"]);
    }

    #[test]
    fn prediction_catalog_keeps_ids() {
        let file = catalog("# id f_g e_g\nA1 1 0.1\nB22 2 0.2\n");
        let cat = read_catalog(file.path(), &options(), CatalogMode::Prediction).unwrap();
        assert_eq!(cat.data.ids.as_deref(), Some(&["A1".to_string(), "B22".to_string()][..]));
        assert!(cat.data.output.is_none());
    }

    #[test]
    fn without_errors_only_values_are_read() {
        let file = catalog("# z_spec f_g w\n0.1 -inf 2\n0.2 3 1\n");
        let mut opts = options();
        opts.use_errors = false;
        opts.weight_column = "W".into();

        let cat = read_catalog(file.path(), &opts, CatalogMode::Training).unwrap();
        assert!(cat.data.input_error.is_none());
        assert!(cat.data.input[[0, 0]].is_nan());
        assert_eq!(cat.data.weight.unwrap().to_vec(), vec![2.0, 1.0]);
    }

    #[test]
    fn token_count_mismatch_reports_line() {
        let file = catalog("# z_spec f_g e_g\n0.1 1 0.1\n\n0.2 1\n");
        let err = read_catalog(file.path(), &options(), CatalogMode::Training).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::ColumnCount {
                line: 4,
                found: 2,
                expected: 3
            }
        ));
    }

    #[test]
    fn unparsable_required_field_is_fatal() {
        let file = catalog("# z_spec f_g e_g\n0.1 1 0.1\n0.2 1 abc\n");
        let err = read_catalog(file.path(), &options(), CatalogMode::Training).unwrap_err();
        match err {
            CatalogError::InvalidNumber { what, column, line, value } => {
                assert_eq!(what, "feature uncertainty");
                assert_eq!(column, "e_g");
                assert_eq!(line, 3);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn header_is_required() {
        let file = catalog("#\n1 2 3\n");
        let err = read_catalog(file.path(), &options(), CatalogMode::Training).unwrap_err();
        assert!(matches!(err, CatalogError::MissingHeader { .. }));
    }

    #[test]
    fn missing_file_names_the_catalog_kind() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_catalog(&dir.path().join("nope.cat"), &options(), CatalogMode::Prediction)
            .unwrap_err();
        assert!(err.to_string().starts_with("could not open prediction catalog"));
    }

    #[test]
    fn empty_catalog_gives_empty_dataset() {
        let file = catalog("# z_spec f_g e_g\n");
        let cat = read_catalog(file.path(), &options(), CatalogMode::Training).unwrap();
        assert!(cat.data.is_empty());
        assert_eq!(cat.data.num_features(), 1);
    }
}
