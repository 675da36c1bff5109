//! Positional text format for trained models.
//!
//! ```text
//! ## GPz 1.0.0 model file
//! ## internal data (do not edit)
//! # number of features
//! 2
//! # feature column name
//! g r
//! ...
//! ## model parameters (can edit)
//! # num basis functions
//! 3
//! ...
//! # BF covariances
//! <nbasis × nfeature lines>
//! ```
//!
//! Sections come in a fixed order. Comment and blank lines between sections
//! are ignored; the rows of a matrix section follow each other directly.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayViewMut1};

use super::{Model, StoredModel};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The sections of a model file, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    FeatureCount,
    BandNames,
    FeatureMean,
    FeatureSigma,
    OutputMean,
    BasisCount,
    Weights,
    InputPrior,
    LogRelevances,
    UncertaintyWeights,
    UncertaintyLogRelevances,
    LogUncertaintyConstant,
    InvCovariance,
    Positions,
    Covariances,
}

impl Section {
    pub const FIRST: Section = Section::FeatureCount;

    /// The section that follows this one, `None` after the last.
    pub fn next(self) -> Option<Section> {
        use Section::*;
        Some(match self {
            FeatureCount => BandNames,
            BandNames => FeatureMean,
            FeatureMean => FeatureSigma,
            FeatureSigma => OutputMean,
            OutputMean => BasisCount,
            BasisCount => Weights,
            Weights => InputPrior,
            InputPrior => LogRelevances,
            LogRelevances => UncertaintyWeights,
            UncertaintyWeights => UncertaintyLogRelevances,
            UncertaintyLogRelevances => LogUncertaintyConstant,
            LogUncertaintyConstant => InvCovariance,
            InvCovariance => Positions,
            Positions => Covariances,
            Covariances => return None,
        })
    }

    /// Comment label written above the section.
    pub fn label(self) -> &'static str {
        match self {
            Section::FeatureCount => "number of features",
            Section::BandNames => "feature column name",
            Section::FeatureMean => "feature mean",
            Section::FeatureSigma => "feature sigma",
            Section::OutputMean => "output mean",
            Section::BasisCount => "num basis functions",
            Section::Weights => "BF weights",
            Section::InputPrior => "BF priors",
            Section::LogRelevances => "BF log relevances",
            Section::UncertaintyWeights => "BF uncertainty weights",
            Section::UncertaintyLogRelevances => "BF uncertainty log relevances",
            Section::LogUncertaintyConstant => "log uncertainty constant",
            Section::InvCovariance => "BF inverse covariance",
            Section::Positions => "BF positions",
            Section::Covariances => "BF covariances",
        }
    }

    fn iter() -> impl Iterator<Item = Section> {
        std::iter::successors(Some(Section::FIRST), |s| s.next())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ModelFileError {
    #[error("could not open model file '{}'", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write model file '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error reading {file}")]
    Read {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("could not read {section} from '{content}' (reading {file} on line {line})")]
    Parse {
        section: Section,
        file: String,
        line: usize,
        content: String,
    },

    #[error("unexpected end of file while reading {section} (reading {file} on line {line})")]
    UnexpectedEof {
        section: Section,
        file: String,
        line: usize,
    },

    #[error("model has {found} entries for {section}, expected {expected}")]
    Inconsistent {
        section: Section,
        found: usize,
        expected: usize,
    },
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `model` with its band names to `path`.
pub fn write_model(path: &Path, bands: &[String], model: &Model) -> Result<(), ModelFileError> {
    check_shapes(bands, model)?;

    let file = File::create(path).map_err(|source| ModelFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    write_sections(&mut out, bands, model)
        .and_then(|_| out.flush())
        .map_err(|source| ModelFileError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    log::info!(
        "wrote model with {} features and {} basis functions to '{}'",
        model.num_features(),
        model.num_basis_functions(),
        path.display()
    );
    Ok(())
}

/// Write the model text to any sink. Shapes are not checked.
pub fn write_sections<W: Write>(out: &mut W, bands: &[String], model: &Model) -> io::Result<()> {
    let params = &model.parameters;

    writeln!(out, "## GPz {} model file", crate::VERSION)?;
    writeln!(out, "## internal data (do not edit)")?;

    for section in Section::iter() {
        if section == Section::BasisCount {
            writeln!(out, "## model parameters (can edit)")?;
        }
        writeln!(out, "# {}", section.label())?;

        match section {
            Section::FeatureCount => writeln!(out, "{}", model.num_features())?,
            Section::BandNames => writeln!(out, "{}", bands.join(" "))?,
            Section::FeatureMean => write_vector(out, model.feature_mean.iter())?,
            Section::FeatureSigma => write_vector(out, model.feature_sigma.iter())?,
            Section::OutputMean => writeln!(out, "{}", model.output_mean)?,
            Section::BasisCount => writeln!(out, "{}", model.num_basis_functions())?,
            Section::Weights => write_vector(out, model.model_weights.iter())?,
            Section::InputPrior => write_vector(out, model.model_input_prior.iter())?,
            Section::LogRelevances => write_vector(out, params.basis_function_log_relevances.iter())?,
            Section::UncertaintyWeights => write_vector(out, params.uncertainty_basis_weights.iter())?,
            Section::UncertaintyLogRelevances => {
                write_vector(out, params.uncertainty_basis_log_relevances.iter())?
            }
            Section::LogUncertaintyConstant => writeln!(out, "{}", params.log_uncertainty_constant)?,
            Section::InvCovariance => write_matrix(out, &model.model_inv_covariance)?,
            Section::Positions => write_matrix(out, &params.basis_function_positions)?,
            Section::Covariances => {
                for cov in &params.basis_function_covariances {
                    write_matrix(out, cov)?;
                }
            }
        }
    }

    Ok(())
}

fn write_vector<'a, W: Write>(out: &mut W, values: impl Iterator<Item = &'a f64>) -> io::Result<()> {
    let line: Vec<String> = values.map(f64::to_string).collect();
    writeln!(out, "{}", line.join(" "))
}

fn write_matrix<W: Write>(out: &mut W, matrix: &Array2<f64>) -> io::Result<()> {
    if matrix.ncols() == 0 {
        return Ok(());
    }
    for row in matrix.rows() {
        write_vector(out, row.iter())?;
    }
    Ok(())
}

fn check_shapes(bands: &[String], model: &Model) -> Result<(), ModelFileError> {
    let nf = model.num_features();
    let nb = model.num_basis_functions();
    let params = &model.parameters;

    let mut checks = vec![
        (Section::BandNames, bands.len(), nf),
        (Section::FeatureSigma, model.feature_sigma.len(), nf),
        (Section::InputPrior, model.model_input_prior.len(), nb),
        (Section::LogRelevances, params.basis_function_log_relevances.len(), nb),
        (Section::UncertaintyWeights, params.uncertainty_basis_weights.len(), nb),
        (Section::UncertaintyLogRelevances, params.uncertainty_basis_log_relevances.len(), nb),
        (Section::InvCovariance, model.model_inv_covariance.nrows(), nb),
        (Section::InvCovariance, model.model_inv_covariance.ncols(), nb),
        (Section::Positions, params.basis_function_positions.nrows(), nb),
        (Section::Positions, params.basis_function_positions.ncols(), nf),
        (Section::Covariances, params.basis_function_covariances.len(), nb),
    ];
    for cov in &params.basis_function_covariances {
        checks.push((Section::Covariances, cov.nrows(), nf));
        checks.push((Section::Covariances, cov.ncols(), nf));
    }

    match checks.into_iter().find(|(_, found, expected)| found != expected) {
        Some((section, found, expected)) => Err(ModelFileError::Inconsistent {
            section,
            found,
            expected,
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read a model file written by [`write_model`].
pub fn read_model(path: &Path) -> Result<StoredModel, ModelFileError> {
    let file = File::open(path).map_err(|source| ModelFileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let stored = read_sections(BufReader::new(file), &path.display().to_string())?;

    log::info!(
        "read model with {} features and {} basis functions from '{}'",
        stored.model.num_features(),
        stored.model.num_basis_functions(),
        path.display()
    );
    Ok(stored)
}

/// Read model text from any source; `file` names it in diagnostics.
///
/// The feature count sizes the feature-indexed containers and the basis
/// count sizes the basis-indexed ones; every later section must fill its
/// container exactly. Anything after the last section is ignored.
pub fn read_sections<R: BufRead>(reader: R, file: &str) -> Result<StoredModel, ModelFileError> {
    let mut src = LineSource {
        lines: reader.lines(),
        line: 0,
        file: file.to_string(),
    };

    let mut bands = Vec::new();
    let mut model = Model::default();

    for section in Section::iter() {
        let params = &mut model.parameters;
        match section {
            Section::FeatureCount => {
                let nfeature = src.count(section, |n| model_values(n, 0).is_some())?;
                model = Model::zeros(nfeature, 0);
            }
            Section::BandNames => {
                let nfeature = model.num_features();
                if nfeature > 0 {
                    let line = src.next_content(section)?;
                    bands = line.split_whitespace().map(str::to_string).collect();
                    if bands.len() != nfeature {
                        return Err(src.parse_error(section, line));
                    }
                }
            }
            Section::FeatureMean => src.fill_vector(section, model.feature_mean.view_mut())?,
            Section::FeatureSigma => src.fill_vector(section, model.feature_sigma.view_mut())?,
            Section::OutputMean => model.output_mean = src.scalar(section)?,
            Section::BasisCount => {
                let nfeature = model.num_features();
                let nbasis = src.count(section, |n| model_values(nfeature, n).is_some())?;
                model.resize_basis(nbasis);
            }
            Section::Weights => src.fill_vector(section, model.model_weights.view_mut())?,
            Section::InputPrior => src.fill_vector(section, model.model_input_prior.view_mut())?,
            Section::LogRelevances => {
                src.fill_vector(section, params.basis_function_log_relevances.view_mut())?
            }
            Section::UncertaintyWeights => {
                src.fill_vector(section, params.uncertainty_basis_weights.view_mut())?
            }
            Section::UncertaintyLogRelevances => {
                src.fill_vector(section, params.uncertainty_basis_log_relevances.view_mut())?
            }
            Section::LogUncertaintyConstant => params.log_uncertainty_constant = src.scalar(section)?,
            Section::InvCovariance => {
                src.fill_matrix(section, &mut model.model_inv_covariance, true)?
            }
            Section::Positions => {
                src.fill_matrix(section, &mut params.basis_function_positions, true)?
            }
            Section::Covariances => {
                for (i, cov) in params.basis_function_covariances.iter_mut().enumerate() {
                    src.fill_matrix(section, cov, i == 0)?;
                }
            }
        }
    }

    Ok(StoredModel { bands, model })
}

/// Most values a model file may declare through its two counts.
pub const MAX_MODEL_VALUES: usize = 1 << 26;

/// Values held by a model with these counts, `None` past [`MAX_MODEL_VALUES`].
fn model_values(nfeature: usize, nbasis: usize) -> Option<usize> {
    let per_basis = nfeature
        .checked_mul(nfeature)?
        .checked_add(nfeature)?
        .checked_add(nbasis)?
        .checked_add(5)?;
    let total = nbasis
        .checked_mul(per_basis)?
        .checked_add(nfeature.checked_mul(2)?)?;
    (total <= MAX_MODEL_VALUES).then_some(total)
}

/// Parse whitespace tokens into `slots`; false unless there is exactly one
/// valid token per slot.
fn fill_tokens<'a, T: 'a>(
    line: &str,
    slots: impl Iterator<Item = &'a mut T>,
    parse: impl Fn(&str) -> Option<T>,
) -> bool {
    let mut tokens = line.split_whitespace();
    for slot in slots {
        match tokens.next().and_then(&parse) {
            Some(v) => *slot = v,
            None => return false,
        }
    }
    tokens.next().is_none()
}

struct LineSource<R> {
    lines: io::Lines<R>,
    line: usize,
    file: String,
}

impl<R: BufRead> LineSource<R> {
    fn next_raw(&mut self) -> Result<Option<String>, ModelFileError> {
        match self.lines.next() {
            None => Ok(None),
            Some(Ok(line)) => {
                self.line += 1;
                Ok(Some(line.trim().to_string()))
            }
            Some(Err(source)) => Err(ModelFileError::Read {
                file: self.file.clone(),
                source,
            }),
        }
    }

    fn eof(&self, section: Section) -> ModelFileError {
        ModelFileError::UnexpectedEof {
            section,
            file: self.file.clone(),
            line: self.line,
        }
    }

    fn parse_error(&self, section: Section, content: String) -> ModelFileError {
        ModelFileError::Parse {
            section,
            file: self.file.clone(),
            line: self.line,
            content,
        }
    }

    /// Next line that is neither blank nor a comment.
    fn next_content(&mut self, section: Section) -> Result<String, ModelFileError> {
        loop {
            match self.next_raw()? {
                None => return Err(self.eof(section)),
                Some(line) if line.is_empty() || line.starts_with('#') => continue,
                Some(line) => return Ok(line),
            }
        }
    }

    /// The line directly following the current one.
    fn next_row(&mut self, section: Section) -> Result<String, ModelFileError> {
        self.next_raw()?.ok_or_else(|| self.eof(section))
    }

    fn scalar<T: std::str::FromStr>(&mut self, section: Section) -> Result<T, ModelFileError> {
        let line = self.next_content(section)?;
        match line.parse() {
            Ok(v) => Ok(v),
            Err(_) => Err(self.parse_error(section, line)),
        }
    }

    /// A size field; rejected unless `accept` holds for it.
    fn count(&mut self, section: Section, accept: impl Fn(usize) -> bool) -> Result<usize, ModelFileError> {
        let line = self.next_content(section)?;
        match line.parse() {
            Ok(n) if accept(n) => Ok(n),
            _ => Err(self.parse_error(section, line)),
        }
    }

    /// Fill a presized vector from one line. Empty vectors take no line.
    fn fill_vector(&mut self, section: Section, mut target: ArrayViewMut1<f64>) -> Result<(), ModelFileError> {
        if target.is_empty() {
            return Ok(());
        }
        let line = self.next_content(section)?;
        if fill_tokens(&line, target.iter_mut(), |t| t.parse().ok()) {
            Ok(())
        } else {
            Err(self.parse_error(section, line))
        }
    }

    /// Fill a presized matrix, one line per row. The first row may be
    /// preceded by comments when `at_section_start`.
    fn fill_matrix(
        &mut self,
        section: Section,
        target: &mut Array2<f64>,
        at_section_start: bool,
    ) -> Result<(), ModelFileError> {
        if target.ncols() == 0 {
            return Ok(());
        }
        for (i, mut row) in target.rows_mut().into_iter().enumerate() {
            let line = if i == 0 && at_section_start {
                self.next_content(section)?
            } else {
                self.next_row(section)?
            };
            if !fill_tokens(&line, row.iter_mut(), |t| t.parse().ok()) {
                return Err(self.parse_error(section, line));
            }
        }
        Ok(())
    }
}
