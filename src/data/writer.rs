use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::error::CatalogError;
use crate::config::Options;
use crate::engine::settings::{
    CovarianceType, NormalizationScheme, OutputUncertaintyType, PriorMeanFunction, WeightingScheme,
};
use crate::engine::{Prediction, Regressor};

const ID_MAX_WIDTH: usize = 7;
const VALUE_WIDTH: usize = 15;
const VALUE_COLUMNS: [&str; 5] = ["value", "uncertainty", "var.density", "var.tr.noise", "var.in.noise"];

/// Descriptive banner of an output catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputHeader {
    pub version: String,
    pub training_catalog: String,
    pub prediction_catalog: String,
    pub num_features: usize,
    pub num_basis_functions: usize,
    pub prior_mean: PriorMeanFunction,
    pub weighting_scheme: WeightingScheme,
    pub normalization_scheme: NormalizationScheme,
    pub covariance: CovarianceType,
    pub output_uncertainty: OutputUncertaintyType,
}

impl OutputHeader {
    pub fn new(opts: &Options, engine: &dyn Regressor) -> Self {
        Self {
            version: crate::version_string(),
            training_catalog: opts.training_catalog.clone(),
            prediction_catalog: opts.prediction_catalog.clone(),
            num_features: engine.num_features(),
            num_basis_functions: engine.num_basis_functions(),
            prior_mean: engine.prior_mean_function(),
            weighting_scheme: engine.weighting_scheme(),
            normalization_scheme: engine.normalization_scheme(),
            covariance: engine.covariance_type(),
            output_uncertainty: engine.output_uncertainty_type(),
        }
    }
}

/// Write predictions to `path`, one row per prediction row.
///
/// `ids` are printed in a leading column when present and non-empty.
pub fn write_output(
    path: &Path,
    header: &OutputHeader,
    ids: Option<&[String]>,
    prediction: &Prediction,
) -> Result<(), CatalogError> {
    let write_err = |source| CatalogError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut out = BufWriter::new(file);
    write_predictions(&mut out, header, ids, prediction).map_err(write_err)?;
    out.flush().map_err(write_err)?;

    log::info!("wrote {} predictions to '{}'", prediction.len(), path.display());
    Ok(())
}

pub fn write_predictions<W: Write>(
    out: &mut W,
    header: &OutputHeader,
    ids: Option<&[String]>,
    prediction: &Prediction,
) -> io::Result<()> {
    writeln!(out, "# GPz version: {}", header.version)?;
    writeln!(out, "# Training catalog file:   {}", header.training_catalog)?;
    writeln!(out, "# Prediction catalog file: {}", header.prediction_catalog)?;
    writeln!(out, "# Number of features:         {}", header.num_features)?;
    writeln!(out, "# Number of basis functions:  {}", header.num_basis_functions)?;
    writeln!(out, "# Prior mean function:        {}", header.prior_mean)?;
    writeln!(out, "# Weighting scheme:           {}", header.weighting_scheme)?;
    writeln!(out, "# Input normalization scheme: {}", header.normalization_scheme)?;
    writeln!(
        out,
        "# Covariance type:            {} ({})",
        header.covariance,
        header.covariance.code()
    )?;
    writeln!(out, "# Output uncertainty type:    {}", header.output_uncertainty)?;

    let ids = ids.filter(|ids| !ids.is_empty());
    let id_width = ids
        .and_then(|ids| ids.iter().map(String::len).max())
        .map_or(ID_MAX_WIDTH, |longest| (longest + 1).min(ID_MAX_WIDTH));

    write!(out, "#")?;
    if ids.is_some() {
        write!(out, "{:>id_width$}", "id")?;
    }
    for name in VALUE_COLUMNS {
        write!(out, "{name:>VALUE_WIDTH$}")?;
    }
    writeln!(out)?;

    let columns = [
        &prediction.value,
        &prediction.uncertainty,
        &prediction.variance_train_density,
        &prediction.variance_train_noise,
        &prediction.variance_input_noise,
    ];
    for row in 0..prediction.len() {
        if let Some(ids) = ids {
            let id = ids.get(row).map_or("", String::as_str);
            write!(out, "{id:>id_width$}")?;
        }
        for column in columns {
            write!(out, "{:>VALUE_WIDTH$}", format_scientific(column[row]))?;
        }
        writeln!(out)?;
    }

    Ok(())
}

/// `1.234560e+00` style: six fractional digits, signed exponent of at least
/// two digits.
pub fn format_scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let raw = format!("{value:.6e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => raw,
    }
}
