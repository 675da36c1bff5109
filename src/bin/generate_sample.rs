use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gpz::rng::SimpleRng;

/// Write a synthetic training/prediction catalog pair and a matching
/// parameter file.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Cli {
    /// Directory receiving train.cat, pred.cat and gpz.param
    #[arg(default_value = ".")]
    out_dir: PathBuf,

    /// Rows in the training catalog
    #[arg(long, default_value_t = 2000)]
    train_rows: usize,

    /// Rows in the prediction catalog
    #[arg(long, default_value_t = 500)]
    pred_rows: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Effective wavelengths (micron) of the synthetic bands.
const BANDS: [(&str, f64); 5] = [("u", 0.36), ("g", 0.47), ("r", 0.62), ("i", 0.75), ("z", 0.89)];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Continuum plus a 4000 Å break bump, observed at redshift `z`.
fn band_flux(wavelength: f64, z: f64, luminosity: f64) -> f64 {
    let rest = wavelength / (1.0 + z);
    let continuum = 0.2 + 0.8 * (rest / 0.4).min(1.5);
    luminosity * (continuum + gaussian(rest, 0.55, 0.12, 0.6))
}

struct Galaxy {
    z: f64,
    flux: Vec<f64>,
    error: Vec<f64>,
}

fn draw_galaxy(rng: &mut SimpleRng) -> Galaxy {
    let z = 0.05 + 1.45 * rng.next_f64();
    let luminosity = 10f64.powf(rng.gauss(1.0, 0.3));

    let mut flux = Vec::with_capacity(BANDS.len());
    let mut error = Vec::with_capacity(BANDS.len());
    for &(_, wavelength) in &BANDS {
        let truth = band_flux(wavelength, z, luminosity);
        let sigma = 0.05 * truth + 0.1;
        flux.push(truth + rng.gauss(0.0, sigma));
        error.push(sigma);
    }

    Galaxy { z, flux, error }
}

fn write_catalog(path: &Path, galaxies: &[Galaxy], with_output: bool) -> Result<()> {
    let file = File::create(path).with_context(|| format!("could not create '{}'", path.display()))?;
    let mut out = BufWriter::new(file);

    write!(out, "# id")?;
    for (name, _) in BANDS {
        write!(out, " F_{name}")?;
    }
    for (name, _) in BANDS {
        write!(out, " E_{name}")?;
    }
    if with_output {
        write!(out, " z_spec")?;
    }
    writeln!(out)?;

    for (i, g) in galaxies.iter().enumerate() {
        write!(out, "{}", i + 1)?;
        for v in g.flux.iter().chain(&g.error) {
            write!(out, " {v:.6}")?;
        }
        if with_output {
            write!(out, " {:.5}", g.z)?;
        }
        writeln!(out)?;
    }

    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut rng = SimpleRng::new(cli.seed);

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("could not create '{}'", cli.out_dir.display()))?;

    let train: Vec<Galaxy> = (0..cli.train_rows).map(|_| draw_galaxy(&mut rng)).collect();
    let pred: Vec<Galaxy> = (0..cli.pred_rows).map(|_| draw_galaxy(&mut rng)).collect();

    write_catalog(&cli.out_dir.join("train.cat"), &train, true)?;
    write_catalog(&cli.out_dir.join("pred.cat"), &pred, false)?;

    let params = "\
# synthetic demo parameters
TRAINING_CATALOG = train.cat
PREDICTION_CATALOG = pred.cat
OUTPUT_CATALOG = gpz.cat
MODEL_FILE = gpz_model.dat
OUTPUT_COLUMN = z_spec
FLUX_COLUMN_PREFIX = F_
ERROR_COLUMN_PREFIX = E_
USE_ERRORS = 1
BANDS = [.]
TRANSFORM_INPUTS = flux_to_luptitude
NUM_BF = 100
";
    let param_path = cli.out_dir.join("gpz.param");
    std::fs::write(&param_path, params)
        .with_context(|| format!("could not write '{}'", param_path.display()))?;

    println!(
        "Wrote {} training and {} prediction rows ({} bands) to {}",
        train.len(),
        pred.len(),
        BANDS.len(),
        cli.out_dir.display()
    );
    Ok(())
}
