//! End-to-end pipeline: parameters → training or model load → prediction.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{load_config, Config, Options};
use crate::data::writer::{write_output, OutputHeader};
use crate::data::{read_catalog, CatalogMode};
use crate::engine::{ReferenceEngine, Regressor, TrainingData};
use crate::model::{read_model, write_model, Model};

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub trained: bool,
    pub model_saved: bool,
    pub model_loaded: bool,
    /// Rows written to the output catalog, if a prediction was made.
    pub predicted_rows: Option<usize>,
}

/// Load the parameter file and run the pipeline with the reference engine.
pub fn run(param_file: &Path) -> Result<RunReport> {
    let loaded = load_config(param_file)
        .with_context(|| format!("invalid parameter file '{}'", param_file.display()))?;
    let mut engine = ReferenceEngine::default();
    run_with(loaded.config, &mut engine)
}

/// Run the pipeline on an already validated configuration.
pub fn run_with(config: Config, engine: &mut dyn Regressor) -> Result<RunReport> {
    let Config {
        mut options,
        engine: settings,
        optim,
    } = config;
    engine.configure(&settings, &optim);

    let mut report = RunReport::default();
    let model_path = Path::new(&options.model_file).to_path_buf();
    let have_model = model_path.exists();

    if !options.reuse_model || !have_model {
        let hint = if have_model && options.use_model_as_hint {
            let stored = read_model(&model_path).context("could not read the hint model")?;
            options.bands = stored.bands;
            Some(stored.model)
        } else {
            None
        };

        train(&mut options, engine, hint.as_ref())?;
        report.trained = true;

        if options.save_model {
            let model = engine.model().context("engine produced no model")?;
            write_model(&model_path, &options.bands, model).context("could not save the model")?;
            report.model_saved = true;
        }
    } else {
        let stored = read_model(&model_path).context("could not load the model")?;
        options.bands = stored.bands;
        engine
            .load_model(stored.model)
            .context("an error occurred while loading the model")?;
        report.model_loaded = true;
    }

    if !options.prediction_catalog.is_empty() {
        report.predicted_rows = Some(predict(&mut options, engine)?);
    }

    Ok(report)
}

fn train(options: &mut Options, engine: &mut dyn Regressor, hint: Option<&Model>) -> Result<()> {
    let path = Path::new(&options.training_catalog).to_path_buf();
    let catalog = read_catalog(&path, options, CatalogMode::Training)
        .context("could not read the training catalog")?;
    if options.bands.is_empty() {
        options.bands = catalog.mapping.bands.clone();
    }

    let data = &catalog.data;
    let output = data
        .output
        .as_ref()
        .context("training catalog has no output column")?;

    let training = TrainingData {
        input: data.input.view(),
        input_error: data.input_error.as_ref().map(|e| e.view()),
        output: output.view(),
        weight: data.weight.as_ref().map(|w| w.view()),
    };
    engine
        .fit(training, hint)
        .context("an error occurred during the training")?;
    Ok(())
}

fn predict(options: &mut Options, engine: &mut dyn Regressor) -> Result<usize> {
    let path = Path::new(&options.prediction_catalog).to_path_buf();
    let catalog = read_catalog(&path, options, CatalogMode::Prediction)
        .context("could not read the prediction catalog")?;
    if options.bands.is_empty() {
        options.bands = catalog.mapping.bands.clone();
    }

    let data = &catalog.data;
    let prediction = engine
        .predict(data.input.view(), data.input_error.as_ref().map(|e| e.view()))
        .context("an error occurred while making predictions")?;

    let header = OutputHeader::new(options, &*engine);
    write_output(
        Path::new(&options.output_catalog),
        &header,
        data.ids.as_deref(),
        &prediction,
    )
    .context("could not write the output catalog")?;

    Ok(prediction.len())
}
