use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use gpz::config::{load_config, ConfigError, Options};
use gpz::data::{read_catalog, CatalogMode, FeatureColumn, ResolveWarning};
use gpz::model::read_model;
use gpz::run::run;
use tempfile::TempDir;

fn training_text(rows: usize) -> String {
    let mut text = String::from("# id F_g F_r E_g E_r z_spec\n");
    for i in 0..rows {
        let z = 0.05 + 1.5 * i as f64 / rows as f64;
        let g = 20.0 + 5.0 * z + (i as f64 * 0.7).sin();
        let r = 18.0 + 8.0 * z + (i as f64 * 1.3).cos();
        writeln!(text, "{} {g:.4} {r:.4} 0.2 0.3 {z:.4}", i + 1).unwrap();
    }
    text
}

fn prediction_text(rows: usize) -> String {
    let mut text = String::from("# id F_g F_r E_g E_r\n");
    for i in 0..rows {
        let z = 0.1 + i as f64 * 0.1;
        writeln!(text, "obj{i} {:.4} {:.4} 0.2 0.3", 20.0 + 5.0 * z, 18.0 + 8.0 * z).unwrap();
    }
    text
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn scenario_options() -> Options {
    Options {
        flux_column_prefix: "F".into(),
        error_column_prefix: "E".into(),
        use_errors: true,
        bands_regex: vec!["F_.".into()],
        ..Options::default()
    }
}

#[test]
fn scenario_a_trains_and_saves_then_predicts_from_saved_model() {
    let dir = TempDir::new().unwrap();
    let train = write(dir.path(), "train.cat", &training_text(60));
    let model = dir.path().join("gpz_model.dat");
    let output = dir.path().join("gpz.cat");

    let params = format!(
        "TRAINING_CATALOG = {}\nOUTPUT_COLUMN = z_spec\nSAVE_MODEL = 1\nMODEL_FILE = {}\n\
         OUTPUT_CATALOG = {}\nBANDS = [F_.]\nNUM_BF = 8\n",
        train.display(),
        model.display(),
        output.display()
    );
    let param_file = write(dir.path(), "gpz.param", &params);

    let report = run(&param_file).unwrap();
    assert!(report.trained);
    assert!(report.model_saved);
    assert_eq!(report.predicted_rows, None);

    let text = fs::read_to_string(&model).unwrap();
    assert!(text.starts_with("## GPz "));
    let stored = read_model(&model).unwrap();
    assert_eq!(stored.bands, vec!["g", "r"]);
    assert_eq!(stored.model.num_features(), 2);
    assert_eq!(stored.model.num_basis_functions(), 8);

    // Second run reuses the stored model and predicts.
    let pred = write(dir.path(), "pred.cat", &prediction_text(5));
    let params = format!("{params}PREDICTION_CATALOG = {}\n", pred.display());
    let param_file = write(dir.path(), "gpz.param", &params);

    let report = run(&param_file).unwrap();
    assert!(!report.trained);
    assert!(report.model_loaded);
    assert_eq!(report.predicted_rows, Some(5));

    let out = fs::read_to_string(&output).unwrap();
    let rows: Vec<&str> = out.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(rows.len(), 5);
    assert!(rows[0].trim_start().starts_with("obj0"));
    assert_eq!(rows[0].split_whitespace().count(), 6);
    assert!(out.contains("# Number of basis functions:  8"));
}

#[test]
fn hint_model_seeds_training_and_fixes_bands() {
    let dir = TempDir::new().unwrap();
    let train = write(dir.path(), "train.cat", &training_text(60));
    let model = dir.path().join("gpz_model.dat");
    let output = dir.path().join("gpz.cat");

    let base = format!(
        "TRAINING_CATALOG = {}\nMODEL_FILE = {}\nOUTPUT_CATALOG = {}\nBANDS = [F_.]\n",
        train.display(),
        model.display(),
        output.display()
    );
    let param_file = write(dir.path(), "gpz.param", &format!("{base}NUM_BF = 8\n"));
    run(&param_file).unwrap();

    // Retrain with fewer requested basis functions: the hint's 8 win.
    let hinted = format!("{base}NUM_BF = 3\nREUSE_MODEL = 0\nUSE_MODEL_AS_HINT = 1\n");
    let param_file = write(dir.path(), "gpz.param", &hinted);
    let report = run(&param_file).unwrap();
    assert!(report.trained);
    assert!(!report.model_loaded);
    let stored = read_model(&model).unwrap();
    assert_eq!(stored.model.num_basis_functions(), 8);
    assert_eq!(stored.bands, vec!["g", "r"]);

    // A training catalog with other bands conflicts with the hint.
    let other = training_text(60).replace("F_r", "F_i").replace("E_r", "E_i");
    fs::write(&train, other).unwrap();
    let err = run(&param_file).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("stored model"), "{message}");
    assert!(message.contains("training catalog"), "{message}");
}

#[test]
fn scenario_b_resolves_sorted_bands_with_error_pairs() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "pred.cat",
        "# id F_r F_g E_g E_r\n1 1.0 2.0 0.1 0.2\n2 3.0 4.0 0.3 0.4\n",
    );

    let catalog = read_catalog(&path, &scenario_options(), CatalogMode::Prediction).unwrap();
    assert_eq!(catalog.mapping.bands, vec!["g", "r"]);
    assert_eq!(
        catalog.mapping.features,
        vec![
            FeatureColumn { value: 2, error: Some(3) },
            FeatureColumn { value: 1, error: Some(4) },
        ]
    );
    assert_eq!(catalog.data.input[[0, 0]], 2.0);
    assert_eq!(catalog.data.input[[0, 1]], 1.0);
    assert_eq!(catalog.data.ids, Some(vec!["1".to_string(), "2".to_string()]));
}

#[test]
fn scenario_c_missing_error_column_drops_band() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "pred.cat",
        "# id F_g F_r E_g\n1 1.0 2.0 0.1\n",
    );

    let catalog = read_catalog(&path, &scenario_options(), CatalogMode::Prediction).unwrap();
    assert_eq!(catalog.mapping.bands, vec!["g"]);
    assert_eq!(catalog.data.num_features(), 1);
    assert!(matches!(
        catalog.mapping.warnings.as_slice(),
        [ResolveWarning::MissingErrorColumn { .. }]
    ));
}

#[test]
fn scenario_d_output_overwriting_training_catalog_is_rejected_before_io() {
    let dir = TempDir::new().unwrap();
    let train = dir.path().join("never_created.cat");
    let params = format!(
        "TRAINING_CATALOG = {0}\nOUTPUT_CATALOG = {0}\nMODEL_FILE = {1}\n",
        train.display(),
        dir.path().join("model.dat").display()
    );
    let param_file = write(dir.path(), "gpz.param", &params);

    let err = load_config(&param_file).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutputOverwrites { target: "training catalog", .. }
    ));
    assert!(!train.exists());

    assert!(run(&param_file).is_err());
}

#[test]
fn out_of_range_outputs_become_nan_without_dropping_rows() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "train.cat", &training_text(20));
    let opts = Options {
        output_column: "z_spec".into(),
        output_min: 0.2,
        output_max: 1.0,
        ..scenario_options()
    };

    let catalog = read_catalog(&path, &opts, CatalogMode::Training).unwrap();
    let output = catalog.data.output.unwrap();
    assert_eq!(output.len(), 20);
    assert!(output[0].is_nan());
    assert!(output.iter().filter(|v| v.is_finite()).all(|v| (0.2..=1.0).contains(v)));
}
