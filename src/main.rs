use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Train and apply a sparse Gaussian-process regression on ASCII catalogs.
///
/// All settings come from the parameter file (`KEY = value` lines).
#[derive(Parser, Debug)]
#[command(name = "gpz")]
#[command(about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Parameter file
    #[arg(value_name = "PARAM_FILE", default_value = "gpz.param")]
    param_file: PathBuf,

    /// Print version (with build id) and exit
    #[arg(short = 'V', long)]
    version: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version {
        println!("gpz {}", gpz::version_string());
        return ExitCode::SUCCESS;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("gpz {}", gpz::version_string());

    match gpz::run::run(&cli.param_file) {
        Ok(report) => {
            log::debug!("{report:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
