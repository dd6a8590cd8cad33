//! `monolayer` applies one OCI image layer onto a root filesystem.
//!
//! ## Usage
//!
//! ```bash
//! MONOLAYER_ROOTFS=/var/lib/rootfs monolayer /tmp/layer.tar.gz
//! ```
//!
//! The root filesystem may also be set in a `.env` file in the working directory. Every failure,
//! including a usage error, exits with status 255.

use std::process::ExitCode;

use clap::{error::ErrorKind, Parser};
use monolayer::{cli::MonolayerArgs, config::ApplyConfig, layer, LayerResult, ABORT_EXIT_CODE};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match MonolayerArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            return abort_code();
        }
    };

    dotenvy::dotenv().ok();
    init_logging(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("monolayer: {:?}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

async fn run(args: MonolayerArgs) -> LayerResult<()> {
    let config = ApplyConfig::from_env()?;
    let report = layer::apply_layer_async(args.layer, config).await?;
    tracing::debug!("{:?}", report);
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn abort_code() -> ExitCode {
    ExitCode::from(ABORT_EXIT_CODE as u8)
}
