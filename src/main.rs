use anyhow::Context;
use batchgen::batch::BatchDriver;
use batchgen::cli::CliOptions;
use batchgen::config::{BatchConfig, setup_logging};
use clap::Parser;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliOptions::parse();

    setup_logging(cli.shared().debug).ok();

    let config = BatchConfig::from_cli(&cli)
        .inspect_err(|err| error!("fatal: {err}"))
        .context("Invalid configuration")?;

    let mut driver = BatchDriver::new(config)?;
    let report = driver
        .run()
        .await
        .inspect_err(|err| error!("fatal: {err}"))
        .context("Batch could not start")?;

    if report.failed() > 0 {
        error!(
            "{} of {} items failed, see warnings above",
            report.failed(),
            report.outcomes.len()
        );
    }
    println!("Done.");
    Ok(())
}
