use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Instrument;

use rbac_webhook::testharness::Scenario;

#[derive(Parser, Debug)]
struct Cli {
    #[clap(subcommand)]
    subcommand: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Test(TestArgs),
}

#[derive(Args, Debug)]
struct TestArgs {
    #[clap(value_parser)]
    scenario_paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .compact()
        .without_time()
        .init();

    let cli = Cli::parse();

    match cli.subcommand {
        Commands::Test(args) => cli_test(args).await,
    }
}

async fn cli_test(args: TestArgs) -> Result<()> {
    for path in args.scenario_paths {
        let span = tracing::info_span!("scenario", path = %path.display());
        run_scenario(&path)
            .instrument(span)
            .await
            .with_context(|| format!("failed scenario {}", path.display()))?;
    }
    Ok(())
}

async fn run_scenario(path: &std::path::Path) -> Result<()> {
    let scenario = Scenario::load(path).context("failed to load scenario")?;
    scenario.check().await?;
    tracing::info!("passed");
    Ok(())
}
