//! Riverbank adaptation classifier - Main Entry Point

use clap::Parser;
use riverbank_adapt::cli::{cmd_generate, cmd_info, cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "riverbank_adapt=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, output, seed, test_size, fit_encoders_on, estimators } => {
            cmd_train(&data, &output, seed, test_size, fit_encoders_on.into(), estimators)?;
        }
        Commands::Predict { artifacts, input } => {
            cmd_predict(&artifacts, &input)?;
        }
        Commands::Serve { artifacts, host, port } => {
            cmd_serve(artifacts, host, port).await?;
        }
        Commands::Generate { rows, output, seed } => {
            cmd_generate(rows, &output, seed)?;
        }
        Commands::Info { artifacts } => {
            cmd_info(&artifacts)?;
        }
    }

    Ok(())
}
