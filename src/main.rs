// scantag - Serial barcode scanner to OPC UA bridge

use anyhow::Context;
use clap::Parser;
use scantag::cli::{Cli, Commands, RunCommand};
use scantag::output;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let command = match cli.command {
        Some(command) => command,
        None => Commands::Run(RunCommand::defaults()?),
    };

    match command {
        Commands::Run(run) => {
            let report = run
                .execute(cli.config.as_deref(), cli.verbose)
                .await
                .context("scantag failed to start")?;
            Ok(if report.is_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Config(config) => {
            config
                .execute(cli.config.as_deref())
                .await
                .context("config command failed")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
