//! pktedit CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use pktedit_client::cli::{Cli, Command, ConfigAction, TemplateAction};
use pktedit_client::commands;
use pktedit_client::config::ClientConfig;
use pktedit_client::error::ClientResult;
use pktedit_core::{TemplateStore, TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(TracingConfig::for_cli(cli.debug || config.debug)) {
        eprintln!("warning: {}", e);
    }
    debug!(path = %config_path.display(), "configuration loaded");

    match run(cli, config, &config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match &cli.config {
        Some(path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
}

async fn run(cli: Cli, config: ClientConfig, config_path: &std::path::Path) -> ClientResult<()> {
    match &cli.command {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, config_path),
            ConfigAction::Path => commands::config::path(&config, config_path),
        },
        Command::Version => {
            let client = commands::connect(&cli, &config).await?;
            commands::packet::version(&client).await
        }
        Command::Tree => {
            let client = commands::connect(&cli, &config).await?;
            commands::packet::tree(&client).await
        }
        Command::Templates { action } => {
            let client = commands::connect(&cli, &config).await?;
            let store = TemplateStore::new(config.templates_dir());
            match action {
                TemplateAction::List => commands::templates::list(&store, &client).await,
                TemplateAction::Show { name } => {
                    commands::templates::show(&store, &client, name).await
                }
            }
        }
        Command::Build { input } => {
            let client = commands::connect(&cli, &config).await?;
            let mut editor = commands::editor(client, &config);
            commands::packet::build(&mut editor, input).await
        }
        Command::Decode { input } => {
            let client = commands::connect(&cli, &config).await?;
            let mut editor = commands::editor(client, &config);
            commands::packet::decode(&mut editor, input).await
        }
        Command::Encode { input, output } => {
            let client = commands::connect(&cli, &config).await?;
            let mut editor = commands::editor(client, &config);
            commands::packet::encode(&mut editor, input, output).await
        }
    }
}
