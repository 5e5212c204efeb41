mod cli;
mod ui;

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardflow::config::CardflowConfig;
use cardflow::model::BoardId;
use cardflow::reconcile::Reconciler;
use cardflow::sync::HttpBoardService;
use cardflow::view::ActiveBoard;
use cli::{Cli, Command};

/// Logs go to stderr so they never interleave with the rendered board.
fn init_tracing(verbose: bool) {
    let default = if verbose { "cardflow=debug" } else { "cardflow=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<CardflowConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = CardflowConfig::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
        None => CardflowConfig::load()?,
    };
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    if let Some(board) = &cli.board {
        config.board_id = Some(board.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(&cli)?;
    let Some(board_id) = config.board_id.clone() else {
        bail!("no board selected: pass --board or set board_id in cardflow.toml");
    };
    if let Command::Show { archived: true } = cli.command {
        config.view.show_archived = true;
    }

    let service = HttpBoardService::with_timeouts(
        config.base_url.clone(),
        config.api_key(),
        config.connect_timeout(),
        config.request_timeout(),
    )
    .context("failed to build HTTP client")?;
    let reconciler = Reconciler::new(service, config.roles.clone());
    reconciler.load(&BoardId::new(board_id)).await?;

    let mut code = ExitCode::SUCCESS;
    if let Some(intent) = cli.command.intent()? {
        let operation = intent.name();
        let progress = ui::SyncProgress::start(operation);
        let result = reconciler.dispatch(intent).await;
        progress.finish(operation, &result);
        if result.is_err() {
            code = ExitCode::FAILURE;
        }
        if reconciler.needs_reload() {
            reconciler.reload().await?;
            ui::print_reloaded();
        }
    }

    if let Some(board) = reconciler.board() {
        println!();
        ui::render_board(&ActiveBoard::new(&board, &config.view));
    }
    Ok(code)
}
