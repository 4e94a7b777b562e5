use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::assets::AssetError;

mod app;
mod cli;
mod config;
mod external;
mod input;
mod state;
mod storage;
mod terminal;
mod ui;
mod workspace;

use app::App;
use cli::Cli;
use terminal::Terminal;
use workspace::Workspace;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("warning: logging disabled: {:#}", e);
    }

    let cli = Cli::parse();
    match cli.command {
        Some(command) => match cli::execute(command).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{}", e);
                eprintln!("error: {}", e);
                ExitCode::from(e.exit_code())
            }
        },
        None => match run_ui().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) if e.is::<AssetError>() => {
                eprintln!("error: {:#}", e);
                ExitCode::from(2)
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                eprintln!("error: {:#}", e);
                ExitCode::from(3)
            }
        },
    }
}

async fn run_ui() -> Result<()> {
    let workspace = Workspace::open()?;
    let mut app = App::new(workspace);

    let mut terminal = Terminal::new()?;
    let result = app.run(&mut terminal).await;
    terminal.restore()?;

    result
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,ql=info,utils=info"));

    // The UI owns the terminal, so logs go to a file
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(utils::assets::log_path()?)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    Ok(())
}
