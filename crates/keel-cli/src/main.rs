//! Keel CLI - Inspect and edit provenance-tracked records.

use clap::Parser;
use keel_cli::commands;
use keel_cli::{Cli, Command, Config, Context, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr so table and JSON output stay clean; `KEEL_LOG` sets the filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("KEEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run() -> keel_cli::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_init(&Config::path()?)?,
    };
    if let Some(database) = cli.database {
        config.storage.database = Some(database);
    }

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    let ctx = Context::new(config, formatter)?;

    match cli.command {
        Command::Records => commands::execute_records(&ctx)?,
        Command::History(args) => commands::execute_history(args, &ctx)?,
        Command::Show(args) => commands::execute_show(args, &ctx)?,
        Command::Check(args) => commands::execute_check(args, &ctx)?,
        Command::Import(args) => commands::execute_import(args, &ctx)?,
        Command::Edit(args) => commands::execute_edit(args, &ctx).await?,
        Command::Lock(args) => commands::execute_lock(args, &ctx).await?,
        Command::Draft(args) => commands::execute_draft(args, &ctx)?,
        Command::Registry(args) => commands::execute_registry(args, &ctx)?,
    }

    Ok(())
}
