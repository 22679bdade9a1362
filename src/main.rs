mod audit;
mod cli;
mod config;
mod document;
mod error;
mod pipeline;
mod registry;
mod scheduler;
mod store;
mod tasks;
mod transitions;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audit::LogAudit;
use cli::{Cli, Command};
use config::Settings;
use scheduler::{Scheduler, SystemClock, TaskContext};

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    let store_path = settings.sentinel()?.store_path;
    let store = store::open(&store_path).await?;

    let ctx = TaskContext {
        store,
        audit: Arc::new(LogAudit),
        config: Arc::new(settings),
    };
    let clock = Arc::new(SystemClock);
    let registry = registry::assemble(&ctx, clock.clone())?;

    match cli.command {
        Command::Check => {
            ui::print_startup(&registry.report);
            if !registry.report.is_clean() {
                anyhow::bail!("{} transition(s) failed to load", registry.report.failed.len());
            }
        }
        Command::Once => {
            ui::print_startup(&registry.report);
            let scheduler = Scheduler::new(registry.tasks, ctx, clock);
            let report = scheduler.run_tick().await;
            ui::print_tick(&report);
            if let Some(e) = report.error() {
                return Err(e.into());
            }
        }
        Command::Run => {
            let handle = Scheduler::new(registry.tasks, ctx, clock).start();
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutdown requested");
            handle.stop().await;
        }
    }

    Ok(())
}
