use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use roll_over_dice::config::AppConfig;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

// The terminal owns stdout, so logs go to a daily file instead.
fn init_tracing(config: &AppConfig) -> Result<WorkerGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .wrap_err_with(|| format!("creating log directory {}", log_dir.display()))?;
    let appender = rolling::daily(&log_dir, "roll-over-dice.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("installing tracing subscriber: {err}"))?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = AppConfig::parse();
    let _guard = init_tracing(&config)?;
    tracing::info!(?config, "starting roll-over dice");
    client::run_app(config).await
}
