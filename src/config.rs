use crate::{
    auto_bet::DEFAULT_AUTO_INTERVAL,
    dice_service::{
        DiceBackend,
        HttpDiceService,
        LocalDiceService,
        http::{
            DEFAULT_BASE_URL,
            DEFAULT_REQUEST_TIMEOUT,
        },
    },
    error::ServiceError,
    ledger::{
        DEFAULT_GAME_ID,
        DEFAULT_STARTING_BALANCE,
    },
};
use clap::Parser;
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_DATA_DIR: &str = "~/.roll-over-dice";

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Provably-fair roll-over dice in the terminal", long_about = None)]
pub struct AppConfig {
    /// Base URL of the dice service
    #[arg(long, default_value = DEFAULT_BASE_URL, conflicts_with = "offline")]
    pub backend_url: String,

    /// Roll against locally generated commitments instead of the hosted service
    #[arg(long)]
    pub offline: bool,

    /// Where the balance is kept between runs
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,

    /// Storage key for the balance
    #[arg(long, default_value = DEFAULT_GAME_ID)]
    pub game_id: String,

    #[arg(long, default_value_t = DEFAULT_STARTING_BALANCE)]
    pub starting_balance: u64,

    #[arg(
        long,
        default_value_t = DEFAULT_AUTO_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub auto_interval_ms: u64,

    #[arg(
        long,
        default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_secs: u64,

    /// Log directory, defaults to `<data-dir>/logs`
    #[arg(long)]
    pub log_dir: Option<String>,
}

impl AppConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }

    pub fn log_dir(&self) -> PathBuf {
        match &self.log_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => self.data_dir().join("logs"),
        }
    }

    pub fn auto_interval(&self) -> Duration {
        Duration::from_millis(self.auto_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backend(&self) -> Result<DiceBackend, ServiceError> {
        if self.offline {
            return Ok(DiceBackend::Offline(LocalDiceService::new()));
        }
        let service = HttpDiceService::new(self.backend_url.clone(), self.request_timeout())?;
        Ok(DiceBackend::Remote(service))
    }
}
