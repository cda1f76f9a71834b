use std::path::PathBuf;
use thiserror::Error;

/// A bet refused locally, before any request reaches the dice service.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectedBet {
    #[error("invalid bet amount: {0}")]
    InvalidAmount(i64),
    #[error("insufficient balance: bet of {requested} exceeds balance of {balance}")]
    InsufficientBalance { requested: u64, balance: u64 },
}

/// Failure talking to the remote dice service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("dice service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("dice service responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed dice service response: {0}")]
    Malformed(String),
    #[error("dice service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("balance store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored balance for '{key}' is not a non-negative integer: {raw:?}")]
    Parse { key: String, raw: String },
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("applying {delta} to balance {balance} leaves the valid range")]
    OutOfRange { balance: u64, delta: i64 },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Rejected(#[from] RejectedBet),
    #[error("roll failed: {0}")]
    RollTransport(#[source] ServiceError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("verification unavailable: {0}")]
    Transport(#[from] ServiceError),
    #[error("no resolved round to verify")]
    NoRound,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum AutoBetError {
    #[error("an auto-bet run is already in progress")]
    AlreadyRunning,
    #[error("invalid auto-bet plan: {0}")]
    InvalidPlan(&'static str),
    #[error("manual bets are disabled while auto-bet is running")]
    ManualBetDuringAutoBet,
}
