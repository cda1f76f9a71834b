use crate::{
    error::ServiceError,
    odds::DiceValue,
    seed::PublicSeed,
};

pub mod http;
pub mod local;

pub use http::HttpDiceService;
pub use local::LocalDiceService;

/// What the service commits to for one roll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollOutcome {
    pub dice: DiceValue,
    pub hash: String,
    pub server_seed: String,
}

/// The two operations of the provably-fair dice service.
pub trait DiceService: Send + Sync {
    /// Request a fresh commitment and dice value for `public_seed`.
    fn roll(
        &self,
        public_seed: &PublicSeed,
    ) -> impl Future<Output = Result<RollOutcome, ServiceError>> + Send;

    /// Ask whether `original_hash` really commits to the seed pair.
    fn verify(
        &self,
        public_seed: &PublicSeed,
        server_seed: &str,
        original_hash: &str,
    ) -> impl Future<Output = Result<bool, ServiceError>> + Send;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendMode {
    Remote,
    Offline,
}

/// Runtime choice between the hosted service and the offline stand-in.
#[derive(Clone, Debug)]
pub enum DiceBackend {
    Remote(HttpDiceService),
    Offline(LocalDiceService),
}

impl DiceBackend {
    pub fn mode(&self) -> BackendMode {
        match self {
            DiceBackend::Remote(_) => BackendMode::Remote,
            DiceBackend::Offline(_) => BackendMode::Offline,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DiceBackend::Remote(service) => format!("remote ({})", service.base_url()),
            DiceBackend::Offline(_) => String::from("offline (local commitments)"),
        }
    }
}

impl DiceService for DiceBackend {
    async fn roll(&self, public_seed: &PublicSeed) -> Result<RollOutcome, ServiceError> {
        match self {
            DiceBackend::Remote(service) => service.roll(public_seed).await,
            DiceBackend::Offline(service) => service.roll(public_seed).await,
        }
    }

    async fn verify(
        &self,
        public_seed: &PublicSeed,
        server_seed: &str,
        original_hash: &str,
    ) -> Result<bool, ServiceError> {
        match self {
            DiceBackend::Remote(service) => {
                service.verify(public_seed, server_seed, original_hash).await
            }
            DiceBackend::Offline(service) => {
                service.verify(public_seed, server_seed, original_hash).await
            }
        }
    }
}
