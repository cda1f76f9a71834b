use crate::{
    dice_service::DiceService,
    error::VerifyError,
    session::{
        Round,
        SharedSession,
    },
};
use std::{
    fmt,
    sync::Arc,
};
use tracing::{
    info,
    warn,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Authentic,
    Tampered,
}

impl Verification {
    pub fn is_authentic(&self) -> bool {
        matches!(self, Verification::Authentic)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Verification::Authentic => "Roll is authentic ✅",
            Verification::Tampered => "Roll is tampered ❌",
        }
    }
}

impl From<bool> for Verification {
    fn from(valid: bool) -> Self {
        if valid {
            Verification::Authentic
        } else {
            Verification::Tampered
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Asks the dice service to confirm a past round. Never touches the ledger or
/// the seed state.
pub struct VerificationClient<S> {
    service: Arc<S>,
}

impl<S> Clone for VerificationClient<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<S: DiceService> VerificationClient<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub async fn verify(&self, round: &Round) -> Result<Verification, VerifyError> {
        let valid = self
            .service
            .verify(&round.public_seed_used, &round.server_seed, &round.hash)
            .await
            .inspect_err(|err| warn!(%err, "verification request failed"))?;
        let verdict = Verification::from(valid);
        info!(
            seed = %round.public_seed_used,
            dice = %round.dice_value,
            authentic = verdict.is_authentic(),
            "round verified"
        );
        Ok(verdict)
    }

    /// Verify the most recent round. The session lock is released before the
    /// request goes out.
    pub async fn verify_latest(
        &self,
        session: &SharedSession,
    ) -> Result<(Round, Verification), VerifyError> {
        let round = session
            .lock()
            .await
            .last_round()
            .cloned()
            .ok_or(VerifyError::NoRound)?;
        let verdict = self.verify(&round).await?;
        Ok((round, verdict))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        ledger::{
            BalanceLedger,
            DEFAULT_GAME_ID,
        },
        odds::Threshold,
        resolver::RoundResolver,
        session::Session,
        test_helpers::{
            FakeDiceService,
            InMemoryBalanceStore,
        },
    };

    async fn played_session(service: Arc<FakeDiceService>) -> SharedSession {
        let ledger =
            BalanceLedger::open(DEFAULT_GAME_ID, Box::new(InMemoryBalanceStore::new()), 1000);
        let mut session = Session::new(ledger);
        RoundResolver::new(service)
            .resolve(&mut session, 10, Threshold::default())
            .await
            .unwrap();
        session.into_shared()
    }

    #[tokio::test]
    async fn verify_latest__confirms_an_untouched_round() {
        // given
        let service = Arc::new(FakeDiceService::with_dice([5]));
        let session = played_session(service.clone()).await;
        let client = VerificationClient::new(service.clone());

        // when
        let (round, verdict) = client.verify_latest(&session).await.unwrap();

        // then
        assert_eq!(verdict, Verification::Authentic);
        assert_eq!(verdict.message(), "Roll is authentic ✅");
        assert_eq!(service.verify_calls(), 1);
        assert_eq!(Some(&round), session.lock().await.last_round());
    }

    #[tokio::test]
    async fn verify__flags_an_altered_record() {
        // given
        let service = Arc::new(FakeDiceService::with_dice([5]));
        let session = played_session(service.clone()).await;
        let client = VerificationClient::new(service);
        let original = session.lock().await.last_round().cloned().unwrap();

        let mut bad_hash = original.clone();
        bad_hash.hash = "00".repeat(32);
        let mut bad_seed = original.clone();
        bad_seed.server_seed.push('x');

        // when
        let hash_verdict = client.verify(&bad_hash).await.unwrap();
        let seed_verdict = client.verify(&bad_seed).await.unwrap();

        // then
        assert_eq!(hash_verdict, Verification::Tampered);
        assert_eq!(seed_verdict.message(), "Roll is tampered ❌");
    }

    #[tokio::test]
    async fn verify_latest__leaves_session_state_alone() {
        // given
        let service = Arc::new(FakeDiceService::with_dice([2]));
        let session = played_session(service.clone()).await;
        let (balance, seed) = {
            let guard = session.lock().await;
            (guard.balance(), guard.live_seed().clone())
        };

        // when
        VerificationClient::new(service)
            .verify_latest(&session)
            .await
            .unwrap();

        // then
        let guard = session.lock().await;
        assert_eq!(guard.balance(), balance);
        assert_eq!(guard.live_seed(), &seed);
        assert_eq!(guard.history().len(), 1);
    }

    #[tokio::test]
    async fn verify_latest__errors_without_a_round() {
        let service = Arc::new(FakeDiceService::new());
        let ledger =
            BalanceLedger::open(DEFAULT_GAME_ID, Box::new(InMemoryBalanceStore::new()), 1000);
        let session = Session::new(ledger).into_shared();

        let result = VerificationClient::new(service.clone())
            .verify_latest(&session)
            .await;

        assert!(matches!(result, Err(VerifyError::NoRound)));
        assert_eq!(service.verify_calls(), 0);
    }

    #[tokio::test]
    async fn verify__surfaces_transport_failures() {
        let service = Arc::new(FakeDiceService::with_dice([4]));
        let session = played_session(service.clone()).await;
        service.fail_verification(true);

        let result = VerificationClient::new(service)
            .verify_latest(&session)
            .await;

        assert!(matches!(result, Err(VerifyError::Transport(_))));
    }
}
