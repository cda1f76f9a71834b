//! Settles one bet against the dice service.
//!
//! Ordering inside [`RoundResolver::resolve`] is fixed: the live seed is
//! captured, the roll is requested with it, the ledger is settled, and only
//! then is the seed rotated. A failed roll stops before settlement, so the
//! balance and the live seed are left exactly as they were. Once a roll has
//! come back the seed is spent, even if settlement then fails.
//!
//! Settlement is even money. The multiplier in [`crate::odds`] is shown to the
//! player but does not scale payouts.

use crate::{
    dice_service::DiceService,
    error::{
        RejectedBet,
        ResolveError,
    },
    odds::Threshold,
    session::{
        Outcome,
        Round,
        Session,
    },
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{
    debug,
    error,
    info,
    warn,
};

/// Admit a bet against the current balance.
pub fn check_bet(bet_amount: i64, balance: u64) -> Result<u64, RejectedBet> {
    if bet_amount <= 0 {
        return Err(RejectedBet::InvalidAmount(bet_amount));
    }
    let requested = bet_amount as u64;
    if requested > balance {
        return Err(RejectedBet::InsufficientBalance { requested, balance });
    }
    Ok(requested)
}

pub struct RoundResolver<S> {
    service: Arc<S>,
}

impl<S> Clone for RoundResolver<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<S: DiceService> RoundResolver<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub async fn resolve(
        &self,
        session: &mut Session,
        bet_amount: i64,
        threshold: Threshold,
    ) -> Result<Round, ResolveError> {
        let amount = check_bet(bet_amount, session.balance()).inspect_err(|rejected| {
            debug!(bet_amount, %rejected, "bet rejected before roll");
        })?;

        let seed_used = session.live_seed().clone();
        let rolled = self.service.roll(&seed_used).await.map_err(|err| {
            warn!(seed = %seed_used, %err, "roll failed; live seed kept for retry");
            ResolveError::RollTransport(err)
        })?;

        let outcome = Outcome::for_roll(rolled.dice, threshold);
        let delta = match outcome {
            Outcome::Win => bet_amount,
            Outcome::Loss => -bet_amount,
        };
        // The server has seen this seed, so it is retired even when settling fails.
        let balance_after = match session.ledger_mut().apply_delta(delta) {
            Ok(balance) => balance,
            Err(err) => {
                session.seeds_mut().rotate();
                error!(seed = %seed_used, %err, "roll succeeded but settlement failed");
                return Err(err.into());
            }
        };

        let round = Round {
            public_seed_used: seed_used,
            bet_amount: amount,
            threshold,
            dice_value: rolled.dice,
            server_seed: rolled.server_seed,
            hash: rolled.hash,
            outcome,
            balance_after,
            resolved_at: Utc::now(),
        };
        session.history_mut().push(round.clone());
        session.seeds_mut().rotate();

        info!(
            dice = %round.dice_value,
            threshold = %threshold,
            bet = amount,
            outcome = ?outcome,
            balance = balance_after,
            "round settled"
        );
        Ok(round)
    }
}
