use crate::{
    ledger::BalanceLedger,
    odds::{
        DiceValue,
        Threshold,
    },
    seed::{
        PublicSeed,
        SeedManager,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How many recent dice values the board shows.
pub const HISTORY_DISPLAY_DEPTH: usize = 14;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn for_roll(dice: DiceValue, threshold: Threshold) -> Self {
        if threshold.wins(dice) {
            Outcome::Win
        } else {
            Outcome::Loss
        }
    }
}

/// A settled round, with everything needed to audit it later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub public_seed_used: PublicSeed,
    pub bet_amount: u64,
    pub threshold: Threshold,
    pub dice_value: DiceValue,
    pub server_seed: String,
    pub hash: String,
    pub outcome: Outcome,
    pub balance_after: u64,
    pub resolved_at: DateTime<Utc>,
}

impl Round {
    pub fn is_win(&self) -> bool {
        self.outcome == Outcome::Win
    }

    /// Signed balance change this round caused.
    pub fn delta(&self) -> i64 {
        match self.outcome {
            Outcome::Win => self.bet_amount as i64,
            Outcome::Loss => -(self.bet_amount as i64),
        }
    }
}

/// Append-only record of every round this session, oldest first.
#[derive(Clone, Debug, Default)]
pub struct RoundHistory {
    rounds: Vec<Round>,
}

impl RoundHistory {
    pub fn push(&mut self, round: Round) {
        self.rounds.push(round);
    }

    pub fn latest(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn get(&self, index: usize) -> Option<&Round> {
        self.rounds.get(index)
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Round> + ExactSizeIterator {
        self.rounds.iter()
    }

    pub fn dice_values(&self) -> Vec<DiceValue> {
        self.rounds.iter().map(|round| round.dice_value).collect()
    }

    /// The last `depth` dice values, oldest first.
    pub fn recent_dice(&self, depth: usize) -> Vec<DiceValue> {
        let skip = self.rounds.len().saturating_sub(depth);
        self.rounds[skip..].iter().map(|round| round.dice_value).collect()
    }

    /// The last `depth` rounds paired with their history index, newest first.
    pub fn recent_rounds(&self, depth: usize) -> Vec<(usize, Round)> {
        self.rounds
            .iter()
            .enumerate()
            .rev()
            .take(depth)
            .map(|(index, round)| (index, round.clone()))
            .collect()
    }
}

/// All per-player state for one play session.
#[derive(Debug)]
pub struct Session {
    ledger: BalanceLedger,
    seeds: SeedManager,
    history: RoundHistory,
    threshold: Threshold,
}

pub type SharedSession = Arc<Mutex<Session>>;

impl Session {
    pub fn new(ledger: BalanceLedger) -> Self {
        Self {
            ledger,
            seeds: SeedManager::new(),
            history: RoundHistory::default(),
            threshold: Threshold::default(),
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn balance(&self) -> u64 {
        self.ledger.balance()
    }

    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    pub fn live_seed(&self) -> &PublicSeed {
        self.seeds.current_seed()
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Set the threshold, clamping out-of-range requests.
    pub fn set_threshold(&mut self, requested: i64) -> Threshold {
        self.threshold = Threshold::clamped(requested);
        self.threshold
    }

    pub fn history(&self) -> &RoundHistory {
        &self.history
    }

    pub fn last_round(&self) -> Option<&Round> {
        self.history.latest()
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut BalanceLedger {
        &mut self.ledger
    }

    pub(crate) fn seeds_mut(&mut self) -> &mut SeedManager {
        &mut self.seeds
    }

    pub(crate) fn history_mut(&mut self) -> &mut RoundHistory {
        &mut self.history
    }

    pub fn snapshot(&self, round_depth: usize) -> SessionSnapshot {
        SessionSnapshot {
            balance: self.balance(),
            live_seed: self.live_seed().clone(),
            threshold: self.threshold,
            recent_dice: self.history.recent_dice(HISTORY_DISPLAY_DEPTH),
            last_round: self.history.latest().cloned(),
            recent_rounds: self.history.recent_rounds(round_depth),
            round_count: self.history.len(),
        }
    }
}

/// Point-in-time copy of the session for rendering.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub balance: u64,
    pub live_seed: PublicSeed,
    pub threshold: Threshold,
    pub recent_dice: Vec<DiceValue>,
    pub last_round: Option<Round>,
    pub recent_rounds: Vec<(usize, Round)>,
    pub round_count: usize,
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        ledger::DEFAULT_GAME_ID,
        test_helpers::{
            InMemoryBalanceStore,
            round_with,
        },
    };

    fn session() -> Session {
        let ledger =
            BalanceLedger::open(DEFAULT_GAME_ID, Box::new(InMemoryBalanceStore::new()), 1000);
        Session::new(ledger)
    }

    #[test]
    fn set_threshold__clamps_to_range() {
        let mut session = session();
        assert_eq!(session.set_threshold(1).get(), 2);
        assert_eq!(session.set_threshold(9).get(), 6);
        assert_eq!(session.threshold().get(), 6);
    }

    #[test]
    fn recent_dice__keeps_only_the_display_window() {
        // given
        let mut history = RoundHistory::default();
        for n in 0..20u8 {
            history.push(round_with(n % 6 + 1, 4));
        }

        // when
        let recent = history.recent_dice(HISTORY_DISPLAY_DEPTH);

        // then
        assert_eq!(recent.len(), HISTORY_DISPLAY_DEPTH);
        assert_eq!(recent.last(), history.latest().map(|r| &r.dice_value));
        assert_eq!(history.dice_values().len(), 20);
    }

    #[test]
    fn recent_rounds__lists_newest_first_with_indices() {
        let mut history = RoundHistory::default();
        history.push(round_with(1, 4));
        history.push(round_with(5, 4));
        history.push(round_with(6, 4));

        let recent = history.recent_rounds(2);

        let indices: Vec<usize> = recent.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2, 1]);
        assert_eq!(recent[0].1.dice_value.get(), 6);
    }

    #[test]
    fn round__serializes_with_camel_case_fields() {
        let round = round_with(5, 4);
        let json = serde_json::to_value(&round).unwrap();
        assert_eq!(json["diceValue"], 5);
        assert_eq!(json["outcome"], "win");
        assert!(json.get("publicSeedUsed").is_some());
    }

    #[test]
    fn snapshot__reflects_live_state() {
        let session = session();
        let snapshot = session.snapshot(10);
        assert_eq!(snapshot.balance, 1000);
        assert_eq!(&snapshot.live_seed, session.live_seed());
        assert!(snapshot.last_round.is_none());
        assert_eq!(snapshot.round_count, 0);
    }
}
