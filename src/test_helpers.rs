use crate::{
    dice_service::{
        DiceService,
        RollOutcome,
        local::commitment_hex,
    },
    error::{
        ServiceError,
        StoreError,
    },
    ledger::{
        BalanceStore,
        decode_balance,
        encode_balance,
    },
    odds::{
        DiceValue,
        Threshold,
    },
    seed::PublicSeed,
    session::{
        Outcome,
        Round,
    },
};
use chrono::Utc;
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::time::Instant;

#[derive(Default)]
struct FakeDiceState {
    scripted: VecDeque<u8>,
    failing_rolls: usize,
    failing_verification: bool,
    roll_delays: VecDeque<Duration>,
    roll_started_at: Vec<Instant>,
    issued: Vec<(PublicSeed, String, String)>,
    seeds_rolled: Vec<PublicSeed>,
    roll_calls: usize,
    verify_calls: usize,
}

/// Scripted dice service. Rolls hand out the queued faces in order and
/// remember what they issued so `verify` can answer honestly.
#[derive(Default)]
pub struct FakeDiceService {
    state: Mutex<FakeDiceState>,
}

impl FakeDiceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dice(dice: impl IntoIterator<Item = u8>) -> Self {
        let service = Self::new();
        for face in dice {
            service.push_dice(face);
        }
        service
    }

    pub fn push_dice(&self, face: u8) {
        self.state.lock().unwrap().scripted.push_back(face);
    }

    /// The next `n` rolls fail with a transport-style error.
    pub fn fail_next_rolls(&self, n: usize) {
        self.state.lock().unwrap().failing_rolls = n;
    }

    /// The next roll sleeps for `delay` before answering. Queued delays are
    /// consumed one per roll.
    pub fn delay_next_roll(&self, delay: Duration) {
        self.state.lock().unwrap().roll_delays.push_back(delay);
    }

    /// When each roll was received, on the tokio clock.
    pub fn roll_started_at(&self) -> Vec<Instant> {
        self.state.lock().unwrap().roll_started_at.clone()
    }

    pub fn fail_verification(&self, failing: bool) {
        self.state.lock().unwrap().failing_verification = failing;
    }

    /// Roll attempts, successful or not.
    pub fn roll_calls(&self) -> usize {
        self.state.lock().unwrap().roll_calls
    }

    pub fn verify_calls(&self) -> usize {
        self.state.lock().unwrap().verify_calls
    }

    pub fn seeds_rolled(&self) -> Vec<PublicSeed> {
        self.state.lock().unwrap().seeds_rolled.clone()
    }
}

impl DiceService for FakeDiceService {
    async fn roll(&self, public_seed: &PublicSeed) -> Result<RollOutcome, ServiceError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.roll_calls += 1;
            state.seeds_rolled.push(public_seed.clone());
            state.roll_started_at.push(Instant::now());
            state.roll_delays.pop_front()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_rolls > 0 {
            state.failing_rolls -= 1;
            return Err(ServiceError::Unavailable("scripted roll failure".to_string()));
        }
        let face = state
            .scripted
            .pop_front()
            .ok_or_else(|| ServiceError::Unavailable("no scripted dice left".to_string()))?;
        let dice = DiceValue::try_from(face).map_err(ServiceError::Malformed)?;
        let server_seed = format!("fake-server-seed-{}", state.issued.len());
        let hash = commitment_hex(&server_seed, public_seed.as_str());
        state
            .issued
            .push((public_seed.clone(), server_seed.clone(), hash.clone()));
        Ok(RollOutcome {
            dice,
            hash,
            server_seed,
        })
    }

    async fn verify(
        &self,
        public_seed: &PublicSeed,
        server_seed: &str,
        original_hash: &str,
    ) -> Result<bool, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.verify_calls += 1;
        if state.failing_verification {
            return Err(ServiceError::Unavailable(
                "scripted verification failure".to_string(),
            ));
        }
        Ok(state.issued.iter().any(|(seed, server, hash)| {
            seed == public_seed && server == server_seed && hash == original_hash
        }))
    }
}

/// Clonable in-memory balance store. Clones share the same map so tests can
/// inspect what the ledger wrote.
#[derive(Clone, Default)]
pub struct InMemoryBalanceStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    persist_calls: Arc<Mutex<usize>>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(self, key: &str, raw: &str) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), raw.to_string());
        self
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn persist_calls(&self) -> usize {
        *self.persist_calls.lock().unwrap()
    }
}

impl BalanceStore for InMemoryBalanceStore {
    fn load(&self, key: &str) -> Result<Option<u64>, StoreError> {
        match self.values.lock().unwrap().get(key) {
            Some(raw) => decode_balance(key, raw).map(Some),
            None => Ok(None),
        }
    }

    fn persist(&mut self, key: &str, balance: u64) -> Result<(), StoreError> {
        *self.persist_calls.lock().unwrap() += 1;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), encode_balance(balance));
        Ok(())
    }
}

/// A settled ten-credit round on a fresh seed.
pub fn round_with(dice: u8, threshold: u8) -> Round {
    let dice_value = DiceValue::try_from(dice).unwrap();
    let threshold = Threshold::clamped(threshold as i64);
    let outcome = Outcome::for_roll(dice_value, threshold);
    let public_seed = PublicSeed::generate();
    let server_seed = format!("server-seed-{dice}");
    let hash = commitment_hex(&server_seed, public_seed.as_str());
    Round {
        public_seed_used: public_seed,
        bet_amount: 10,
        threshold,
        dice_value,
        server_seed,
        hash,
        outcome,
        balance_after: match outcome {
            Outcome::Win => 1010,
            Outcome::Loss => 990,
        },
        resolved_at: Utc::now(),
    }
}
