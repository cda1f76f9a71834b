use crate::error::{
    LedgerError,
    StoreError,
};
use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::{
    error,
    info,
    warn,
};

pub const DEFAULT_STARTING_BALANCE: u64 = 1000;
pub const DEFAULT_GAME_ID: &str = "balance-dice";

/// Durable key-value storage for one balance per game.
pub trait BalanceStore: Send {
    /// retrieve the stored balance for `key`, if any
    fn load(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// write or overwrite the balance for `key`
    fn persist(&mut self, key: &str, balance: u64) -> Result<(), StoreError>;
}

pub fn encode_balance(balance: u64) -> String {
    balance.to_string()
}

pub fn decode_balance(key: &str, raw: &str) -> Result<u64, StoreError> {
    raw.trim().parse::<u64>().map_err(|_| StoreError::Parse {
        key: key.to_string(),
        raw: raw.to_string(),
    })
}

/// One file per game key, holding the balance as a decimal string.
#[derive(Clone, Debug)]
pub struct FileBalanceStore {
    dir: PathBuf,
}

impl FileBalanceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(file_name)
    }
}

impl BalanceStore for FileBalanceStore {
    fn load(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => decode_balance(key, &raw).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn persist(&mut self, key: &str, balance: u64) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let staging = path.with_extension("tmp");
        fs::write(&staging, encode_balance(balance)).map_err(|source| {
            StoreError::Io {
                path: staging.clone(),
                source,
            }
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io { path, source })
    }
}

/// The player's balance. `apply_delta` is the only way to change it, and every
/// change is written through to the store.
pub struct BalanceLedger {
    key: String,
    balance: u64,
    store: Box<dyn BalanceStore>,
}

impl BalanceLedger {
    /// Restore the persisted balance for `key`, falling back to
    /// `starting_balance` when nothing usable is stored.
    pub fn open(
        key: impl Into<String>,
        store: Box<dyn BalanceStore>,
        starting_balance: u64,
    ) -> Self {
        let key = key.into();
        let balance = match store.load(&key) {
            Ok(Some(balance)) => {
                info!(key = %key, balance, "restored persisted balance");
                balance
            }
            Ok(None) => {
                info!(key = %key, balance = starting_balance, "no persisted balance, starting fresh");
                starting_balance
            }
            Err(err) => {
                warn!(key = %key, %err, "ignoring unreadable persisted balance");
                starting_balance
            }
        };
        Self {
            key,
            balance,
            store,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Read what the store currently holds without touching the live balance.
    pub fn load(&self) -> Result<Option<u64>, StoreError> {
        self.store.load(&self.key)
    }

    pub fn apply_delta(&mut self, delta: i64) -> Result<u64, LedgerError> {
        let next = self
            .balance
            .checked_add_signed(delta)
            .ok_or(LedgerError::OutOfRange {
                balance: self.balance,
                delta,
            })?;
        self.balance = next;
        if let Err(err) = self.store.persist(&self.key, next) {
            error!(key = %self.key, balance = next, %err, "failed to persist balance");
        }
        Ok(next)
    }
}

impl std::fmt::Debug for BalanceLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceLedger")
            .field("key", &self.key)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::InMemoryBalanceStore;
    use proptest::prelude::*;
    use tempdir::TempDir;

    #[test]
    fn open__uses_starting_balance_when_store_is_empty() {
        let store = InMemoryBalanceStore::new();
        let ledger = BalanceLedger::open(DEFAULT_GAME_ID, Box::new(store.clone()), 1000);
        assert_eq!(ledger.balance(), 1000);
        assert_eq!(store.raw(DEFAULT_GAME_ID), None);
    }

    #[test]
    fn open__restores_persisted_balance() {
        // given
        let store = InMemoryBalanceStore::new().with_raw(DEFAULT_GAME_ID, "1234");

        // when
        let ledger = BalanceLedger::open(DEFAULT_GAME_ID, Box::new(store), 1000);

        // then
        assert_eq!(ledger.balance(), 1234);
    }

    #[test]
    fn open__falls_back_when_persisted_value_is_garbage() {
        let store = InMemoryBalanceStore::new().with_raw(DEFAULT_GAME_ID, "lots");
        let ledger = BalanceLedger::open(DEFAULT_GAME_ID, Box::new(store), 1000);
        assert_eq!(ledger.balance(), 1000);
    }

    #[test]
    fn apply_delta__persists_every_change_as_decimal_string() {
        // given
        let store = InMemoryBalanceStore::new();
        let mut ledger = BalanceLedger::open(DEFAULT_GAME_ID, Box::new(store.clone()), 1000);

        // when
        ledger.apply_delta(10).unwrap();
        let after = ledger.apply_delta(-25).unwrap();

        // then
        assert_eq!(after, 985);
        assert_eq!(store.raw(DEFAULT_GAME_ID).as_deref(), Some("985"));
        assert_eq!(store.persist_calls(), 2);
    }

    #[test]
    fn apply_delta__refuses_to_go_negative() {
        // given
        let store = InMemoryBalanceStore::new();
        let mut ledger = BalanceLedger::open(DEFAULT_GAME_ID, Box::new(store.clone()), 5);

        // when
        let result = ledger.apply_delta(-6);

        // then
        assert_eq!(
            result,
            Err(LedgerError::OutOfRange {
                balance: 5,
                delta: -6
            })
        );
        assert_eq!(ledger.balance(), 5);
        assert_eq!(store.persist_calls(), 0);
    }

    #[test]
    fn load__is_idempotent_before_mutation() {
        let store = InMemoryBalanceStore::new().with_raw(DEFAULT_GAME_ID, "700");
        let ledger = BalanceLedger::open(DEFAULT_GAME_ID, Box::new(store), 1000);
        assert_eq!(ledger.load().unwrap(), Some(700));
        assert_eq!(ledger.load().unwrap(), Some(700));
        assert_eq!(ledger.balance(), 700);
    }

    #[test]
    fn file_store__survives_reopen() {
        // given
        let temp_dir = TempDir::new("file_balance_store").unwrap();
        let store = FileBalanceStore::new(temp_dir.path().join("data")).unwrap();
        let mut ledger = BalanceLedger::open("balance-dice", Box::new(store.clone()), 1000);

        // when
        ledger.apply_delta(-990).unwrap();
        drop(ledger);
        let reopened = BalanceLedger::open("balance-dice", Box::new(store.clone()), 1000);

        // then
        assert_eq!(reopened.balance(), 10);
        let raw = fs::read_to_string(store.path_for("balance-dice")).unwrap();
        assert_eq!(raw, "10");
    }

    #[test]
    fn file_store__reports_missing_key_as_none() {
        let temp_dir = TempDir::new("file_balance_store_missing").unwrap();
        let store = FileBalanceStore::new(temp_dir.path()).unwrap();
        assert_eq!(store.load("nothing-here").unwrap(), None);
    }

    #[test]
    fn file_store__sanitizes_keys_into_file_names() {
        let temp_dir = TempDir::new("file_balance_store_keys").unwrap();
        let store = FileBalanceStore::new(temp_dir.path()).unwrap();
        assert_eq!(store.path_for("../escape"), temp_dir.path().join("___escape"));
    }

    proptest! {
        #[test]
        fn apply_delta__never_leaves_a_negative_balance(
            start in 0u64..10_000,
            deltas in proptest::collection::vec(-5_000i64..5_000, 0..32),
        ) {
            let store = InMemoryBalanceStore::new();
            let mut ledger = BalanceLedger::open(DEFAULT_GAME_ID, Box::new(store.clone()), start);
            let mut expected = start as i64;
            for delta in deltas {
                match ledger.apply_delta(delta) {
                    Ok(balance) => {
                        expected += delta;
                        prop_assert_eq!(balance as i64, expected);
                    }
                    Err(_) => prop_assert!(expected + delta < 0),
                }
            }
            prop_assert_eq!(ledger.balance() as i64, expected);
        }
    }
}
