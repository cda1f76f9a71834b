use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Player-side commitment sent with a roll request. A random 128-bit token,
/// rendered as a v4 UUID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicSeed(String);

impl PublicSeed {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PublicSeed {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PublicSeed {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PublicSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds the single live seed. Rotated once per resolved round.
#[derive(Debug)]
pub struct SeedManager {
    live: PublicSeed,
    rotations: u64,
}

impl SeedManager {
    pub fn new() -> Self {
        Self {
            live: PublicSeed::generate(),
            rotations: 0,
        }
    }

    pub fn current_seed(&self) -> &PublicSeed {
        &self.live
    }

    /// Replace the live seed, returning the one it retired.
    pub fn rotate(&mut self) -> PublicSeed {
        let retired = std::mem::replace(&mut self.live, PublicSeed::generate());
        self.rotations += 1;
        debug!(retired = %retired, live = %self.live, "rotated public seed");
        retired
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }
}

impl Default for SeedManager {
    fn default() -> Self {
        Self::new()
    }
}
