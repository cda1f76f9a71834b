// Offline commitment scheme: hash = SHA-256(server_seed || public_seed), dice
// taken from the first four digest bytes.
use super::{
    DiceService,
    RollOutcome,
};
use crate::{
    error::ServiceError,
    odds::{
        DIE_FACES,
        DiceValue,
    },
    seed::PublicSeed,
};
use rand::RngCore;
use sha2::{
    Digest,
    Sha256,
};

#[derive(Clone, Debug, Default)]
pub struct LocalDiceService;

impl LocalDiceService {
    pub fn new() -> Self {
        Self
    }
}

fn commit(server_seed: &str, public_seed: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hasher.update(public_seed.as_bytes());
    hasher.finalize().into()
}

pub fn commitment_hex(server_seed: &str, public_seed: &str) -> String {
    hex::encode(commit(server_seed, public_seed))
}

pub fn dice_for(server_seed: &str, public_seed: &str) -> DiceValue {
    let digest = commit(server_seed, public_seed);
    let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let face = (word % DIE_FACES as u32) as u8 + 1;
    DiceValue::new(face).unwrap_or_else(|| unreachable!("face {face} is always in range"))
}

fn fresh_server_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl DiceService for LocalDiceService {
    async fn roll(&self, public_seed: &PublicSeed) -> Result<RollOutcome, ServiceError> {
        let server_seed = fresh_server_seed();
        Ok(RollOutcome {
            dice: dice_for(&server_seed, public_seed.as_str()),
            hash: commitment_hex(&server_seed, public_seed.as_str()),
            server_seed,
        })
    }

    async fn verify(
        &self,
        public_seed: &PublicSeed,
        server_seed: &str,
        original_hash: &str,
    ) -> Result<bool, ServiceError> {
        let expected = commitment_hex(server_seed, public_seed.as_str());
        Ok(expected.eq_ignore_ascii_case(original_hash))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[tokio::test]
    async fn roll__commits_to_the_public_seed() {
        // given
        let service = LocalDiceService::new();
        let seed = PublicSeed::generate();

        // when
        let outcome = service.roll(&seed).await.unwrap();

        // then
        assert_eq!(outcome.hash, commitment_hex(&outcome.server_seed, seed.as_str()));
        assert_eq!(outcome.dice, dice_for(&outcome.server_seed, seed.as_str()));
        assert!(service
            .verify(&seed, &outcome.server_seed, &outcome.hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn verify__rejects_a_different_public_seed() {
        let service = LocalDiceService::new();
        let seed = PublicSeed::generate();
        let outcome = service.roll(&seed).await.unwrap();

        let other = PublicSeed::generate();
        assert!(!service
            .verify(&other, &outcome.server_seed, &outcome.hash)
            .await
            .unwrap());
    }

    #[test]
    fn dice_for__covers_every_face() {
        let mut seen = [false; 6];
        for n in 0..500 {
            let face = dice_for(&format!("server-{n}"), "public");
            seen[(face.get() - 1) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
