//! Threshold and odds arithmetic for the roll-over game.
//!
//! A round wins when the dice lands on or above the threshold, so a threshold
//! `t` covers `7 - t` of the six faces. The multiplier is shown to the player
//! but settlement is always even money (see [`crate::resolver`]).

use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

pub const DIE_FACES: u8 = 6;
pub const MIN_THRESHOLD: u8 = 2;
pub const MAX_THRESHOLD: u8 = DIE_FACES;
pub const DEFAULT_THRESHOLD: u8 = 4;

/// Roll-over threshold, always within `[MIN_THRESHOLD, MAX_THRESHOLD]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Threshold(u8);

impl Threshold {
    /// Clamp any requested value into range. A threshold of 1 would win every
    /// roll, so it (and anything lower) becomes 2.
    pub fn clamped(value: i64) -> Self {
        let bounded = value.clamp(MIN_THRESHOLD as i64, MAX_THRESHOLD as i64);
        Self(bounded as u8)
    }

    pub fn new(value: u8) -> Option<Self> {
        (MIN_THRESHOLD..=MAX_THRESHOLD)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn raise(self) -> Self {
        Self::clamped(self.0 as i64 + 1)
    }

    pub fn lower(self) -> Self {
        Self::clamped(self.0 as i64 - 1)
    }

    pub fn win_chance(self) -> f64 {
        (7 - self.0) as f64 / DIE_FACES as f64
    }

    pub fn multiplier(self) -> f64 {
        1.0 / self.win_chance()
    }

    pub fn multiplier_display(self) -> String {
        format!("{:.2}", self.multiplier())
    }

    pub fn win_chance_display(self) -> String {
        format!("{:.2}%", self.win_chance() * 100.0)
    }

    /// Share of the 1..=6 slider track below the threshold.
    pub fn slider_fill(self) -> f64 {
        (self.0 - 1) as f64 / (DIE_FACES - 1) as f64
    }

    pub fn wins(self, dice: DiceValue) -> bool {
        dice.get() >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl From<u8> for Threshold {
    fn from(value: u8) -> Self {
        Self::clamped(value as i64)
    }
}

impl From<Threshold> for u8 {
    fn from(value: Threshold) -> Self {
        value.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Face value reported by the dice service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiceValue(u8);

impl DiceValue {
    pub fn new(value: u8) -> Option<Self> {
        (1..=DIE_FACES).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DiceValue {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("dice value {value} outside 1..={DIE_FACES}"))
    }
}

impl TryFrom<i64> for DiceValue {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("dice value {value} outside 1..={DIE_FACES}"))
    }
}

impl From<DiceValue> for u8 {
    fn from(value: DiceValue) -> Self {
        value.0
    }
}

impl fmt::Display for DiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The "1/2" button: never drops below one.
pub fn halve_bet(bet: u64) -> u64 {
    (bet / 2).max(1)
}

/// The "2X" button: never exceeds what the player can cover.
pub fn double_bet(bet: u64, balance: u64) -> u64 {
    bet.saturating_mul(2).min(balance)
}

/// Even-money settlement pays exactly the stake on a win.
pub fn profit_on_win(bet: u64) -> u64 {
    bet
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn win_chance__matches_covered_faces_for_every_threshold() {
        for t in MIN_THRESHOLD..=MAX_THRESHOLD {
            // given
            let threshold = Threshold::new(t).unwrap();

            // when
            let chance = threshold.win_chance();

            // then
            assert_eq!(chance, (7 - t) as f64 / 6.0);
        }
    }

    #[test]
    fn multiplier_display__rounds_to_two_decimals() {
        let cases = [(2, "1.20"), (3, "1.50"), (4, "2.00"), (5, "3.00"), (6, "6.00")];
        for (t, expected) in cases {
            let threshold = Threshold::new(t).unwrap();
            assert_eq!(threshold.multiplier_display(), expected, "threshold {t}");
        }
    }

    #[test]
    fn win_chance__reference_values() {
        assert_eq!(Threshold::new(4).unwrap().win_chance(), 0.5);
        assert!((Threshold::new(2).unwrap().win_chance() - 0.833).abs() < 0.001);
        assert!((Threshold::new(6).unwrap().win_chance() - 0.167).abs() < 0.001);
        assert_eq!(Threshold::new(6).unwrap().win_chance_display(), "16.67%");
    }

    #[test]
    fn clamped__turns_one_into_two() {
        // when
        let once = Threshold::clamped(1);
        let twice = Threshold::clamped(once.get() as i64);

        // then
        assert_eq!(once.get(), 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn lower__stops_at_minimum() {
        let threshold = Threshold::new(MIN_THRESHOLD).unwrap();
        assert_eq!(threshold.lower(), threshold);
        assert_eq!(Threshold::new(MAX_THRESHOLD).unwrap().raise().get(), MAX_THRESHOLD);
    }

    #[test]
    fn wins__includes_the_threshold_face() {
        let threshold = Threshold::new(4).unwrap();
        assert!(threshold.wins(DiceValue::new(4).unwrap()));
        assert!(threshold.wins(DiceValue::new(5).unwrap()));
        assert!(!threshold.wins(DiceValue::new(3).unwrap()));
    }

    #[test]
    fn slider_fill__spans_the_track() {
        assert_eq!(Threshold::new(2).unwrap().slider_fill(), 0.2);
        assert_eq!(Threshold::new(6).unwrap().slider_fill(), 1.0);
    }

    #[test]
    fn dice_value__rejects_out_of_range_faces() {
        assert!(DiceValue::new(0).is_none());
        assert!(DiceValue::new(7).is_none());
        assert!(DiceValue::try_from(-1i64).is_err());
        assert_eq!(DiceValue::try_from(6i64).unwrap().get(), 6);
    }

    #[test]
    fn bet_helpers__follow_button_rules() {
        assert_eq!(halve_bet(1), 1);
        assert_eq!(halve_bet(25), 12);
        assert_eq!(double_bet(10, 1000), 20);
        assert_eq!(double_bet(600, 1000), 1000);
        assert_eq!(profit_on_win(10), 10);
    }

    proptest! {
        #[test]
        fn clamped__always_in_range(value in any::<i64>()) {
            let threshold = Threshold::clamped(value);
            prop_assert!((MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold.get()));
            prop_assert_eq!(Threshold::clamped(threshold.get() as i64), threshold);
        }

        #[test]
        fn multiplier__is_inverse_of_win_chance(t in MIN_THRESHOLD..=MAX_THRESHOLD) {
            let threshold = Threshold::new(t).unwrap();
            prop_assert!((threshold.multiplier() * threshold.win_chance() - 1.0).abs() < 1e-12);
        }
    }
}
