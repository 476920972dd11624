//! Deterministic Seeded RNG
//!
//! A 32-bit add-then-mix generator seeded from an FNV-1a hash of seed text.
//! Given the same seed text, produces the identical sequence the browser
//! client produces.

use super::hash::fnv1a_32;

/// Per-call state increment.
const STATE_INCREMENT: u32 = 0x6d2b_79f5;

/// Normalizer from a 32-bit output to `[0, 1)`.
const U32_RANGE: f64 = 4_294_967_296.0;

/// Deterministic PRNG seeded from text.
///
/// # Determinism Guarantee
///
/// The output is purely a function of (seed text, call index). There is no
/// reseeding and no way to resume mid-stream: to replay a stream, build a
/// new generator from the same seed text and draw the same number of values.
///
/// # Example
///
/// ```
/// use minigame_host::core::rng::SeededRng;
///
/// let mut rng = SeededRng::new("abc");
/// assert_eq!(rng.next_u32(), 2218960489); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    /// Create a generator from seed text.
    pub fn new(seed_text: &str) -> Self {
        Self {
            state: fnv1a_32(seed_text),
        }
    }

    /// Create the generator for a session stream.
    ///
    /// Equivalent to `SeededRng::new(&child_seed(&session_seed(..), salt))`.
    pub fn for_session(seed: &str, game_id: &str, difficulty: i64, salt: &str) -> Self {
        Self::new(&child_seed(&session_seed(seed, game_id, difficulty), salt))
    }

    /// Generate the next 32-bit output.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(STATE_INCREMENT);
        let s = self.state;
        let mut t = (s ^ (s >> 15)).wrapping_mul(1 | s);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t));
        t ^ (t >> 14)
    }

    /// Generate a float in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / U32_RANGE
    }

    /// Generate an index in `[0, len)`. Returns 0 for an empty range.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let idx = (self.next_f64() * len as f64).floor() as usize;
        idx.min(len - 1)
    }

    /// Generate a float in `[min, max)`.
    #[inline]
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next_f64()
    }

    /// Generate a decimal digit character.
    #[inline]
    pub fn next_digit(&mut self) -> char {
        char::from(b'0' + self.next_index(10) as u8)
    }
}

/// Base seed text for one session: `seed:game_id:difficulty`.
pub fn session_seed(seed: &str, game_id: &str, difficulty: i64) -> String {
    format!("{seed}:{game_id}:{difficulty}")
}

/// Derive an independent stream's seed text from a base and a salt.
pub fn child_seed(base: &str, salt: &str) -> String {
    format!("{base}:{salt}")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rng_known_values() {
        // These values must never change!
        // Client proofs and widget layouts are replayed from them.
        let mut rng = SeededRng::new("abc");
        assert_eq!(rng.next_u32(), 2218960489);
        assert_eq!(rng.next_u32(), 2833055473);
        assert_eq!(rng.next_u32(), 8073077);
    }

    #[test]
    fn test_rng_known_floats() {
        let mut rng = SeededRng::new("abc:lockpick:1:main");
        assert_eq!(rng.next_f64(), 0.18775585596449673);
        assert_eq!(rng.next_f64(), 0.18540149345062673);
        assert_eq!(rng.next_f64(), 0.5968607654795051);
    }

    #[test]
    fn test_empty_seed() {
        let mut rng = SeededRng::new("");
        assert_eq!(rng.next_u32(), 2625274932);
    }

    #[test]
    fn test_for_session_matches_manual_seed() {
        let mut a = SeededRng::for_session("abc", "lockpick", 1, "main");
        let mut b = SeededRng::new("abc:lockpick:1:main");
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_child_streams_differ() {
        let base = session_seed("abc", "keypad", 2);
        let mut main = SeededRng::new(&child_seed(&base, "main"));
        let mut other = SeededRng::new(&child_seed(&base, "keypad"));
        let a: Vec<u32> = (0..8).map(|_| main.next_u32()).collect();
        let b: Vec<u32> = (0..8).map(|_| other.next_u32()).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_next_index_bounds() {
        let mut rng = SeededRng::new("index");
        for _ in 0..1000 {
            assert!(rng.next_index(7) < 7);
        }
        assert_eq!(rng.next_index(0), 0);
        assert_eq!(rng.next_index(1), 0);
    }

    #[test]
    fn test_next_digit() {
        let mut rng = SeededRng::new("digits");
        for _ in 0..200 {
            assert!(rng.next_digit().is_ascii_digit());
        }
    }

    proptest! {
        #[test]
        fn prop_same_seed_same_sequence(seed in ".{0,24}") {
            let mut a = SeededRng::new(&seed);
            let mut b = SeededRng::new(&seed);
            for _ in 0..64 {
                prop_assert_eq!(a.next_u32(), b.next_u32());
            }
        }

        #[test]
        fn prop_floats_in_unit_interval(seed in ".{0,24}") {
            let mut rng = SeededRng::new(&seed);
            for _ in 0..64 {
                let v = rng.next_f64();
                prop_assert!((0.0..1.0).contains(&v));
            }
        }

        #[test]
        fn prop_distinct_seeds_diverge(prefix in "[a-z]{0,12}", a in "[0-9]{1,4}", b in "[0-9]{1,4}") {
            prop_assume!(a != b);
            let mut x = SeededRng::new(&format!("{prefix}{a}"));
            let mut y = SeededRng::new(&format!("{prefix}{b}"));
            let xs: Vec<u32> = (0..4).map(|_| x.next_u32()).collect();
            let ys: Vec<u32> = (0..4).map(|_| y.next_u32()).collect();
            prop_assert_ne!(xs, ys);
        }
    }
}
