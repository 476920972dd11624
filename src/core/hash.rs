//! FNV-1a Hashing
//!
//! The one hash primitive shared by seed derivation and client proofs.
//!
//! Input text is consumed as UTF-16 code units, which is what the browser
//! client hashes. For ASCII text this is identical to hashing bytes.

/// FNV-1a 32-bit offset basis.
pub const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime.
pub const FNV_PRIME: u32 = 0x0100_0193;

/// Incremental FNV-1a hasher over text.
///
/// Feeding `"ab"` then `"c"` yields the same hash as feeding `"abc"`,
/// so callers can stream delimited fields without building a string first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fnv1aHasher {
    hash: u32,
}

impl Default for Fnv1aHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv1aHasher {
    /// Create a hasher at the offset basis.
    pub fn new() -> Self {
        Self { hash: FNV_OFFSET_BASIS }
    }

    /// Update with a single UTF-16 code unit.
    #[inline]
    pub fn update_unit(&mut self, unit: u16) {
        self.hash ^= unit as u32;
        self.hash = self.hash.wrapping_mul(FNV_PRIME);
    }

    /// Update with text.
    #[inline]
    pub fn update_str(&mut self, text: &str) {
        for unit in text.encode_utf16() {
            self.update_unit(unit);
        }
    }

    /// Update with a single character.
    #[inline]
    pub fn update_char(&mut self, ch: char) {
        let mut buf = [0u16; 2];
        for unit in ch.encode_utf16(&mut buf) {
            self.update_unit(*unit);
        }
    }

    /// Current 32-bit hash.
    pub fn finish(&self) -> u32 {
        self.hash
    }

    /// Current hash as 8 lowercase, zero-padded hex digits.
    pub fn finish_hex(&self) -> String {
        hex::encode(self.hash.to_be_bytes())
    }
}

/// Hash text to a 32-bit value.
pub fn fnv1a_32(text: &str) -> u32 {
    let mut hasher = Fnv1aHasher::new();
    hasher.update_str(text);
    hasher.finish()
}

/// Hash text to 8 lowercase hex digits.
pub fn fnv1a_hex(text: &str) -> String {
    let mut hasher = Fnv1aHasher::new();
    hasher.update_str(text);
    hasher.finish_hex()
}

// =============================================================================
// TESTS
// =============================================================================
