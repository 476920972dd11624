//! Core deterministic primitives.
//!
//! Everything here is a pure function of its inputs so that a browser client,
//! this host, and a server-side verifier all agree on the same seed text.

pub mod hash;
pub mod rng;

// Re-export core types
pub use hash::{fnv1a_32, fnv1a_hex, Fnv1aHasher};
pub use rng::{child_seed, session_seed, SeededRng};
