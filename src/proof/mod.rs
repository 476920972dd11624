//! Client Proofs
//!
//! Compact outcome traces and the short proof token attached to every
//! standard-mode result.
//!
//! ## Strength
//!
//! The proof is FNV-1a over `seed|trace|elapsed`. It is **not** a
//! cryptographic MAC: anyone holding the seed can forge it. It only lets the
//! server-side authority, which holds its own copy of the seed, cheaply check
//! that a reported outcome is consistent with the seed it issued.

pub mod trace;

// Re-export key types
pub use trace::{
    build_client_proof, build_trace, verify_client_proof, Verdict, TRACE_DELIMITER,
};
