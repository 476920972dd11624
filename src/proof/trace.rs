//! Outcome Trace and Client Proof

use serde::{Deserialize, Serialize};

use crate::core::hash::Fnv1aHasher;
use crate::session::detail::{format_number, Detail};

/// Field delimiter for traces and proof payloads.
pub const TRACE_DELIMITER: char = '|';

/// Session outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Puzzle cleared.
    Pass,
    /// Puzzle failed, timed out or aborted by the host.
    Fail,
}

impl Verdict {
    /// Wire label (`PASS` / `FAIL`).
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }

    /// Whether this is a pass.
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }

    fn default_code(self) -> &'static str {
        match self {
            Verdict::Pass => "ok",
            Verdict::Fail => "fail",
        }
    }
}

/// Build the outcome trace.
///
/// Fields, in order: `game_id|verdict|code|stage|difficulty|attempt`.
/// `code` falls back to `ok`/`fail`, `stage` to `final` and `attempt` to `0`
/// when the detail does not carry a value of the right type.
pub fn build_trace(game_id: &str, difficulty: i64, verdict: Verdict, detail: &Detail) -> String {
    let code = detail.text("code").unwrap_or_else(|| verdict.default_code());
    let stage = detail.text("stage").unwrap_or("final");
    let attempt = detail
        .number("attempt")
        .map(format_number)
        .unwrap_or_else(|| "0".to_string());

    let difficulty = difficulty.to_string();
    let delimiter = TRACE_DELIMITER.to_string();
    [game_id, verdict.as_str(), code, stage, difficulty.as_str(), attempt.as_str()]
        .join(delimiter.as_str())
}

/// Build the 8-hex-digit client proof for a trace.
pub fn build_client_proof(seed: &str, trace: &str, elapsed_ms: u64) -> String {
    let mut hasher = Fnv1aHasher::new();
    hasher.update_str(seed);
    hasher.update_char(TRACE_DELIMITER);
    hasher.update_str(trace);
    hasher.update_char(TRACE_DELIMITER);
    hasher.update_str(&elapsed_ms.to_string());
    hasher.finish_hex()
}

/// Recompute a client proof and compare (hex case-insensitive).
pub fn verify_client_proof(seed: &str, trace: &str, elapsed_ms: u64, proof: &str) -> bool {
    build_client_proof(seed, trace, elapsed_ms).eq_ignore_ascii_case(proof)
}

// =============================================================================
// TESTS
// =============================================================================
