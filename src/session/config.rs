//! Session Configuration

use std::path::PathBuf;

/// Allowed countdown range for one entry mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Shortest allowed limit (ms).
    pub min_ms: u64,
    /// Longest allowed limit (ms).
    pub max_ms: u64,
    /// Limit used when the host sends none (ms).
    pub default_ms: u64,
}

impl TimeWindow {
    /// Clamp a requested limit into the window, rounding to whole ms.
    ///
    /// `None` means "use the default". A non-finite request counts as 0.
    pub fn clamp(&self, requested_ms: Option<f64>) -> u64 {
        let requested = requested_ms.unwrap_or(self.default_ms as f64);
        let requested = if requested.is_finite() { requested } else { 0.0 };
        requested
            .clamp(self.min_ms as f64, self.max_ms as f64)
            .round() as u64
    }
}

/// Configuration for the session controller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Countdown window for `minigame:start`.
    pub standard: TimeWindow,
    /// Countdown window for `inside_open`.
    pub inside: TimeWindow,
    /// How long the result overlay stays up (ms).
    pub overlay_timeout_ms: f64,
    /// Directory holding `{locale}.json` tables.
    pub locale_dir: Option<PathBuf>,
    /// Locale loaded at startup.
    pub default_locale: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            standard: TimeWindow {
                min_ms: 5_000,
                max_ms: 60_000,
                default_ms: 20_000,
            },
            inside: TimeWindow {
                min_ms: 5_000,
                max_ms: 30_000,
                default_ms: 15_000,
            },
            overlay_timeout_ms: 1_200.0,
            locale_dir: None,
            default_locale: "en".to_string(),
        }
    }
}
