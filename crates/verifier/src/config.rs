//! Verifier configuration loaded from environment variables.

use std::time::Duration;

/// Verification run configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DCB_APPENDERS` - concurrent appender tasks (default: `20`)
/// - `DCB_READERS` - concurrent position readers (default: `1`)
/// - `DCB_VERIFIERS` - concurrent consistency verifiers (default: `5`)
/// - `DCB_DURATION_MS` - how long appenders and readers run (default: `2000`)
/// - `DCB_VERIFY_ITERATIONS` - positions checked for consistency (default: `1000`)
/// - `DCB_POSITION_BATCH_SIZE` - tail positions per recorded batch (default: `6`)
/// - `SEED` - fixture seed, random when unset
/// - `RUST_LOG` - tracing filter directive (default: `"info"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub appenders: usize,
    pub readers: usize,
    pub verifiers: usize,
    pub duration: Duration,
    pub verify_iterations: usize,
    pub position_batch_size: usize,
    pub seed: Option<u64>,
    pub log_level: String,
}

impl VerifierConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Values that are missing or fail to parse fall back to their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let count = |key: &str, default: usize| {
            parsed(key)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(default)
        };

        Self {
            appenders: count("DCB_APPENDERS", defaults.appenders),
            readers: count("DCB_READERS", defaults.readers),
            verifiers: count("DCB_VERIFIERS", defaults.verifiers),
            duration: parsed("DCB_DURATION_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.duration),
            verify_iterations: count("DCB_VERIFY_ITERATIONS", defaults.verify_iterations),
            position_batch_size: count("DCB_POSITION_BATCH_SIZE", defaults.position_batch_size),
            seed: parsed("SEED"),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }
}

impl VerifierConfig {
    /// Returns the configured seed, or a fresh random one.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            appenders: 20,
            readers: 1,
            verifiers: 5,
            duration: Duration::from_millis(2000),
            verify_iterations: 1000,
            position_batch_size: 6,
            seed: None,
            log_level: "info".to_string(),
        }
    }
}
