//! Runtime configuration.
//!
//! Environment-driven with typed defaults; the library reads plain `std::env`
//! and leaves dotenv loading to whatever binary embeds it.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DECIMAL_PRECISION_ENV: &str = "ZKAT_DECIMAL_PRECISION";
const RETRY_ATTEMPTS_ENV: &str = "ZKAT_RETRY_ATTEMPTS";
const RETRY_MIN_DELAY_MS_ENV: &str = "ZKAT_RETRY_MIN_DELAY_MS";
const RETRY_MAX_DELAY_MS_ENV: &str = "ZKAT_RETRY_MAX_DELAY_MS";
const PROOF_BACKEND_ENV: &str = "ZKAT_PROOF_BACKEND";
const ENTITY_CODE_ENV: &str = "ZKAT_ENTITY_CODE";

const DEFAULT_DECIMAL_PRECISION: u64 = 100;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 200;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;
const DEFAULT_ENTITY_CODE: &str = "local";

/// Which proof engine backs the coordinators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofBackendKind {
    /// Shield-contract engine submitting real proof transactions.
    Live,
    /// Deterministic in-process simulation.
    Simulated,
}

impl FromStr for ProofBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(ProofBackendKind::Live),
            "simulated" => Ok(ProofBackendKind::Simulated),
            other => Err(format!("unknown proof backend: {other}")),
        }
    }
}

/// Bounded exponential backoff policy shared by the connection resolver and
/// the retry executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least one.
    pub attempts: u32,
    /// Delay before the second attempt; doubles per subsequent attempt.
    pub min_delay: Duration,
    /// Ceiling on the inter-attempt delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.min_delay
            .checked_mul(factor)
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            min_delay: Duration::from_millis(DEFAULT_RETRY_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

/// Coordinator configuration.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// Scaling factor between display amounts and raw commitment values.
    pub decimal_precision: u64,
    pub retry: RetryPolicy,
    pub proof_backend: ProofBackendKind,
    /// Entity code written into transfer/burn audit notes.
    pub entity_code: String,
}

impl CoreConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let decimal_precision = env_parse(DECIMAL_PRECISION_ENV, DEFAULT_DECIMAL_PRECISION);
        let retry = RetryPolicy {
            attempts: env_parse(RETRY_ATTEMPTS_ENV, DEFAULT_RETRY_ATTEMPTS),
            min_delay: Duration::from_millis(env_parse(
                RETRY_MIN_DELAY_MS_ENV,
                DEFAULT_RETRY_MIN_DELAY_MS,
            )),
            max_delay: Duration::from_millis(env_parse(
                RETRY_MAX_DELAY_MS_ENV,
                DEFAULT_RETRY_MAX_DELAY_MS,
            )),
        };
        let proof_backend = env::var(PROOF_BACKEND_ENV)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(ProofBackendKind::Simulated);
        let entity_code =
            env::var(ENTITY_CODE_ENV).unwrap_or_else(|_| DEFAULT_ENTITY_CODE.to_string());

        Self {
            decimal_precision,
            retry,
            proof_backend,
            entity_code,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            retry: RetryPolicy::default(),
            proof_backend: ProofBackendKind::Simulated,
            entity_code: DEFAULT_ENTITY_CODE.to_string(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses() {
        assert_eq!(
            "live".parse::<ProofBackendKind>().unwrap(),
            ProofBackendKind::Live
        );
        assert_eq!(
            " Simulated ".parse::<ProofBackendKind>().unwrap(),
            ProofBackendKind::Simulated
        );
        assert!("zk".parse::<ProofBackendKind>().is_err());
    }

    #[test]
    fn delays_double_and_clamp() {
        let policy = RetryPolicy {
            attempts: 5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(450),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(450));
        // Far past the clamp, including shift overflow territory.
        assert_eq!(policy.delay_for(40), Duration::from_millis(450));
    }
}
