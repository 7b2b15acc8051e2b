//! Tunables for key generation, reconstruction and tally decryption.
//!
//! Nothing here is global: each component takes its configuration by value
//! at construction time. All structs deserialize from JSON with defaults for
//! missing fields, so a host application can keep them next to its other
//! settings.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::functions::PrimeSearchBudget;

pub const DEFAULT_MILLER_RABIN_ROUNDS: u32 = 40;
pub const DEFAULT_FIELD_MARGIN_BITS: u64 = 128;
pub const DEFAULT_MIN_FIELD_BITS: u64 = 512;
pub const DEFAULT_PRIME_RETRY_BUDGET: u32 = 10_000;
pub const DEFAULT_MAX_SUBSET_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyGenConfig {
    /// Rounds for every probabilistic primality test (error below `4^-rounds`).
    pub miller_rabin_rounds: u32,
    /// Extra bits of the Shamir field over the bit length of `p`.
    pub field_margin_bits: u64,
    /// Lower bound on the exponent of the field prime.
    pub min_field_bits: u64,
    /// Candidate draws allowed per prime before giving up.
    pub prime_retry_budget: u32,
    /// Wall-clock budget for one whole key generation.
    pub deadline_ms: Option<u64>,
    pub use_known_field_primes: bool,
}

impl Default for KeyGenConfig {
    fn default() -> Self {
        KeyGenConfig {
            miller_rabin_rounds: DEFAULT_MILLER_RABIN_ROUNDS,
            field_margin_bits: DEFAULT_FIELD_MARGIN_BITS,
            min_field_bits: DEFAULT_MIN_FIELD_BITS,
            prime_retry_budget: DEFAULT_PRIME_RETRY_BUDGET,
            deadline_ms: None,
            use_known_field_primes: true,
        }
    }
}

impl KeyGenConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: KeyGenConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidParameters(format!("key generation config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // 40 rounds is the 2^-80 certainty floor
        if self.miller_rabin_rounds < DEFAULT_MILLER_RABIN_ROUNDS {
            return Err(Error::InvalidParameters(format!(
                "miller_rabin_rounds {} below {}",
                self.miller_rabin_rounds, DEFAULT_MILLER_RABIN_ROUNDS
            )));
        }
        if self.field_margin_bits < DEFAULT_FIELD_MARGIN_BITS {
            return Err(Error::InvalidParameters(format!(
                "field_margin_bits {} below {}",
                self.field_margin_bits, DEFAULT_FIELD_MARGIN_BITS
            )));
        }
        if self.min_field_bits < DEFAULT_MIN_FIELD_BITS {
            return Err(Error::InvalidParameters(format!(
                "min_field_bits {} below {}",
                self.min_field_bits, DEFAULT_MIN_FIELD_BITS
            )));
        }
        if self.prime_retry_budget == 0 {
            return Err(Error::InvalidParameters(
                "prime_retry_budget must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Budget for the prime searches of one key generation started now.
    pub fn prime_budget(&self) -> PrimeSearchBudget {
        let deadline = self
            .deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        PrimeSearchBudget::new(self.prime_retry_budget, deadline)
    }
}

/// Whether reconstruction may fall back to the legacy `φ(n)`/`λ(n)` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LegacyFallback {
    #[default]
    Allow,
    /// For records tagged `direct_p`: only the direct-prime phase runs.
    Forbid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionPolicy {
    pub legacy_fallback: LegacyFallback,
    /// Upper bound on threshold-sized subsets tried when the full share set
    /// does not reconstruct a valid factor.
    pub max_subset_attempts: usize,
    pub miller_rabin_rounds: u32,
}

impl Default for ReconstructionPolicy {
    fn default() -> Self {
        ReconstructionPolicy {
            legacy_fallback: LegacyFallback::Allow,
            max_subset_attempts: DEFAULT_MAX_SUBSET_ATTEMPTS,
            miller_rabin_rounds: DEFAULT_MILLER_RABIN_ROUNDS,
        }
    }
}

impl ReconstructionPolicy {
    pub fn direct_only() -> Self {
        ReconstructionPolicy {
            legacy_fallback: LegacyFallback::Forbid,
            ..Default::default()
        }
    }
}

/// Plausibility limits applied when a decrypted residue is read as a vote count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DecryptionBounds {
    /// Typically the number of eligible voters.
    pub max_vote_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(KeyGenConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = KeyGenConfig::from_json(r#"{"deadline_ms": 60000}"#).unwrap();
        assert_eq!(config.deadline_ms, Some(60_000));
        assert_eq!(config.miller_rabin_rounds, DEFAULT_MILLER_RABIN_ROUNDS);
        assert!(config.prime_budget().deadline.is_some());
    }

    #[test]
    fn test_from_json_rejects_weak_settings() {
        let err = KeyGenConfig::from_json(r#"{"miller_rabin_rounds": 5}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
        let err = KeyGenConfig::from_json(r#"{"field_margin_bits": 16}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
        let err = KeyGenConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn test_policy_json() {
        let policy: ReconstructionPolicy =
            serde_json::from_str(r#"{"legacy_fallback": "forbid"}"#).unwrap();
        assert_eq!(policy, ReconstructionPolicy::direct_only());
    }
}
