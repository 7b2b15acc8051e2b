//! Paillier key ceremony: modulus generation and Shamir split of `p`.

use log::info;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{KeyGenConfig, ReconstructionPolicy};
use crate::decrypt::PrivateKey;
use crate::error::{Error, Result};
use crate::functions::{random_prime, smallest_prime_from_power_of_two, PrimeSearchBudget};
use crate::pub_key::PublicKey;
use crate::shamir::{self, Share};

pub const MIN_BIT_LENGTH: usize = 1024;

/// What the Shamir secret of a key ceremony encodes.
///
/// New ceremonies always share `p` directly. The other tags name the legacy
/// encodings that reconstruction can still recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SharingMethod {
    #[serde(rename = "direct_p")]
    DirectP,
    #[serde(rename = "old_phi_n")]
    OldPhiN,
    #[serde(rename = "lambda_gcd")]
    LambdaGcd,
    #[serde(rename = "old_lambda_n")]
    OldLambdaN,
}

impl SharingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharingMethod::DirectP => "direct_p",
            SharingMethod::OldPhiN => "old_phi_n",
            SharingMethod::LambdaGcd => "lambda_gcd",
            SharingMethod::OldLambdaN => "old_lambda_n",
        }
    }
}

impl fmt::Display for SharingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityMetadata {
    pub p_bit_length: u64,
    #[serde(with = "crate::serde_support::bigint_decimal")]
    pub field_prime: BigInt,
    /// Absent on records written before the tag existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing_method: Option<SharingMethod>,
}

/// The public half of a ceremony, stored by the persistence layer keyed by
/// election. Never contains shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    pub public_key: PublicKey,
    pub security_metadata: SecurityMetadata,
    pub threshold: u32,
    pub total_shares: u32,
    pub fingerprint: String,
}

impl PublicKeyRecord {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::InvalidParameters(format!("public key record: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidParameters(format!("public key record: {}", e)))
    }

    /// Records tagged `direct_p` never need the legacy phase; untagged
    /// records keep it available.
    pub fn reconstruction_policy(&self) -> ReconstructionPolicy {
        match self.security_metadata.sharing_method {
            Some(SharingMethod::DirectP) => ReconstructionPolicy::direct_only(),
            _ => ReconstructionPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct KeyGenerationResult {
    pub public_key: PublicKey,
    pub shares: Vec<Share>,
    pub threshold: u32,
    pub total_shares: u32,
    pub security_metadata: SecurityMetadata,
}

impl KeyGenerationResult {
    pub fn public_record(&self) -> PublicKeyRecord {
        PublicKeyRecord {
            public_key: self.public_key.clone(),
            security_metadata: self.security_metadata.clone(),
            threshold: self.threshold,
            total_shares: self.total_shares,
            fingerprint: self.public_key.fingerprint(),
        }
    }

    /// Separates what goes to storage from what goes to each authority.
    pub fn into_parts(self) -> (PublicKeyRecord, Vec<Share>) {
        let record = self.public_record();
        (record, self.shares)
    }
}

pub struct PaillierKeyGenerator {
    config: KeyGenConfig,
}

impl Default for PaillierKeyGenerator {
    fn default() -> Self {
        PaillierKeyGenerator {
            config: KeyGenConfig::default(),
        }
    }
}

impl PaillierKeyGenerator {
    pub fn new(config: KeyGenConfig) -> Result<Self> {
        config.validate()?;
        Ok(PaillierKeyGenerator { config })
    }

    pub fn generate(
        &self,
        bit_length: usize,
        total_shares: u32,
        threshold: u32,
    ) -> Result<KeyGenerationResult> {
        if threshold < 1 || threshold > total_shares {
            return Err(Error::InvalidParameters(format!(
                "threshold {} not in [1, {}]",
                threshold, total_shares
            )));
        }
        if bit_length < MIN_BIT_LENGTH || bit_length % 2 != 0 {
            return Err(Error::InvalidParameters(format!(
                "bit length {} must be even and at least {}",
                bit_length, MIN_BIT_LENGTH
            )));
        }

        let budget = self.config.prime_budget();
        let factors = self.generate_factors(bit_length / 2, &budget)?;
        if factors.p == factors.q {
            return Err(Error::KeyGenFailure("p and q coincide".to_string()));
        }

        let n = &factors.p * &factors.q;
        let public_key = PublicKey::new(n);
        if factors.modulus() != public_key.n || public_key.bit_length != bit_length {
            return Err(Error::KeyGenFailure(format!(
                "modulus has {} bits, expected {}",
                public_key.bit_length, bit_length
            )));
        }

        let field_prime = self.select_field_prime(&factors.p);
        if field_prime <= factors.p || field_prime <= BigInt::from(total_shares) {
            return Err(Error::InvalidField(format!(
                "{}-bit field does not exceed the secret",
                field_prime.bits()
            )));
        }

        let shares = shamir::split(&factors.p, total_shares, threshold, &field_prime)?;
        let security_metadata = SecurityMetadata {
            p_bit_length: factors.p.bits(),
            field_prime,
            sharing_method: Some(SharingMethod::DirectP),
        };

        info!(
            "generated {}-bit key {} split {}-of-{} over a {}-bit field",
            bit_length,
            public_key.fingerprint(),
            threshold,
            total_shares,
            security_metadata.field_prime.bits()
        );

        Ok(KeyGenerationResult {
            public_key,
            shares,
            threshold,
            total_shares,
            security_metadata,
        })
    }

    #[cfg(feature = "parallel")]
    fn generate_factors(&self, bits: usize, budget: &PrimeSearchBudget) -> Result<PrivateKey> {
        let rounds = self.config.miller_rabin_rounds;
        let (p, q) = rayon::join(
            || random_prime(bits, rounds, budget),
            || random_prime(bits, rounds, budget),
        );
        Ok(PrivateKey::new(p?, q?))
    }

    #[cfg(not(feature = "parallel"))]
    fn generate_factors(&self, bits: usize, budget: &PrimeSearchBudget) -> Result<PrivateKey> {
        let rounds = self.config.miller_rabin_rounds;
        let p = random_prime(bits, rounds, budget)?;
        let q = random_prime(bits, rounds, budget)?;
        Ok(PrivateKey::new(p, q))
    }

    /// Smallest prime `>= 2^max(bits(p) + margin, min_field_bits)`.
    fn select_field_prime(&self, p: &BigInt) -> BigInt {
        let exponent = (p.bits() + self.config.field_margin_bits).max(self.config.min_field_bits);
        smallest_prime_from_power_of_two(
            exponent,
            self.config.miller_rabin_rounds,
            self.config.use_known_field_primes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_integer::Integer;
    use num_traits::{One, Zero};
    use rug::integer::{IsPrime, Order};

    fn fermat_base_two(p: &BigInt) -> bool {
        BigInt::from(2).modpow(&(p - 1u32), p).is_one()
    }

    #[test]
    fn test_keygen_produces_valid_factorization() {
        let result = PaillierKeyGenerator::default().generate(1024, 3, 2).unwrap();
        assert_eq!(result.shares.len(), 3);
        assert_eq!(result.public_key.bit_length, 1024);

        let p = shamir::reconstruct(&result.shares[1..], 2).unwrap();
        let n = &result.public_key.n;
        assert!(n.mod_floor(&p).is_zero());
        let q = n / &p;
        assert_eq!(&p * &q, *n);
        assert_eq!(p.bits(), 512);
        assert_eq!(q.bits(), 512);
        assert_eq!(result.security_metadata.p_bit_length, 512);

        for factor in [&p, &q] {
            let as_gmp = rug::Integer::from_digits(&factor.to_bytes_be().1, Order::Msf);
            assert!(as_gmp.is_probably_prime(25) != IsPrime::No);
            assert!(fermat_base_two(factor));
        }
    }

    #[test]
    fn test_field_prime_margin() {
        let result = PaillierKeyGenerator::default().generate(1024, 5, 3).unwrap();
        let field = &result.security_metadata.field_prime;
        // smallest prime >= 2^(512 + 128)
        assert_eq!(field.bits(), 641);
        assert_eq!(*field, (BigInt::one() << 640u32) + 115u32);
        assert!(result.shares.iter().all(|s| &s.field_prime == field));
        assert_eq!(
            result.security_metadata.sharing_method,
            Some(SharingMethod::DirectP)
        );
    }

    #[test]
    fn test_field_prime_without_table_matches() {
        let config = KeyGenConfig {
            use_known_field_primes: false,
            ..Default::default()
        };
        let result = PaillierKeyGenerator::new(config).unwrap().generate(1024, 2, 2).unwrap();
        assert_eq!(
            result.security_metadata.field_prime,
            (BigInt::one() << 640u32) + 115u32
        );
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let keygen = PaillierKeyGenerator::default();
        for (bits, total, threshold) in [(1024, 3, 4), (1024, 3, 0), (512, 3, 2), (1025, 3, 2)] {
            assert!(
                matches!(
                    keygen.generate(bits, total, threshold),
                    Err(Error::InvalidParameters(_))
                ),
                "accepted ({}, {}, {})",
                bits,
                total,
                threshold
            );
        }
    }

    #[test]
    fn test_deadline_surfaces_as_keygen_failure() {
        let config = KeyGenConfig {
            deadline_ms: Some(0),
            ..Default::default()
        };
        let keygen = PaillierKeyGenerator::new(config).unwrap();
        assert!(matches!(
            keygen.generate(1024, 3, 2),
            Err(Error::KeyGenFailure(_))
        ));
    }

    #[test]
    fn test_public_record_excludes_shares() {
        let result = PaillierKeyGenerator::default().generate(1024, 3, 3).unwrap();
        let (record, shares) = result.into_parts();
        assert_eq!(shares.len(), 3);
        let json = record.to_json().unwrap();
        assert!(json.contains(r#""sharing_method":"direct_p""#));
        assert!(!json.contains("\"shares\""));
        for share in &shares {
            assert!(!json.contains(&share.value.to_str_radix(10)));
        }
        let back = PublicKeyRecord::from_json(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.reconstruction_policy(), ReconstructionPolicy::direct_only());
    }

    #[test]
    fn test_untagged_legacy_record_keeps_fallback() {
        let json = r#"{
            "public_key": {"n": "1081", "bit_length": 11},
            "security_metadata": {"p_bit_length": 5, "field_prime": "127"},
            "threshold": 2,
            "total_shares": 3,
            "fingerprint": "legacy"
        }"#;
        let record = PublicKeyRecord::from_json(json).unwrap();
        assert_eq!(record.security_metadata.sharing_method, None);
        assert_eq!(record.reconstruction_policy(), ReconstructionPolicy::default());
    }
}
