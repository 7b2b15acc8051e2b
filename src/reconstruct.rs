//! Threshold recovery of the Paillier factors from authority shares.
//!
//! Keys generated here share `p` directly, but records issued before the
//! `sharing_method` tag existed may share `φ(n)` or `λ(n)` instead, and
//! nothing in those records says which. Recovery therefore runs in two
//! phases over the interpolated secret `s`:
//!
//! 1. `direct_p`: `s` divides `n`.
//! 2. legacy, in order: `old_phi_n` (`s = φ(n)`, factors from the roots of
//!    `t^2 - (n - φ + 1) t + n`), `lambda_gcd` (`gcd(s, n)`), and
//!    `old_lambda_n` (`k s = φ(n)` for small `k`).
//!
//! Every candidate pair is checked against `p q = n` before it is returned.

use log::{info, warn};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::config::{LegacyFallback, ReconstructionPolicy};
use crate::decrypt::PrivateKey;
use crate::error::{Error, Result};
use crate::functions::{exact_isqrt, fingerprint, gcd, is_probable_prime, wipe};
use crate::keygen::SharingMethod;
use crate::shamir::{self, Share};
use crate::share_codec;

/// Largest `k` tried when reading the secret as `λ(n) = φ(n) / k`.
/// `k = gcd(p - 1, q - 1)`, which is small for random primes.
pub const MAX_LAMBDA_MULTIPLIER: u32 = 64;

#[derive(Debug)]
pub struct Reconstruction {
    pub private_key: PrivateKey,
    pub method: SharingMethod,
    /// Share indices whose interpolation produced the factors.
    pub indices_used: Vec<u32>,
}

/// Lexicographic `k`-subsets of `0..n`.
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Combinations {
            n,
            indices: (0..k).collect(),
            started: false,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let k = self.indices.len();
        if k > self.n {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.indices[i] < self.n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                return Some(self.indices.clone());
            }
        }
        None
    }
}

fn validate_pair(p: &BigInt, n: &BigInt) -> Option<PrivateKey> {
    if p <= &BigInt::one() || p >= n {
        return None;
    }
    let (q, remainder) = n.div_rem(p);
    if !remainder.is_zero() || q <= BigInt::one() || &(p * &q) != n {
        return None;
    }
    Some(PrivateKey::new(p.clone(), q))
}

fn from_direct_prime(s: &BigInt, n: &BigInt) -> Option<PrivateKey> {
    validate_pair(s, n)
}

/// Reads `phi` as `(p - 1)(q - 1)`: `p + q = n - φ + 1` and `p q = n`.
fn from_phi(phi: &BigInt, n: &BigInt) -> Option<PrivateKey> {
    if phi <= &BigInt::zero() || phi >= n {
        return None;
    }
    let sum_pq = n - phi + 1u32;
    let discriminant = &sum_pq * &sum_pq - n * 4u32;
    if discriminant < BigInt::zero() {
        return None;
    }
    let root = exact_isqrt(&discriminant)?;
    [&sum_pq + &root, &sum_pq - &root]
        .iter()
        .filter(|twice| twice.is_even())
        .find_map(|twice| validate_pair(&(twice >> 1u32), n))
}

fn from_lambda_gcd(s: &BigInt, n: &BigInt) -> Option<PrivateKey> {
    let g = gcd(s, n);
    if g <= BigInt::one() {
        return None;
    }
    validate_pair(&(&g + 1u32), n).or_else(|| validate_pair(&g, n))
}

fn from_lambda_multiple(lambda: &BigInt, n: &BigInt) -> Option<PrivateKey> {
    (2..=MAX_LAMBDA_MULTIPLIER).find_map(|k| from_phi(&(lambda * k), n))
}

pub struct ThresholdReconstructor {
    policy: ReconstructionPolicy,
}

impl Default for ThresholdReconstructor {
    fn default() -> Self {
        ThresholdReconstructor::new(ReconstructionPolicy::default())
    }
}

impl ThresholdReconstructor {
    pub fn new(policy: ReconstructionPolicy) -> Self {
        ThresholdReconstructor { policy }
    }

    /// Recovers `(p, q)` from at least `threshold` shares of one ceremony.
    ///
    /// If the full share set does not factor `n` and more than `threshold`
    /// distinct shares were given, every `threshold`-subset is tried in turn,
    /// so a corrupted share is tolerated while enough honest ones remain.
    pub fn reconstruct(
        &self,
        shares: &[Share],
        threshold: u32,
        public_n: &BigInt,
    ) -> Result<Reconstruction> {
        if threshold < 1 {
            return Err(Error::InvalidParameters("threshold must be positive".to_string()));
        }
        if public_n <= &BigInt::one() {
            return Err(Error::InvalidParameters("public modulus must exceed 1".to_string()));
        }
        let need = threshold as usize;
        let distinct = shamir::distinct_shares(shares)?;
        if distinct.len() < need {
            return Err(Error::InsufficientShares {
                got: distinct.len(),
                need,
            });
        }
        let field_prime = &distinct[0].field_prime;
        if !is_probable_prime(field_prime, self.policy.miller_rabin_rounds) {
            return Err(Error::InvalidField(format!(
                "{}-bit field modulus is not prime",
                field_prime.bits()
            )));
        }
        let key_id = fingerprint(public_n);

        if let Some(found) = self.attempt(&distinct, public_n)? {
            info!(
                "reconstructed key {} via {} from shares {:?}",
                key_id, found.method, found.indices_used
            );
            return Ok(found);
        }

        if distinct.len() > need {
            warn!(
                "full set of {} shares did not factor key {}, trying {}-share subsets",
                distinct.len(),
                key_id,
                need
            );
            for (attempt, combo) in Combinations::new(distinct.len(), need).enumerate() {
                if attempt >= self.policy.max_subset_attempts {
                    warn!(
                        "subset search for key {} stopped after {} attempts",
                        key_id, attempt
                    );
                    break;
                }
                let subset: Vec<Share> = combo.iter().map(|&i| distinct[i].clone()).collect();
                if let Some(found) = self.attempt(&subset, public_n)? {
                    let excluded: Vec<u32> = distinct
                        .iter()
                        .map(|s| s.index)
                        .filter(|i| !found.indices_used.contains(i))
                        .collect();
                    warn!(
                        "reconstructed key {} via {} after excluding shares {:?}",
                        key_id, found.method, excluded
                    );
                    return Ok(found);
                }
            }
        }

        Err(Error::ReconstructionFailure(format!(
            "{} share(s) did not yield a factorization of key {}",
            distinct.len(),
            key_id
        )))
    }

    /// Decodes share tokens collected from the authorities, then reconstructs.
    pub fn reconstruct_tokens<S: AsRef<str>>(
        &self,
        tokens: &[S],
        field_prime: &BigInt,
        threshold: u32,
        public_n: &BigInt,
    ) -> Result<Reconstruction> {
        let shares = tokens
            .iter()
            .map(|t| share_codec::decode(t.as_ref(), field_prime))
            .collect::<Result<Vec<Share>>>()?;
        self.reconstruct(&shares, threshold, public_n)
    }

    fn attempt(&self, shares: &[Share], n: &BigInt) -> Result<Option<Reconstruction>> {
        let mut secret = shamir::interpolate_at_zero(shares)?;
        let recovered = self.recover_factors(&secret, n);
        wipe(&mut secret);
        Ok(recovered.map(|(private_key, method)| Reconstruction {
            private_key,
            method,
            indices_used: shares.iter().map(|s| s.index).collect(),
        }))
    }

    fn recover_factors(&self, s: &BigInt, n: &BigInt) -> Option<(PrivateKey, SharingMethod)> {
        if let Some(key) = from_direct_prime(s, n) {
            return Some((key, SharingMethod::DirectP));
        }
        if self.policy.legacy_fallback == LegacyFallback::Forbid {
            return None;
        }
        let legacy = from_phi(s, n)
            .map(|key| (key, SharingMethod::OldPhiN))
            .or_else(|| from_lambda_gcd(s, n).map(|key| (key, SharingMethod::LambdaGcd)))
            .or_else(|| from_lambda_multiple(s, n).map(|key| (key, SharingMethod::OldLambdaN)));
        if let Some((_, method)) = &legacy {
            warn!(
                "key {} recovered through legacy encoding {}",
                fingerprint(n),
                method
            );
        }
        legacy
    }
}
