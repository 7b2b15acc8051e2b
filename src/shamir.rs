//! Shamir secret sharing over a prime field.

use log::debug;
use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

use crate::config::DEFAULT_MILLER_RABIN_ROUNDS;
use crate::error::{Error, Result};
use crate::functions::{is_probable_prime, mod_inverse, wipe};
use crate::polynomial::Polynomial;

/// One authority's point `(index, f(index))` on the sharing polynomial.
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    pub index: u32,
    pub value: BigInt,
    pub field_prime: BigInt,
}

impl Share {
    pub fn new(index: u32, value: BigInt, field_prime: BigInt) -> Self {
        Share {
            index,
            value,
            field_prime,
        }
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("value", &"<redacted>")
            .field("field_bits", &self.field_prime.bits())
            .finish()
    }
}

impl Zeroize for Share {
    fn zeroize(&mut self) {
        wipe(&mut self.value);
        // index and field_prime are public
    }
}

impl Drop for Share {
    fn drop(&mut self) {
        self.zeroize();
    }
}

fn ensure_prime_field(field_prime: &BigInt) -> Result<()> {
    if !is_probable_prime(field_prime, DEFAULT_MILLER_RABIN_ROUNDS) {
        return Err(Error::InvalidField(format!(
            "{}-bit field modulus is not prime",
            field_prime.bits()
        )));
    }
    Ok(())
}

/// Splits `secret` into `total` shares, any `threshold` of which recover it.
pub fn split(
    secret: &BigInt,
    total: u32,
    threshold: u32,
    field_prime: &BigInt,
) -> Result<Vec<Share>> {
    if threshold < 1 || threshold > total {
        return Err(Error::InvalidParameters(format!(
            "threshold {} not in [1, {}]",
            threshold, total
        )));
    }
    ensure_prime_field(field_prime)?;
    if secret.sign() == Sign::Minus || secret >= field_prime {
        return Err(Error::InvalidField(format!(
            "{}-bit field cannot hold a {}-bit secret",
            field_prime.bits(),
            secret.bits()
        )));
    }
    if BigInt::from(total) >= *field_prime {
        return Err(Error::InvalidField(format!(
            "field too small for {} shares",
            total
        )));
    }

    let poly = Polynomial::with_secret(secret, threshold as usize - 1, field_prime)?;
    let shares = (1..=total)
        .map(|index| Share::new(index, poly.evaluate(&BigInt::from(index)), field_prime.clone()))
        .collect();
    Ok(shares)
}

/// Checks a share set for consistency and drops exact duplicates.
///
/// The returned shares are ordered by index.
pub fn distinct_shares(shares: &[Share]) -> Result<Vec<Share>> {
    let Some(first) = shares.first() else {
        return Ok(Vec::new());
    };
    let field_prime = &first.field_prime;

    let mut by_index: BTreeMap<u32, &Share> = BTreeMap::new();
    for share in shares {
        if share.field_prime != *field_prime {
            return Err(Error::FieldMismatch);
        }
        if share.index == 0 {
            return Err(Error::MalformedShare("share index 0".to_string()));
        }
        if share.value.sign() == Sign::Minus || share.value >= *field_prime {
            return Err(Error::MalformedShare(format!(
                "share {} value outside the field",
                share.index
            )));
        }
        match by_index.get(&share.index) {
            Some(existing) if existing.value == share.value => {
                debug!("dropping duplicate share {}", share.index);
            }
            Some(_) => return Err(Error::ConflictingShare { index: share.index }),
            None => {
                by_index.insert(share.index, share);
            }
        }
    }
    Ok(by_index.into_values().cloned().collect())
}

/// Lagrange interpolation at `x = 0`.
///
/// Expects shares that already passed [`distinct_shares`].
pub(crate) fn interpolate_at_zero(shares: &[Share]) -> Result<BigInt> {
    let Some(first) = shares.first() else {
        return Err(Error::InsufficientShares { got: 0, need: 1 });
    };
    let p = &first.field_prime;

    let mut secret = BigInt::zero();
    for (i, share_i) in shares.iter().enumerate() {
        let xi = BigInt::from(share_i.index);
        let mut num = BigInt::one();
        let mut den = BigInt::one();
        for (j, share_j) in shares.iter().enumerate() {
            if i == j {
                continue;
            }
            let xj = BigInt::from(share_j.index);
            num = (num * &xj).mod_floor(p);
            den = (den * (&xj - &xi)).mod_floor(p);
        }
        let den_inv = mod_inverse(&den, p).map_err(|_| {
            Error::InvalidField("lagrange denominator not invertible".to_string())
        })?;
        let basis = (num * den_inv).mod_floor(p);
        secret = (secret + &share_i.value * basis).mod_floor(p);
    }
    Ok(secret)
}

/// Recovers the secret from at least `threshold` distinct shares.
pub fn reconstruct(shares: &[Share], threshold: u32) -> Result<BigInt> {
    if threshold < 1 {
        return Err(Error::InvalidParameters("threshold must be positive".to_string()));
    }
    let need = threshold as usize;
    let distinct = distinct_shares(shares)?;
    if distinct.len() < need {
        return Err(Error::InsufficientShares {
            got: distinct.len(),
            need,
        });
    }
    ensure_prime_field(&distinct[0].field_prime)?;
    interpolate_at_zero(&distinct)
}
