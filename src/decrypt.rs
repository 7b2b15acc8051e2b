//! Paillier decryption from reconstructed factors.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use std::fmt;
use zeroize::Zeroize;

use crate::config::DecryptionBounds;
use crate::error::{Error, Result};
use crate::functions::{lcm, mod_inverse, wipe};
use crate::pub_key::PublicKey;
use crate::tally::{DecryptedTally, EncryptedTally};

/// The factors of `n`. Lives only between reconstruction and decryption.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub p: BigInt,
    pub q: BigInt,
}

impl PrivateKey {
    pub fn new(p: BigInt, q: BigInt) -> Self {
        PrivateKey { p, q }
    }

    pub fn modulus(&self) -> BigInt {
        &self.p * &self.q
    }

    /// Carmichael's `λ(n) = lcm(p - 1, q - 1)`.
    pub fn lambda(&self) -> BigInt {
        lcm(&(&self.p - 1u32), &(&self.q - 1u32))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("p", &"<redacted>")
            .field("q", &"<redacted>")
            .finish()
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        wipe(&mut self.p);
        wipe(&mut self.q);
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// `L(x) = (x - 1) / n`, defined only when `x ≡ 1 (mod n)`.
fn l_function(x: &BigInt, n: &BigInt) -> Result<BigInt> {
    let (quotient, remainder) = (x - 1u32).div_rem(n);
    if !remainder.is_zero() {
        return Err(Error::DecryptionFailure(
            "L(x) is not integral; key and ciphertext do not belong together".to_string(),
        ));
    }
    Ok(quotient)
}

/// Decryption context holding `λ` and `μ` for one key.
pub struct PaillierDecryptor {
    public_key: PublicKey,
    n_squared: BigInt,
    lambda: BigInt,
    mu: BigInt,
}

impl PaillierDecryptor {
    pub fn new(public_key: &PublicKey, private_key: &PrivateKey) -> Result<Self> {
        if private_key.p <= BigInt::one()
            || private_key.q <= BigInt::one()
            || private_key.modulus() != public_key.n
        {
            return Err(Error::DecryptionFailure(format!(
                "factors do not match key {}",
                public_key.fingerprint()
            )));
        }
        let n = &public_key.n;
        let n_squared = public_key.n_squared();
        let lambda = private_key.lambda();
        let g = n + 1u32;
        let u = g.modpow(&lambda, &n_squared);
        let mu = mod_inverse(&l_function(&u, n)?, n).map_err(|_| {
            Error::DecryptionFailure("μ = L(g^λ)^-1 mod n does not exist".to_string())
        })?;
        Ok(PaillierDecryptor {
            public_key: public_key.clone(),
            n_squared,
            lambda,
            mu,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Raw plaintext residue in `[0, n)`, with no plausibility check.
    pub fn decrypt_residue(&self, ciphertext: &BigInt) -> Result<BigInt> {
        self.public_key.check_ciphertext(ciphertext)?;
        let n = &self.public_key.n;
        let x = ciphertext.modpow(&self.lambda, &self.n_squared);
        Ok((l_function(&x, n)? * &self.mu).mod_floor(n))
    }

    /// Plaintext in `[0, n/2]`.
    ///
    /// Residues in the upper half of `Z_n` stand for negative numbers and
    /// never come out of a correct tally, so they are a `DecryptionFailure`.
    pub fn decrypt(&self, ciphertext: &BigInt) -> Result<BigInt> {
        let residue = self.decrypt_residue(ciphertext)?;
        let half = &self.public_key.n >> 1u32;
        if residue > half {
            return Err(Error::DecryptionFailure(
                "plaintext is a negative residue; key or ciphertext mismatch".to_string(),
            ));
        }
        Ok(residue)
    }

    /// Reads a decrypted plaintext as a vote count.
    pub fn decrypt_count(&self, ciphertext: &BigInt, bounds: &DecryptionBounds) -> Result<u64> {
        let residue = self.decrypt(ciphertext)?;
        let count = residue.to_u64().ok_or_else(|| {
            Error::DecryptionFailure("plaintext too large to be a vote count".to_string())
        })?;
        if let Some(max) = bounds.max_vote_count {
            if count > max {
                return Err(Error::DecryptionFailure(format!(
                    "count {} exceeds the bound of {}",
                    count, max
                )));
            }
        }
        Ok(count)
    }

    pub fn decrypt_tallies(
        &self,
        tallies: &[EncryptedTally],
        bounds: &DecryptionBounds,
    ) -> Result<Vec<DecryptedTally>> {
        tallies
            .iter()
            .map(|tally| {
                Ok(DecryptedTally {
                    candidate_id: tally.candidate_id.clone(),
                    vote_count: self.decrypt_count(&tally.encrypted_total, bounds)?,
                })
            })
            .collect()
    }
}

impl Drop for PaillierDecryptor {
    fn drop(&mut self) {
        wipe(&mut self.lambda);
        wipe(&mut self.mu);
    }
}

/// One-shot decryption of a single ciphertext; negative residues fail as in
/// [`PaillierDecryptor::decrypt`].
pub fn decrypt(
    public_key: &PublicKey,
    private_key: &PrivateKey,
    ciphertext: &BigInt,
) -> Result<BigInt> {
    PaillierDecryptor::new(public_key, private_key)?.decrypt(ciphertext)
}
