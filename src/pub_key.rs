use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::functions::{fingerprint, random_mod};

/// Draws allowed when sampling a unit mod `n`. For an RSA modulus almost
/// every draw is a unit.
const MAX_UNIT_DRAWS: usize = 128;

/// Paillier public key with generator `g = n + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredPublicKey")]
pub struct PublicKey {
    #[serde(with = "crate::serde_support::bigint_decimal")]
    pub n: BigInt,
    pub bit_length: usize,
}

/// Wire shape of a stored key, checked before it becomes a [`PublicKey`].
#[derive(Deserialize)]
struct StoredPublicKey {
    #[serde(with = "crate::serde_support::bigint_decimal")]
    n: BigInt,
    bit_length: usize,
}

impl TryFrom<StoredPublicKey> for PublicKey {
    type Error = Error;

    fn try_from(stored: StoredPublicKey) -> Result<Self> {
        if stored.n <= BigInt::one() || stored.n.is_even() {
            return Err(Error::InvalidParameters(
                "stored modulus must be odd and greater than 1".to_string(),
            ));
        }
        let key = PublicKey::new(stored.n);
        if key.bit_length != stored.bit_length {
            return Err(Error::InvalidParameters(format!(
                "stored bit_length {} does not match a {}-bit modulus",
                stored.bit_length, key.bit_length
            )));
        }
        Ok(key)
    }
}

impl PublicKey {
    pub fn new(n: BigInt) -> Self {
        let bit_length = n.bits() as usize;
        PublicKey { n, bit_length }
    }

    pub fn n_squared(&self) -> BigInt {
        &self.n * &self.n
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.n)
    }

    /// Whether `c` is a unit of `Z_{n^2}`. Zero and multiples of a prime
    /// factor of `n` are not valid ciphertexts.
    pub fn contains_ciphertext(&self, c: &BigInt) -> bool {
        self.is_unit_below(c, &self.n_squared())
    }

    pub(crate) fn is_unit_below(&self, c: &BigInt, n_squared: &BigInt) -> bool {
        c.sign() == Sign::Plus && c < n_squared && c.gcd(&self.n).is_one()
    }

    pub fn check_ciphertext(&self, c: &BigInt) -> Result<()> {
        if self.contains_ciphertext(c) {
            Ok(())
        } else {
            Err(Error::InvalidCiphertext(format!(
                "not a unit below n^2 for key {}",
                self.fingerprint()
            )))
        }
    }

    /// Parses a decimal-string ciphertext as stored by the vote collector.
    pub fn parse_ciphertext(&self, text: &str) -> Result<BigInt> {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidCiphertext("not a decimal integer".to_string()));
        }
        let c = BigInt::parse_bytes(text.as_bytes(), 10)
            .ok_or_else(|| Error::InvalidCiphertext("not a decimal integer".to_string()))?;
        self.check_ciphertext(&c)?;
        Ok(c)
    }

    pub fn encrypt(&self, message: &BigInt) -> Result<BigInt> {
        let r = self.random_unit()?;
        self.encrypt_with_randomness(message, &r)
    }

    /// `c = g^m * r^n mod n^2`.
    pub fn encrypt_with_randomness(&self, message: &BigInt, r: &BigInt) -> Result<BigInt> {
        if message.sign() == Sign::Minus || *message >= self.n {
            return Err(Error::InvalidParameters("plaintext outside [0, n)".to_string()));
        }
        if r.sign() != Sign::Plus || *r >= self.n || !r.gcd(&self.n).is_one() {
            return Err(Error::InvalidParameters(
                "randomness is not a unit mod n".to_string(),
            ));
        }
        let n_sq = self.n_squared();
        // (n + 1)^m = 1 + m n  (mod n^2)
        let g_m = (BigInt::one() + message * &self.n) % &n_sq;
        let r_n = r.modpow(&self.n, &n_sq);
        Ok((g_m * r_n) % &n_sq)
    }

    /// Homomorphic addition of two plaintexts.
    pub fn add(&self, c1: &BigInt, c2: &BigInt) -> Result<BigInt> {
        self.check_ciphertext(c1)?;
        self.check_ciphertext(c2)?;
        Ok((c1 * c2) % self.n_squared())
    }

    pub fn random_unit(&self) -> Result<BigInt> {
        if self.n <= BigInt::one() {
            return Err(Error::InvalidParameters("modulus must exceed 1".to_string()));
        }
        for _ in 0..MAX_UNIT_DRAWS {
            let r = random_mod(&self.n, &mut OsRng)?;
            if !r.is_zero() && r.gcd(&self.n).is_one() {
                return Ok(r);
            }
        }
        Err(Error::InvalidParameters(format!(
            "no unit found after {} draws for key {}",
            MAX_UNIT_DRAWS,
            self.fingerprint()
        )))
    }
}
