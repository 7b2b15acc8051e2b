use log::{debug, warn};
use num_bigint::{BigInt, Sign};
use num_integer::Integer as _;
use num_traits::{One, Zero};
use rand::{rngs::OsRng, RngCore};
use rug::{
    integer::{IsPrime, Order},
    rand::RandState,
    Integer,
};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::convert::TryInto;
use std::time::Instant;
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("random number generation failed")]
    RandomNumberGeneration,
    #[error("prime search exhausted after {0} attempts")]
    PrimeSearchExhausted(u32),
    #[error("prime search deadline exceeded")]
    DeadlineExceeded,
    #[error("invalid bit length")]
    InvalidBitLength,
    #[error("modular inverse does not exist")]
    NoInverse,
}

/// Offsets `d` such that `2^k + d` is the smallest prime `>= 2^k`.
///
/// A lookup shortcut for field selection at the exponents produced by 1024,
/// 2048 and 4096-bit keys (and the 512-bit floor). Every entry is re-checked
/// with the primality test before it is handed out.
pub const KNOWN_FIELD_PRIMES: &[(u64, u32)] = &[(512, 75), (640, 115), (1152, 561), (2176, 1987)];

/// Bounds a single prime search by attempt count and, optionally, wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct PrimeSearchBudget {
    pub max_attempts: u32,
    pub deadline: Option<Instant>,
}

impl PrimeSearchBudget {
    pub fn new(max_attempts: u32, deadline: Option<Instant>) -> Self {
        PrimeSearchBudget {
            max_attempts,
            deadline,
        }
    }

    fn expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

pub(crate) fn to_gmp(x: &BigInt) -> Integer {
    let (sign, bytes) = x.to_bytes_be();
    let magnitude = Integer::from_digits(&bytes, Order::Msf);
    if sign == Sign::Minus {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) fn from_gmp(x: &Integer) -> BigInt {
    let magnitude = BigInt::from_bytes_be(Sign::Plus, &x.to_digits::<u8>(Order::Msf));
    if x.cmp0() == Ordering::Less {
        -magnitude
    } else {
        magnitude
    }
}

fn seeded_rand_state<'a>() -> RandState<'a> {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let mut rand_state = RandState::new();
    rand_state.seed(&Integer::from_digits(&seed, Order::Msf));
    seed.zeroize();
    rand_state
}

/// Uniform sample in `[0, n)` by rejection.
pub fn random_mod(n: &BigInt, rng: &mut impl RngCore) -> Result<BigInt, FunctionError> {
    if n <= &BigInt::zero() {
        return Err(FunctionError::RandomNumberGeneration);
    }
    let bits = n.bits() as usize;
    let mut bytes = vec![0u8; (bits + 7) / 8];
    let excess = bytes.len() * 8 - bits;
    let result = loop {
        rng.fill_bytes(&mut bytes);
        // mask the excess high bits so rejection stays below 1/2 per draw
        bytes[0] &= 0xff >> excess;
        let candidate = BigInt::from_bytes_be(Sign::Plus, &bytes);
        if candidate < *n {
            break candidate;
        }
    };
    bytes.zeroize();
    Ok(result)
}

pub fn is_probable_prime(x: &BigInt, rounds: u32) -> bool {
    if x <= &BigInt::one() {
        return false;
    }
    to_gmp(x).is_probably_prime(rounds) != IsPrime::No
}

/// Smallest prime strictly greater than `x`.
pub fn next_prime(x: &BigInt) -> BigInt {
    from_gmp(&to_gmp(x).next_prime())
}

/// Random prime of exactly `bits` bits with the top two bits set, so the
/// product of two such primes has exactly `2 * bits` bits.
pub fn random_prime(
    bits: usize,
    rounds: u32,
    budget: &PrimeSearchBudget,
) -> Result<BigInt, FunctionError> {
    if bits < 16 {
        return Err(FunctionError::InvalidBitLength);
    }
    let bits_u32: u32 = bits
        .try_into()
        .map_err(|_| FunctionError::InvalidBitLength)?;
    let mut rand_state = seeded_rand_state();
    for attempt in 1..=budget.max_attempts {
        if budget.expired() {
            return Err(FunctionError::DeadlineExceeded);
        }
        let mut candidate: Integer = Integer::random_bits(bits_u32, &mut rand_state).into();
        candidate.set_bit(bits_u32 - 1, true);
        candidate.set_bit(bits_u32 - 2, true);
        let candidate = candidate.next_prime();
        if candidate.significant_bits() == bits_u32
            && candidate.is_probably_prime(rounds) != IsPrime::No
        {
            debug!("found {}-bit prime after {} attempt(s)", bits, attempt);
            return Ok(from_gmp(&candidate));
        }
    }
    Err(FunctionError::PrimeSearchExhausted(budget.max_attempts))
}

/// Smallest prime `>= 2^exponent`.
pub fn smallest_prime_from_power_of_two(exponent: u64, rounds: u32, use_table: bool) -> BigInt {
    let base = BigInt::one() << exponent;
    if use_table {
        if let Some(&(_, offset)) = KNOWN_FIELD_PRIMES.iter().find(|(k, _)| *k == exponent) {
            let candidate = &base + offset;
            if is_probable_prime(&candidate, rounds) {
                return candidate;
            }
            warn!(
                "tabulated prime for 2^{} failed verification, falling back to search",
                exponent
            );
        }
    }
    next_prime(&base)
}

pub fn mod_inverse(a: &BigInt, m: &BigInt) -> Result<BigInt, FunctionError> {
    if m <= &BigInt::one() {
        return Err(FunctionError::NoInverse);
    }
    let a = a.mod_floor(m);
    let egcd = a.extended_gcd(m);
    if !egcd.gcd.is_one() {
        return Err(FunctionError::NoInverse);
    }
    Ok(egcd.x.mod_floor(m))
}

pub fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    a.gcd(b)
}

pub fn lcm(a: &BigInt, b: &BigInt) -> BigInt {
    a.lcm(b)
}

/// Integer square root, only if `x` is a perfect square.
pub fn exact_isqrt(x: &BigInt) -> Option<BigInt> {
    if x.sign() == Sign::Minus {
        return None;
    }
    let root = x.sqrt();
    if &root * &root == *x {
        Some(root)
    } else {
        None
    }
}

/// Overwrites the limbs of `x` with zeros before they are released.
///
/// `Sign::NoSign` would only clear the digit vector, so the zeros are
/// assigned as a positive magnitude to make the write hit the old buffer.
pub(crate) fn wipe(x: &mut BigInt) {
    let words = (x.bits() as usize).div_ceil(32);
    x.assign_from_slice(Sign::Plus, &vec![0u32; words]);
}

/// Short public identifier for a modulus, safe to log.
pub fn fingerprint(n: &BigInt) -> String {
    let digest = Sha256::digest(n.to_bytes_be().1);
    let mut encoded = hex::encode(digest);
    encoded.truncate(16);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BITLEN: usize = 256;
    const TEST_C: u32 = 40;

    fn unbounded() -> PrimeSearchBudget {
        PrimeSearchBudget::new(10_000, None)
    }

    #[test]
    fn test_random_mod_different() {
        let max = BigInt::one() << TEST_BITLEN;
        let rand1 = random_mod(&max, &mut OsRng).expect("first random number generation failed");
        let rand2 = random_mod(&max, &mut OsRng).expect("second random number generation failed");
        assert_ne!(rand1, rand2, "random numbers are equal");
    }

    #[test]
    fn test_wipe_leaves_zero() {
        let mut positive = BigInt::from(0xdead_beef_u64) << 300;
        wipe(&mut positive);
        assert!(positive.is_zero());
        assert_eq!(positive.sign(), Sign::NoSign);

        let mut negative = BigInt::from(-42);
        wipe(&mut negative);
        assert!(negative.is_zero());

        let mut zero = BigInt::zero();
        wipe(&mut zero);
        assert!(zero.is_zero());
    }

    #[test]
    fn test_random_mod_bounds() {
        let n = BigInt::from(1000);
        for _ in 0..200 {
            let r = random_mod(&n, &mut OsRng).unwrap();
            assert!(r >= BigInt::zero() && r < n);
        }
        assert_eq!(
            random_mod(&BigInt::zero(), &mut OsRng),
            Err(FunctionError::RandomNumberGeneration)
        );
    }

    #[test]
    fn test_random_prime_bit_length() {
        let p = random_prime(TEST_BITLEN, TEST_C, &unbounded()).expect("prime generation failed");
        assert_eq!(p.bits() as usize, TEST_BITLEN);
        assert!(p.bit(TEST_BITLEN as u64 - 2), "second highest bit not set");
        let p_rug = Integer::from_digits(&p.to_bytes_be().1, Order::Msf);
        assert!(p_rug.is_probably_prime(TEST_C) != IsPrime::No, "p is not prime");
    }

    #[test]
    fn test_random_prime_respects_budget() {
        let exhausted = PrimeSearchBudget::new(0, None);
        assert_eq!(
            random_prime(TEST_BITLEN, TEST_C, &exhausted),
            Err(FunctionError::PrimeSearchExhausted(0))
        );
        let expired = PrimeSearchBudget::new(10, Some(Instant::now()));
        assert_eq!(
            random_prime(TEST_BITLEN, TEST_C, &expired),
            Err(FunctionError::DeadlineExceeded)
        );
        assert_eq!(
            random_prime(8, TEST_C, &unbounded()),
            Err(FunctionError::InvalidBitLength)
        );
    }

    #[test]
    fn test_known_field_primes_are_minimal() {
        for &(exponent, offset) in KNOWN_FIELD_PRIMES {
            let base = BigInt::one() << exponent;
            assert_eq!(next_prime(&base), &base + offset, "table entry for 2^{}", exponent);
            assert_eq!(
                smallest_prime_from_power_of_two(exponent, TEST_C, true),
                smallest_prime_from_power_of_two(exponent, TEST_C, false)
            );
        }
    }

    #[test]
    fn test_mod_inverse() {
        let m = BigInt::from(97);
        let a = BigInt::from(-15);
        let inv = mod_inverse(&a, &m).unwrap();
        assert_eq!((a * inv).mod_floor(&m), BigInt::one());
        assert_eq!(
            mod_inverse(&BigInt::from(6), &BigInt::from(9)),
            Err(FunctionError::NoInverse)
        );
    }

    #[test]
    fn test_exact_isqrt() {
        assert_eq!(exact_isqrt(&BigInt::from(144)), Some(BigInt::from(12)));
        assert_eq!(exact_isqrt(&BigInt::from(145)), None);
        assert_eq!(exact_isqrt(&BigInt::from(-4)), None);
        assert_eq!(exact_isqrt(&BigInt::zero()), Some(BigInt::zero()));
    }

    #[test]
    fn test_gmp_conversion_preserves_sign() {
        let x = BigInt::from(-123_456_789_i64) << 200;
        assert_eq!(from_gmp(&to_gmp(&x)), x);
        assert_eq!(from_gmp(&to_gmp(&BigInt::zero())), BigInt::zero());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let n = BigInt::from(1081);
        assert_eq!(fingerprint(&n), fingerprint(&n));
        assert_eq!(fingerprint(&n).len(), 16);
        assert_ne!(fingerprint(&n), fingerprint(&BigInt::from(1082)));
    }
}
