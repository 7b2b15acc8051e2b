use crate::functions::{random_mod, wipe, FunctionError};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::Zero;
use rand::rngs::OsRng;

/// Polynomial over `Z_p` whose constant term is the shared secret.
pub struct Polynomial {
    coefficients: Vec<BigInt>,
    modulus: BigInt,
}

impl Polynomial {
    /// `f(x) = secret + a_1 x + ... + a_degree x^degree mod modulus` with
    /// uniformly random `a_i` in `[0, modulus)`.
    pub fn with_secret(
        secret: &BigInt,
        degree: usize,
        modulus: &BigInt,
    ) -> Result<Self, FunctionError> {
        let mut rng = OsRng;
        let mut coefficients = Vec::with_capacity(degree + 1);
        coefficients.push(secret.mod_floor(modulus));
        for _ in 0..degree {
            coefficients.push(random_mod(modulus, &mut rng)?);
        }
        Ok(Polynomial {
            coefficients,
            modulus: modulus.clone(),
        })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Horner evaluation mod the field prime.
    pub fn evaluate(&self, x: &BigInt) -> BigInt {
        self.coefficients
            .iter()
            .rev()
            .fold(BigInt::zero(), |acc, coeff| (acc * x + coeff).mod_floor(&self.modulus))
    }
}

impl Drop for Polynomial {
    fn drop(&mut self) {
        self.coefficients.iter_mut().for_each(wipe);
        self.coefficients.clear();
    }
}
