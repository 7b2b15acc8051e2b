//! Homomorphic accumulation of encrypted ballots.
//!
//! Adding plaintexts under Paillier is multiplying ciphertexts mod `n^2`.
//! A bad ciphertext is skipped and counted rather than failing the whole
//! candidate: one corrupt record must not block an election's tally.

use log::warn;
use num_bigint::BigInt;
use num_traits::One;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pub_key::PublicKey;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyOutcome {
    /// Product of every accepted ciphertext; `1` (an encryption of zero)
    /// when nothing was accepted.
    pub combined: BigInt,
    pub accumulated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedTally {
    pub candidate_id: String,
    #[serde(with = "crate::serde_support::bigint_decimal")]
    pub encrypted_total: BigInt,
    pub accumulated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedTally {
    pub candidate_id: String,
    pub vote_count: u64,
}

struct Accumulator<'a> {
    public_key: &'a PublicKey,
    n_squared: BigInt,
    combined: Option<BigInt>,
    accumulated: usize,
    skipped: usize,
}

impl<'a> Accumulator<'a> {
    fn new(public_key: &'a PublicKey) -> Self {
        Accumulator {
            public_key,
            n_squared: public_key.n_squared(),
            combined: None,
            accumulated: 0,
            skipped: 0,
        }
    }

    fn push(&mut self, c: &BigInt) {
        if !self.public_key.is_unit_below(c, &self.n_squared) {
            self.skipped += 1;
            return;
        }
        self.combined = Some(match self.combined.take() {
            None => c.clone(),
            Some(acc) => (acc * c) % &self.n_squared,
        });
        self.accumulated += 1;
    }

    fn skip(&mut self) {
        self.skipped += 1;
    }

    fn finish(self) -> TallyOutcome {
        if self.skipped > 0 {
            warn!(
                "skipped {} of {} ciphertexts under key {}",
                self.skipped,
                self.skipped + self.accumulated,
                self.public_key.fingerprint()
            );
        }
        TallyOutcome {
            combined: self.combined.unwrap_or_else(BigInt::one),
            accumulated: self.accumulated,
            skipped: self.skipped,
        }
    }
}

/// Folds one candidate's ciphertexts into a single encrypted total.
pub fn accumulate(public_key: &PublicKey, ciphertexts: &[BigInt]) -> TallyOutcome {
    let mut acc = Accumulator::new(public_key);
    for c in ciphertexts {
        acc.push(c);
    }
    acc.finish()
}

/// Same as [`accumulate`] over decimal strings; unparseable entries count as skipped.
pub fn accumulate_decimal<S: AsRef<str>>(public_key: &PublicKey, ciphertexts: &[S]) -> TallyOutcome {
    let mut acc = Accumulator::new(public_key);
    for text in ciphertexts {
        match public_key.parse_ciphertext(text.as_ref()) {
            Ok(c) => acc.push(&c),
            Err(_) => acc.skip(),
        }
    }
    acc.finish()
}

fn candidate_tally(public_key: &PublicKey, candidate_id: &str, ballots: &[BigInt]) -> EncryptedTally {
    let outcome = accumulate(public_key, ballots);
    if outcome.skipped > 0 {
        warn!(
            "candidate {}: {} ciphertext(s) skipped",
            candidate_id, outcome.skipped
        );
    }
    EncryptedTally {
        candidate_id: candidate_id.to_string(),
        encrypted_total: outcome.combined,
        accumulated: outcome.accumulated,
        skipped: outcome.skipped,
    }
}

/// Tallies every candidate independently, in candidate-id order.
pub fn tally_candidates(
    public_key: &PublicKey,
    ballots: &BTreeMap<String, Vec<BigInt>>,
) -> Vec<EncryptedTally> {
    let entries: Vec<(&String, &Vec<BigInt>)> = ballots.iter().collect();

    #[cfg(feature = "parallel")]
    let iter = entries.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = entries.iter();

    iter.map(|(id, cts)| candidate_tally(public_key, id, cts))
        .collect()
}
