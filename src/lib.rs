//! This crate implements threshold-shared Paillier keys for election tallying.
//!
//! Based on:
//! [Paillier, 1999](https://link.springer.com/chapter/10.1007/3-540-48910-X_16) and
//! [Shamir, 1979](https://dl.acm.org/doi/10.1145/359168.359176)
//!
//! A key is generated once per election. Its prime factor `p` is split into
//! Shamir shares held by the election authorities, so no single authority can
//! decrypt. Ballots are encrypted under the public key and summed without
//! decryption. After polls close, a quorum of authorities submits shares, the
//! factors are recovered and only the per-candidate totals are decrypted.
//!
//! # Example
//! ```no_run
//! use std::collections::BTreeMap;
//! use num_bigint::BigInt;
//! use threshold_tally::{
//!     tally_candidates, DecryptionBounds, PaillierDecryptor, PaillierKeyGenerator,
//!     ThresholdReconstructor,
//! };
//!
//! let keys = PaillierKeyGenerator::default().generate(2048, 5, 3).unwrap();
//! let record = keys.public_record();
//!
//! let mut ballots = BTreeMap::new();
//! ballots.insert(
//!     "alice".to_string(),
//!     vec![record.public_key.encrypt(&BigInt::from(1)).unwrap()],
//! );
//! let tallies = tally_candidates(&record.public_key, &ballots);
//!
//! let recovered = ThresholdReconstructor::new(record.reconstruction_policy())
//!     .reconstruct(&keys.shares[..3], record.threshold, &record.public_key.n)
//!     .unwrap();
//! let decryptor = PaillierDecryptor::new(&record.public_key, &recovered.private_key).unwrap();
//! let counts = decryptor
//!     .decrypt_tallies(&tallies, &DecryptionBounds::default())
//!     .unwrap();
//! assert_eq!(counts[0].vote_count, 1);
//! ```

pub mod config;
pub mod decrypt;
pub mod error;
pub mod functions;
pub mod keygen;
pub mod polynomial;
pub mod pub_key;
pub mod reconstruct;
pub mod serde_support;
pub mod shamir;
pub mod share_codec;
pub mod tally;

pub use config::{DecryptionBounds, KeyGenConfig, LegacyFallback, ReconstructionPolicy};
pub use decrypt::{PaillierDecryptor, PrivateKey};
pub use error::{Error, Result};
pub use keygen::{
    KeyGenerationResult, PaillierKeyGenerator, PublicKeyRecord, SecurityMetadata, SharingMethod,
};
pub use pub_key::PublicKey;
pub use reconstruct::{Reconstruction, ThresholdReconstructor};
pub use shamir::Share;
pub use share_codec::ShareFormat;
pub use tally::{accumulate, accumulate_decimal, tally_candidates, DecryptedTally, EncryptedTally, TallyOutcome};
