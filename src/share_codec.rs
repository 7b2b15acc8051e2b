//! Textual share tokens.
//!
//! The canonical token is `"{index}:{hex}"`: decimal index, a colon, and the
//! share value in lowercase hex without prefix. Older deployments handed out
//! two other shapes, which are still decoded through a fixed chain:
//!
//! | format      | example        |
//! |-------------|----------------|
//! | `Canonical` | `3:1f0a`       |
//! | `JsonArray` | `[3, "1f0a"]`  |
//! | `Tuple`     | `(3, 1f0a)`    |
//!
//! A token is claimed by the first format in the chain whose shape it has;
//! if that format then fails to parse it, decoding fails. No further variants
//! are tried.

use log::debug;
use num_bigint::{BigInt, Sign};

use crate::error::{Error, Result};
use crate::shamir::Share;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareFormat {
    Canonical,
    JsonArray,
    Tuple,
}

const DECODER_CHAIN: [ShareFormat; 3] = [
    ShareFormat::Canonical,
    ShareFormat::JsonArray,
    ShareFormat::Tuple,
];

impl ShareFormat {
    fn claims(self, token: &str) -> bool {
        match self {
            ShareFormat::Canonical => {
                token.contains(':') && !token.starts_with('[') && !token.starts_with('(')
            }
            ShareFormat::JsonArray => token.starts_with('['),
            ShareFormat::Tuple => token.starts_with('('),
        }
    }

    fn parse(self, token: &str) -> Result<(u32, BigInt)> {
        match self {
            ShareFormat::Canonical => {
                let (index, value) = token
                    .split_once(':')
                    .ok_or_else(|| malformed(self, "missing separator"))?;
                Ok((parse_index(self, index)?, parse_hex(self, value)?))
            }
            ShareFormat::JsonArray => {
                let (index, value): (u32, String) =
                    serde_json::from_str(token).map_err(|_| malformed(self, "not [index, \"hex\"]"))?;
                if index == 0 {
                    return Err(malformed(self, "index 0"));
                }
                Ok((index, parse_hex(self, &value)?))
            }
            ShareFormat::Tuple => {
                let inner = token
                    .strip_prefix('(')
                    .and_then(|t| t.strip_suffix(')'))
                    .ok_or_else(|| malformed(self, "unbalanced parentheses"))?;
                let (index, value) = inner
                    .split_once(',')
                    .ok_or_else(|| malformed(self, "missing separator"))?;
                Ok((parse_index(self, index.trim())?, parse_hex(self, value.trim())?))
            }
        }
    }
}

fn malformed(format: ShareFormat, reason: &str) -> Error {
    Error::MalformedShare(format!("{:?} token: {}", format, reason))
}

fn parse_index(format: ShareFormat, digits: &str) -> Result<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format, "index is not a decimal number"));
    }
    let index: u32 = digits
        .parse()
        .map_err(|_| malformed(format, "index out of range"))?;
    if index == 0 {
        return Err(malformed(format, "index 0"));
    }
    Ok(index)
}

fn parse_hex(format: ShareFormat, digits: &str) -> Result<BigInt> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed(format, "value is not plain hex"));
    }
    let bytes = if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits))
    } else {
        hex::decode(digits)
    }
    .map_err(|_| malformed(format, "value is not plain hex"))?;
    Ok(BigInt::from_bytes_be(Sign::Plus, &bytes))
}

pub fn encode(share: &Share) -> String {
    format!("{}:{}", share.index, share.value.to_str_radix(16))
}

pub fn decode(token: &str, field_prime: &BigInt) -> Result<Share> {
    decode_with_format(token, field_prime).map(|(share, _)| share)
}

/// Decodes a token and reports which variant of the chain accepted it.
pub fn decode_with_format(token: &str, field_prime: &BigInt) -> Result<(Share, ShareFormat)> {
    let token = token.trim();
    let format = DECODER_CHAIN
        .into_iter()
        .find(|f| f.claims(token))
        .ok_or_else(|| Error::MalformedShare("unrecognized share token".to_string()))?;
    let (index, value) = format.parse(token)?;
    if value >= *field_prime {
        return Err(Error::MalformedShare(format!(
            "share {} value exceeds the {}-bit field",
            index,
            field_prime.bits()
        )));
    }
    if format != ShareFormat::Canonical {
        debug!("share {} decoded from legacy {:?} token", index, format);
    }
    Ok((Share::new(index, value, field_prime.clone()), format))
}
