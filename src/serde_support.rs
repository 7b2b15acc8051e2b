//! Serde adapters for the JSON documents exchanged with persistence.

/// `BigInt` as a decimal string, the representation used for stored moduli
/// and encrypted totals.
pub mod bigint_decimal {
    use num_bigint::BigInt;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(D::Error::custom("expected a non-negative decimal string"));
        }
        BigInt::parse_bytes(text.as_bytes(), 10)
            .ok_or_else(|| D::Error::custom("expected a non-negative decimal string"))
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Wrapped {
        #[serde(with = "super::bigint_decimal")]
        value: BigInt,
    }

    #[test]
    fn test_decimal_string() {
        let wrapped = Wrapped {
            value: BigInt::from(1u64) << 100,
        };
        let json = serde_json::to_string(&wrapped).unwrap();
        assert_eq!(json, r#"{"value":"1267650600228229401496703205376"}"#);
        assert_eq!(serde_json::from_str::<Wrapped>(&json).unwrap(), wrapped);
    }

    #[test]
    fn test_rejects_non_decimal() {
        for bad in [r#"{"value":"-1"}"#, r#"{"value":"0x10"}"#, r#"{"value":12}"#, r#"{"value":""}"#] {
            assert!(serde_json::from_str::<Wrapped>(bad).is_err(), "accepted {}", bad);
        }
    }
}
