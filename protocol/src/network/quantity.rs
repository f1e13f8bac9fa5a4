//! Serde helpers for JSON-RPC quantities.
//!
//! The canonical wire form is a `0x`-prefixed hex string, but client
//! libraries and dev chains also emit plain JSON numbers and decimal
//! strings. Deserialization accepts all three; serialization always writes
//! canonical hex.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serializer};
use std::fmt;

/// Parses a quantity string: `0x`-prefixed hex or plain decimal.
pub fn parse_u64(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some("") => None,
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => trimmed.parse::<u64>().ok(),
    }
}

pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:#x}"))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    deserializer.deserialize_any(QuantityVisitor)
}

struct QuantityVisitor;

impl<'de> Visitor<'de> for QuantityVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hex quantity string, decimal string, or unsigned integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative quantity {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        parse_u64(v).ok_or_else(|| E::custom(format!("invalid quantity {v:?}")))
    }
}

/// Same rules for `Option<u64>`; `null` and a missing field map to `None`.
pub mod opt {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(deserialize_with = "crate::network::quantity::deserialize")] u64);

        Option::<Wrapped>::deserialize(deserializer).map(|w| w.map(|Wrapped(v)| v))
    }
}

/// A bare quantity result, e.g. from `eth_estimateGas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Quantity(#[serde(deserialize_with = "deserialize")] pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(with = "crate::network::quantity")]
        n: u64,
        #[serde(default, with = "crate::network::quantity::opt")]
        m: Option<u64>,
    }

    #[test]
    fn accepts_hex_decimal_and_numbers() {
        let h: Holder = serde_json::from_str(r#"{"n":"0x1b4"}"#).unwrap();
        assert_eq!(h.n, 436);
        assert_eq!(h.m, None);
        let h: Holder = serde_json::from_str(r#"{"n":"436","m":12}"#).unwrap();
        assert_eq!((h.n, h.m), (436, Some(12)));
        let h: Holder = serde_json::from_str(r#"{"n":436,"m":null}"#).unwrap();
        assert_eq!((h.n, h.m), (436, None));
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Holder>(r#"{"n":"0x"}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"n":"twelve"}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"n":-1}"#).is_err());
    }

    #[test]
    fn quantity_newtype_parses() {
        let q: Quantity = serde_json::from_str(r#""0x5208""#).unwrap();
        assert_eq!(q, Quantity(21_000));
    }
}
