use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProofError, ProofResult};
use crate::suite::{marshal, unmarshal};

/// Compressed encoding as a lowercase hex string with a `0x` prefix.
pub fn to_hex<T: CanonicalSerialize>(value: &T) -> ProofResult<String> {
    marshal(value).map(|bytes| format!("0x{}", hex::encode(bytes)))
}

/// Inverse of [`to_hex`]; the prefix is optional.
pub fn from_hex<T: CanonicalDeserialize>(value: &str) -> ProofResult<T> {
    let bytes = decode_hex_bytes(value)?;
    unmarshal(&bytes)
}

pub fn decode_hex_bytes(value: &str) -> ProofResult<Vec<u8>> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).map_err(|err| ProofError::Malformed(format!("invalid hex: {err}")))
}

/// Serde helpers for encoding curve points and scalars as 0x-prefixed hex strings.
pub mod curve {
    use super::*;

    pub fn serialize<C, S>(value: &C, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        C: CanonicalSerialize,
        S: Serializer,
    {
        let hex = to_hex(value).map_err(SerError::custom)?;
        serializer.serialize_str(&hex)
    }

    pub fn deserialize<'de, C, D>(deserializer: D) -> std::result::Result<C, D::Error>
    where
        C: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        from_hex(&s).map_err(DeError::custom)
    }
}

/// Serde helpers for `Vec<Curve>` values encoded as hex strings.
pub mod curve_vec {
    use super::*;

    pub fn serialize<C, S>(values: &[C], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        C: CanonicalSerialize,
        S: Serializer,
    {
        let encoded = values
            .iter()
            .map(to_hex)
            .collect::<ProofResult<Vec<_>>>()
            .map_err(SerError::custom)?;
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, C, D>(deserializer: D) -> std::result::Result<Vec<C>, D::Error>
    where
        C: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| from_hex(s).map_err(DeError::custom))
            .collect()
    }
}

/// Serde helpers for BTreeMap<String, Curve> values encoded as hex strings.
pub mod curve_map {
    use super::*;
    use std::collections::BTreeMap;

    pub fn serialize<C, S>(
        value: &BTreeMap<String, C>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        C: CanonicalSerialize,
        S: Serializer,
    {
        let encoded = value
            .iter()
            .map(|(key, point)| Ok((key.clone(), to_hex(point)?)))
            .collect::<ProofResult<BTreeMap<String, String>>>()
            .map_err(SerError::custom)?;
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, C, D>(
        deserializer: D,
    ) -> std::result::Result<BTreeMap<String, C>, D::Error>
    where
        C: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(key, value)| {
                let point = from_hex(&value).map_err(DeError::custom)?;
                Ok((key, point))
            })
            .collect()
    }
}

/// Serde helpers for opaque byte payloads encoded as hex strings.
pub mod bytes {
    use super::*;

    pub fn serialize<S>(value: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_hex_bytes(&s).map_err(DeError::custom)
    }
}
