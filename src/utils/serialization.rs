// Two encodings live here: bincode for moving blocks over the wire, and
// sorted-key JSON for anything that gets hashed.
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

/// Canonical JSON encoding: object keys sorted lexicographically at every level.
///
/// Going through `serde_json::Value` sorts keys because its map is a `BTreeMap`,
/// so the output does not depend on struct field declaration order.
pub fn canonical_json<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(data)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Parse a value previously produced by `canonical_json` or any JSON encoder
pub fn from_json<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    Ok(serde_json::from_slice(bytes)?)
}
