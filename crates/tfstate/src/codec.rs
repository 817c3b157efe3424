//! Reading and writing state snapshots.

use crate::error::{Error, Result};
use crate::types::StateV4;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

/// Parse a state snapshot from raw bytes.
pub fn parse(raw: &[u8]) -> Result<StateV4> {
    serde_json::from_slice(raw).map_err(Error::Parse)
}

/// Serialize a snapshot into bytes the tool can consume again.
pub fn serialize(state: &StateV4) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(state).map_err(Error::Serialize)
}

/// Encode a snapshot into a single string suitable for storing on the
/// resource object (standard base64 over the serialized JSON).
pub fn encoded(state: &StateV4) -> Result<String> {
    Ok(STANDARD.encode(serialize(state)?))
}

/// Rebuild a snapshot from its encoded form.
pub fn from_encoded(encoded: &str) -> Result<StateV4> {
    let raw = STANDARD.decode(encoded.trim())?;
    parse(&raw)
}

/// Look up the external identifier of the resource in its attributes.
pub fn external_id(state: &StateV4, id_field: &str) -> Result<String> {
    match state.attributes().get(id_field) {
        None => Err(Error::MissingField {
            field: id_field.to_string(),
        }),
        Some(Value::String(id)) => Ok(id.clone()),
        Some(_) => Err(Error::FieldType {
            field: id_field.to_string(),
        }),
    }
}
