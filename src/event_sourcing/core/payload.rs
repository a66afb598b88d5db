// ============================================================================
// Payload bytes on the wire
// ============================================================================
//
// Envelope payloads travel as standard base64 strings inside the JSON
// envelope, matching how the other services on the bus encode raw bytes.
// A null payload reads as empty.
//
// ============================================================================

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(encoded) => STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom),
        None => Ok(Vec::new()),
    }
}
