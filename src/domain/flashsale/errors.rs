use crate::wire::FieldError;

use super::value_objects::FlashsaleField;

// ============================================================================
// Flashsale Codec Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Error while asserting {field}: {source}")]
    Field {
        field: FlashsaleField,
        #[source]
        source: FieldError,
    },

    #[error("BSON unmarshal error: {0}")]
    BsonUnmarshal(#[source] bson::de::Error),

    #[error("JSON unmarshal error: {0}")]
    JsonUnmarshal(#[source] serde_json::Error),

    #[error("BSON marshal error: {0}")]
    BsonMarshal(#[source] bson::ser::Error),

    #[error("JSON marshal error: {0}")]
    JsonMarshal(#[source] serde_json::Error),

    #[error("Error while decoding element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<CodecError>,
    },
}

impl CodecError {
    /// The field that failed its type assertion, looking through element
    /// wrappers.
    pub fn field(&self) -> Option<FlashsaleField> {
        match self {
            CodecError::Field { field, .. } => Some(*field),
            CodecError::Element { source, .. } => source.field(),
            _ => None,
        }
    }

    /// Wire format label for metrics.
    pub fn format(&self) -> &'static str {
        match self {
            CodecError::BsonUnmarshal(_) | CodecError::BsonMarshal(_) => "bson",
            CodecError::JsonUnmarshal(_) | CodecError::JsonMarshal(_) => "json",
            CodecError::Field { .. } | CodecError::Element { .. } => "field",
        }
    }
}
