use bson::oid::ObjectId;
use uuid::Uuid;

use super::value::{WireNumber, WireValue};

// ============================================================================
// Field Coercions
// ============================================================================
//
// Each coercion either yields the target type or a FieldError describing why
// the wire value does not fit. No value is ever stringified or truncated.
//
// ============================================================================

/// Largest integer magnitude an f64 holds exactly (2^53).
const F64_EXACT_INT: u64 = 1 << 53;

/// -2^63, which is exactly i64::MIN.
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
/// 2^63, the first float past i64::MAX.
const I64_END_F64: f64 = 9_223_372_036_854_775_808.0;

/// Length of the hyphenated `8-4-4-4-12` form.
const HYPHENATED_UUID_LEN: usize = 36;

/// Field-level type assertion failure.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("UUID {value:?} is not in hyphenated form")]
    NonCanonicalUuid { value: String },

    #[error("invalid UUID string {value:?}: {source}")]
    InvalidUuid {
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("invalid ObjectId {value:?}: {source}")]
    InvalidObjectId {
        value: String,
        #[source]
        source: bson::oid::Error,
    },

    #[error("{value} is not representable as {target}")]
    NotRepresentable { value: String, target: &'static str },
}

impl WireValue {
    /// Strings only; numbers are not stringified.
    pub fn to_str(&self) -> Result<&str, FieldError> {
        match self {
            WireValue::String(s) => Ok(s),
            other => Err(wrong_type("string", other)),
        }
    }

    /// Integers in range, and floats that are finite, integral and in range.
    pub fn to_i64(&self) -> Result<i64, FieldError> {
        match self {
            WireValue::Number(WireNumber::Int(i)) => Ok(*i),
            WireValue::Number(WireNumber::UInt(u)) => {
                i64::try_from(*u).map_err(|_| not_representable(u, "i64"))
            }
            WireValue::Number(WireNumber::Float(f)) => {
                let in_range = *f >= I64_MIN_F64 && *f < I64_END_F64;
                if f.is_finite() && f.fract() == 0.0 && in_range {
                    Ok(*f as i64)
                } else {
                    Err(not_representable(f, "i64"))
                }
            }
            other => Err(wrong_type("number", other)),
        }
    }

    /// Floats, and integers an f64 can hold without rounding.
    pub fn to_f64(&self) -> Result<f64, FieldError> {
        match self {
            WireValue::Number(WireNumber::Float(f)) => Ok(*f),
            WireValue::Number(WireNumber::Int(i)) => {
                if i.unsigned_abs() <= F64_EXACT_INT {
                    Ok(*i as f64)
                } else {
                    Err(not_representable(i, "f64"))
                }
            }
            WireValue::Number(WireNumber::UInt(u)) => {
                if *u <= F64_EXACT_INT {
                    Ok(*u as f64)
                } else {
                    Err(not_representable(u, "f64"))
                }
            }
            other => Err(wrong_type("number", other)),
        }
    }

    /// Hyphenated UUID string only; simple, braced and urn forms are
    /// rejected.
    pub fn to_uuid<T: From<Uuid>>(&self) -> Result<T, FieldError> {
        let value = self.to_str()?;
        if value.len() != HYPHENATED_UUID_LEN {
            return Err(FieldError::NonCanonicalUuid {
                value: value.to_string(),
            });
        }
        Uuid::parse_str(value)
            .map(T::from)
            .map_err(|source| FieldError::InvalidUuid {
                value: value.to_string(),
                source,
            })
    }

    /// Native ObjectId, hex string, or extended-JSON `{"$oid": "<hex>"}`.
    pub fn to_object_id(&self) -> Result<ObjectId, FieldError> {
        match self {
            WireValue::ObjectId(oid) => Ok(*oid),
            WireValue::String(hex) => parse_hex(hex),
            WireValue::Document(doc) => match doc.present("$oid") {
                Some(WireValue::String(hex)) => parse_hex(hex),
                _ => Err(wrong_type("objectId or hex string", self)),
            },
            other => Err(wrong_type("objectId or hex string", other)),
        }
    }
}

fn parse_hex(hex: &str) -> Result<ObjectId, FieldError> {
    ObjectId::parse_str(hex).map_err(|source| FieldError::InvalidObjectId {
        value: hex.to_string(),
        source,
    })
}

fn wrong_type(expected: &'static str, found: &WireValue) -> FieldError {
    FieldError::WrongType {
        expected,
        found: found.type_name(),
    }
}

fn not_representable(value: impl ToString, target: &'static str) -> FieldError {
    FieldError::NotRepresentable {
        value: value.to_string(),
        target,
    }
}
