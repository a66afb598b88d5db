use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::identifiers::{DeviceId, FlashId, ItemId, ObjectId};

use super::errors::CodecError;
use super::value_objects::FlashsaleField;

// ============================================================================
// Query Filter - payload of a `query` event
// ============================================================================
//
// A key/value map restricted to Flashsale wire keys. Values use the same
// encoding as the JSON codec, so the executor can match them directly
// against stored documents.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    criteria: BTreeMap<FlashsaleField, Value>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: FlashsaleField, value: impl Into<Value>) -> Self {
        self.criteria.insert(field, value.into());
        self
    }

    pub fn document_id(self, id: ObjectId) -> Self {
        self.with(FlashsaleField::Id, id.to_hex())
    }

    pub fn flash_id(self, id: FlashId) -> Self {
        self.with(FlashsaleField::FlashId, id.to_string())
    }

    pub fn item_id(self, id: ItemId) -> Self {
        self.with(FlashsaleField::ItemId, id.to_string())
    }

    pub fn device_id(self, id: DeviceId) -> Self {
        self.with(FlashsaleField::DeviceId, id.to_string())
    }

    pub fn upc(self, upc: i64) -> Self {
        self.with(FlashsaleField::Upc, upc)
    }

    pub fn sku(self, sku: impl Into<String>) -> Self {
        self.with(FlashsaleField::Sku, sku.into())
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.with(FlashsaleField::Name, name.into())
    }

    pub fn origin(self, origin: impl Into<String>) -> Self {
        self.with(FlashsaleField::Origin, origin.into())
    }

    pub fn lot(self, lot: impl Into<String>) -> Self {
        self.with(FlashsaleField::Lot, lot.into())
    }

    pub fn status(self, status: impl Into<String>) -> Self {
        self.with(FlashsaleField::Status, status.into())
    }

    pub fn get(&self, field: FlashsaleField) -> Option<&Value> {
        self.criteria.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlashsaleField, &Value)> {
        self.criteria.iter().map(|(field, value)| (*field, value))
    }

    pub fn to_json_value(&self) -> Value {
        let map: Map<String, Value> = self
            .criteria
            .iter()
            .map(|(field, value)| (field.key().to_string(), value.clone()))
            .collect();
        Value::Object(map)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&self.to_json_value()).map_err(CodecError::JsonMarshal)
    }

    /// Parse a filter map. Keys that are not Flashsale fields are dropped.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let object: Map<String, Value> =
            serde_json::from_slice(bytes).map_err(CodecError::JsonUnmarshal)?;

        let criteria = object
            .into_iter()
            .filter_map(|(key, value)| {
                match FlashsaleField::from_key(&key) {
                    Some(field) => Some((field, value)),
                    None => {
                        tracing::debug!(key = %key, "Ignoring unknown query filter key");
                        None
                    }
                }
            })
            .collect();

        Ok(Self { criteria })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encodes_with_wire_keys() {
        let flash_id = FlashId::new_v4();
        let filter = QueryFilter::new()
            .flash_id(flash_id)
            .upc(42)
            .name("Bananas")
            .origin("Ecuador");

        let value: Value = serde_json::from_slice(&filter.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "flashID": flash_id.to_string(),
                "upc": 42,
                "name": "Bananas",
                "origin": "Ecuador",
            })
        );
    }

    #[test]
    fn test_decode_drops_unknown_keys() {
        let filter = QueryFilter::decode(br#"{"lot": "A1", "color": "red"}"#).unwrap();
        assert_eq!(filter.get(FlashsaleField::Lot), Some(&json!("A1")));
        assert_eq!(filter.iter().count(), 1);
    }

    #[test]
    fn test_later_values_replace_earlier_ones() {
        let filter = QueryFilter::new().status("open").status("closed");
        assert_eq!(filter.get(FlashsaleField::Status), Some(&json!("closed")));
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(matches!(
            QueryFilter::decode(b"[]"),
            Err(CodecError::JsonUnmarshal(_))
        ));
    }
}
