use bson::Document;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::wire::{FieldError, WireMap, WireValue};

use super::aggregate::Flashsale;
use super::errors::CodecError;
use super::value_objects::FlashsaleField;

// ============================================================================
// Flashsale Codec - BSON and JSON wire forms
// ============================================================================
//
// Encoding rules (both forms use the same key names):
// - BSON omits zero-valued scalars (0, 0.0, "") and an absent _id.
//   Identifiers are always written as strings, so a nil UUID goes out as
//   the all-zero string.
// - JSON emits every field, zeros included. Only _id is conditional: it is
//   written as a hex string when present and left out otherwise.
//
// Decoding goes through WireMap regardless of the source format:
// - a missing (or null) key leaves the field at its zero value
// - a present key must pass its coercion, otherwise decoding stops with an
//   error naming the key and the partially built aggregate is dropped
//
// ============================================================================

type JsonObject = Map<String, Value>;

impl Flashsale {
    // ------------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------------

    pub fn to_bson_document(&self) -> Document {
        let mut doc = Document::new();

        if let Some(id) = self.id {
            doc.insert(FlashsaleField::Id.key(), id);
        }
        doc.insert(FlashsaleField::FlashId.key(), self.flash_id.to_string());
        doc.insert(FlashsaleField::ItemId.key(), self.item_id.to_string());
        if self.upc != 0 {
            doc.insert(FlashsaleField::Upc.key(), self.upc);
        }

        let strings = [
            (FlashsaleField::Sku, &self.sku),
            (FlashsaleField::Name, &self.name),
            (FlashsaleField::Origin, &self.origin),
        ];
        for (field, value) in strings {
            if !value.is_empty() {
                doc.insert(field.key(), value.as_str());
            }
        }

        doc.insert(FlashsaleField::DeviceId.key(), self.device_id.to_string());

        insert_nonzero_f64(&mut doc, FlashsaleField::Price, self.price);
        insert_nonzero_f64(&mut doc, FlashsaleField::SalePrice, self.sale_price);
        if self.timestamp != 0 {
            doc.insert(FlashsaleField::Timestamp.key(), self.timestamp);
        }
        insert_nonzero_f64(&mut doc, FlashsaleField::Ethylene, self.ethylene);
        if !self.status.is_empty() {
            doc.insert(FlashsaleField::Status.key(), self.status.as_str());
        }
        insert_nonzero_f64(&mut doc, FlashsaleField::TotalWeight, self.total_weight);
        insert_nonzero_f64(&mut doc, FlashsaleField::SoldWeight, self.sold_weight);
        if !self.lot.is_empty() {
            doc.insert(FlashsaleField::Lot.key(), self.lot.as_str());
        }

        doc
    }

    pub fn encode_bson(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        self.to_bson_document()
            .to_writer(&mut buf)
            .map_err(CodecError::BsonMarshal)?;
        Ok(buf)
    }

    pub fn to_json_value(&self) -> Value {
        let mut value = json!({
            "flashID": self.flash_id.to_string(),
            "itemID": self.item_id.to_string(),
            "deviceID": self.device_id.to_string(),
            "upc": self.upc,
            "sku": self.sku,
            "name": self.name,
            "origin": self.origin,
            "price": self.price,
            "salePrice": self.sale_price,
            "timestamp": self.timestamp,
            "ethylene": self.ethylene,
            "status": self.status,
            "soldWeight": self.sold_weight,
            "totalWeight": self.total_weight,
            "lot": self.lot,
        });

        if let (Some(id), Value::Object(map)) = (self.id, &mut value) {
            map.insert(FlashsaleField::Id.key().to_string(), Value::String(id.to_hex()));
        }
        value
    }

    pub fn encode_json(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&self.to_json_value()).map_err(CodecError::JsonMarshal)
    }

    /// JSON array of aggregates, as carried in a query response result.
    pub fn encode_json_many(items: &[Flashsale]) -> Result<Vec<u8>, CodecError> {
        let values: Vec<Value> = items.iter().map(Flashsale::to_json_value).collect();
        serde_json::to_vec(&values).map_err(CodecError::JsonMarshal)
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    pub fn decode_bson(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = bytes;
        let doc = Document::from_reader(&mut reader).map_err(CodecError::BsonUnmarshal)?;
        Self::from_wire_map(&WireMap::from_bson(doc))
    }

    pub fn decode_json(bytes: &[u8]) -> Result<Self, CodecError> {
        let object: JsonObject = serde_json::from_slice(bytes).map_err(CodecError::JsonUnmarshal)?;
        Self::from_wire_map(&WireMap::from_json(object))
    }

    /// Decode a JSON array of aggregates. `null` is read as an empty list.
    pub fn decode_json_many(bytes: &[u8]) -> Result<Vec<Self>, CodecError> {
        let objects: Option<Vec<JsonObject>> =
            serde_json::from_slice(bytes).map_err(CodecError::JsonUnmarshal)?;

        objects
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, object)| {
                Self::from_wire_map(&WireMap::from_json(object)).map_err(|source| {
                    CodecError::Element {
                        index,
                        source: Box::new(source),
                    }
                })
            })
            .collect()
    }

    pub fn from_wire_map(map: &WireMap) -> Result<Self, CodecError> {
        let mut flashsale = Flashsale::default();

        for field in FlashsaleField::DECODE_ORDER {
            let Some(value) = map.present(field.key()) else {
                continue;
            };
            flashsale
                .assign(field, value)
                .map_err(|source| CodecError::Field { field, source })?;
        }

        Ok(flashsale)
    }

    fn assign(&mut self, field: FlashsaleField, value: &WireValue) -> Result<(), FieldError> {
        match field {
            FlashsaleField::Id => self.id = Some(value.to_object_id()?),
            FlashsaleField::FlashId => self.flash_id = value.to_uuid()?,
            FlashsaleField::ItemId => self.item_id = value.to_uuid()?,
            FlashsaleField::DeviceId => self.device_id = value.to_uuid()?,
            FlashsaleField::Lot => self.lot = value.to_str()?.to_string(),
            FlashsaleField::Name => self.name = value.to_str()?.to_string(),
            FlashsaleField::Origin => self.origin = value.to_str()?.to_string(),
            FlashsaleField::Price => self.price = value.to_f64()?,
            FlashsaleField::SalePrice => self.sale_price = value.to_f64()?,
            FlashsaleField::Sku => self.sku = value.to_str()?.to_string(),
            FlashsaleField::SoldWeight => self.sold_weight = value.to_f64()?,
            FlashsaleField::Timestamp => self.timestamp = value.to_i64()?,
            FlashsaleField::TotalWeight => self.total_weight = value.to_f64()?,
            FlashsaleField::Upc => self.upc = value.to_i64()?,
            FlashsaleField::Ethylene => self.ethylene = value.to_f64()?,
            FlashsaleField::Status => self.status = value.to_str()?.to_string(),
        }
        Ok(())
    }
}

fn insert_nonzero_f64(doc: &mut Document, field: FlashsaleField, value: f64) {
    if value != 0.0 {
        doc.insert(field.key(), value);
    }
}

// serde goes through the JSON codec so the aggregate can sit inside any
// serde_json payload with the same wire shape.

impl Serialize for Flashsale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Flashsale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = JsonObject::deserialize(deserializer)?;
        Flashsale::from_wire_map(&WireMap::from_json(object)).map_err(D::Error::custom)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{DeviceId, FlashId, ItemId, ObjectId};
    use crate::wire::WireNumber;
    use bson::{doc, Bson};

    fn sample() -> Flashsale {
        Flashsale {
            id: None,
            flash_id: FlashId::new_v4(),
            item_id: ItemId::new_v4(),
            upc: 123_456_789_012,
            sku: "test-sku".to_string(),
            name: "test-name".to_string(),
            origin: "test-origin".to_string(),
            device_id: DeviceId::new_v4(),
            price: 13.4,
            sale_price: 12.23,
            timestamp: 1_538_000_000,
            ethylene: 250.0,
            status: "test-status".to_string(),
            total_weight: 300.0,
            sold_weight: 12.0,
            lot: "test-lot".to_string(),
        }
    }

    fn full_wire_map(sale: &Flashsale) -> WireMap {
        WireMap::from_bson(sale.to_bson_document())
    }

    // ------------------------------------------------------------------------
    // Round trips
    // ------------------------------------------------------------------------

    #[test]
    fn test_bson_round_trip() {
        let sale = sample().with_document_id(ObjectId::new());
        let bytes = sale.encode_bson().unwrap();
        assert_eq!(Flashsale::decode_bson(&bytes).unwrap(), sale);
    }

    #[test]
    fn test_json_round_trip() {
        let sale = sample().with_document_id(ObjectId::new());
        let bytes = sale.encode_json().unwrap();
        assert_eq!(Flashsale::decode_json(&bytes).unwrap(), sale);
    }

    #[test]
    fn test_serde_uses_json_codec() {
        let sale = sample();
        let json = serde_json::to_string(&sale).unwrap();
        let back: Flashsale = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sale);

        let err = serde_json::from_str::<Flashsale>(r#"{"price": "cheap"}"#).unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_many_round_trip() {
        let items = vec![sample(), sample().with_document_id(ObjectId::new())];
        let bytes = Flashsale::encode_json_many(&items).unwrap();
        assert_eq!(Flashsale::decode_json_many(&bytes).unwrap(), items);
    }

    #[test]
    fn test_many_accepts_empty_and_null() {
        assert!(Flashsale::decode_json_many(b"[]").unwrap().is_empty());
        assert!(Flashsale::decode_json_many(b"null").unwrap().is_empty());
    }

    #[test]
    fn test_many_reports_failing_index() {
        let good = sample().to_json_value();
        let bytes = serde_json::to_vec(&json!([good, {"lot": 5}])).unwrap();

        let err = Flashsale::decode_json_many(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Element { index: 1, .. }));
        assert_eq!(err.field(), Some(FlashsaleField::Lot));
    }

    // ------------------------------------------------------------------------
    // Zero values and the BSON/JSON asymmetry
    // ------------------------------------------------------------------------

    #[test]
    fn test_bson_omits_zero_scalars_but_keeps_identifiers() {
        let doc = Flashsale::default().to_bson_document();
        let keys: Vec<&str> = doc
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["flashID", "itemID", "deviceID"]);

        let sale = Flashsale {
            price: 0.0,
            lot: String::new(),
            item_id: ItemId::nil(),
            upc: 0,
            ..sample()
        };
        let doc = sale.to_bson_document();
        for key in ["_id", "price", "lot", "upc"] {
            assert!(!doc.contains_key(key), "{} should be omitted", key);
        }
        assert_eq!(
            doc.get("itemID"),
            Some(&Bson::String("00000000-0000-0000-0000-000000000000".to_string()))
        );

        let decoded = Flashsale::decode_bson(&sale.encode_bson().unwrap()).unwrap();
        assert_eq!(decoded.price, 0.0);
        assert!(decoded.lot.is_empty());
        assert!(decoded.item_id.is_nil());
        assert_eq!(decoded, sale);
    }

    #[test]
    fn test_bson_identifiers_are_strings() {
        let sale = sample();
        let doc = sale.to_bson_document();
        assert_eq!(
            doc.get("flashID"),
            Some(&Bson::String(sale.flash_id.to_string()))
        );
        assert_eq!(doc.get("upc"), Some(&Bson::Int64(123_456_789_012)));
    }

    #[test]
    fn test_json_emits_zero_fields_but_not_absent_id() {
        let value = Flashsale::default().to_json_value();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 15);
        assert!(!object.contains_key("_id"));
        assert_eq!(object["flashID"], json!("00000000-0000-0000-0000-000000000000"));
        assert_eq!(object["price"], json!(0.0));
        assert_eq!(object["upc"], json!(0));
        assert_eq!(object["lot"], json!(""));
    }

    #[test]
    fn test_json_writes_present_id_as_hex() {
        let oid = ObjectId::new();
        let value = sample().with_document_id(oid).to_json_value();
        assert_eq!(value["_id"], json!(oid.to_hex()));
        assert_eq!(value.as_object().unwrap().len(), 16);
    }

    // ------------------------------------------------------------------------
    // Decoding partial and malformed input
    // ------------------------------------------------------------------------

    #[test]
    fn test_partial_input_leaves_zero_values() {
        let flash_id = FlashId::new_v4();
        let bytes = serde_json::to_vec(&json!({
            "flashID": flash_id.to_string(),
            "price": 13.4,
            "unknownKey": true,
        }))
        .unwrap();

        let sale = Flashsale::decode_json(&bytes).unwrap();
        assert_eq!(sale.flash_id, flash_id);
        assert_eq!(sale.price, 13.4);
        assert_eq!(
            sale,
            Flashsale {
                flash_id,
                price: 13.4,
                ..Flashsale::default()
            }
        );
    }

    #[test]
    fn test_null_fields_are_absent() {
        let sale = Flashsale::decode_json(br#"{"lot": null, "upc": null}"#).unwrap();
        assert_eq!(sale, Flashsale::default());
    }

    #[test]
    fn test_wrong_type_names_each_field() {
        let base = full_wire_map(&sample().with_document_id(ObjectId::new()));

        for field in FlashsaleField::DECODE_ORDER {
            let mut map = base.clone();
            map.insert(field.key(), WireValue::Bool(true));

            let err = Flashsale::from_wire_map(&map).unwrap_err();
            assert_eq!(err.field(), Some(field), "field {}", field);
            assert!(err.to_string().contains(field.key()));
        }
    }

    #[test]
    fn test_strings_are_not_coerced() {
        let err = Flashsale::decode_json(br#"{"sku": 1234}"#).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Field {
                field: FlashsaleField::Sku,
                source: FieldError::WrongType { expected: "string", .. },
            }
        ));
    }

    #[test]
    fn test_numeric_strings_rejected() {
        let err = Flashsale::decode_json(br#"{"price": "13.4"}"#).unwrap_err();
        assert_eq!(err.field(), Some(FlashsaleField::Price));
    }

    #[test]
    fn test_numeric_width_coercion() {
        let sale = Flashsale::decode_bson(&{
            let mut buf = Vec::new();
            doc! { "upc": 42_i32, "timestamp": 1_700_000_000.0, "price": 13_i32 }
                .to_writer(&mut buf)
                .unwrap();
            buf
        })
        .unwrap();
        assert_eq!(sale.upc, 42);
        assert_eq!(sale.timestamp, 1_700_000_000);
        assert_eq!(sale.price, 13.0);

        let err = Flashsale::decode_json(br#"{"upc": 1.5}"#).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Field {
                field: FlashsaleField::Upc,
                source: FieldError::NotRepresentable { .. },
            }
        ));
    }

    #[test]
    fn test_invalid_uuid_is_wrapped_with_field() {
        let err = Flashsale::decode_json(br#"{"deviceID": "not-a-uuid"}"#).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Field {
                field: FlashsaleField::DeviceId,
                source: FieldError::NonCanonicalUuid { .. },
            }
        ));
        assert!(err.to_string().starts_with("Error while asserting deviceID"));
    }

    #[test]
    fn test_id_accepts_hex_and_native_forms() {
        let oid = ObjectId::new();

        let mut native = WireMap::new();
        native.insert("_id", WireValue::ObjectId(oid));
        let mut hex = WireMap::new();
        hex.insert("_id", WireValue::String(oid.to_hex()));

        let from_native = Flashsale::from_wire_map(&native).unwrap();
        let from_hex = Flashsale::from_wire_map(&hex).unwrap();
        assert_eq!(from_native.id, Some(oid));
        assert_eq!(from_native, from_hex);

        let extended = format!(r#"{{"_id": {{"$oid": "{}"}}}}"#, oid.to_hex());
        assert_eq!(Flashsale::decode_json(extended.as_bytes()).unwrap().id, Some(oid));
    }

    #[test]
    fn test_invalid_id_hex() {
        let err = Flashsale::decode_json(br#"{"_id": "zzzz"}"#).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Field {
                field: FlashsaleField::Id,
                source: FieldError::InvalidObjectId { .. },
            }
        ));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            Flashsale::decode_json(b"{not json"),
            Err(CodecError::JsonUnmarshal(_))
        ));
        assert!(matches!(
            Flashsale::decode_json(b"[1, 2]"),
            Err(CodecError::JsonUnmarshal(_))
        ));
        assert!(matches!(
            Flashsale::decode_bson(&[0x05, 0x00]),
            Err(CodecError::BsonUnmarshal(_))
        ));
    }

    #[test]
    fn test_large_integers_do_not_become_prices() {
        let mut map = WireMap::new();
        map.insert("price", WireValue::Number(WireNumber::Int(i64::MAX)));
        let err = Flashsale::from_wire_map(&map).unwrap_err();
        assert_eq!(err.field(), Some(FlashsaleField::Price));
    }
}
