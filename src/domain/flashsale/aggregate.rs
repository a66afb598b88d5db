use crate::identifiers::{DeviceId, FlashId, ItemId, ObjectId};

// ============================================================================
// Flashsale Aggregate - query-side view of one flash sale line item
// ============================================================================
//
// A plain value with public fields: the query side replaces it wholesale on
// each replayed event rather than mutating it in place. Identifiers come from
// `new` or from decoding, and no method here reassigns them; `with_document_id`
// only attaches the store id. Numeric fields are validated where they enter the system (the command
// side) and pass through here uninterpreted.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flashsale {
    /// Assigned by the document store on first persistence.
    pub id: Option<ObjectId>,
    pub flash_id: FlashId,
    pub item_id: ItemId,
    pub upc: i64,
    pub sku: String,
    pub name: String,
    pub origin: String,
    pub device_id: DeviceId,
    pub price: f64,
    pub sale_price: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub ethylene: f64,
    pub status: String,
    pub total_weight: f64,
    pub sold_weight: f64,
    pub lot: String,
}

impl Flashsale {
    pub fn new(flash_id: FlashId, item_id: ItemId, device_id: DeviceId) -> Self {
        Self {
            flash_id,
            item_id,
            device_id,
            ..Self::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Copy of this aggregate carrying the store-assigned id.
    pub fn with_document_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    /// Weight still available for sale.
    pub fn remaining_weight(&self) -> f64 {
        self.total_weight - self.sold_weight
    }
}
