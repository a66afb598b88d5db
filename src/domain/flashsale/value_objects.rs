use std::fmt;

// ============================================================================
// Flashsale Value Objects
// ============================================================================

/// Tag identifying the Flashsale aggregate among other aggregate kinds on
/// the event bus.
pub const FLASHSALE_AGGREGATE_ID: i8 = 7;

/// Every field of the aggregate, keyed by its wire name.
///
/// The same key names are used by the BSON and the JSON encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlashsaleField {
    Id,
    FlashId,
    ItemId,
    DeviceId,
    Upc,
    Sku,
    Name,
    Origin,
    Price,
    SalePrice,
    Timestamp,
    Ethylene,
    Status,
    TotalWeight,
    SoldWeight,
    Lot,
}

impl FlashsaleField {
    /// Order in which fields are validated while decoding.
    pub const DECODE_ORDER: [FlashsaleField; 16] = [
        FlashsaleField::Id,
        FlashsaleField::FlashId,
        FlashsaleField::ItemId,
        FlashsaleField::DeviceId,
        FlashsaleField::Lot,
        FlashsaleField::Name,
        FlashsaleField::Origin,
        FlashsaleField::Price,
        FlashsaleField::SalePrice,
        FlashsaleField::Sku,
        FlashsaleField::SoldWeight,
        FlashsaleField::Timestamp,
        FlashsaleField::TotalWeight,
        FlashsaleField::Upc,
        FlashsaleField::Ethylene,
        FlashsaleField::Status,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            FlashsaleField::Id => "_id",
            FlashsaleField::FlashId => "flashID",
            FlashsaleField::ItemId => "itemID",
            FlashsaleField::DeviceId => "deviceID",
            FlashsaleField::Upc => "upc",
            FlashsaleField::Sku => "sku",
            FlashsaleField::Name => "name",
            FlashsaleField::Origin => "origin",
            FlashsaleField::Price => "price",
            FlashsaleField::SalePrice => "salePrice",
            FlashsaleField::Timestamp => "timestamp",
            FlashsaleField::Ethylene => "ethylene",
            FlashsaleField::Status => "status",
            FlashsaleField::TotalWeight => "totalWeight",
            FlashsaleField::SoldWeight => "soldWeight",
            FlashsaleField::Lot => "lot",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::DECODE_ORDER.into_iter().find(|field| field.key() == key)
    }
}

impl fmt::Display for FlashsaleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
