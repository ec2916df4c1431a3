//! Order aggregate structures
//!
//! The wire names of every field match the JSON emitted by order producers,
//! so the same structs are used for the inbound event payload, the rows
//! assembled by the store, and the read API response body.

use crate::{is_blank_uid, OrderUid, Timestamp, ValidationError};
use chrono::SubsecRound;
use serde::{Deserialize, Serialize};

/// Fractional-second digits a stored timestamp keeps (PostgreSQL
/// `TIMESTAMPTZ` resolution).
pub const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;

/// Order - root aggregate.
///
/// Owns exactly one [`Delivery`], one [`Payment`] and any number of
/// [`Item`]s. Missing scalar fields decode to their zero values; a field of
/// the wrong type fails decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_uid: OrderUid,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: Timestamp,
    pub oof_shard: String,
}

/// Delivery - recipient and shipping details, 1:1 with its order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment - transaction details, 1:1 with its order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i32,
    /// Unix seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i32,
    pub goods_total: i32,
    pub custom_fee: i32,
}

/// Item - one order line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i32,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i32,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Decode an order event payload and check that it carries an identifier.
    ///
    /// `date_created` is truncated to microseconds so the cached aggregate
    /// equals what the store returns for it.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ValidationError> {
        let mut order: Order =
            serde_json::from_slice(payload).map_err(|e| ValidationError::MalformedPayload {
                reason: e.to_string(),
            })?;
        order.validate()?;
        order.date_created = order.date_created.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS);
        Ok(order)
    }

    /// Check the invariants an order must satisfy before it is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank_uid(&self.order_uid) {
            return Err(ValidationError::RequiredFieldMissing {
                field: "order_uid".to_string(),
            });
        }
        Ok(())
    }

    /// Number of order lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    #[test]
    fn test_decode_full_payload() {
        let order = Order::from_slice(SAMPLE.as_bytes()).expect("sample decodes");
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.item_count(), 1);
        assert_eq!(order.items[0].chrt_id, 9934930);
        assert_eq!(
            order.date_created,
            chrono::Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap()
        );
    }

    #[test]
    fn test_date_created_truncated_to_microseconds() {
        let order = Order::from_slice(
            br#"{"order_uid":"A1","date_created":"2021-11-26T06:22:19.123456789Z"}"#,
        )
        .expect("decodes");
        let expected = chrono::Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(order.date_created, expected);
        assert_eq!(order.date_created.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_missing_fields_decode_to_defaults() {
        let order = Order::from_slice(br#"{"order_uid":"A1"}"#).expect("decodes");
        assert_eq!(order.order_uid, "A1");
        assert!(order.items.is_empty());
        assert_eq!(order.payment, Payment::default());
    }

    #[test]
    fn test_empty_uid_rejected() {
        let err = Order::from_slice(br#"{"order_uid":"","items":[]}"#).unwrap_err();
        assert_eq!(
            err,
            ValidationError::RequiredFieldMissing {
                field: "order_uid".to_string()
            }
        );

        let err = Order::from_slice(br#"{"track_number":"X"}"#).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn test_whitespace_uid_rejected() {
        let err = Order::from_slice(br#"{"order_uid":"   "}"#).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let err = Order::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedPayload { .. }));

        // Wrong type for a numeric field
        let err = Order::from_slice(br#"{"order_uid":"A1","sm_id":"ninety"}"#).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedPayload { .. }));
    }

    #[test]
    fn test_serialization_uses_wire_names() {
        let order = Order::from_slice(SAMPLE.as_bytes()).expect("sample decodes");
        let json = serde_json::to_value(&order).expect("serializes");
        assert_eq!(json["shardkey"], "9");
        assert_eq!(json["items"][0]["nm_id"], 2389212);
        assert_eq!(json["date_created"], "2021-11-26T06:22:19Z");
    }
}
