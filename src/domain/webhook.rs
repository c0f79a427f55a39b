//! Fulfillment provider webhook events and their effect on orders.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use super::error::ValidationError;
use super::types::{Order, OrderStatus, OrderUpdate};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the raw webhook body.
pub const SIGNATURE_HEADER: &str = "x-printful-signature";

/// Checks `signature_hex` against the HMAC-SHA256 of `body` in constant time.
#[must_use]
pub fn verify_signature(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex HMAC-SHA256 of `body`, as the provider computes it.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
pub fn sign_body(secret: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentEventKind {
    PackageShipped,
    PackageInTransit,
    PackageDelivered,
    OrderFailed,
    OrderCanceled,
    OrderCreated,
    OrderUpdated,
    Other(String),
}

impl From<&str> for FulfillmentEventKind {
    fn from(value: &str) -> Self {
        match value {
            "package_shipped" => Self::PackageShipped,
            "package_in_transit" => Self::PackageInTransit,
            "package_delivered" => Self::PackageDelivered,
            "order_failed" => Self::OrderFailed,
            "order_canceled" => Self::OrderCanceled,
            "order_created" => Self::OrderCreated,
            "order_updated" => Self::OrderUpdated,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(rename = "type")]
    event_type: Option<String>,
    data: Option<Value>,
}

/// A parsed webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentEvent {
    pub kind: FulfillmentEventKind,
    pub provider_order_id: Option<i64>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub order_status: Option<String>,
}

impl FulfillmentEvent {
    /// Parses a raw body. A payload without `type` or `data` is invalid.
    pub fn parse(body: &[u8]) -> Result<Self, ValidationError> {
        let raw: RawPayload = serde_json::from_slice(body)
            .map_err(|e| ValidationError::InvalidFormat(format!("invalid webhook payload: {e}")))?;
        let (Some(event_type), Some(data)) = (raw.event_type, raw.data) else {
            return Err(ValidationError::InvalidFormat(
                "invalid webhook payload".to_string(),
            ));
        };

        let order = data.get("order");
        let shipment = data.get("shipment");
        let provider_order_id = order
            .and_then(|o| o.get("id"))
            .and_then(as_id)
            .or_else(|| shipment.and_then(|s| s.get("order_id")).and_then(as_id));

        Ok(Self {
            kind: FulfillmentEventKind::from(event_type.as_str()),
            provider_order_id,
            tracking_number: shipment.and_then(|s| text(s, "tracking_number")),
            tracking_url: shipment.and_then(|s| text(s, "tracking_url")),
            order_status: order.and_then(|o| text(o, "status")),
        })
    }

    /// Order changes and escrow settlement this event implies for `order`.
    ///
    /// Final orders keep their status; only provider fields are refreshed.
    #[must_use]
    pub fn plan(&self, order: &Order) -> EventPlan {
        let mut update = OrderUpdate::default();
        let mut escrow = None;
        let movable = !order.status.is_final();

        match &self.kind {
            FulfillmentEventKind::PackageShipped => {
                update.status = movable.then_some(OrderStatus::Shipped);
                update.fulfillment_status = Some("shipped".to_string());
                update.tracking_number = self.tracking_number.clone();
                update.tracking_url = self.tracking_url.clone();
            }
            FulfillmentEventKind::PackageInTransit => {
                update.fulfillment_status = Some("in_transit".to_string());
                if order.tracking_number.is_none() {
                    update.tracking_number = self.tracking_number.clone();
                }
                if order.tracking_url.is_none() {
                    update.tracking_url = self.tracking_url.clone();
                }
            }
            FulfillmentEventKind::PackageDelivered => {
                update.status = movable.then_some(OrderStatus::Delivered);
                update.fulfillment_status = Some("delivered".to_string());
                escrow = Some(EscrowAction::Release);
            }
            FulfillmentEventKind::OrderFailed => {
                update.status = movable.then_some(OrderStatus::Failed);
                update.fulfillment_status = Some("failed".to_string());
                escrow = Some(EscrowAction::Refund);
            }
            FulfillmentEventKind::OrderCanceled => {
                update.status = movable.then_some(OrderStatus::Canceled);
                update.fulfillment_status = Some("canceled".to_string());
                escrow = Some(EscrowAction::Refund);
            }
            FulfillmentEventKind::OrderCreated => {
                update.fulfillment_status = Some("pending".to_string());
            }
            FulfillmentEventKind::OrderUpdated => {
                update.fulfillment_status = self.order_status.clone();
            }
            FulfillmentEventKind::Other(_) => {}
        }

        // a release or refund only follows the status change it belongs to
        if order.status.is_final() {
            escrow = match (escrow, order.status) {
                (Some(EscrowAction::Release), OrderStatus::Delivered) => Some(EscrowAction::Release),
                (Some(EscrowAction::Refund), OrderStatus::Failed | OrderStatus::Canceled) => {
                    Some(EscrowAction::Refund)
                }
                _ => None,
            };
        }

        EventPlan { update, escrow }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowAction {
    Release,
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPlan {
    pub update: OrderUpdate,
    pub escrow: Option<EscrowAction>,
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ShippingDetails;
    use chrono::Utc;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: 7,
            goods_id: 1,
            buyer_wallet: "buyer".to_string(),
            buyer_email: "buyer@example.com".to_string(),
            size: "M".to_string(),
            color: "Black".to_string(),
            quantity: 1,
            total_price_cents: 2500,
            sol_amount_lamports: Some(100_000_000),
            payment_signature: Some("sig".to_string()),
            shipping: ShippingDetails {
                name: "Buyer".to_string(),
                address1: "1 Main St".to_string(),
                address2: None,
                city: "Seoul".to_string(),
                state: None,
                country: "KR".to_string(),
                zip: "04524".to_string(),
                phone: None,
            },
            status,
            fulfillment_order_id: Some(555),
            fulfillment_status: None,
            tracking_number: None,
            tracking_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"type":"package_shipped","data":{}}"#;
        let sig = sign_body(b"secret", body).unwrap();
        assert!(verify_signature(b"secret", body, &sig));
        assert!(!verify_signature(b"other", body, &sig));
        assert!(!verify_signature(b"secret", b"tampered", &sig));
        assert!(!verify_signature(b"secret", body, "zz-not-hex"));
    }

    #[test]
    fn test_parse_requires_type_and_data() {
        assert!(FulfillmentEvent::parse(br#"{"data":{}}"#).is_err());
        assert!(FulfillmentEvent::parse(br#"{"type":"order_created"}"#).is_err());
        assert!(FulfillmentEvent::parse(b"not json").is_err());
    }

    #[test]
    fn test_parse_order_id_sources() {
        let from_order =
            FulfillmentEvent::parse(br#"{"type":"order_updated","data":{"order":{"id":555,"status":"inprocess"}}}"#)
                .unwrap();
        assert_eq!(from_order.provider_order_id, Some(555));
        assert_eq!(from_order.order_status.as_deref(), Some("inprocess"));

        let from_shipment = FulfillmentEvent::parse(
            br#"{"type":"package_shipped","data":{"shipment":{"order_id":"556","tracking_number":"TN1","tracking_url":"https://t.example/TN1"}}}"#,
        )
        .unwrap();
        assert_eq!(from_shipment.provider_order_id, Some(556));
        assert_eq!(from_shipment.kind, FulfillmentEventKind::PackageShipped);
        assert_eq!(from_shipment.tracking_number.as_deref(), Some("TN1"));

        let none = FulfillmentEvent::parse(br#"{"type":"order_created","data":{}}"#).unwrap();
        assert!(none.provider_order_id.is_none());
    }

    #[test]
    fn test_plan_shipped_sets_tracking() {
        let event = FulfillmentEvent::parse(
            br#"{"type":"package_shipped","data":{"shipment":{"order_id":555,"tracking_number":"TN1","tracking_url":"https://t.example/TN1"}}}"#,
        )
        .unwrap();
        let plan = event.plan(&order(OrderStatus::Confirmed));
        assert_eq!(plan.update.status, Some(OrderStatus::Shipped));
        assert_eq!(plan.update.fulfillment_status.as_deref(), Some("shipped"));
        assert_eq!(plan.update.tracking_number.as_deref(), Some("TN1"));
        assert!(plan.escrow.is_none());
    }

    #[test]
    fn test_plan_in_transit_keeps_existing_tracking() {
        let event = FulfillmentEvent::parse(
            br#"{"type":"package_in_transit","data":{"shipment":{"order_id":555,"tracking_number":"TN2"}}}"#,
        )
        .unwrap();
        let mut tracked = order(OrderStatus::Shipped);
        tracked.tracking_number = Some("TN1".to_string());
        let plan = event.plan(&tracked);
        assert!(plan.update.tracking_number.is_none());
        assert!(plan.update.status.is_none());

        let plan = event.plan(&order(OrderStatus::Shipped));
        assert_eq!(plan.update.tracking_number.as_deref(), Some("TN2"));
    }

    #[test]
    fn test_plan_delivery_releases_escrow() {
        let event =
            FulfillmentEvent::parse(br#"{"type":"package_delivered","data":{"order":{"id":555}}}"#).unwrap();
        let plan = event.plan(&order(OrderStatus::Shipped));
        assert_eq!(plan.update.status, Some(OrderStatus::Delivered));
        assert_eq!(plan.escrow, Some(EscrowAction::Release));

        // a redelivered webhook still attempts the idempotent release
        let plan = event.plan(&order(OrderStatus::Delivered));
        assert!(plan.update.status.is_none());
        assert_eq!(plan.escrow, Some(EscrowAction::Release));
    }

    #[test]
    fn test_plan_failure_and_cancel_refund() {
        for (kind, status) in [
            ("order_failed", OrderStatus::Failed),
            ("order_canceled", OrderStatus::Canceled),
        ] {
            let body = format!(r#"{{"type":"{kind}","data":{{"order":{{"id":555}}}}}}"#);
            let event = FulfillmentEvent::parse(body.as_bytes()).unwrap();
            let plan = event.plan(&order(OrderStatus::Confirmed));
            assert_eq!(plan.update.status, Some(status));
            assert_eq!(plan.escrow, Some(EscrowAction::Refund));
        }
    }

    #[test]
    fn test_plan_cancel_after_delivery_does_not_refund() {
        let event =
            FulfillmentEvent::parse(br#"{"type":"order_canceled","data":{"order":{"id":555}}}"#).unwrap();
        let plan = event.plan(&order(OrderStatus::Delivered));
        assert!(plan.update.status.is_none());
        assert!(plan.escrow.is_none());
    }

    #[test]
    fn test_plan_unknown_event_is_noop() {
        let event =
            FulfillmentEvent::parse(br#"{"type":"stock_updated","data":{"order":{"id":555}}}"#).unwrap();
        let plan = event.plan(&order(OrderStatus::Confirmed));
        assert!(plan.update.is_empty());
        assert!(plan.escrow.is_none());
    }
}
