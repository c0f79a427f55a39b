//! Printful REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{info, instrument, warn};

use crate::config::PrintfulConfig;
use crate::domain::{
    AppError, ExternalServiceError, FulfillmentClient, FulfillmentOrderReceipt,
    FulfillmentOrderRequest, ShippingAddress, ShippingRate,
};

pub const PRINTFUL_BASE_URL: &str = "https://api.printful.com";

/// Printful API client
pub struct PrintfulClient {
    http_client: Client,
    base_url: String,
    api_key: SecretString,
    store_id: String,
}

#[derive(Debug, Deserialize)]
struct PrintfulEnvelope<T> {
    result: Option<T>,
    error: Option<PrintfulError>,
}

#[derive(Debug, Deserialize)]
struct PrintfulError {
    message: String,
}

#[derive(Debug, Serialize)]
struct OrderRecipient<'a> {
    name: &'a str,
    address1: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    address2: Option<&'a str>,
    city: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_code: Option<&'a str>,
    country_code: &'a str,
    zip: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderFile<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderItem<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_variant_id: Option<i64>,
    quantity: i32,
    retail_price: String,
    files: Vec<OrderFile<'a>>,
}

#[derive(Debug, Serialize)]
struct OrderPayload<'a> {
    recipient: OrderRecipient<'a>,
    items: Vec<OrderItem<'a>>,
}

#[derive(Debug, Serialize)]
struct RateRecipient<'a> {
    address1: &'a str,
    city: &'a str,
    country_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_code: Option<&'a str>,
    zip: &'a str,
}

#[derive(Debug, Serialize)]
struct RateItem {
    variant_id: i64,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct RatePayload<'a> {
    recipient: RateRecipient<'a>,
    items: Vec<RateItem>,
}

#[derive(Debug, Deserialize)]
struct OrderResult {
    id: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateResult {
    id: String,
    name: String,
    rate: String,
    currency: String,
    min_delivery_days: Option<u32>,
    max_delivery_days: Option<u32>,
}

impl From<RateResult> for ShippingRate {
    fn from(rate: RateResult) -> Self {
        Self {
            id: rate.id,
            name: rate.name,
            rate: rate.rate,
            currency: rate.currency,
            min_delivery_days: rate.min_delivery_days,
            max_delivery_days: rate.max_delivery_days,
        }
    }
}

/// Formats cents as the decimal string Printful expects, e.g. `2999` -> `"29.99"`.
fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

fn order_payload(order: &FulfillmentOrderRequest) -> OrderPayload<'_> {
    let recipient = &order.recipient;
    OrderPayload {
        recipient: OrderRecipient {
            name: &recipient.name,
            address1: &recipient.address1,
            address2: recipient.address2.as_deref(),
            city: &recipient.city,
            state_code: recipient.state.as_deref(),
            country_code: &recipient.country,
            zip: &recipient.zip,
            phone: recipient.phone.as_deref(),
            email: &order.email,
        },
        items: vec![OrderItem {
            sync_variant_id: order.sync_variant_id,
            quantity: order.quantity,
            retail_price: format_price(order.retail_price_cents),
            files: vec![OrderFile {
                url: &order.file_url,
            }],
        }],
    }
}

impl PrintfulClient {
    pub fn new(config: &PrintfulConfig) -> Result<Self, AppError> {
        Self::with_base_url(config, PRINTFUL_BASE_URL)
    }

    pub fn with_base_url(config: &PrintfulConfig, base_url: &str) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ExternalService(ExternalServiceError::HttpError(e.to_string())))?;
        info!(store_id = %config.store_id, "Created Printful client");
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            store_id: config.store_id.clone(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AppError> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.api_key.expose_secret())
            .header("X-PF-Store-Id", &self.store_id)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::ExternalService(ExternalServiceError::Timeout(e.to_string()))
                } else {
                    AppError::ExternalService(ExternalServiceError::HttpError(e.to_string()))
                }
            })?;

        let status = response.status();
        let envelope: PrintfulEnvelope<R> = response.json().await.map_err(|e| {
            AppError::ExternalService(ExternalServiceError::HttpError(e.to_string()))
        })?;

        if !status.is_success() {
            let message = envelope
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            warn!(path = %path, status = %status, message = %message, "Printful request failed");
            return Err(AppError::ExternalService(match status {
                StatusCode::TOO_MANY_REQUESTS => ExternalServiceError::RateLimited(message),
                s if s.is_server_error() => ExternalServiceError::Unavailable(message),
                _ => ExternalServiceError::HttpError(message),
            }));
        }

        envelope.result.ok_or_else(|| {
            AppError::ExternalService(ExternalServiceError::HttpError(
                "Printful response has no result".to_string(),
            ))
        })
    }
}

#[async_trait]
impl FulfillmentClient for PrintfulClient {
    #[instrument(skip(self, order), fields(sync_variant_id = ?order.sync_variant_id))]
    async fn create_order(
        &self,
        order: &FulfillmentOrderRequest,
    ) -> Result<FulfillmentOrderReceipt, AppError> {
        let result: OrderResult = self.post("/orders", &order_payload(order)).await?;
        info!(printful_order_id = result.id, status = %result.status, "Printful order created");
        Ok(FulfillmentOrderReceipt {
            id: result.id,
            status: result.status,
        })
    }

    #[instrument(skip(self, address))]
    async fn shipping_rates(
        &self,
        variant_id: i64,
        address: &ShippingAddress,
        quantity: u32,
    ) -> Result<Vec<ShippingRate>, AppError> {
        let payload = RatePayload {
            recipient: RateRecipient {
                address1: &address.address1,
                city: &address.city,
                country_code: &address.country_code,
                state_code: address.state_code.as_deref(),
                zip: &address.zip,
            },
            items: vec![RateItem {
                variant_id,
                quantity,
            }],
        };
        let rates: Vec<RateResult> = self.post("/shipping/rates", &payload).await?;
        Ok(rates.into_iter().map(ShippingRate::from).collect())
    }
}
