//! Goods, orders, escrow settlement and fulfillment webhooks.

use secrecy::ExposeSecret;
use tracing::{info, instrument, warn};

use crate::domain::catalog::{
    CATALOG_SIZES, DEFAULT_BASE_PRICE_PERCENT, DEFAULT_COLORS, DEFAULT_SIZES, TSHIRT_PRODUCT_ID,
    variant_catalog, variant_id,
};
use crate::domain::revenue::{escrow_profit, mul_div, split_goods_revenue};
use crate::domain::webhook::{
    EscrowAction, FulfillmentEvent, FulfillmentEventKind, verify_signature,
};
use crate::domain::{
    AppError, ContestStatus, CreateGoodsRequest, EntityId, EscrowStatus, FulfillmentOrderRequest,
    Goods, GoodsRevenueDistribution, GoodsStatus, NewGoods, NewGoodsDistribution, NewOrder,
    Order, OrderStatus, PlaceOrderRequest, PlaceOrderResponse, PoolCredit, ShippingAddress,
    ShippingEstimateResponse, ShippingRate, TransferCheck, ValidationError, VariantCatalog,
    WebhookAck,
};

use super::service::{AppService, validate};

/// Fulfillment status recorded when the provider rejected an order.
pub const PROVIDER_ERROR_STATUS: &str = "provider_error";

impl AppService {
    pub async fn list_goods(&self) -> Result<Vec<Goods>, AppError> {
        self.db_client.list_goods().await
    }

    #[instrument(skip(self))]
    pub async fn get_goods(&self, id: EntityId) -> Result<Goods, AppError> {
        self.db_client
            .get_goods(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("goods {id}")))
    }

    #[must_use]
    pub fn variants(&self) -> VariantCatalog {
        variant_catalog()
    }

    /// Creates a goods listing from an ended contest's meme.
    ///
    /// Base price defaults to 60% of retail; sizes and colours default to the
    /// full size range in black and white. Every size/colour pair must exist
    /// in the variant catalogue.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_goods(&self, request: &CreateGoodsRequest) -> Result<Goods, AppError> {
        validate(request, "create goods")?;

        let sizes = request
            .sizes
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SIZES.iter().map(|s| (*s).to_string()).collect());
        let colors = request
            .colors
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COLORS.iter().map(|c| (*c).to_string()).collect());

        if let Some(size) = sizes.iter().find(|s| !CATALOG_SIZES.contains(&s.as_str())) {
            return Err(AppError::Validation(ValidationError::field(
                "sizes",
                format!("unknown size '{size}'"),
            )));
        }
        if let Some(color) = colors.iter().find(|c| variant_id(c, CATALOG_SIZES[0]).is_none()) {
            return Err(AppError::Validation(ValidationError::field(
                "colors",
                format!("unknown colour '{color}'"),
            )));
        }

        let base_price_cents = request.base_price_cents.unwrap_or_else(|| {
            mul_div(request.retail_price_cents, DEFAULT_BASE_PRICE_PERCENT, 100)
        });
        if base_price_cents < 0 || base_price_cents > request.retail_price_cents {
            return Err(AppError::Validation(ValidationError::field(
                "base_price_cents",
                "must be between 0 and the retail price",
            )));
        }

        let meme_contest_id = match request.meme_id {
            Some(meme_id) => self.get_meme(meme_id).await?.contest_id,
            None => None,
        };
        let checks = [("contest_id", request.contest_id), ("meme_id", meme_contest_id)];
        for (field, contest_id) in checks {
            let Some(contest_id) = contest_id else { continue };
            let contest = self.get_contest(contest_id).await?;
            if contest.status != ContestStatus::Ended {
                return Err(AppError::Validation(ValidationError::field(
                    field,
                    "goods can only be made from an ended contest",
                )));
            }
        }

        let goods = self
            .db_client
            .create_goods(&NewGoods {
                contest_id: request.contest_id,
                meme_id: request.meme_id,
                title: request.title.clone(),
                description: request.description.clone(),
                image_url: request.image_url.clone(),
                mockup_urls: Vec::new(),
                category: request
                    .category
                    .clone()
                    .unwrap_or_else(|| "clothing".to_string()),
                product_type: request
                    .product_type
                    .clone()
                    .unwrap_or_else(|| "t-shirt".to_string()),
                base_price_cents,
                retail_price_cents: request.retail_price_cents,
                sizes,
                colors,
                fulfillment_product_id: request.fulfillment_product_id.or(Some(TSHIRT_PRODUCT_ID)),
                fulfillment_variant_id: request.fulfillment_variant_id,
            })
            .await?;

        info!(goods_id = goods.id, "Goods created");
        Ok(goods)
    }

    /// Quotes shipping for one item of the goods.
    ///
    /// Without a fulfillment provider, or when it fails, a flat rate is quoted.
    #[instrument(skip(self, address))]
    pub async fn estimate_shipping(
        &self,
        goods_id: EntityId,
        address: &ShippingAddress,
    ) -> Result<ShippingEstimateResponse, AppError> {
        validate(address, "estimate shipping")?;
        let goods = self.get_goods(goods_id).await?;

        let Some(client) = &self.fulfillment_client else {
            return Ok(ShippingEstimateResponse {
                shipping_rates: vec![ShippingRate::flat_rate()],
            });
        };

        let variant = goods.fulfillment_variant_id.or_else(|| {
            let color = goods.colors.first()?;
            let size = goods.sizes.first()?;
            variant_id(color, size)
        });
        let Some(variant) = variant else {
            return Ok(ShippingEstimateResponse {
                shipping_rates: vec![ShippingRate::flat_rate()],
            });
        };

        let shipping_rates = match client.shipping_rates(variant, address, 1).await {
            Ok(rates) if !rates.is_empty() => rates,
            Ok(_) => vec![ShippingRate::flat_rate()],
            Err(e) => {
                warn!(goods_id, error = ?e, "Shipping rate lookup failed, quoting flat rate");
                vec![ShippingRate::flat_rate()]
            }
        };
        Ok(ShippingEstimateResponse { shipping_rates })
    }

    /// Places an order for one item.
    ///
    /// This method orchestrates the following workflow:
    /// 1. Validates the buyer, shipping and variant
    /// 2. Verifies the SOL payment on chain (when paid and enabled)
    /// 3. Forwards the order to the fulfillment provider (when linked)
    /// 4. Stores the order and, when paid, its profit escrow atomically
    ///
    /// A provider failure does not fail the order; it is recorded as
    /// `fulfillment_status = "provider_error"`.
    #[instrument(skip(self, request), fields(buyer = %request.buyer_wallet))]
    pub async fn place_order(
        &self,
        goods_id: EntityId,
        request: &PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, AppError> {
        validate(request, "place order")?;

        let goods = self.get_goods(goods_id).await?;
        if goods.status != GoodsStatus::Active {
            return Err(AppError::Validation(ValidationError::field(
                "goods_id",
                "goods are no longer available",
            )));
        }
        if !goods.offers(&request.size, &request.color) {
            return Err(AppError::Validation(ValidationError::field(
                "size",
                format!(
                    "{} / {} is not offered for these goods",
                    request.size, request.color
                ),
            )));
        }

        if let Some(lamports) = request.sol_amount_lamports {
            let signature = request
                .payment_signature
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    AppError::Validation(ValidationError::MissingField(
                        "payment_signature".to_string(),
                    ))
                })?;
            self.verify_payment(signature, &request.buyer_wallet, lamports)
                .await?;
        }

        let shipping = request.shipping();
        let (fulfillment_order_id, fulfillment_status) = match &self.fulfillment_client {
            Some(client) if goods.fulfillment_product_id.is_some() => {
                let provider_request = FulfillmentOrderRequest {
                    recipient: shipping.clone(),
                    email: request.buyer_email.clone(),
                    sync_variant_id: goods
                        .fulfillment_variant_id
                        .or_else(|| variant_id(&request.color, &request.size)),
                    quantity: 1,
                    retail_price_cents: goods.retail_price_cents,
                    file_url: goods.image_url.clone(),
                };
                match client.create_order(&provider_request).await {
                    Ok(receipt) => (Some(receipt.id), Some(receipt.status)),
                    Err(e) => {
                        warn!(goods_id, error = ?e, "Fulfillment provider rejected order");
                        (None, Some(PROVIDER_ERROR_STATUS.to_string()))
                    }
                }
            }
            _ => (None, None),
        };

        let status = if fulfillment_order_id.is_some() {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        };
        let escrow_lamports = request.sol_amount_lamports.map(|lamports| {
            escrow_profit(lamports, goods.retail_price_cents, goods.base_price_cents)
        });

        let (order, escrow) = self
            .db_client
            .create_order(
                &NewOrder {
                    goods_id,
                    buyer_wallet: request.buyer_wallet.clone(),
                    buyer_email: request.buyer_email.clone(),
                    size: request.size.clone(),
                    color: request.color.clone(),
                    quantity: 1,
                    total_price_cents: goods.retail_price_cents,
                    sol_amount_lamports: request.sol_amount_lamports,
                    payment_signature: request.payment_signature.clone(),
                    shipping,
                    status,
                    fulfillment_order_id,
                    fulfillment_status,
                },
                escrow_lamports,
            )
            .await?;

        info!(
            order_id = order.id,
            status = %order.status,
            escrow_lamports = ?escrow.as_ref().map(|e| e.amount_lamports),
            "Order placed"
        );
        Ok(PlaceOrderResponse { order, escrow })
    }

    async fn verify_payment(
        &self,
        signature: &str,
        buyer_wallet: &str,
        lamports: i64,
    ) -> Result<(), AppError> {
        if !self.config.verify_onchain_payments {
            return Ok(());
        }
        let min_amount = u64::try_from(lamports).map_err(|_| {
            AppError::Validation(ValidationError::field(
                "sol_amount_lamports",
                "must be positive",
            ))
        })?;
        let check = TransferCheck {
            signature: signature.to_string(),
            source_wallet: buyer_wallet.to_string(),
            destination_wallet: self.config.treasury_wallet.clone(),
            mint: None,
            min_amount,
        };
        if self.blockchain_client.verify_transfer(&check).await? {
            Ok(())
        } else {
            warn!(signature = %signature, "Order payment could not be verified");
            Err(AppError::Validation(ValidationError::field(
                "payment_signature",
                "transaction does not transfer the order amount to the treasury",
            )))
        }
    }

    #[instrument(skip(self))]
    pub async fn orders_by_wallet(&self, wallet: &str) -> Result<Vec<Order>, AppError> {
        self.db_client.orders_by_wallet(wallet).await
    }

    /// Confirms delivery of an order by hand, exactly as a delivery webhook would.
    #[instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: EntityId) -> Result<Order, AppError> {
        let order = self
            .db_client
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("order {order_id}")))?;
        let event = FulfillmentEvent {
            kind: FulfillmentEventKind::PackageDelivered,
            provider_order_id: order.fulfillment_order_id,
            tracking_number: None,
            tracking_url: None,
            order_status: None,
        };
        self.apply_fulfillment_event(&order, &event).await
    }

    /// Authenticates and applies a fulfillment provider webhook.
    ///
    /// # Errors
    ///
    /// - `Authentication` when a secret is configured and the signature does not match
    /// - `Validation` when the payload lacks `type` or `data`
    ///
    /// Everything after parsing is acknowledged, including unknown orders and
    /// processing failures, so the provider does not retry forever.
    #[instrument(skip(self, body, signature))]
    pub async fn handle_fulfillment_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, AppError> {
        if let Some(secret) = &self.config.webhook_secret {
            let valid = signature.is_some_and(|sig| {
                verify_signature(secret.expose_secret().as_bytes(), body, sig)
            });
            if !valid {
                warn!("Rejected webhook with invalid signature");
                return Err(AppError::Authentication(
                    "invalid webhook signature".to_string(),
                ));
            }
        }

        let event = FulfillmentEvent::parse(body).map_err(AppError::Validation)?;
        let ack = WebhookAck { ok: true };

        let Some(provider_order_id) = event.provider_order_id else {
            info!(kind = ?event.kind, "Webhook without order id ignored");
            return Ok(ack);
        };

        let order = match self
            .db_client
            .find_order_by_fulfillment_id(provider_order_id)
            .await
        {
            Ok(Some(order)) => order,
            Ok(None) => {
                info!(provider_order_id, "Webhook for unknown order ignored");
                return Ok(ack);
            }
            Err(e) => {
                warn!(provider_order_id, error = ?e, "Webhook order lookup failed");
                return Ok(ack);
            }
        };

        if let Err(e) = self.apply_fulfillment_event(&order, &event).await {
            warn!(order_id = order.id, kind = ?event.kind, error = ?e, "Webhook processing failed");
        }
        Ok(ack)
    }

    async fn apply_fulfillment_event(
        &self,
        order: &Order,
        event: &FulfillmentEvent,
    ) -> Result<Order, AppError> {
        let plan = event.plan(order);
        let updated = if plan.update.is_empty() {
            order.clone()
        } else {
            self.db_client.update_order(order.id, &plan.update).await?
        };

        match plan.escrow {
            Some(EscrowAction::Release) => {
                self.release_escrow(&updated).await?;
            }
            Some(EscrowAction::Refund) => {
                self.refund_escrow(updated.id).await?;
            }
            None => {}
        }

        info!(order_id = updated.id, status = %updated.status, kind = ?event.kind, "Fulfillment event applied");
        Ok(updated)
    }

    /// Releases a delivered order's escrow and splits it.
    ///
    /// The creator is the goods' meme author, or the author of the winning
    /// meme of the goods' contest. The voter part is credited to the
    /// contest's reward pool. Returns `None` when there is no held escrow.
    #[instrument(skip(self, order), fields(order_id = order.id))]
    pub async fn release_escrow(
        &self,
        order: &Order,
    ) -> Result<Option<GoodsRevenueDistribution>, AppError> {
        let escrow = match self.db_client.get_escrow_by_order(order.id).await? {
            Some(escrow) if escrow.status == EscrowStatus::Held => escrow,
            _ => return Ok(None),
        };

        let goods = self.get_goods(order.goods_id).await?;
        let meme = match goods.meme_id {
            Some(meme_id) => self.db_client.get_meme(meme_id).await?,
            None => None,
        };
        let contest_id = goods.contest_id.or_else(|| meme.as_ref().and_then(|m| m.contest_id));
        if let Some(id) = contest_id {
            // Voter weights are only final once the contest has ended.
            let contest = self.get_contest(id).await?;
            if contest.status != ContestStatus::Ended {
                warn!(order_id = order.id, contest_id = id, "Escrow held until the contest ends");
                return Err(AppError::Conflict(format!(
                    "contest {id} has not ended; escrow stays held"
                )));
            }
        }

        let creator_wallet = match (meme, contest_id) {
            (Some(meme), _) => Some(meme.author_wallet),
            (None, Some(contest_id)) => self.winner_author(contest_id).await?,
            (None, None) => None,
        };

        let total_weight: i64 = match contest_id {
            Some(id) => self
                .db_client
                .voter_totals(id)
                .await?
                .iter()
                .map(|v| v.total_samu_amount)
                .sum(),
            None => 0,
        };

        let split = split_goods_revenue(
            &self.config.goods_shares,
            escrow.amount_lamports,
            creator_wallet.is_some(),
            total_weight > 0,
        );
        let pool_credit = contest_id
            .filter(|_| split.voter_pool_amount > 0)
            .map(|contest_id| PoolCredit {
                contest_id,
                amount_lamports: split.voter_pool_amount,
                total_weight,
            });

        let distribution = NewGoodsDistribution {
            order_id: order.id,
            goods_id: goods.id,
            contest_id,
            creator_wallet,
            total_lamports: escrow.amount_lamports,
            creator_amount: split.creator_amount,
            voter_pool_amount: split.voter_pool_amount,
            platform_amount: split.platform_amount,
        };

        let released = self
            .db_client
            .release_escrow(order.id, &distribution, pool_credit)
            .await?;
        if let Some(record) = &released {
            metrics::counter!("escrow_released_total").increment(1);
            info!(
                distribution_id = record.id,
                creator = split.creator_amount,
                voter_pool = split.voter_pool_amount,
                platform = split.platform_amount,
                "Escrow released"
            );
        }
        Ok(released)
    }

    /// Refunds a held escrow. Returns `false` when nothing was held.
    #[instrument(skip(self))]
    pub async fn refund_escrow(&self, order_id: EntityId) -> Result<bool, AppError> {
        let refunded = self.db_client.refund_escrow(order_id).await?;
        if refunded {
            metrics::counter!("escrow_refunded_total").increment(1);
            info!(order_id, "Escrow refunded");
        }
        Ok(refunded)
    }

    /// Author of the contest's winning meme, or of its most voted meme when
    /// no winner was recorded.
    pub(super) async fn winner_author(
        &self,
        contest_id: EntityId,
    ) -> Result<Option<String>, AppError> {
        let contest = self.db_client.get_contest(contest_id).await?;
        if let Some(winner_id) = contest.and_then(|c| c.winner_meme_id) {
            if let Some(meme) = self.db_client.get_meme(winner_id).await? {
                return Ok(Some(meme.author_wallet));
            }
        }
        Ok(self
            .db_client
            .memes_by_contest(contest_id)
            .await?
            .into_iter()
            .next()
            .map(|m| m.author_wallet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ServiceConfig;
    use crate::domain::webhook::sign_body;
    use crate::domain::{
        CastVoteRequest, CommerceRepository, CreateContestRequest, CreateMemeRequest,
        RevenueRepository,
    };
    use crate::test_utils::wallets::{ALICE, BOB, CAROL, TREASURY};
    use crate::test_utils::{MockBlockchainClient, MockDatabaseClient, MockFulfillmentClient};
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use std::sync::Arc;

    const SOL: i64 = 1_000_000_000;

    struct Fixture {
        db: Arc<MockDatabaseClient>,
        chain: Arc<MockBlockchainClient>,
        provider: Arc<MockFulfillmentClient>,
        service: AppService,
    }

    fn config() -> ServiceConfig {
        ServiceConfig {
            treasury_wallet: TREASURY.to_string(),
            ..ServiceConfig::default()
        }
    }

    fn fixture() -> Fixture {
        let db = Arc::new(MockDatabaseClient::new());
        let chain = Arc::new(MockBlockchainClient::new());
        let provider = Arc::new(MockFulfillmentClient::new());
        let service = AppService::new(db.clone(), chain.clone())
            .with_config(config())
            .with_fulfillment(provider.clone());
        Fixture {
            db,
            chain,
            provider,
            service,
        }
    }

    /// Ended contest with one winning meme by ALICE, voted by BOB (30) and CAROL (10).
    async fn ended_contest(service: &AppService) -> (EntityId, EntityId) {
        let now = Utc::now();
        let contest = service
            .create_contest(&CreateContestRequest::new(
                "Weekly",
                now - Duration::hours(2),
                now + Duration::hours(2),
            ))
            .await
            .unwrap();
        service.start_contest(contest.id).await.unwrap();
        let meme = service
            .create_meme(&CreateMemeRequest {
                title: "Winner".to_string(),
                description: None,
                image_url: "https://cdn.samu.io/w.png".to_string(),
                author_wallet: ALICE.to_string(),
                author_username: "alice".to_string(),
            })
            .await
            .unwrap();
        for (voter, amount, sig) in [(BOB, 30, "v1"), (CAROL, 10, "v2")] {
            service
                .cast_vote(
                    meme.id,
                    &CastVoteRequest {
                        voter_wallet: voter.to_string(),
                        samu_amount: amount,
                        tx_signature: sig.to_string(),
                    },
                )
                .await
                .unwrap();
        }
        service.end_contest(contest.id).await.unwrap();
        (contest.id, meme.id)
    }

    fn order_request(lamports: Option<i64>, signature: Option<&str>) -> PlaceOrderRequest {
        PlaceOrderRequest {
            size: "M".to_string(),
            color: "Black".to_string(),
            buyer_wallet: BOB.to_string(),
            buyer_email: "bob@example.com".to_string(),
            shipping_name: "Bob".to_string(),
            shipping_address1: "1 Main St".to_string(),
            shipping_address2: None,
            shipping_city: "Austin".to_string(),
            shipping_state: Some("TX".to_string()),
            shipping_country: "US".to_string(),
            shipping_zip: "73301".to_string(),
            shipping_phone: None,
            sol_amount_lamports: lamports,
            payment_signature: signature.map(str::to_string),
        }
    }

    async fn goods_for(service: &AppService, contest_id: EntityId, meme_id: EntityId) -> Goods {
        let mut request = CreateGoodsRequest::new("Winner Tee", "https://cdn.samu.io/w.png", 2500);
        request.contest_id = Some(contest_id);
        request.meme_id = Some(meme_id);
        service.create_goods(&request).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_goods_applies_defaults() {
        let f = fixture();
        let goods = f
            .service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500))
            .await
            .unwrap();
        assert_eq!(goods.base_price_cents, 1500);
        assert_eq!(goods.sizes, vec!["S", "M", "L", "XL", "2XL"]);
        assert_eq!(goods.colors, vec!["Black", "White"]);
        assert_eq!(goods.fulfillment_product_id, Some(TSHIRT_PRODUCT_ID));
    }

    #[tokio::test]
    async fn test_create_goods_rejects_unknown_variants() {
        let f = fixture();
        let mut request = CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500);
        request.colors = Some(vec!["Purple".to_string()]);
        assert!(matches!(
            f.service.create_goods(&request).await,
            Err(AppError::Validation(_))
        ));

        let mut request = CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500);
        request.sizes = Some(vec!["XXS".to_string()]);
        assert!(f.service.create_goods(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_create_goods_requires_ended_contest() {
        let f = fixture();
        let now = Utc::now();
        let contest = f
            .service
            .create_contest(&CreateContestRequest::new("Open", now, now + Duration::hours(1)))
            .await
            .unwrap();
        let mut request = CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500);
        request.contest_id = Some(contest.id);
        assert!(matches!(
            f.service.create_goods(&request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_goods_rejects_meme_from_running_contest() {
        let f = fixture();
        let now = Utc::now();
        let contest = f
            .service
            .create_contest(&CreateContestRequest::new("Live", now, now + Duration::hours(1)))
            .await
            .unwrap();
        f.service.start_contest(contest.id).await.unwrap();
        let meme = f
            .service
            .create_meme(&CreateMemeRequest {
                title: "Live".to_string(),
                description: None,
                image_url: "https://cdn.samu.io/l.png".to_string(),
                author_wallet: ALICE.to_string(),
                author_username: "alice".to_string(),
            })
            .await
            .unwrap();

        let mut request = CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500);
        request.meme_id = Some(meme.id);
        let err = f.service.create_goods(&request).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidField { ref field, .. }) if field == "meme_id"
        ));

        f.service.end_contest(contest.id).await.unwrap();
        let goods = f.service.create_goods(&request).await.unwrap();
        assert_eq!(goods.meme_id, Some(meme.id));
    }

    #[tokio::test]
    async fn test_estimate_shipping_flat_rate_without_provider() {
        let db = Arc::new(MockDatabaseClient::new());
        let service = AppService::new(db, Arc::new(MockBlockchainClient::new()));
        let goods = service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500))
            .await
            .unwrap();
        let address = ShippingAddress {
            address1: "1 Main St".to_string(),
            city: "Austin".to_string(),
            country_code: "US".to_string(),
            state_code: Some("TX".to_string()),
            zip: "73301".to_string(),
        };

        let estimate = service.estimate_shipping(goods.id, &address).await.unwrap();
        assert_eq!(estimate.shipping_rates, vec![ShippingRate::flat_rate()]);
    }

    #[tokio::test]
    async fn test_estimate_shipping_uses_provider() {
        let f = fixture();
        let goods = f
            .service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500))
            .await
            .unwrap();
        let address = ShippingAddress {
            address1: "1 Rue".to_string(),
            city: "Paris".to_string(),
            country_code: "FR".to_string(),
            state_code: None,
            zip: "75001".to_string(),
        };

        let estimate = f.service.estimate_shipping(goods.id, &address).await.unwrap();
        assert_eq!(estimate.shipping_rates[0].name, "Standard to FR");
    }

    #[tokio::test]
    async fn test_place_paid_order_opens_escrow() {
        let f = fixture();
        let (contest_id, meme_id) = ended_contest(&f.service).await;
        let goods = goods_for(&f.service, contest_id, meme_id).await;

        let placed = f
            .service
            .place_order(goods.id, &order_request(Some(SOL), Some("pay-1")))
            .await
            .unwrap();

        assert_eq!(placed.order.status, OrderStatus::Confirmed);
        assert!(placed.order.fulfillment_order_id.is_some());
        let escrow = placed.escrow.unwrap();
        assert_eq!(escrow.amount_lamports, 400_000_000);
        assert_eq!(escrow.status, EscrowStatus::Held);

        let sent = f.provider.get_orders();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sync_variant_id, variant_id("Black", "M"));
        let checks = f.chain.get_checks();
        assert_eq!(checks.last().unwrap().mint, None);
        assert_eq!(checks.last().unwrap().min_amount, SOL as u64);
    }

    #[tokio::test]
    async fn test_place_order_requires_signature_when_paid() {
        let f = fixture();
        let goods = f
            .service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500))
            .await
            .unwrap();

        let result = f
            .service
            .place_order(goods.id, &order_request(Some(SOL), None))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        f.chain.set_transfers_valid(false);
        let result = f
            .service
            .place_order(goods.id, &order_request(Some(SOL), Some("forged")))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_place_order_rejects_unoffered_variant() {
        let f = fixture();
        let goods = f
            .service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500))
            .await
            .unwrap();
        let mut request = order_request(None, None);
        request.color = "Navy".to_string();

        assert!(matches!(
            f.service.place_order(goods.id, &request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_is_tolerated() {
        let db = Arc::new(MockDatabaseClient::new());
        let service = AppService::new(db, Arc::new(MockBlockchainClient::new()))
            .with_config(config())
            .with_fulfillment(Arc::new(MockFulfillmentClient::failing("provider down")));
        let goods = service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500))
            .await
            .unwrap();

        let placed = service
            .place_order(goods.id, &order_request(None, None))
            .await
            .unwrap();
        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert_eq!(
            placed.order.fulfillment_status.as_deref(),
            Some(PROVIDER_ERROR_STATUS)
        );
        assert!(placed.escrow.is_none());
    }

    #[tokio::test]
    async fn test_delivery_releases_escrow_once() {
        let f = fixture();
        let (contest_id, meme_id) = ended_contest(&f.service).await;
        let goods = goods_for(&f.service, contest_id, meme_id).await;
        let placed = f
            .service
            .place_order(goods.id, &order_request(Some(SOL), Some("pay-1")))
            .await
            .unwrap();

        let order = f.service.mark_delivered(placed.order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);

        let distributions = f.db.list_distributions().await.unwrap();
        assert_eq!(distributions.len(), 1);
        let d = &distributions[0];
        assert_eq!(d.creator_wallet.as_deref(), Some(ALICE));
        assert_eq!(d.creator_amount, 180_000_000);
        assert_eq!(d.voter_pool_amount, 160_000_000);
        assert_eq!(d.platform_amount, 60_000_000);
        assert_eq!(
            d.creator_amount + d.voter_pool_amount + d.platform_amount,
            d.total_lamports
        );

        let pool = f.db.get_pool(contest_id).await.unwrap().unwrap();
        assert_eq!(pool.total_credited_lamports, 160_000_000);
        assert_eq!(pool.total_weight, 40);

        f.service.mark_delivered(placed.order.id).await.unwrap();
        assert_eq!(f.db.list_distributions().await.unwrap().len(), 1);
        assert_eq!(
            f.db.get_pool(contest_id)
                .await
                .unwrap()
                .unwrap()
                .total_credited_lamports,
            160_000_000
        );
    }

    #[tokio::test]
    async fn test_release_without_contest_sends_voter_part_to_platform() {
        let f = fixture();
        let goods = f
            .service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2000))
            .await
            .unwrap();
        let placed = f
            .service
            .place_order(goods.id, &order_request(Some(1_000_001), Some("pay-1")))
            .await
            .unwrap();
        let escrowed = placed.escrow.unwrap().amount_lamports;
        assert_eq!(escrowed, 400_000);

        f.service.mark_delivered(placed.order.id).await.unwrap();
        let d = &f.db.list_distributions().await.unwrap()[0];
        assert_eq!(d.creator_amount, 0);
        assert_eq!(d.voter_pool_amount, 0);
        assert_eq!(d.platform_amount, escrowed);
    }

    fn event_body(kind: &str, provider_order_id: i64) -> Vec<u8> {
        serde_json::json!({
            "type": kind,
            "data": {
                "order": { "id": provider_order_id, "status": "fulfilled" },
                "shipment": {
                    "order_id": provider_order_id,
                    "tracking_number": "1Z999",
                    "tracking_url": "https://track.example.com/1Z999"
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_webhook_flow_shipped_then_delivered() {
        let f = fixture();
        let (contest_id, meme_id) = ended_contest(&f.service).await;
        let goods = goods_for(&f.service, contest_id, meme_id).await;
        let placed = f
            .service
            .place_order(goods.id, &order_request(Some(SOL), Some("pay-1")))
            .await
            .unwrap();
        let provider_id = placed.order.fulfillment_order_id.unwrap();

        let ack = f
            .service
            .handle_fulfillment_webhook(&event_body("package_shipped", provider_id), None)
            .await
            .unwrap();
        assert!(ack.ok);
        let shipped = f.db.orders_by_wallet(BOB).await.unwrap().remove(0);
        assert_eq!(shipped.status, OrderStatus::Shipped);
        assert_eq!(shipped.tracking_number.as_deref(), Some("1Z999"));

        f.service
            .handle_fulfillment_webhook(&event_body("package_delivered", provider_id), None)
            .await
            .unwrap();
        let escrow = f.db.get_escrow_by_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(escrow.status, EscrowStatus::Released);

        // a late failure event cannot undo the delivery
        f.service
            .handle_fulfillment_webhook(&event_body("order_failed", provider_id), None)
            .await
            .unwrap();
        let escrow = f.db.get_escrow_by_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(escrow.status, EscrowStatus::Released);
    }

    #[tokio::test]
    async fn test_webhook_cancel_refunds_escrow() {
        let f = fixture();
        let goods = f
            .service
            .create_goods(&CreateGoodsRequest::new("Tee", "https://cdn.samu.io/t.png", 2500))
            .await
            .unwrap();
        let placed = f
            .service
            .place_order(goods.id, &order_request(Some(SOL), Some("pay-1")))
            .await
            .unwrap();
        let provider_id = placed.order.fulfillment_order_id.unwrap();

        f.service
            .handle_fulfillment_webhook(&event_body("order_canceled", provider_id), None)
            .await
            .unwrap();

        let escrow = f.db.get_escrow_by_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(escrow.status, EscrowStatus::Refunded);
        assert!(f.db.list_distributions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_unknown_order_is_acknowledged() {
        let f = fixture();
        let ack = f
            .service
            .handle_fulfillment_webhook(&event_body("package_delivered", 123_456), None)
            .await
            .unwrap();
        assert!(ack.ok);
    }

    #[tokio::test]
    async fn test_webhook_rejects_malformed_payload() {
        let f = fixture();
        let result = f
            .service
            .handle_fulfillment_webhook(br#"{"data":{}}"#, None)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_webhook_signature_checked_when_secret_set() {
        let db = Arc::new(MockDatabaseClient::new());
        let service = AppService::new(db, Arc::new(MockBlockchainClient::new())).with_config(
            ServiceConfig {
                webhook_secret: Some(SecretString::from("whsec")),
                ..config()
            },
        );
        let body = event_body("order_created", 1);

        let missing = service.handle_fulfillment_webhook(&body, None).await;
        assert!(matches!(missing, Err(AppError::Authentication(_))));

        let wrong = service.handle_fulfillment_webhook(&body, Some("deadbeef")).await;
        assert!(matches!(wrong, Err(AppError::Authentication(_))));

        let signature = sign_body(b"whsec", &body).unwrap();
        let ok = service
            .handle_fulfillment_webhook(&body, Some(&signature))
            .await
            .unwrap();
        assert!(ok.ok);
    }
}
