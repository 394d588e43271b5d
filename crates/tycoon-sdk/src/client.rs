//! Tycoon client implementation.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use tycoon_core::{
    AuditEvent, AuditFilter, Business, BusinessId, CartLine, CartSummary, Category, CategoryId,
    Item, ItemId, Money, Result, Subcategory, SubcategoryId, TycoonError, User, UserId,
};
use tycoon_ledger::{BudgetReport, ChainReport, CheckoutReceipt, PriceAdjustment, SettlementReport};
use tycoon_negotiate::{ContractProposal, NegotiationCommand, NegotiationReply, NegotiationState};

use crate::stream::NotificationStream;

/// Header carrying the caller's identity.
pub(crate) const USER_HEADER: &str = "x-user-id";

/// Client for interacting with a Tycoon node on behalf of one participant.
#[derive(Clone)]
pub struct TycoonClient {
    /// Base URL of the Tycoon node.
    base_url: String,

    /// HTTP client.
    http_client: reqwest::Client,

    /// Identity sent with every request.
    user_id: Option<UserId>,
}

/// Response of the health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub protocol: String,
    pub store_version: u64,
    pub subscribers: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BusinessEnvelope {
    business: Business,
}

#[derive(Debug, Deserialize)]
struct CartEnvelope {
    cart: CartSummary,
}

#[derive(Debug, Deserialize)]
struct ReportEnvelope {
    report: BudgetReport,
}

#[derive(Debug, Serialize)]
struct AmountRequest {
    amount: Money,
}

impl TycoonClient {
    /// Connect to a Tycoon node.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Self {
            base_url: url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            user_id: None,
        };

        // Verify connection with health check
        let health = client.health().await?;
        debug!(version = %health.version, "Connected to Tycoon node");
        Ok(client)
    }

    /// A client acting as `user_id`, sharing the connection pool.
    pub fn as_user(&self, user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..self.clone()
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn identify(&self, request: RequestBuilder) -> RequestBuilder {
        match self.user_id {
            Some(user_id) => request.header(USER_HEADER, user_id.to_string()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .identify(request)
            .send()
            .await
            .map_err(|e| TycoonError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), &body))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| TycoonError::SerializationError(e.to_string()))
    }

    /// Node status.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.fetch(self.http_client.get(self.url("/health"))).await
    }

    // Registration

    pub async fn register_user(&self) -> Result<User> {
        self.fetch(self.http_client.post(self.url("/api/v1/users/register")))
            .await
    }

    pub async fn unclaimed_businesses(&self) -> Result<Vec<Business>> {
        self.fetch(self.http_client.get(self.url("/api/v1/businesses/unclaimed")))
            .await
    }

    /// Claim `business_id` and give it its display name.
    pub async fn complete_registration(&self, business_id: BusinessId, name: &str) -> Result<Business> {
        let envelope: BusinessEnvelope = self
            .fetch(
                self.http_client
                    .post(self.url("/api/v1/registration"))
                    .json(&json!({ "business_id": business_id, "name": name })),
            )
            .await?;
        Ok(envelope.business)
    }

    pub async fn my_business(&self) -> Result<Business> {
        let envelope: BusinessEnvelope = self
            .fetch(self.http_client.get(self.url("/api/v1/me/business")))
            .await?;
        Ok(envelope.business)
    }

    // Catalog

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.fetch(self.http_client.get(self.url("/api/v1/catalog/categories")))
            .await
    }

    pub async fn subcategories(&self, category_id: CategoryId) -> Result<Vec<Subcategory>> {
        let path = format!("/api/v1/catalog/categories/{}/subcategories", category_id);
        self.fetch(self.http_client.get(self.url(&path))).await
    }

    pub async fn items(&self, subcategory_id: SubcategoryId) -> Result<Vec<Item>> {
        let path = format!("/api/v1/catalog/subcategories/{}/items", subcategory_id);
        self.fetch(self.http_client.get(self.url(&path))).await
    }

    pub async fn item(&self, item_id: ItemId) -> Result<Item> {
        let path = format!("/api/v1/catalog/items/{}", item_id);
        self.fetch(self.http_client.get(self.url(&path))).await
    }

    // Cart

    pub async fn view_cart(&self) -> Result<CartSummary> {
        let envelope: CartEnvelope = self.fetch(self.http_client.get(self.url("/api/v1/cart"))).await?;
        Ok(envelope.cart)
    }

    pub async fn add_to_cart(&self, item_id: ItemId, quantity: i64) -> Result<CartLine> {
        self.fetch(
            self.http_client
                .post(self.url("/api/v1/cart/items"))
                .json(&json!({ "item_id": item_id, "quantity": quantity })),
        )
        .await
    }

    pub async fn checkout(&self) -> Result<CheckoutReceipt> {
        self.fetch(self.http_client.post(self.url("/api/v1/cart/checkout")))
            .await
    }

    pub async fn cancel_checkout(&self) -> Result<()> {
        self.send(self.http_client.delete(self.url("/api/v1/cart")))
            .await
            .map(|_| ())
    }

    // Contracts

    /// Send one negotiation command.
    pub async fn negotiate(&self, command: &NegotiationCommand) -> Result<NegotiationReply> {
        self.fetch(self.http_client.post(self.url("/api/v1/contracts")).json(command))
            .await
    }

    pub async fn negotiation_state(&self) -> Result<NegotiationState> {
        self.fetch(self.http_client.get(self.url("/api/v1/contracts/state")))
            .await
    }

    /// Proposals waiting for this user's business to answer.
    pub async fn pending_proposals(&self) -> Result<Vec<ContractProposal>> {
        self.fetch(self.http_client.get(self.url("/api/v1/contracts/pending")))
            .await
    }

    // Administration

    pub async fn credit(&self, business_id: BusinessId, amount: Money) -> Result<Business> {
        let path = format!("/api/v1/admin/businesses/{}/credit", business_id);
        self.fetch(self.http_client.post(self.url(&path)).json(&AmountRequest { amount }))
            .await
    }

    pub async fn debit(&self, business_id: BusinessId, amount: Money) -> Result<Business> {
        let path = format!("/api/v1/admin/businesses/{}/debit", business_id);
        self.fetch(self.http_client.post(self.url(&path)).json(&AmountRequest { amount }))
            .await
    }

    pub async fn set_monthly_expense(&self, business_id: BusinessId, amount: Money) -> Result<Business> {
        let path = format!("/api/v1/admin/businesses/{}/expense", business_id);
        self.fetch(self.http_client.put(self.url(&path)).json(&AmountRequest { amount }))
            .await
    }

    pub async fn run_settlement(&self) -> Result<SettlementReport> {
        self.fetch(self.http_client.post(self.url("/api/v1/admin/settlement")))
            .await
    }

    pub async fn apply_inflation(&self, pct: i64) -> Result<PriceAdjustment> {
        self.fetch(
            self.http_client
                .post(self.url("/api/v1/admin/inflation"))
                .json(&json!({ "pct": pct })),
        )
        .await
    }

    pub async fn budget_report(&self) -> Result<BudgetReport> {
        let envelope: ReportEnvelope = self
            .fetch(self.http_client.get(self.url("/api/v1/admin/report")))
            .await?;
        Ok(envelope.report)
    }

    pub async fn audit_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        self.fetch(self.http_client.get(self.url("/api/v1/admin/audit")).query(filter))
            .await
    }

    pub async fn verify_audit(&self) -> Result<ChainReport> {
        self.fetch(self.http_client.get(self.url("/api/v1/admin/audit/verify")))
            .await
    }

    // Notifications

    /// Subscribe to this user's notifications and public announcements.
    pub async fn notifications(&self) -> Result<NotificationStream> {
        let user_id = self
            .user_id
            .ok_or_else(|| TycoonError::invalid("notifications need a user identity, see `as_user`"))?;
        let ws_url = format!("{}/ws/notifications/{}", websocket_base(&self.base_url), user_id);
        NotificationStream::connect(&ws_url, user_id).await
    }
}

fn websocket_base(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    }
}

/// Rebuild an error from a node's error body.
fn error_from_body(status: u16, body: &str) -> TycoonError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error, message }) => match error.as_str() {
            "invalid_input" => {
                let message = message.strip_prefix("Invalid input: ").unwrap_or(&message);
                TycoonError::InvalidInput(message.to_string())
            }
            _ => TycoonError::Rejected {
                code: error,
                message,
            },
        },
        Err(_) => TycoonError::Rejected {
            code: format!("http_{}", status),
            message: body.to_string(),
        },
    }
}
