use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::ProviderError;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
const PROVIDER: &str = "stripe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub unit_amount: i64,
    pub currency: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub line_item: LineItem,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub payment_status: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SessionSummary {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid" || self.payment_status == "no_payment_required"
    }
}

/// Hosted checkout provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSummary, ProviderError>;
}

#[derive(Clone, Debug)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: Option<StripeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    id: Option<String>,
    url: Option<String>,
}

impl StripeClient {
    pub fn new(client: Client, api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.api_base)
    }

    /// The id is pushed as one encoded path segment, so `/`, `?` and `..`
    /// cannot reach another endpoint.
    fn session_url(&self, session_id: &str) -> Result<Url, ProviderError> {
        let invalid = |detail: String| ProviderError::InvalidRequest {
            provider: PROVIDER,
            detail,
        };
        let mut url = Url::parse(&self.sessions_url())
            .map_err(|err| invalid(format!("invalid api base: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| invalid("api base cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(session_id);
        Ok(url)
    }
}

/// Stripe's form encoding for a one-item hosted checkout.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let item = &request.line_item;
    let mut form = vec![
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            item.currency.clone(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            item.name.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]".to_string(),
            item.description.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            item.unit_amount.to_string(),
        ),
        ("line_items[0][quantity]".to_string(), item.quantity.to_string()),
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    form
}

async fn assert_ok_response(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StripeErrorResponse>(&text)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| format!("Stripe request failed: {status} {text}"));
    Err(ProviderError::Api {
        provider: PROVIDER,
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(request))
            .send()
            .await
            .map_err(ProviderError::transport(PROVIDER))?;

        let response = assert_ok_response(response).await?;
        let payload: CreatedSession = response
            .json()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err.to_string()))?;
        let id = payload
            .id
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "checkout session has no id"))?;
        info!(session_id = %id, "checkout session created");
        Ok(CheckoutSession {
            id,
            url: payload.url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSummary, ProviderError> {
        let response = self
            .client
            .get(self.session_url(session_id.trim())?)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(ProviderError::transport(PROVIDER))?;

        let response = assert_ok_response(response).await?;
        let session: SessionSummary = response
            .json()
            .await
            .map_err(|err| ProviderError::malformed(PROVIDER, err.to_string()))?;
        debug!(session_id = %session.id, payment_status = %session.payment_status, "session retrieved");
        Ok(session)
    }
}
