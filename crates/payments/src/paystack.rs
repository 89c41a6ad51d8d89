//! Paystack adapter (redirect checkout).
//!
//! Amounts travel in kobo, which is what [`Money::minor`] holds. The cart is
//! stored as `metadata.cart_items` when the transaction is initialized and
//! read back on verification.

use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use domain::{CartLine, PaymentProcessor};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::gateway::{FALLBACK_PAYER_NAME, check_reference};
use crate::http::{DEFAULT_TIMEOUT, build_client, join};
use crate::{CheckoutSession, GatewayError, PaymentFacts, PaymentGateway, PaymentRequest, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    /// Where Paystack sends the customer after paying.
    pub callback_url: String,
    pub timeout: Duration,
}

impl PaystackConfig {
    pub fn new(secret_key: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            callback_url: callback_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct PaystackGateway {
    client: Client,
    config: PaystackConfig,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    metadata: InitializeMetadata<'a>,
    callback_url: &'a str,
}

#[derive(Serialize)]
struct InitializeMetadata<'a> {
    cart_items: &'a [CartLine],
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_name: Option<&'a str>,
}

/// Every Paystack response is wrapped in this envelope.
#[derive(Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Deserialize)]
struct TransactionData {
    id: u64,
    status: String,
    amount: i64,
    customer: Customer,
    /// An object when set at initialization, but Paystack may send `""` or
    /// a JSON-encoded string.
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Deserialize)]
struct Customer {
    email: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl Customer {
    /// `first last` from the customer record, then the name typed at
    /// checkout, then a placeholder.
    fn display_name(&self, metadata: &serde_json::Value) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join(" ");
        }

        metadata
            .get("customer_name")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_PAYER_NAME)
            .to_string()
    }
}

/// Metadata arrives as an object, or as that object JSON-encoded in a string.
fn decode_metadata(metadata: &serde_json::Value) -> serde_json::Value {
    match metadata {
        serde_json::Value::String(raw) => serde_json::from_str(raw).unwrap_or_default(),
        other => other.clone(),
    }
}

fn cart_from_metadata(metadata: &serde_json::Value) -> Result<Vec<CartLine>> {
    let cart_items = match metadata.get("cart_items") {
        Some(serde_json::Value::String(raw)) => serde_json::from_str(raw),
        Some(value) => serde_json::from_value(value.clone()),
        None => {
            return Err(GatewayError::VerificationFailed(
                "transaction carries no cart metadata".to_string(),
            ));
        }
    };

    cart_items
        .map_err(|e| GatewayError::VerificationFailed(format!("unreadable cart metadata: {e}")))
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn processor(&self) -> PaymentProcessor {
        PaymentProcessor::Paystack
    }

    #[tracing::instrument(
        skip(self, request),
        fields(email = %request.email, amount = %request.amount)
    )]
    async fn initialize(&self, request: &PaymentRequest) -> Result<CheckoutSession> {
        let body = InitializeBody {
            email: &request.email,
            amount: request.amount.minor(),
            metadata: InitializeMetadata {
                cart_items: &request.cart,
                customer_name: request.customer_name.as_deref(),
            },
            callback_url: &self.config.callback_url,
        };

        let response = self
            .client
            .post(join(&self.config.base_url, "/transaction/initialize"))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?;

        let http_status = response.status();
        let envelope: Envelope<InitializeData> = response.json().await.map_err(|e| {
            GatewayError::Initialization(format!("unreadable response ({http_status}): {e}"))
        })?;

        match envelope.data {
            Some(data) if envelope.status => Ok(CheckoutSession {
                processor: PaymentProcessor::Paystack,
                reference: data.reference,
                redirect_url: Some(data.authorization_url),
                access_code: Some(data.access_code),
                client_secret: None,
            }),
            _ => Err(GatewayError::Initialization(
                envelope
                    .message
                    .unwrap_or_else(|| format!("Paystack returned {http_status}")),
            )),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn verify(&self, reference: &str) -> Result<PaymentFacts> {
        let reference = check_reference(reference)?;

        let response = self
            .client
            .get(join(
                &self.config.base_url,
                &format!("/transaction/verify/{reference}"),
            ))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        let http_status = response.status();
        let envelope: Envelope<TransactionData> = response.json().await.map_err(|e| {
            GatewayError::VerificationFailed(format!("unreadable response ({http_status}): {e}"))
        })?;

        let data = match envelope.data {
            Some(data) if envelope.status => data,
            _ => {
                return Err(GatewayError::VerificationFailed(
                    envelope
                        .message
                        .unwrap_or_else(|| format!("Paystack returned {http_status}")),
                ));
            }
        };

        if data.status != "success" {
            return Err(GatewayError::VerificationFailed(format!(
                "transaction status is '{}'",
                data.status
            )));
        }

        let metadata = decode_metadata(&data.metadata);
        Ok(PaymentFacts {
            processor: PaymentProcessor::Paystack,
            external_reference: data.id.to_string(),
            succeeded: true,
            amount_paid: Money::from_minor(data.amount),
            payer_name: data.customer.display_name(&metadata),
            payer_email: data.customer.email,
            cart: cart_from_metadata(&metadata)?,
        })
    }
}
