//! Stripe adapter (PaymentIntents with client-side card confirmation).
//!
//! Stripe caps a metadata value at 500 characters and an object at 50 keys,
//! so the cart travels one line per key (`cart_items_0`, `cart_items_1`, ...)
//! and is reassembled in key order on verification.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use domain::{CartLine, PaymentProcessor, ValidationError};
use reqwest::Client;
use serde::Deserialize;

use crate::gateway::{FALLBACK_PAYER_NAME, check_reference};
use crate::http::{DEFAULT_TIMEOUT, build_client, join};
use crate::{CheckoutSession, GatewayError, PaymentFacts, PaymentGateway, PaymentRequest, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
pub const DEFAULT_CURRENCY: &str = "usd";

const MAX_METADATA_VALUE_LEN: usize = 500;
/// 50 keys per object, less `customer_email` and `customer_name`.
const MAX_CART_KEYS: usize = 48;
const CART_KEY_PREFIX: &str = "cart_items_";

/// Encodes the cart as numbered metadata entries, one line each.
fn encode_cart(cart: &[CartLine]) -> Result<Vec<(String, String)>> {
    if cart.len() > MAX_CART_KEYS {
        return Err(ValidationError::new(
            "items",
            format!("a Stripe checkout holds at most {MAX_CART_KEYS} distinct items"),
        )
        .into());
    }

    cart.iter()
        .enumerate()
        .map(|(i, line)| -> Result<(String, String)> {
            let value = serde_json::to_string(line)
                .map_err(|e| GatewayError::Initialization(e.to_string()))?;
            if value.len() > MAX_METADATA_VALUE_LEN {
                return Err(ValidationError::new(
                    "items",
                    format!("item {} does not fit in Stripe metadata", line.merch_item_id),
                )
                .into());
            }
            Ok((format!("metadata[{CART_KEY_PREFIX}{i}]"), value))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub base_url: String,
    pub currency: String,
    pub timeout: Duration,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    amount_received: i64,
    #[serde(default)]
    receipt_email: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Reads a PaymentIntent, or Stripe's error message for a non-2xx answer.
async fn read_intent(response: reqwest::Response) -> std::result::Result<PaymentIntent, String> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| format!("unreadable response: {e}"));
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error.message)
        .unwrap_or_else(|| format!("Stripe returned {status}"));
    Err(message)
}

impl PaymentIntent {
    fn cart(&self) -> Result<Vec<CartLine>> {
        let cart = (0..)
            .map_while(|i| self.metadata.get(&format!("{CART_KEY_PREFIX}{i}")))
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| {
                    GatewayError::VerificationFailed(format!("unreadable cart metadata: {e}"))
                })
            })
            .collect::<Result<Vec<CartLine>>>()?;

        if cart.is_empty() {
            return Err(GatewayError::VerificationFailed(
                "payment intent carries no cart metadata".to_string(),
            ));
        }
        Ok(cart)
    }

    fn payer_email(&self) -> Option<String> {
        self.metadata
            .get("customer_email")
            .cloned()
            .or_else(|| self.receipt_email.clone())
    }

    fn payer_name(&self) -> String {
        self.metadata
            .get("customer_name")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_PAYER_NAME)
            .to_string()
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn processor(&self) -> PaymentProcessor {
        PaymentProcessor::Stripe
    }

    #[tracing::instrument(
        skip(self, request),
        fields(email = %request.email, amount = %request.amount)
    )]
    async fn initialize(&self, request: &PaymentRequest) -> Result<CheckoutSession> {
        let cart_entries = encode_cart(&request.cart)?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), request.amount.minor().to_string()),
            ("currency".into(), self.config.currency.clone()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
            ("receipt_email".into(), request.email.clone()),
            ("metadata[customer_email]".into(), request.email.clone()),
        ];
        if let Some(name) = &request.customer_name {
            form.push(("metadata[customer_name]".into(), name.clone()));
        }
        form.extend(cart_entries);

        let response = self
            .client
            .post(join(&self.config.base_url, "/v1/payment_intents"))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await?;

        let intent = read_intent(response)
            .await
            .map_err(GatewayError::Initialization)?;

        Ok(CheckoutSession {
            processor: PaymentProcessor::Stripe,
            reference: intent.id,
            redirect_url: None,
            access_code: None,
            client_secret: intent.client_secret,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn verify(&self, reference: &str) -> Result<PaymentFacts> {
        let reference = check_reference(reference)?;

        let response = self
            .client
            .get(join(
                &self.config.base_url,
                &format!("/v1/payment_intents/{reference}"),
            ))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        let intent = read_intent(response)
            .await
            .map_err(GatewayError::VerificationFailed)?;

        if intent.status != "succeeded" {
            return Err(GatewayError::VerificationFailed(format!(
                "payment intent status is '{}'",
                intent.status
            )));
        }

        let payer_email = intent.payer_email().ok_or_else(|| {
            GatewayError::VerificationFailed("payment intent has no payer email".to_string())
        })?;

        Ok(PaymentFacts {
            processor: PaymentProcessor::Stripe,
            succeeded: true,
            amount_paid: Money::from_minor(intent.amount_received),
            payer_email,
            payer_name: intent.payer_name(),
            cart: intent.cart()?,
            external_reference: intent.id,
        })
    }
}
