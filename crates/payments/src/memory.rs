//! In-memory payment gateway for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::PaymentProcessor;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::gateway::FALLBACK_PAYER_NAME;
use crate::{CheckoutSession, GatewayError, PaymentFacts, PaymentGateway, PaymentRequest, Result};

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    transactions: HashMap<String, PaymentFacts>,
    fail_on_initialize: bool,
    fail_on_verify: bool,
    verify_calls: usize,
}

/// Records sessions opened through [`PaymentGateway::initialize`] and treats
/// them as paid in full unless told otherwise.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    processor: PaymentProcessor,
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new(processor: PaymentProcessor) -> Self {
        Self {
            processor,
            state: Arc::default(),
        }
    }

    /// Registers a transaction directly, as if the customer had paid out of band.
    pub async fn insert(&self, reference: impl Into<String>, facts: PaymentFacts) {
        self.state
            .write()
            .await
            .transactions
            .insert(reference.into(), facts);
    }

    /// Marks a known transaction as declined (or paid again).
    pub async fn set_succeeded(&self, reference: &str, succeeded: bool) {
        if let Some(facts) = self.state.write().await.transactions.get_mut(reference) {
            facts.succeeded = succeeded;
        }
    }

    pub async fn set_fail_on_initialize(&self, fail: bool) {
        self.state.write().await.fail_on_initialize = fail;
    }

    /// Makes every verification fail as if the processor were unreachable.
    pub async fn set_fail_on_verify(&self, fail: bool) {
        self.state.write().await.fail_on_verify = fail;
    }

    pub async fn verify_calls(&self) -> usize {
        self.state.read().await.verify_calls
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    fn processor(&self) -> PaymentProcessor {
        self.processor
    }

    async fn initialize(&self, request: &PaymentRequest) -> Result<CheckoutSession> {
        let mut state = self.state.write().await;
        if state.fail_on_initialize {
            return Err(GatewayError::Initialization("processor unavailable".to_string()));
        }

        let reference = format!("{}_{}", self.processor, Uuid::new_v4().simple());
        state.transactions.insert(
            reference.clone(),
            PaymentFacts {
                processor: self.processor,
                external_reference: reference.clone(),
                succeeded: true,
                amount_paid: request.amount,
                payer_email: request.email.clone(),
                payer_name: request
                    .customer_name
                    .clone()
                    .unwrap_or_else(|| FALLBACK_PAYER_NAME.to_string()),
                cart: request.cart.clone(),
            },
        );

        Ok(CheckoutSession {
            processor: self.processor,
            reference: reference.clone(),
            redirect_url: match self.processor {
                PaymentProcessor::Paystack => Some(format!("https://checkout.test/{reference}")),
                PaymentProcessor::Stripe => None,
            },
            access_code: None,
            client_secret: match self.processor {
                PaymentProcessor::Stripe => Some(format!("{reference}_secret")),
                PaymentProcessor::Paystack => None,
            },
        })
    }

    async fn verify(&self, reference: &str) -> Result<PaymentFacts> {
        let mut state = self.state.write().await;
        state.verify_calls += 1;

        if state.fail_on_verify {
            return Err(GatewayError::Timeout);
        }

        state.transactions.get(reference).cloned().ok_or_else(|| {
            GatewayError::VerificationFailed(format!("unknown reference '{reference}'"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MerchItemId, Money};
    use domain::CartLine;

    fn request() -> PaymentRequest {
        PaymentRequest {
            email: "ada@example.com".to_string(),
            customer_name: None,
            amount: Money::from_major(50),
            cart: vec![CartLine {
                merch_item_id: MerchItemId::new(),
                name: "Ceramic Mug".to_string(),
                unit_price: Money::from_major(25),
                quantity: 2,
            }],
        }
    }

    #[tokio::test]
    async fn initialized_session_verifies_with_its_cart() {
        let gateway = InMemoryPaymentGateway::new(PaymentProcessor::Stripe);
        let request = request();
        let session = gateway.initialize(&request).await.unwrap();
        assert!(session.client_secret.is_some());

        let facts = gateway.verify(&session.reference).await.unwrap();
        assert!(facts.succeeded);
        assert_eq!(facts.amount_paid, Money::from_major(50));
        assert_eq!(facts.payer_name, "Customer");
        assert_eq!(facts.cart, request.cart);
    }

    #[tokio::test]
    async fn unknown_reference_fails() {
        let gateway = InMemoryPaymentGateway::new(PaymentProcessor::Paystack);
        let err = gateway.verify("nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::VerificationFailed(_)));
        assert_eq!(gateway.verify_calls().await, 1);
    }

    #[tokio::test]
    async fn forced_failures() {
        let gateway = InMemoryPaymentGateway::new(PaymentProcessor::Paystack);
        gateway.set_fail_on_initialize(true).await;
        assert!(gateway.initialize(&request()).await.is_err());

        gateway.set_fail_on_initialize(false).await;
        let session = gateway.initialize(&request()).await.unwrap();
        gateway.set_fail_on_verify(true).await;
        assert_eq!(
            gateway.verify(&session.reference).await.unwrap_err(),
            GatewayError::Timeout
        );
    }
}
