use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::Money;
use domain::{CartLine, PaymentProcessor};
use serde::Serialize;

use crate::{GatewayError, Result};

/// What the customer is about to pay for. `amount` is computed server-side
/// from catalog prices.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub email: String,
    pub customer_name: Option<String>,
    pub amount: Money,
    /// Carried in processor metadata and handed back by [`PaymentGateway::verify`].
    pub cart: Vec<CartLine>,
}

/// A checkout session opened with a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub processor: PaymentProcessor,
    /// The reference the client later submits for verification.
    pub reference: String,
    /// Where to send the customer (redirect processors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    /// Token for client-side card confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// The processor's account of a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFacts {
    pub processor: PaymentProcessor,
    /// Processor-side transaction id; orders are unique on it.
    pub external_reference: String,
    pub succeeded: bool,
    pub amount_paid: Money,
    pub payer_email: String,
    pub payer_name: String,
    /// Cart snapshot recovered from the transaction metadata.
    pub cart: Vec<CartLine>,
}

/// A payment processor adapter.
///
/// Adapters keep no local state. Every `verify` call asks the processor
/// again, bounded by the adapter's HTTP timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn processor(&self) -> PaymentProcessor;

    /// Opens a checkout session carrying the cart snapshot.
    async fn initialize(&self, request: &PaymentRequest) -> Result<CheckoutSession>;

    /// Confirms a payment.
    ///
    /// Timeouts, network errors, non-success statuses and unreadable bodies
    /// are all errors; a returned [`PaymentFacts`] describes a successful
    /// payment.
    async fn verify(&self, reference: &str) -> Result<PaymentFacts>;
}

/// Configured gateways, keyed by processor.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    gateways: HashMap<PaymentProcessor, Arc<dyn PaymentGateway>>,
}

impl PaymentGateways {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gateway under its own processor, replacing any previous one.
    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.processor(), gateway);
    }

    pub fn with(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.register(gateway);
        self
    }

    pub fn get(&self, processor: PaymentProcessor) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&processor).cloned()
    }

    pub fn processors(&self) -> Vec<PaymentProcessor> {
        let mut processors: Vec<_> = self.gateways.keys().copied().collect();
        processors.sort_by_key(|p| p.as_str());
        processors
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

/// Rejects references that cannot be a single URL path segment.
pub(crate) fn check_reference(reference: &str) -> Result<&str> {
    let reference = reference.trim();
    let valid = !reference.is_empty()
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '='));
    if valid {
        Ok(reference)
    } else {
        Err(GatewayError::VerificationFailed(format!(
            "malformed payment reference '{reference}'"
        )))
    }
}

/// Name shown on orders when the processor has none for the payer.
pub(crate) const FALLBACK_PAYER_NAME: &str = "Customer";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryPaymentGateway;

    #[test]
    fn reference_must_be_a_path_segment() {
        assert_eq!(check_reference(" ref_123 ").unwrap(), "ref_123");
        assert!(check_reference("").is_err());
        assert!(check_reference("../admin").is_err());
        assert!(check_reference("a b").is_err());
    }

    #[test]
    fn registry_dispatches_by_processor() {
        let gateways = PaymentGateways::new()
            .with(Arc::new(InMemoryPaymentGateway::new(PaymentProcessor::Stripe)));

        assert!(gateways.get(PaymentProcessor::Stripe).is_some());
        assert!(gateways.get(PaymentProcessor::Paystack).is_none());
        assert_eq!(gateways.processors(), vec![PaymentProcessor::Stripe]);
    }
}
