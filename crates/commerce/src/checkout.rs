//! Checkout: prices a cart from the catalog, opens a processor session and,
//! once the customer has paid, verifies the payment and reconciles it.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{MerchItemId, Money};
use domain::{CartLine, PaymentProcessor, ValidationError, validation};
use payments::{CheckoutSession, PaymentGateway, PaymentGateways, PaymentRequest};
use serde::Deserialize;
use store::Store;

use crate::reconcile::{Reconciliation, ReconciliationService};
use crate::{CommerceError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub id: MerchItemId,
    pub quantity: u32,
}

/// A cart submitted for payment. Prices are never taken from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub items: Vec<CheckoutItem>,
}

pub struct CheckoutService<S: Store> {
    store: S,
    gateways: PaymentGateways,
    reconciler: ReconciliationService<S>,
}

impl<S: Store> CheckoutService<S> {
    pub fn new(store: S, gateways: PaymentGateways, reconciler: ReconciliationService<S>) -> Self {
        Self {
            store,
            gateways,
            reconciler,
        }
    }

    pub fn processors(&self) -> Vec<PaymentProcessor> {
        self.gateways.processors()
    }

    /// Opens a checkout session for the cart.
    ///
    /// The stock check here takes no locks and only spares the customer a
    /// payment that is bound to fail; reconciliation checks stock again.
    #[tracing::instrument(skip(self, request), fields(processor = %processor))]
    pub async fn initialize(
        &self,
        processor: PaymentProcessor,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession> {
        let gateway = self.gateway(processor)?;
        let email = validation::email(&request.email)?;
        let customer_name = validation::optional(request.name);
        let quantities = merge_items(request.items)?;

        let mut cart = Vec::with_capacity(quantities.len());
        for (id, quantity) in quantities {
            let item = self
                .store
                .get_merch_item(id)
                .await?
                .ok_or_else(|| CommerceError::not_found("merch item", id))?;
            item.take(quantity)?;
            cart.push(CartLine {
                merch_item_id: item.id,
                name: item.name,
                unit_price: item.price,
                quantity,
            });
        }

        let amount: Money = cart.iter().map(CartLine::total_price).sum();
        if amount.minor() <= 0 {
            return Err(ValidationError::new("items", "order total must be positive").into());
        }

        let session = gateway
            .initialize(&PaymentRequest {
                email,
                customer_name,
                amount,
                cart,
            })
            .await
            .map_err(CommerceError::from)?;

        tracing::info!(reference = %session.reference, amount = %amount, "checkout session opened");
        Ok(session)
    }

    /// Verifies a payment with its processor and reconciles it.
    #[tracing::instrument(skip(self), fields(processor = %processor))]
    pub async fn confirm(
        &self,
        processor: PaymentProcessor,
        reference: &str,
    ) -> Result<Reconciliation> {
        let gateway = self.gateway(processor)?;
        let reference = validation::non_empty("reference", reference)?;

        let verified = gateway.verify(&reference).await;
        let outcome = if verified.is_ok() { "verified" } else { "failed" };
        metrics::counter!(
            "gateway_verifications_total",
            "processor" => processor.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        let facts = verified.map_err(|e| {
            tracing::warn!(error = %e, "payment verification failed");
            CommerceError::VerificationFailed(e.to_string())
        })?;
        self.reconciler.reconcile(&facts).await
    }

    fn gateway(&self, processor: PaymentProcessor) -> Result<Arc<dyn PaymentGateway>> {
        self.gateways
            .get(processor)
            .ok_or_else(|| CommerceError::UnknownProcessor(processor.to_string()))
    }
}

/// Sums quantities per item, in id order.
fn merge_items(items: Vec<CheckoutItem>) -> Result<BTreeMap<MerchItemId, u32>> {
    if items.is_empty() {
        return Err(ValidationError::new("items", "cart is empty").into());
    }
    let mut merged = BTreeMap::new();
    for item in items {
        if item.quantity == 0 {
            return Err(ValidationError::new("quantity", "must be at least 1").into());
        }
        let quantity = merged.entry(item.id).or_insert(0u32);
        *quantity = quantity
            .checked_add(item.quantity)
            .ok_or_else(|| ValidationError::new("quantity", "quantity overflow"))?;
    }
    Ok(merged)
}
