//! Order reconciliation: turns a verified payment into exactly one completed
//! order and the matching stock decrements.

use std::time::Instant;

use chrono::Utc;
use common::OrderId;
use domain::{Order, OrderLine, OrderStatus, normalize_cart, validation};
use notify::{Dispatcher, Notification};
use payments::PaymentFacts;
use serde::Serialize;
use store::{Store, StoreError, StoreTx};

use crate::{CommerceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This call created the order and took the stock.
    Created,
    /// An order for the reference already existed; nothing was written.
    AlreadyProcessed,
}

impl ReconcileOutcome {
    /// Status reported to the client.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Created => "completed",
            ReconcileOutcome::AlreadyProcessed => "already_processed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub order: Order,
    pub outcome: ReconcileOutcome,
}

pub struct ReconciliationService<S: Store> {
    store: S,
    dispatcher: Dispatcher,
}

impl<S: Store> ReconciliationService<S> {
    pub fn new(store: S, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Reconciles a verified payment.
    ///
    /// Safe to call any number of times for the same reference: the first
    /// successful call creates the order, every later one returns it with
    /// [`ReconcileOutcome::AlreadyProcessed`]. Either every cart line is
    /// taken from stock and the order is written, or nothing is.
    #[tracing::instrument(
        skip(self, facts),
        fields(reference = %facts.external_reference, processor = %facts.processor)
    )]
    pub async fn reconcile(&self, facts: &PaymentFacts) -> Result<Reconciliation> {
        let start = Instant::now();
        let result = self.apply(facts).await;

        let outcome = match &result {
            Ok(r) => r.outcome.as_str(),
            Err(e) => e.outcome(),
        };
        metrics::counter!("reconciliations_total", "outcome" => outcome).increment(1);
        metrics::histogram!("reconciliation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(r) if r.outcome == ReconcileOutcome::Created => {
                tracing::info!(
                    order_id = %r.order.id,
                    items = r.order.item_count(),
                    "order created"
                );
                self.dispatcher.dispatch(Notification::order_confirmed(&r.order));
            }
            Ok(r) => tracing::info!(order_id = %r.order.id, "payment already reconciled"),
            Err(e) => tracing::warn!(error = %e, outcome, "reconciliation failed"),
        }
        result
    }

    async fn apply(&self, facts: &PaymentFacts) -> Result<Reconciliation> {
        if !facts.succeeded {
            return Err(CommerceError::PaymentNotVerified(
                facts.external_reference.clone(),
            ));
        }
        let reference = validation::non_empty("reference", &facts.external_reference)?;
        let cart = normalize_cart(facts.cart.clone())?;

        let mut tx = self.store.begin().await?;
        tx.lock_payment_reference(&reference).await?;
        if let Some(order) = tx.find_order_by_reference(&reference).await? {
            return Ok(Reconciliation {
                order,
                outcome: ReconcileOutcome::AlreadyProcessed,
            });
        }

        // normalize_cart sorts by id, which keeps the lock order global.
        for line in &cart {
            let item = tx
                .lock_merch_item(line.merch_item_id)
                .await?
                .ok_or_else(|| CommerceError::not_found("merch item", line.merch_item_id))?;
            let remaining = item.take(line.quantity)?;
            tx.set_stock(item.id, remaining).await?;
        }

        let order = Order {
            id: OrderId::new(),
            external_payment_reference: reference,
            processor: facts.processor,
            customer_email: facts.payer_email.clone(),
            customer_name: facts.payer_name.clone(),
            lines: cart.into_iter().map(OrderLine::from).collect(),
            total_amount: facts.amount_paid,
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        };

        match insert_and_commit(tx, &order).await {
            Ok(()) => Ok(Reconciliation {
                order,
                outcome: ReconcileOutcome::Created,
            }),
            Err(StoreError::DuplicateReference(_)) => {
                let existing = self
                    .store
                    .find_order_by_reference(&order.external_payment_reference)
                    .await?
                    .ok_or_else(|| {
                        CommerceError::not_found("order", &order.external_payment_reference)
                    })?;
                Ok(Reconciliation {
                    order: existing,
                    outcome: ReconcileOutcome::AlreadyProcessed,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn insert_and_commit<T: StoreTx>(mut tx: T, order: &Order) -> store::Result<()> {
    tx.insert_order(order).await?;
    tx.commit().await
}
