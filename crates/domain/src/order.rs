//! Merchandise orders and the cart snapshots they are built from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{MerchItemId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Payment processors an order can be settled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProcessor {
    /// Redirect-based checkout (authorization URL + callback reference).
    Paystack,
    /// Card-token checkout through PaymentIntents.
    Stripe,
}

impl PaymentProcessor {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProcessor::Paystack => "paystack",
            PaymentProcessor::Stripe => "stripe",
        }
    }
}

impl std::fmt::Display for PaymentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentProcessor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paystack" => Ok(PaymentProcessor::Paystack),
            "stripe" => Ok(PaymentProcessor::Stripe),
            other => Err(ValidationError::new(
                "processor",
                format!("unknown payment processor '{other}'"),
            )),
        }
    }
}

/// One line of the cart as the customer saw it when paying.
///
/// The serialized field names match the `cart_items` metadata attached to
/// processor transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "id")]
    pub merch_item_id: MerchItemId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Validates a cart and merges duplicate lines for the same item.
///
/// The result is ordered by item id, which is also the order rows must be
/// locked in.
pub fn normalize_cart(lines: Vec<CartLine>) -> Result<Vec<CartLine>, ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::new("items", "cart is empty"));
    }

    let mut merged: BTreeMap<MerchItemId, CartLine> = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(ValidationError::new(
                "quantity",
                format!("{} has a quantity of zero", line.name),
            ));
        }
        match merged.get_mut(&line.merch_item_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| ValidationError::new("quantity", "quantity overflow"))?;
            }
            None => {
                merged.insert(line.merch_item_id, line);
            }
        }
    }

    Ok(merged.into_values().collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(ValidationError::new(
                "status",
                format!("unknown order status '{other}'"),
            )),
        }
    }
}

/// Name/price/quantity of a purchased item, frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub merch_item_id: MerchItemId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl From<CartLine> for OrderLine {
    fn from(line: CartLine) -> Self {
        Self {
            merch_item_id: line.merch_item_id,
            name: line.name,
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

/// A durable order. At most one exists per `external_payment_reference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub external_payment_reference: String,
    pub processor: PaymentProcessor,
    pub customer_email: String,
    pub customer_name: String,
    pub lines: Vec<OrderLine>,
    /// What the processor reports as charged, not a catalog recomputation.
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}
