//! Merchandise catalog items and their stock ledger.

use common::{MerchItemId, Money};
use serde::{Deserialize, Serialize};

use crate::error::{InsufficientStock, ValidationError};
use crate::validation;

/// A sellable item. `stock` counts the units still available and never goes
/// below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchItem {
    pub id: MerchItemId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub category: String,
}

impl MerchItem {
    /// Stock remaining after taking `quantity` units.
    pub fn take(&self, quantity: u32) -> Result<u32, InsufficientStock> {
        self.stock
            .checked_sub(quantity)
            .ok_or_else(|| InsufficientStock {
                item: self.id,
                name: self.name.clone(),
                requested: quantity,
                available: self.stock,
            })
    }

    /// Applies an admin edit. Stock can only grow here, through `restock`.
    pub fn apply_update(&mut self, update: MerchItemUpdate) -> Result<(), ValidationError> {
        if let Some(price) = update.price
            && price.is_negative()
        {
            return Err(ValidationError::new("price", "must not be negative"));
        }

        let restocked = match update.restock {
            Some(units) => self
                .stock
                .checked_add(units)
                .ok_or_else(|| ValidationError::new("restock", "stock would overflow"))?,
            None => self.stock,
        };

        if let Some(name) = update.name {
            self.name = validation::non_empty("name", &name)?;
        }
        if let Some(category) = update.category {
            self.category = validation::non_empty("category", &category)?;
        }
        if update.description.is_some() {
            self.description = validation::optional(update.description);
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        self.stock = restocked;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMerchItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
    pub category: String,
}

impl NewMerchItem {
    pub fn into_item(self) -> Result<MerchItem, ValidationError> {
        if self.price.is_negative() {
            return Err(ValidationError::new("price", "must not be negative"));
        }
        Ok(MerchItem {
            id: MerchItemId::new(),
            name: validation::non_empty("name", &self.name)?,
            description: validation::optional(self.description),
            price: self.price,
            stock: self.stock,
            category: validation::non_empty("category", &self.category)?,
        })
    }
}

/// Admin edit for a catalog item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MerchItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category: Option<String>,
    /// Units to add to the current stock.
    pub restock: Option<u32>,
}
