//! Order Cart Boundary
//!
//! The voice assistant never touches order state directly. It is handed an
//! `OrderCart` at construction and drives it through three mutation entry
//! points. `InMemoryCart` is the reference implementation backed by a menu
//! catalog.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors a cart implementation can report back to the tool layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Item not found: {0}")]
    UnknownItem(String),
    #[error("Cart unavailable: {0}")]
    Unavailable(String),
}

/// The mutation entry points exposed by the order cart.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderCart: Send + Sync {
    /// Adds one unit of the item with the given id.
    async fn add_item_by_id(&self, id: &str) -> Result<(), CartError>;

    /// Removes the line for the given id entirely.
    async fn remove_item_by_id(&self, id: &str) -> Result<(), CartError>;

    /// Sets the quantity for the given id. A quantity of zero removes the line.
    async fn update_item_quantity(&self, id: &str, quantity: u32) -> Result<(), CartError>;
}

/// A single entry of the menu catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    /// Unit price in the smallest currency unit.
    pub price: u64,
    pub category: String,
}

/// A menu item together with the ordered quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: MenuItem,
    pub quantity: u32,
}

/// An `OrderCart` held in memory and validated against a fixed catalog.
pub struct InMemoryCart {
    catalog: HashMap<String, MenuItem>,
    lines: Mutex<Vec<OrderLine>>,
}

impl InMemoryCart {
    /// Creates an empty cart that accepts only ids present in `catalog`.
    pub fn new(catalog: impl IntoIterator<Item = MenuItem>) -> Self {
        Self {
            catalog: catalog
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect(),
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of the current order lines, in insertion order.
    pub async fn lines(&self) -> Vec<OrderLine> {
        self.lines.lock().await.clone()
    }

    /// Returns the quantity ordered for `id`, or zero.
    pub async fn quantity_of(&self, id: &str) -> u32 {
        self.lines
            .lock()
            .await
            .iter()
            .find(|line| line.item.id == id)
            .map_or(0, |line| line.quantity)
    }

    /// Sum of price times quantity over all lines.
    pub async fn total(&self) -> u64 {
        self.lines
            .lock()
            .await
            .iter()
            .map(|line| line.item.price * u64::from(line.quantity))
            .sum()
    }
}

#[async_trait]
impl OrderCart for InMemoryCart {
    async fn add_item_by_id(&self, id: &str) -> Result<(), CartError> {
        let item = self
            .catalog
            .get(id)
            .ok_or_else(|| CartError::UnknownItem(id.to_string()))?;
        let mut lines = self.lines.lock().await;
        match lines.iter_mut().find(|line| line.item.id == id) {
            Some(line) => line.quantity += 1,
            None => lines.push(OrderLine {
                item: item.clone(),
                quantity: 1,
            }),
        }
        info!(item_id = %id, "Added item to cart");
        Ok(())
    }

    async fn remove_item_by_id(&self, id: &str) -> Result<(), CartError> {
        let mut lines = self.lines.lock().await;
        let before = lines.len();
        lines.retain(|line| line.item.id != id);
        if lines.len() == before {
            debug!(item_id = %id, "Remove requested for item not in cart");
        } else {
            info!(item_id = %id, "Removed item from cart");
        }
        Ok(())
    }

    async fn update_item_quantity(&self, id: &str, quantity: u32) -> Result<(), CartError> {
        let mut lines = self.lines.lock().await;
        if quantity == 0 {
            lines.retain(|line| line.item.id != id);
        } else if let Some(line) = lines.iter_mut().find(|line| line.item.id == id) {
            line.quantity = quantity;
        }
        info!(item_id = %id, quantity, "Updated item quantity");
        Ok(())
    }
}
