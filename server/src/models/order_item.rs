// server/src/models/order_item.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CatalogItem;

/// A line of an order. Price and display fields are copied from the catalog
/// at purchase time and never follow later catalog edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub recipe_id: Uuid,
  pub quantity: u32,
  pub price_at_purchase: Decimal,
  pub recipe_name: String,
  pub recipe_image_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl OrderItem {
  pub fn snapshot(order_id: Uuid, item: &CatalogItem, quantity: u32, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id,
      recipe_id: item.id,
      quantity,
      price_at_purchase: item.unit_price,
      recipe_name: item.title.clone(),
      recipe_image_url: item.display_image().map(str::to_string),
      created_at: now,
      updated_at: now,
    }
  }
}
