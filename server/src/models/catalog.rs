// server/src/models/catalog.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogImage {
  pub id: Uuid,
  pub image_url: String,
  #[serde(default)]
  pub is_featured: Option<bool>,
}

/// A priced recipe. `unit_price` is the only price this service trusts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
  pub id: Uuid,
  pub title: String,
  pub unit_price: Decimal,
  /// In display order.
  #[serde(default)]
  pub images: Vec<CatalogImage>,
}

impl CatalogItem {
  /// The first featured image, else the first image, else none.
  pub fn display_image(&self) -> Option<&str> {
    self
      .images
      .iter()
      .find(|img| img.is_featured == Some(true))
      .or_else(|| self.images.first())
      .map(|img| img.image_url.as_str())
  }
}
