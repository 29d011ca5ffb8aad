// server/src/models/buyer.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The paying user, as far as the gateway's initiate call needs to know them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
  pub id: Uuid,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(default)]
  pub phone_number: String,
}
