// server/src/services/tx_ref.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// `c-<12 random hex>-<unix seconds>`. Short enough for the gateway, and the
/// timestamp suffix makes references traceable in logs.
pub fn generate_tx_ref(now: DateTime<Utc>) -> String {
  let random = Uuid::new_v4().simple().to_string();
  format!("c-{}-{}", &random[..12], now.timestamp())
}
