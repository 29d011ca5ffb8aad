// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use hasura_actions::config::AppConfig;
use hasura_actions::models::{Buyer, CatalogItem, Order, OrderItem, OrderStatus};
use hasura_actions::pipelines::contexts::{InitiatePaymentInput, RequestedItem};
use hasura_actions::services::chapa::parse_verify_response;
use hasura_actions::services::{
  DataService, DataServiceError, GatewayError, InitiatePaymentRequest, PaymentGateway, VerifiedTransaction,
};
use hasura_actions::state::AppState;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

pub const CALLBACK_URL: &str = "https://api.example.com/chapa/callback";
pub const RETURN_URL: &str = "https://shop.example.com/orders/done";
pub const CHECKOUT_URL: &str = "https://checkout.chapa.co/checkout/payment/test-session";

// --- In-memory data service ---

#[derive(Default)]
pub struct Store {
  pub catalog: HashMap<Uuid, CatalogItem>,
  pub buyers: HashMap<Uuid, Buyer>,
  pub orders: Vec<Order>,
  pub order_items: Vec<OrderItem>,
  pub status_writes: usize,
  pub fail_order_items: bool,
  pub fail_order_lookup: bool,
  pub read_stall: Option<Duration>,
}

/// Behaves like the Hasura schema: `chapa_tx_ref` is unique and status
/// updates only touch pending or unknown orders.
#[derive(Default)]
pub struct InMemoryDataService {
  pub store: Mutex<Store>,
}

impl InMemoryDataService {
  pub fn add_item(&self, title: &str, unit_price: Decimal) -> CatalogItem {
    let item = CatalogItem {
      id: Uuid::new_v4(),
      title: title.to_string(),
      unit_price,
      images: vec![],
    };
    self.store.lock().catalog.insert(item.id, item.clone());
    item
  }

  pub fn add_buyer(&self) -> Buyer {
    let buyer = Buyer {
      id: Uuid::new_v4(),
      first_name: "Abebe".to_string(),
      last_name: "Kebede".to_string(),
      email: "abebe@example.com".to_string(),
      phone_number: "0911000000".to_string(),
    };
    self.store.lock().buyers.insert(buyer.id, buyer.clone());
    buyer
  }

  /// Stores an order directly, bypassing initiation.
  pub fn add_order(&self, status: OrderStatus, total: Decimal) -> Order {
    let now = Utc::now();
    let order = Order {
      id: Uuid::new_v4(),
      user_id: Uuid::new_v4(),
      total_amount: total,
      currency: "ETB".to_string(),
      return_url: RETURN_URL.to_string(),
      status,
      chapa_tx_ref: format!("c-{}-{}", &Uuid::new_v4().simple().to_string()[..12], now.timestamp()),
      chapa_transaction_id: None,
      created_at: now,
      updated_at: now,
    };
    self.store.lock().orders.push(order.clone());
    order
  }

  pub fn order(&self, tx_ref: &str) -> Option<Order> {
    self.store.lock().orders.iter().find(|o| o.chapa_tx_ref == tx_ref).cloned()
  }

  pub fn order_count(&self) -> usize {
    self.store.lock().orders.len()
  }

  pub fn order_items(&self) -> Vec<OrderItem> {
    self.store.lock().order_items.clone()
  }

  pub fn status_writes(&self) -> usize {
    self.store.lock().status_writes
  }

  pub fn fail_order_items(&self) {
    self.store.lock().fail_order_items = true;
  }

  pub fn fail_order_lookup(&self) {
    self.store.lock().fail_order_lookup = true;
  }

  /// Catalog and order lookups sleep this long before answering.
  pub fn stall_reads(&self, duration: Duration) {
    self.store.lock().read_stall = Some(duration);
  }

  async fn stall(&self) {
    let stall = self.store.lock().read_stall;
    if let Some(duration) = stall {
      tokio::time::sleep(duration).await;
    }
  }
}

#[async_trait]
impl DataService for InMemoryDataService {
  async fn catalog_items_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CatalogItem>, DataServiceError> {
    self.stall().await;
    let store = self.store.lock();
    Ok(ids.iter().filter_map(|id| store.catalog.get(id).cloned()).collect())
  }

  async fn buyer_by_id(&self, id: Uuid) -> Result<Option<Buyer>, DataServiceError> {
    Ok(self.store.lock().buyers.get(&id).cloned())
  }

  async fn insert_order(&self, order: &Order) -> Result<Order, DataServiceError> {
    let mut store = self.store.lock();
    if store.orders.iter().any(|o| o.chapa_tx_ref == order.chapa_tx_ref) {
      return Err(DataServiceError::ConstraintViolation {
        constraint: Some("orders_chapa_tx_ref_key".to_string()),
        message: "duplicate chapa_tx_ref".to_string(),
      });
    }
    store.orders.push(order.clone());
    Ok(order.clone())
  }

  async fn insert_order_items(&self, items: &[OrderItem]) -> Result<u64, DataServiceError> {
    let mut store = self.store.lock();
    if store.fail_order_items {
      return Err(DataServiceError::Transport("connection reset".to_string()));
    }
    store.order_items.extend_from_slice(items);
    Ok(items.len() as u64)
  }

  async fn update_order_status_by_tx_ref(
    &self,
    tx_ref: &str,
    status: OrderStatus,
    chapa_transaction_id: Option<&str>,
  ) -> Result<u64, DataServiceError> {
    let mut store = self.store.lock();
    let mut affected = 0;
    for order in store
      .orders
      .iter_mut()
      .filter(|o| o.chapa_tx_ref == tx_ref && OrderStatus::RESOLVABLE.contains(&o.status))
    {
      order.status = status;
      if let Some(id) = chapa_transaction_id {
        order.chapa_transaction_id = Some(id.to_string());
      }
      order.updated_at = Utc::now();
      affected += 1;
    }
    store.status_writes += affected as usize;
    Ok(affected)
  }

  async fn order_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Order>, DataServiceError> {
    self.stall().await;
    let store = self.store.lock();
    if store.fail_order_lookup {
      return Err(DataServiceError::Transport("connection refused".to_string()));
    }
    Ok(store.orders.iter().find(|o| o.chapa_tx_ref == tx_ref).cloned())
  }
}

// --- Scripted gateway ---

#[derive(Debug, Clone)]
pub enum InitiateScript {
  Succeed,
  Reject(&'static str),
  Unavailable(u16),
}

#[derive(Debug, Clone)]
pub enum VerifyScript {
  Status(&'static str),
  Unavailable(u16),
  Hang(Duration),
  /// Raw 2xx body run through the real response parser.
  Reply(&'static str),
}

pub struct GatewayScript {
  pub initiate: InitiateScript,
  pub verify: VerifyScript,
  pub initiate_requests: Vec<InitiatePaymentRequest>,
  pub verify_calls: usize,
}

pub struct ScriptedGateway {
  pub script: Mutex<GatewayScript>,
}

impl Default for ScriptedGateway {
  fn default() -> Self {
    Self {
      script: Mutex::new(GatewayScript {
        initiate: InitiateScript::Succeed,
        verify: VerifyScript::Status("success"),
        initiate_requests: Vec::new(),
        verify_calls: 0,
      }),
    }
  }
}

impl ScriptedGateway {
  pub fn set_initiate(&self, script: InitiateScript) {
    self.script.lock().initiate = script;
  }

  pub fn set_verify(&self, script: VerifyScript) {
    self.script.lock().verify = script;
  }

  pub fn initiate_requests(&self) -> Vec<InitiatePaymentRequest> {
    self.script.lock().initiate_requests.clone()
  }

  pub fn verify_calls(&self) -> usize {
    self.script.lock().verify_calls
  }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  async fn initiate(&self, request: &InitiatePaymentRequest) -> Result<String, GatewayError> {
    let script = {
      let mut guard = self.script.lock();
      guard.initiate_requests.push(request.clone());
      guard.initiate.clone()
    };
    match script {
      InitiateScript::Succeed => Ok(CHECKOUT_URL.to_string()),
      InitiateScript::Reject(message) => Err(GatewayError::Rejected {
        message: message.to_string(),
      }),
      InitiateScript::Unavailable(status) => Err(GatewayError::Unavailable {
        status: Some(status),
        body: "upstream error".to_string(),
      }),
    }
  }

  async fn verify(&self, _tx_ref: &str) -> Result<VerifiedTransaction, GatewayError> {
    let script = {
      let mut guard = self.script.lock();
      guard.verify_calls += 1;
      guard.verify.clone()
    };
    match script {
      VerifyScript::Status(status) => Ok(VerifiedTransaction {
        status: status.to_string(),
        gateway_transaction_id: Some("APx1".to_string()),
        amount: None,
        currency: Some("ETB".to_string()),
      }),
      VerifyScript::Unavailable(status) => Err(GatewayError::Unavailable {
        status: Some(status),
        body: "Invalid transaction or Transaction not found".to_string(),
      }),
      VerifyScript::Reply(body) => parse_verify_response(body),
      VerifyScript::Hang(duration) => {
        tokio::time::sleep(duration).await;
        Err(GatewayError::Unavailable {
          status: None,
          body: "timed out".to_string(),
        })
      }
    }
  }
}

// --- Wiring ---

pub struct TestApp {
  pub state: AppState,
  pub data: Arc<InMemoryDataService>,
  pub gateway: Arc<ScriptedGateway>,
}

pub fn test_config(extra: &[(&str, &str)]) -> AppConfig {
  let mut vars: HashMap<String, String> = [
    ("HASURA_ADMIN_SECRET", "admin-secret"),
    ("CHAPA_SECRET_KEY", "CHASECK_TEST-secret"),
    ("CHAPA_CALLBACK_URL", CALLBACK_URL),
  ]
  .iter()
  .map(|(k, v)| (k.to_string(), v.to_string()))
  .collect();
  for (k, v) in extra {
    vars.insert(k.to_string(), v.to_string());
  }
  AppConfig::from_lookup(move |name| vars.get(name).cloned()).expect("test config is valid")
}

pub fn test_app() -> TestApp {
  test_app_with(test_config(&[]))
}

pub fn test_app_with(config: AppConfig) -> TestApp {
  setup_tracing();
  let data = Arc::new(InMemoryDataService::default());
  let gateway = Arc::new(ScriptedGateway::default());
  let state = AppState::new(Arc::new(config), data.clone(), gateway.clone());
  TestApp { state, data, gateway }
}

pub fn initiation_input(buyer: &Buyer, items: &[(&CatalogItem, i64)], declared: Decimal) -> InitiatePaymentInput {
  InitiatePaymentInput {
    buyer_id: Some(buyer.id.to_string()),
    items: items
      .iter()
      .map(|(item, quantity)| RequestedItem {
        item_id: item.id.to_string(),
        quantity: *quantity,
      })
      .collect(),
    declared_amount: Some(declared),
    currency: "ETB".to_string(),
    return_url: RETURN_URL.to_string(),
  }
}

/// Query parameters of a URL as a map.
pub fn query_map(url: &str) -> HashMap<String, String> {
  reqwest::Url::parse(url)
    .expect("valid URL")
    .query_pairs()
    .into_owned()
    .collect()
}

// --- Helper for Tracing Setup ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
