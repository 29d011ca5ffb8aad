// server/src/services/hasura.rs

//! `DataService` over the Hasura GraphQL endpoint.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::data_service::{DataService, DataServiceError};
use crate::models::{Buyer, CatalogItem, Order, OrderItem, OrderStatus};

const ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";
const CONSTRAINT_VIOLATION_CODE: &str = "constraint-violation";

const ORDER_FIELDS: &str =
  "id user_id total_amount currency return_url status chapa_tx_ref chapa_transaction_id created_at updated_at";

const CATALOG_ITEMS_BY_IDS: &str = r#"
query CatalogItemsByIds($ids: [uuid!]!) {
  recipes(where: {id: {_in: $ids}}) {
    id
    title
    unit_price: price_etb
    images: recipe_images(order_by: {image_order: asc}) { id image_url is_featured }
  }
}"#;

const BUYER_BY_ID: &str = r#"
query BuyerById($id: uuid!) {
  users_by_pk(id: $id) { id first_name last_name email phone_number }
}"#;

const INSERT_ORDER_ITEMS: &str = r#"
mutation InsertOrderItems($objects: [order_items_insert_input!]!) {
  insert_order_items(objects: $objects) { affected_rows }
}"#;

const UPDATE_ORDER_STATUS: &str = r#"
mutation UpdateOrderStatus($txRef: String!, $resolvable: [String!]!, $set: orders_set_input!) {
  update_orders(where: {chapa_tx_ref: {_eq: $txRef}, status: {_in: $resolvable}}, _set: $set) { affected_rows }
}"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
  data: Option<T>,
  #[serde(default)]
  errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
  message: String,
  #[serde(default)]
  extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorExtensions {
  #[serde(default)]
  code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MutationResult {
  affected_rows: u64,
}

#[derive(Clone)]
pub struct HasuraClient {
  http: Client,
  endpoint: String,
  admin_secret: String,
}

impl std::fmt::Debug for HasuraClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HasuraClient").field("endpoint", &self.endpoint).finish()
  }
}

impl HasuraClient {
  pub fn new(
    endpoint: impl Into<String>,
    admin_secret: impl Into<String>,
    timeout: Duration,
  ) -> Result<Self, DataServiceError> {
    let http = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| DataServiceError::Transport(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self {
      http,
      endpoint: endpoint.into(),
      admin_secret: admin_secret.into(),
    })
  }

  #[instrument(name = "hasura", skip(self, query, variables))]
  async fn execute<T: DeserializeOwned>(
    &self,
    operation: &'static str,
    query: &str,
    variables: Value,
  ) -> Result<T, DataServiceError> {
    let response = self
      .http
      .post(&self.endpoint)
      .header(ADMIN_SECRET_HEADER, &self.admin_secret)
      .json(&json!({ "query": query, "variables": variables }))
      .send()
      .await
      .map_err(|e| DataServiceError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| DataServiceError::Transport(e.to_string()))?;
    debug!(http_status = status.as_u16(), "Data service responded");

    if !status.is_success() {
      return Err(DataServiceError::Status {
        status: status.as_u16(),
        body,
      });
    }
    decode_response(operation, &body)
  }
}

/// Turns a GraphQL response body into `T`, classifying `errors` entries.
fn decode_response<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, DataServiceError> {
  let parsed: GraphqlResponse<T> = serde_json::from_str(body).map_err(|e| DataServiceError::Decode {
    operation,
    message: e.to_string(),
  })?;

  if let Some(first) = parsed.errors.into_iter().next() {
    let code = first.extensions.and_then(|ext| ext.code);
    if code.as_deref() == Some(CONSTRAINT_VIOLATION_CODE) {
      return Err(DataServiceError::ConstraintViolation {
        constraint: constraint_name(&first.message),
        message: first.message,
      });
    }
    warn!(operation, code = ?code, "GraphQL error: {}", first.message);
    return Err(DataServiceError::Graphql {
      operation,
      message: first.message,
    });
  }

  parsed.data.ok_or_else(|| DataServiceError::Decode {
    operation,
    message: "response carried neither data nor errors".to_string(),
  })
}

/// Pulls the quoted constraint name out of a Postgres violation message.
fn constraint_name(message: &str) -> Option<String> {
  let after = message.split("constraint \"").nth(1)?;
  after.split('"').next().filter(|s| !s.is_empty()).map(str::to_string)
}

#[async_trait]
impl DataService for HasuraClient {
  async fn catalog_items_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CatalogItem>, DataServiceError> {
    #[derive(Deserialize)]
    struct Data {
      recipes: Vec<CatalogItem>,
    }
    let data: Data = self
      .execute("CatalogItemsByIds", CATALOG_ITEMS_BY_IDS, json!({ "ids": ids }))
      .await?;
    Ok(data.recipes)
  }

  async fn buyer_by_id(&self, id: Uuid) -> Result<Option<Buyer>, DataServiceError> {
    #[derive(Deserialize)]
    struct Data {
      users_by_pk: Option<Buyer>,
    }
    let data: Data = self.execute("BuyerById", BUYER_BY_ID, json!({ "id": id })).await?;
    Ok(data.users_by_pk)
  }

  async fn insert_order(&self, order: &Order) -> Result<Order, DataServiceError> {
    #[derive(Deserialize)]
    struct Data {
      insert_orders_one: Option<Order>,
    }
    let query = format!(
      "mutation InsertOrder($object: orders_insert_input!) {{ insert_orders_one(object: $object) {{ {} }} }}",
      ORDER_FIELDS
    );
    let data: Data = self.execute("InsertOrder", &query, json!({ "object": order })).await?;
    data.insert_orders_one.ok_or_else(|| DataServiceError::Decode {
      operation: "InsertOrder",
      message: "insert returned no row".to_string(),
    })
  }

  async fn insert_order_items(&self, items: &[OrderItem]) -> Result<u64, DataServiceError> {
    #[derive(Deserialize)]
    struct Data {
      insert_order_items: MutationResult,
    }
    let data: Data = self
      .execute("InsertOrderItems", INSERT_ORDER_ITEMS, json!({ "objects": items }))
      .await?;
    Ok(data.insert_order_items.affected_rows)
  }

  async fn update_order_status_by_tx_ref(
    &self,
    tx_ref: &str,
    status: OrderStatus,
    chapa_transaction_id: Option<&str>,
  ) -> Result<u64, DataServiceError> {
    #[derive(Deserialize)]
    struct Data {
      update_orders: MutationResult,
    }
    #[derive(Serialize)]
    struct SetFields<'a> {
      status: OrderStatus,
      updated_at: chrono::DateTime<Utc>,
      #[serde(skip_serializing_if = "Option::is_none")]
      chapa_transaction_id: Option<&'a str>,
    }

    let resolvable: Vec<&str> = OrderStatus::RESOLVABLE.iter().map(|s| s.as_str()).collect();
    let set = SetFields {
      status,
      updated_at: Utc::now(),
      chapa_transaction_id,
    };
    let data: Data = self
      .execute(
        "UpdateOrderStatus",
        UPDATE_ORDER_STATUS,
        json!({ "txRef": tx_ref, "resolvable": resolvable, "set": set }),
      )
      .await?;
    Ok(data.update_orders.affected_rows)
  }

  async fn order_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Order>, DataServiceError> {
    #[derive(Deserialize)]
    struct Data {
      orders: Vec<Order>,
    }
    let query = format!(
      "query OrderByTxRef($txRef: String!) {{ orders(where: {{chapa_tx_ref: {{_eq: $txRef}}}}, limit: 1) {{ {} }} }}",
      ORDER_FIELDS
    );
    let data: Data = self.execute("OrderByTxRef", &query, json!({ "txRef": tx_ref })).await?;
    Ok(data.orders.into_iter().next())
  }
}
