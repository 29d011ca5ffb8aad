// server/src/services/mod.rs

//! Collaborators of the payment workflow and the small pure helpers it uses.

pub mod chapa;
pub mod data_service;
pub mod hasura;
pub mod pricing;
pub mod redirect;
pub mod tx_ref;

pub use chapa::{ChapaClient, GatewayError, InitiatePaymentRequest, PaymentGateway, VerifiedTransaction};
pub use data_service::{DataService, DataServiceError};
pub use hasura::HasuraClient;
