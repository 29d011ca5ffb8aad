// server/src/lib.rs

//! Hasura Actions backend reconciling food orders with Chapa payments.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod web;
