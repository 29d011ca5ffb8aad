// payflow/src/core/context.rs

//! Defines the `Handler<TData, Err>` type for pipeline step handlers.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// A pipeline step handler.
///
/// A handler is an asynchronous function that receives a clone of the run's
/// `ContextData<TData>` and resolves to `Result<PipelineControl, Err>`.
///
/// Handlers must drop any lock guard obtained from the context BEFORE the
/// first `.await` point; guards are blocking `parking_lot` guards.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
