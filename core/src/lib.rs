// src/lib.rs

//! Payflow: a small async, type-safe step pipeline engine.
//!
//! A pipeline is an ordered list of named steps run against a shared,
//! lockable context. It provides:
//!  - Named steps with `on` and `after` hooks.
//!  - Asynchronous handlers for I/O-bound operations.
//!  - Early stopping of pipeline execution.
//!  - Optional steps, whose handler failures are logged and stepped over.
//!  - Per-step skip conditions evaluated against the context.
//!  - An optional run deadline bounding the whole pipeline.
//!  - A type-keyed registry for managing and running different pipelines.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

// --- Re-exports for the Public API ---

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::Payflow;
