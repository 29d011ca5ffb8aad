// payflow/src/pipeline/execution.rs

//! Contains `Pipeline::run()`, which executes the pipeline's steps and handlers.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use parking_lot::Mutex;
use tracing::{event, instrument, span, Instrument, Level};

/// What a phase of a step decided.
enum PhaseOutcome {
  Continue,
  Stop,
  /// An optional step failed; skip the rest of it and move on.
  AbandonStep,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Executes the pipeline against the shared context `ctx_data`.
  ///
  /// A non-optional step without handlers yields `FlowError::HandlerMissing`,
  /// and a run outliving the configured deadline yields
  /// `FlowError::DeadlineExceeded`; both are converted into `Err`.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      pipeline_context_data_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
      deadline_ms = self.deadline.map(|d| d.as_millis() as u64),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    let current_step = Mutex::new(None::<String>);

    let Some(deadline) = self.deadline else {
      return self.run_steps(ctx_data, &current_step).await;
    };

    match tokio::time::timeout(deadline, self.run_steps(ctx_data, &current_step)).await {
      Ok(outcome) => outcome,
      Err(_elapsed) => {
        let last_step = current_step.lock().take();
        event!(Level::WARN, ?last_step, "Pipeline run exceeded its deadline.");
        Err(Err::from(FlowError::DeadlineExceeded { deadline, last_step }))
      }
    }
  }

  async fn run_steps(
    &self,
    ctx_data: ContextData<TData>,
    current_step: &Mutex<Option<String>>,
  ) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name_str = step_def.name.as_str();
      *current_step.lock() = Some(step_def.name.clone());

      let step_span = span!(
        Level::INFO,
        "pipeline_step_execution",
        step_name = step_name_str,
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          event!(parent: &step_span, Level::INFO, "Step skipped due to 'skip_if' condition.");
          continue;
        }
      }

      let on_handlers = self.on.get(step_name_str).filter(|v| !v.is_empty());
      let after_handlers = self.after.get(step_name_str).filter(|v| !v.is_empty());

      if on_handlers.is_none() && after_handlers.is_none() {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "Non-optional step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      let mut outcome = PhaseOutcome::Continue;
      for (phase, handlers) in [("on", on_handlers), ("after", after_handlers)] {
        let Some(handlers) = handlers else { continue };
        outcome = self
          .run_phase(phase, handlers, step_def, &ctx_data)
          .instrument(step_span.clone())
          .await?;
        if !matches!(outcome, PhaseOutcome::Continue) {
          break;
        }
      }

      match outcome {
        PhaseOutcome::Stop => return Ok(PipelineResult::Stopped),
        PhaseOutcome::AbandonStep | PhaseOutcome::Continue => {}
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed successfully.");
    Ok(PipelineResult::Completed)
  }

  async fn run_phase(
    &self,
    phase: &'static str,
    handlers: &[Handler<TData, Err>],
    step_def: &StepDef<TData>,
    ctx_data: &ContextData<TData>,
  ) -> Result<PhaseOutcome, Err> {
    event!(Level::TRACE, phase, "Executing handlers.");
    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      let handler_span = span!(Level::DEBUG, "handler", phase, handler_index = handler_idx);
      match handler_fn(ctx_data.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => {
          event!(Level::INFO, phase, "Pipeline stopped by a handler.");
          return Ok(PhaseOutcome::Stop);
        }
        Err(e) if step_def.optional => {
          event!(Level::WARN, phase, error = %e, "Handler of optional step failed; continuing with the next step.");
          return Ok(PhaseOutcome::AbandonStep);
        }
        Err(e) => {
          event!(Level::ERROR, phase, error = %e, "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(PhaseOutcome::Continue)
  }
}
