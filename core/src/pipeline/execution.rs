// core/src/pipeline/execution.rs

use crate::core::{ContextData, Handler, PipelineControl, PipelineResult};
use crate::error::PipelineError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, Level};

enum PhaseOutcome<Err> {
  Continue,
  Stopped,
  Failed(Err),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// A step is skipped when its `skip_if` holds, or when it is optional and has no handlers.
  /// The first handler to return `Stop` ends the run with [`PipelineResult::Stopped`]; the first
  /// error ends it with that error.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(context_type = %std::any::type_name::<TData>(), num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    if let Some(step_name) = self.unknown_steps.first() {
      return Err(Err::from(PipelineError::StepNotFound {
        step_name: step_name.clone(),
      }));
    }

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if step_def.should_skip(&ctx_data) {
        event!(Level::INFO, step_name, step_idx, "Step skipped by condition.");
        continue;
      }

      let phases = [
        ("before", self.before.get(step_name)),
        ("on", self.on.get(step_name)),
        ("after", self.after.get(step_name)),
      ];
      if phases.iter().all(|(_, h)| h.map_or(true, |v| v.is_empty())) {
        if step_def.optional {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step_name, "Non-optional step has no handlers.");
        return Err(Err::from(PipelineError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      event!(Level::DEBUG, step_name, step_idx, "Running step.");
      for (phase_name, handlers) in phases {
        let Some(handlers) = handlers else { continue };
        match run_phase(handlers, &ctx_data).await {
          PhaseOutcome::Continue => {}
          PhaseOutcome::Stopped => {
            event!(Level::INFO, step_name, phase = phase_name, "Pipeline stopped by handler.");
            return Ok(PipelineResult::Stopped);
          }
          PhaseOutcome::Failed(e) => {
            event!(Level::ERROR, step_name, phase = phase_name, error = %e, "Handler failed.");
            return Err(e);
          }
        }
      }
    }

    event!(Level::DEBUG, "Pipeline completed.");
    Ok(PipelineResult::Completed)
  }
}

async fn run_phase<TData, Err>(handlers: &[Handler<TData, Err>], ctx_data: &ContextData<TData>) -> PhaseOutcome<Err>
where
  TData: 'static + Send + Sync,
{
  for handler in handlers {
    match handler(ctx_data.clone()).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => return PhaseOutcome::Stopped,
      Err(e) => return PhaseOutcome::Failed(e),
    }
  }
  PhaseOutcome::Continue
}
