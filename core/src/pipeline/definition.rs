// core/src/pipeline/definition.rs

use crate::core::step::{SkipCondition, StepDef};
use crate::core::Handler;
use crate::error::PipelineError;
use std::collections::HashMap;

/// An ordered list of named steps over shared data `TData`, whose handlers fail with `Err`.
///
/// `Err` must absorb [`PipelineError`] so configuration problems (an unknown step name, a
/// mandatory step nobody handles) surface through the same channel as handler failures.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
  /// Hooks registered against names that are not steps. Reported on `run`.
  pub(crate) unknown_steps: Vec<String>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
      unknown_steps: Vec::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub(crate) fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  pub(crate) fn check_step(&mut self, step_name: &str) -> bool {
    if self.has_step(step_name) {
      return true;
    }
    tracing::error!(%step_name, "Hook registered for a step that does not exist.");
    self.unknown_steps.push(step_name.to_string());
    false
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<TData>>) {
    if let Some(step) = self.steps.iter_mut().find(|s| s.name == step_name) {
      step.skip_if = skip_if;
    } else {
      self.unknown_steps.push(step_name.to_string());
    }
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) {
    if let Some(step) = self.steps.iter_mut().find(|s| s.name == step_name) {
      step.optional = optional;
    } else {
      self.unknown_steps.push(step_name.to_string());
    }
  }
}
