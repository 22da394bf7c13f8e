// core/src/core/mod.rs

pub mod context_data;
pub mod control;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use step::{SkipCondition, StepDef};

use std::future::Future;
use std::pin::Pin;

/// A step handler: receives a clone of the shared context and resolves to a flow signal.
///
/// Lock guards taken on the context must be dropped before the handler awaits anything.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
