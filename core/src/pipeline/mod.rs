// core/src/pipeline/mod.rs

//! A named-step pipeline with before/on/after hooks, used to sequence multi-step checkout work.

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::Pipeline;
