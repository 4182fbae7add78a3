//! Batch construction, execution, resolution, and orchestration

pub mod builder;
pub mod descriptor;
pub mod executor;
pub mod reference;
pub mod resolver;
pub mod workflow;
