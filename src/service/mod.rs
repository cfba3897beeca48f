//! Service layer: orchestrates store queries under permission
//! constraints, owns transaction boundaries, and appends audit events.

pub mod pipelines;
pub mod tasks;

pub use pipelines::PipelineService;
pub use tasks::TaskService;
