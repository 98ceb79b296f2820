pub mod coordinator;
pub mod job;

pub use coordinator::{JobCoordinator, ReadinessProbe};
pub use job::{ExportOptions, JobPhase, JobRejected, JobSnapshot};
