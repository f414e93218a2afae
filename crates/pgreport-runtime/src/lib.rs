//! pgreport Runtime - external tools and the two-stage report pipeline

pub mod filter;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod pgbadger;
pub mod pipeline;
pub mod process;
pub mod traits;

pub use filter::PsqlOutputFilter;
pub use pgbadger::PgBadgerTools;
pub use pipeline::{spawn_pipeline, PipelineExit, RunningPipeline};
pub use process::ProcessGroups;
pub use traits::ReportTools;
