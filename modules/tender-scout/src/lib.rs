pub mod coordinator;
pub mod dedup;
pub mod run_log;
pub mod scheduler;
pub mod service;
pub mod sink;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use coordinator::{AdapterStatus, RunCoordinator, RunPhase};
pub use dedup::{dedup, DedupKey};
pub use scheduler::{to_cron_expression, ScheduleError, TenderScheduler};
pub use service::{CrawlService, ServiceStatus};
pub use sink::{JsonlSink, MemorySink, ResultSink};
