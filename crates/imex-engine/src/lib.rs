//! # imex-engine
//!
//! Drives identifier assignment over a curation store:
//!
//! ```text
//! CurationStore ──► Coordinator ──► Notifier ──► TabularReport / ReportDirectory
//!                      │    ▲                    EventLog / EventCollector
//!                      ▼    │
//!               RangeAllocator ──► KeyAssigner (registry)
//! ```
//!
//! Remote calls are retried per `RetryPolicy`; everything else that goes
//! wrong with one publication becomes an `Error` event for that publication
//! and the pass continues.

pub mod cancellation;
pub mod coordinator;
pub mod notifier;
pub mod report;
pub mod retry;
pub mod summary;

pub use cancellation::Cancellation;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError};
pub use notifier::{Notifier, Subscriber, SubscriberError};
pub use report::{
    ALL_REPORT_FILE, EventCollector, EventLog, REPORT_COLUMNS, ReportDirectory, TabularReport,
    render_header, render_row, report_file_name,
};
pub use retry::{RetryFailure, RetryPolicy, RetryPolicyError, Sleeper, ThreadSleeper, retry};
pub use summary::{EXIT_CANCELLED, EXIT_ERRORS, EXIT_OK, RunSummary};
