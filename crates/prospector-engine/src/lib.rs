//! Outreach orchestration engine.
//!
//! Everything that decides when and how outreach happens lives here: the
//! sequential dispatcher, daily-quota admission, failure classification,
//! and the follow-up jobs the scheduler drives on its intervals.

pub mod classifier;
pub mod dispatcher;
pub mod runs;

pub use classifier::{classify, failure_reason, FailureCategory};
pub use dispatcher::{DispatchTicket, Engine, FollowupReport};
pub use runs::{RunInfo, RunKind, RunRegistry, RunReport, RunStatus};
