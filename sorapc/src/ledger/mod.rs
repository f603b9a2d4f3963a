//! Durable tracking of remote jobs.
//!
//! [`JobLedger`] owns the job records; [`RecoveryScanner`] reads back the
//! unfinished ones after a restart.

mod job_ledger;
mod recovery;

pub use job_ledger::{JobLedger, JobStatus, JobSummary};
pub use recovery::RecoveryScanner;
