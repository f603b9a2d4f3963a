use std::sync::Arc;

use tracing::{info, warn};

use crate::database::models::IncompleteTask;
use crate::database::repositories::TaskRepository;

/// Lists jobs that still need polling after a restart.
pub struct RecoveryScanner {
    tasks: Arc<dyn TaskRepository>,
}

impl RecoveryScanner {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Jobs with progress below 100 or unset, oldest first.
    ///
    /// Storage errors degrade to an empty list.
    pub async fn list_incomplete(&self) -> Vec<IncompleteTask> {
        match self.tasks.list_incomplete().await {
            Ok(tasks) => {
                info!(count = tasks.len(), "Incomplete jobs found");
                tasks
            }
            Err(error) => {
                warn!(error = %error, "Recovery scan failed; returning no jobs");
                Vec::new()
            }
        }
    }
}
