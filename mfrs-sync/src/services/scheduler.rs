//! Cron-driven refresh trigger

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use super::refresh::RefreshService;
use crate::models::log_result_summary;

/// Register a refresh job on the given cron expression (seconds field first)
///
/// The returned scheduler is not started; call `start()` on it. An invalid
/// cron expression fails here.
pub async fn schedule_refresh(
    cron: &str,
    refresh: Arc<RefreshService>,
) -> Result<JobScheduler, JobSchedulerError> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let refresh = Arc::clone(&refresh);
        Box::pin(async move {
            info!("Scheduled refresh triggered");
            match refresh.refresh().await {
                Ok(results) => {
                    log_result_summary(&results);
                }
                Err(e) => error!("Scheduled refresh failed: {}", e),
            }
        })
    })?;
    sched.add(job).await?;

    info!(cron, "Scheduled risk assessment refresh");
    Ok(sched)
}
