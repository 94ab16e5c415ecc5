//! Tests for the cron refresh trigger

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{example_records, refresh_service, FakeClinicalServer, StaticSource};
use mfrs_sync::services::schedule_refresh;

#[tokio::test]
async fn test_invalid_cron_is_rejected() {
    let service = Arc::new(refresh_service(
        Arc::new(StaticSource::new(Vec::new())),
        Arc::new(FakeClinicalServer::new()),
    ));

    assert!(schedule_refresh("not a cron expression", service).await.is_err());
}

#[tokio::test]
async fn test_scheduled_job_runs_refresh() {
    let source = Arc::new(StaticSource::new(example_records()));
    let server = Arc::new(
        FakeClinicalServer::new()
            .with_patient("1", "p-one")
            .with_patient("a", "p-a"),
    );
    let service = Arc::new(refresh_service(source.clone(), server.clone()));

    // Every second
    let mut sched = schedule_refresh("* * * * * *", service).await.unwrap();
    sched.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while source.fetches() == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    sched.shutdown().await.unwrap();

    assert!(source.fetches() >= 1);
}
