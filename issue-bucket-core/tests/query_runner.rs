use std::io::Write;
use std::time::Duration;

use issue_bucket_core::contract::{MockQueryService, QueryRequest, QueryResults, ServiceState};
use issue_bucket_core::error::QueryError;
use issue_bucket_core::query::{QueryRunner, QueryState};
use mockall::Sequence;
use tempfile::NamedTempFile;

const EXECUTION_ID: &str = "exec-42";

fn request() -> QueryRequest {
    QueryRequest {
        script: "SELECT count(*) FROM issues".into(),
        database: "analytics".into(),
        output_location: "s3://query-results/".into(),
    }
}

fn runner(service: MockQueryService) -> QueryRunner<MockQueryService> {
    QueryRunner::new(service, Duration::from_millis(500), Duration::from_secs(2))
}

fn expect_start(service: &mut MockQueryService) {
    service
        .expect_start_query()
        .times(1)
        .returning(|_| Ok(EXECUTION_ID.to_string()));
}

fn expect_statuses(service: &mut MockQueryService, statuses: Vec<ServiceState>) {
    let mut seq = Sequence::new();
    for status in statuses {
        service
            .expect_query_status()
            .withf(|id: &str| id == EXECUTION_ID)
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(status.clone()));
    }
}

#[tokio::test(start_paused = true)]
async fn succeeded_query_returns_results() {
    let mut service = MockQueryService::new();
    expect_start(&mut service);
    expect_statuses(
        &mut service,
        vec![ServiceState::Queued, ServiceState::Running, ServiceState::Succeeded],
    );
    service.expect_query_results().times(1).returning(|_| {
        Ok(QueryResults {
            columns: vec!["count".into()],
            rows: vec![vec![Some("12".into())]],
        })
    });

    let outcome = runner(service).run_query(request(), true).await.unwrap();

    assert_eq!(outcome.execution_id, EXECUTION_ID);
    assert_eq!(outcome.state, QueryState::Succeeded);
    assert_eq!(outcome.results.unwrap().rows, vec![vec![Some("12".to_string())]]);
}

#[tokio::test(start_paused = true)]
async fn failed_query_carries_the_reason_and_no_results() {
    let mut service = MockQueryService::new();
    expect_start(&mut service);
    expect_statuses(
        &mut service,
        vec![
            ServiceState::Running,
            ServiceState::Failed("SYNTAX_ERROR: line 1:8".into()),
        ],
    );

    let outcome = runner(service).run_query(request(), true).await.unwrap();

    assert_eq!(outcome.state, QueryState::Failed("SYNTAX_ERROR: line 1:8".into()));
    assert!(outcome.results.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancelled_query_is_reported_as_failed() {
    let mut service = MockQueryService::new();
    expect_start(&mut service);
    expect_statuses(&mut service, vec![ServiceState::Cancelled]);

    let outcome = runner(service).run_query(request(), true).await.unwrap();

    assert_eq!(outcome.state, QueryState::Failed("cancelled".into()));
}

#[tokio::test(start_paused = true)]
async fn query_still_running_at_the_deadline_times_out() {
    let mut service = MockQueryService::new();
    expect_start(&mut service);
    service
        .expect_query_status()
        .returning(|_| Ok(ServiceState::Running));

    let outcome = runner(service).run_query(request(), true).await.unwrap();

    assert_eq!(outcome.state, QueryState::TimedOut);
    assert!(outcome.results.is_none());
}

#[tokio::test]
async fn without_waiting_only_submits() {
    let mut service = MockQueryService::new();
    service
        .expect_start_query()
        .withf(|request: &QueryRequest| request.database == "analytics")
        .times(1)
        .returning(|_| Ok(EXECUTION_ID.to_string()));

    let outcome = runner(service).run_query(request(), false).await.unwrap();

    assert_eq!(outcome.state, QueryState::Submitted);
    assert!(outcome.results.is_none());
}

#[tokio::test]
async fn status_failure_is_an_error() {
    let mut service = MockQueryService::new();
    expect_start(&mut service);
    service
        .expect_query_status()
        .returning(|_| Err(QueryError::Service("throttled".into())));

    let err = runner(service).run_query(request(), true).await.unwrap_err();

    assert!(matches!(err, QueryError::Service(_)));
}

#[tokio::test]
async fn script_is_read_from_disk() {
    let mut script = NamedTempFile::new().unwrap();
    write!(script, "SELECT key FROM issues").unwrap();
    let mut service = MockQueryService::new();
    service
        .expect_start_query()
        .withf(|request: &QueryRequest| {
            request.script == "SELECT key FROM issues" && request.output_location == "s3://out/"
        })
        .times(1)
        .returning(|_| Ok(EXECUTION_ID.to_string()));

    let outcome = runner(service)
        .run_script(script.path(), "analytics", "s3://out/", false)
        .await
        .unwrap();

    assert_eq!(outcome.execution_id, EXECUTION_ID);
}

#[tokio::test]
async fn missing_script_is_reported_with_its_path() {
    let runner = runner(MockQueryService::new());

    let err = runner
        .run_script("does/not/exist.sql".as_ref(), "analytics", "s3://out/", false)
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::Script { ref path, .. } if path.ends_with("exist.sql")));
}

#[test]
fn terminal_states() {
    assert!(!QueryState::Submitted.is_terminal());
    assert!(!QueryState::Running.is_terminal());
    assert!(QueryState::Succeeded.is_terminal());
    assert!(QueryState::Failed("x".into()).is_terminal());
    assert!(QueryState::TimedOut.is_terminal());
}
