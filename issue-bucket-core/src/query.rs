//! Query runner: submit a script to a [`QueryService`] and optionally wait for
//! it to finish.
//!
//! Waiting is a small state machine driven by status polls:
//!
//! ```text
//! Submitted -> Running -> Succeeded | Failed
//!      \           \
//!       `-----------`---> TimedOut (deadline elapsed before a terminal state)
//! ```
//!
//! The runner sleeps `poll_interval` between polls and gives up once
//! `deadline` has elapsed since submission.

use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ConnectorConfig;
use crate::contract::{QueryRequest, QueryResults, QueryService, ServiceState};
use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Submitted,
    Running,
    Succeeded,
    Failed(String),
    TimedOut,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryState::Succeeded | QueryState::Failed(_) | QueryState::TimedOut
        )
    }
}

impl From<ServiceState> for QueryState {
    fn from(reported: ServiceState) -> Self {
        match reported {
            ServiceState::Queued => QueryState::Submitted,
            ServiceState::Running => QueryState::Running,
            ServiceState::Succeeded => QueryState::Succeeded,
            ServiceState::Failed(reason) => QueryState::Failed(reason),
            ServiceState::Cancelled => QueryState::Failed("cancelled".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub execution_id: String,
    pub state: QueryState,
    /// Only present when the query succeeded.
    pub results: Option<QueryResults>,
}

#[derive(Debug)]
pub struct QueryRunner<Q> {
    service: Q,
    poll_interval: Duration,
    deadline: Duration,
}

impl<Q: QueryService> QueryRunner<Q> {
    pub fn new(service: Q, poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            service,
            poll_interval,
            deadline,
        }
    }

    pub fn from_config(service: Q, config: &ConnectorConfig) -> Self {
        Self::new(service, config.query_poll_interval(), config.query_timeout())
    }

    /// Read a script from disk and run it, see [`QueryRunner::run_query`].
    pub async fn run_script(
        &self,
        script_path: &Path,
        database: &str,
        output_location: &str,
        wait_for_done: bool,
    ) -> Result<QueryOutcome, QueryError> {
        let script = tokio::fs::read_to_string(script_path)
            .await
            .map_err(|source| QueryError::Script {
                path: script_path.to_path_buf(),
                source,
            })?;
        let request = QueryRequest {
            script,
            database: database.to_string(),
            output_location: output_location.to_string(),
        };
        self.run_query(request, wait_for_done).await
    }

    pub async fn run_query(
        &self,
        request: QueryRequest,
        wait_for_done: bool,
    ) -> Result<QueryOutcome, QueryError> {
        let database = request.database.clone();
        let execution_id = self.service.start_query(request).await?;
        info!(execution_id = %execution_id, database = %database, "Query submitted");

        if !wait_for_done {
            return Ok(QueryOutcome {
                execution_id,
                state: QueryState::Submitted,
                results: None,
            });
        }

        let state = self.wait(&execution_id).await?;
        let results = match state {
            QueryState::Succeeded => Some(self.service.query_results(&execution_id).await?),
            _ => None,
        };
        Ok(QueryOutcome {
            execution_id,
            state,
            results,
        })
    }

    async fn wait(&self, execution_id: &str) -> Result<QueryState, QueryError> {
        let started = Instant::now();
        let mut state = QueryState::Submitted;
        loop {
            let reported = self.service.query_status(execution_id).await?;
            let next = QueryState::from(reported);
            if next != state {
                debug!(execution_id, from = ?state, to = ?next, "Query state changed");
                state = next;
            }
            if state.is_terminal() {
                break;
            }
            if started.elapsed() >= self.deadline {
                warn!(execution_id, deadline = ?self.deadline, "Query did not finish before the deadline");
                state = QueryState::TimedOut;
                break;
            }
            sleep(self.poll_interval).await;
        }

        match &state {
            QueryState::Failed(reason) => error!(execution_id, reason = %reason, "Query failed"),
            QueryState::Succeeded => info!(execution_id, elapsed = ?started.elapsed(), "Query succeeded"),
            _ => {}
        }
        Ok(state)
    }
}
