//! `QueryService` backed by Amazon Athena.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_athena::config::Region;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration, Row};
use aws_sdk_athena::Client;
use tracing::{debug, info};

use issue_bucket_core::config::ConnectorConfig;
use issue_bucket_core::contract::{QueryRequest, QueryResults, QueryService, ServiceState};
use issue_bucket_core::error::QueryError;

#[derive(Debug, Clone)]
pub struct AthenaService {
    client: Client,
}

impl AthenaService {
    pub async fn new(config: &ConnectorConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.query_region.clone()))
            .load()
            .await;
        info!(region = %config.query_region, "Initialized Athena client");
        Self {
            client: Client::new(&shared),
        }
    }
}

fn service_failure<E: std::error::Error>(operation: &str, err: E) -> QueryError {
    QueryError::Service(format!("{operation}: {}", DisplayErrorContext(err)))
}

fn service_state(state: &QueryExecutionState, reason: Option<&str>) -> ServiceState {
    match state {
        QueryExecutionState::Queued => ServiceState::Queued,
        QueryExecutionState::Running => ServiceState::Running,
        QueryExecutionState::Succeeded => ServiceState::Succeeded,
        QueryExecutionState::Cancelled => ServiceState::Cancelled,
        QueryExecutionState::Failed => {
            ServiceState::Failed(reason.unwrap_or("no reason given").to_string())
        }
        other => ServiceState::Failed(format!("unrecognised state {}", other.as_str())),
    }
}

fn row_values(row: &Row) -> Vec<Option<String>> {
    row.data()
        .iter()
        .map(|datum| datum.var_char_value().map(str::to_string))
        .collect()
}

#[async_trait]
impl QueryService for AthenaService {
    async fn start_query(&self, request: QueryRequest) -> Result<String, QueryError> {
        let response = self
            .client
            .start_query_execution()
            .query_string(request.script)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(request.database)
                    .build(),
            )
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(request.output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(|err| service_failure("start_query_execution", err))?;
        response
            .query_execution_id()
            .map(str::to_string)
            .ok_or(QueryError::MissingField("QueryExecutionId"))
    }

    async fn query_status(&self, execution_id: &str) -> Result<ServiceState, QueryError> {
        let response = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|err| service_failure("get_query_execution", err))?;
        let status = response
            .query_execution()
            .and_then(|execution| execution.status())
            .ok_or(QueryError::MissingField("QueryExecution.Status"))?;
        let state = status
            .state()
            .ok_or(QueryError::MissingField("QueryExecution.Status.State"))?;
        debug!(execution_id, state = state.as_str(), "Polled query status");
        Ok(service_state(state, status.state_change_reason()))
    }

    async fn query_results(&self, execution_id: &str) -> Result<QueryResults, QueryError> {
        let response = self
            .client
            .get_query_results()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|err| service_failure("get_query_results", err))?;
        let Some(result_set) = response.result_set() else {
            return Ok(QueryResults::default());
        };
        let columns = result_set
            .result_set_metadata()
            .map(|metadata| {
                metadata
                    .column_info()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = result_set.rows().iter().map(row_values).collect();
        Ok(QueryResults { columns, rows })
    }
}
