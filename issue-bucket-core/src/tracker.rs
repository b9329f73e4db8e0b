//! Jira REST connector implementing [`IssueTracker`].
//!
//! Searches use `/rest/api/2/search` with all fields and are paginated with
//! `startAt` until the reported total is reached. Board and sprint lookups use
//! the agile API and return its first page.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::TrackerConfig;
use crate::contract::{Board, Issue, IssueTracker, Sprint};
use crate::error::TrackerError;

/// Issues requested per search page.
pub const SEARCH_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    start_at: u32,
    #[serde(default)]
    total: u32,
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct ValuesPage<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    config: TrackerConfig,
}

impl JiraClient {
    pub fn new(config: TrackerConfig) -> Self {
        info!(endpoint = %config.endpoint, username = %config.username, "Initialized Jira client");
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn url(&self, path: &str) -> Result<reqwest::Url, TrackerError> {
        let base = self.config.endpoint.trim_end_matches('/');
        reqwest::Url::parse(&format!("{base}{path}")).map_err(|e| TrackerError::Url(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TrackerError> {
        let url = self.url(path)?;
        debug!(url = %url, ?query, "Tracker request");
        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = status.as_u16(), "Tracker returned an error status");
            return Err(TrackerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn search_issues(
        &self,
        jql: &str,
        expand: Option<String>,
    ) -> Result<Vec<Issue>, TrackerError> {
        info!(jql, "Searching issues");
        let mut issues: Vec<Issue> = Vec::new();
        let mut start_at: u32 = 0;
        loop {
            let mut query = vec![
                ("jql", jql.to_string()),
                ("fields", "*all".to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", SEARCH_PAGE_SIZE.to_string()),
            ];
            if let Some(expand) = &expand {
                query.push(("expand", expand.clone()));
            }
            let page: SearchPage = self.get_json("/rest/api/2/search", &query).await?;
            let received = page.issues.len() as u32;
            debug!(start_at = page.start_at, received, total = page.total, "Received search page");
            issues.extend(page.issues);

            start_at = page.start_at + received;
            if received == 0 || start_at >= page.total {
                break;
            }
        }
        info!(jql, count = issues.len(), "Issue search complete");
        Ok(issues)
    }

    async fn agile_boards(&self, name: Option<String>) -> Result<Vec<Board>, TrackerError> {
        let query: Vec<(&str, String)> = name.into_iter().map(|n| ("name", n)).collect();
        let page: ValuesPage<Board> = self.get_json("/rest/agile/1.0/board", &query).await?;
        info!(count = page.values.len(), "Fetched agile boards");
        Ok(page.values)
    }

    async fn sprints(&self, board_id: u64) -> Result<Vec<Sprint>, TrackerError> {
        let path = format!("/rest/agile/1.0/board/{board_id}/sprint");
        let page: ValuesPage<Sprint> = self.get_json(&path, &[]).await?;
        info!(board_id, count = page.values.len(), "Fetched sprints");
        Ok(page.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> JiraClient {
        JiraClient::new(TrackerConfig {
            endpoint: endpoint.to_string(),
            username: "admin".into(),
            password: "admin".into(),
        })
    }

    #[test]
    fn builds_urls_without_double_slashes() {
        let jira = client("http://localhost:8080/");
        assert_eq!(
            jira.url("/rest/api/2/search").unwrap().as_str(),
            "http://localhost:8080/rest/api/2/search"
        );
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let jira = client("not a url");
        assert!(matches!(jira.url("/rest/api/2/search"), Err(TrackerError::Url(_))));
    }

    #[test]
    fn parses_search_page() {
        let body = r#"{
            "startAt": 0, "maxResults": 50, "total": 1,
            "issues": [{
                "id": "10001", "key": "TEST-1",
                "self": "http://localhost:8080/rest/api/2/issue/10001",
                "fields": {
                    "summary": "Broken export",
                    "description": null,
                    "status": {"name": "Open", "id": "1"},
                    "priority": {"name": "High"}
                }
            }]
        }"#;
        let page: SearchPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.total, 1);
        let issue = &page.issues[0];
        assert_eq!(issue.key, "TEST-1");
        assert_eq!(issue.url, "http://localhost:8080/rest/api/2/issue/10001");
        assert_eq!(issue.fields.description, None);
        assert_eq!(issue.fields.status.as_ref().unwrap().name, "Open");
    }

    #[test]
    fn parses_board_values() {
        let body = r#"{"maxResults": 50, "isLast": true, "values": [
            {"id": 7, "name": "Testing board", "type": "scrum"}
        ]}"#;
        let page: ValuesPage<Board> = serde_json::from_str(body).unwrap();
        assert_eq!(page.values[0].id, 7);
        assert_eq!(page.values[0].kind.as_deref(), Some("scrum"));
    }
}
