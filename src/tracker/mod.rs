//! Issue-tracker REST client (GitHub-compatible API).
//!
//! Token-per-call: credentials belong to the owner record, not the client, so
//! one client instance serves every owner. The base URL is configurable for
//! enterprise installs and tests.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracker returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// A successfully created issue.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedIssue {
    pub number: i64,
    pub html_url: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    name: String,
}

#[derive(Clone)]
pub struct TrackerClient {
    http: reqwest::Client,
    api_base: String,
}

impl std::fmt::Debug for TrackerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TrackerClient {
    pub fn new(api_base: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scribed/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Create an issue in `repo` (`owner/name` form).
    pub async fn create_issue(
        &self,
        token: &str,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<CreatedIssue, TrackerError> {
        let url = format!("{}/repos/{}/issues", self.api_base, repo);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .json(&CreateIssueRequest {
                title,
                body,
                labels,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackerError::Api { status, body });
        }

        let issue: CreatedIssue = resp.json().await?;
        info!(repo, number = issue.number, "issue created");
        Ok(issue)
    }

    /// Names of the labels available in `repo`.
    pub async fn list_labels(&self, token: &str, repo: &str) -> Result<Vec<String>, TrackerError> {
        let url = format!("{}/repos/{}/labels?per_page=100", self.api_base, repo);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackerError::Api { status, body });
        }

        let rows: Vec<LabelRow> = resp.json().await?;
        Ok(rows.into_iter().map(|l| l.name).collect())
    }
}
