//! ZenHub pipeline lookups.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use lifecycle::{CollaboratorError, IssueRef, Pipeline, PipelineResolver, RepositoryId, Timestamp};
use reqwest::header;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::client::{rate_limit_reset, GithubClient, GithubError};
use crate::models::ApiRepository;

#[derive(Debug, Deserialize)]
struct ZenhubIssue {
    #[serde(default)]
    pipeline: Option<ZenhubPipeline>,
}

#[derive(Debug, Deserialize)]
struct ZenhubPipeline {
    name: String,
}

/// Connection settings for [`ZenhubClient`].
#[derive(Debug, Clone)]
pub struct ZenhubConfig {
    pub api_url: String,
    pub token: String,
    pub request_timeout: Duration,
}

impl ZenhubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.zenhub.com".to_string(),
            token: token.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`PipelineResolver`] backed by the ZenHub REST API.
///
/// ZenHub addresses repositories by their numeric GitHub id, so each
/// repository's id is fetched from GitHub once and cached.
#[derive(Debug)]
pub struct ZenhubClient {
    http: reqwest::Client,
    api_url: String,
    github: GithubClient,
    repo_ids: RwLock<HashMap<RepositoryId, u64>>,
}

impl ZenhubClient {
    pub fn new(config: ZenhubConfig, github: GithubClient) -> Result<Self, GithubError> {
        let mut headers = header::HeaderMap::new();
        let mut token = header::HeaderValue::from_str(config.token.trim())
            .map_err(|_| GithubError::Configuration("invalid ZenHub token".to_string()))?;
        token.set_sensitive(true);
        headers.insert("x-authentication-token", token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            github,
            repo_ids: RwLock::new(HashMap::new()),
        })
    }

    async fn repository_id(&self, repository: &RepositoryId) -> Result<u64, GithubError> {
        if let Some(id) = self.repo_ids.read().await.get(repository) {
            return Ok(*id);
        }
        let repo: ApiRepository = self
            .github
            .get_json(
                "get repository",
                &format!("/repos/{}/{}", repository.org(), repository.name()),
            )
            .await?;
        self.repo_ids
            .write()
            .await
            .insert(repository.clone(), repo.id);
        Ok(repo.id)
    }

    async fn fetch_pipeline(&self, issue: &IssueRef) -> Result<Option<Pipeline>, GithubError> {
        let repo_id = self.repository_id(&issue.repository).await?;
        let url = format!(
            "{}/p1/repositories/{}/issues/{}",
            self.api_url, repo_id, issue.number
        );
        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Some(reset) = rate_limit_reset(status, response.headers(), Timestamp::now()) {
            return Err(GithubError::RateLimited { reset });
        }
        if !status.is_success() {
            return Err(GithubError::Api {
                status: status.as_u16(),
                message: format!("get ZenHub issue: {}", response.text().await.unwrap_or_default()),
            });
        }

        let body: ZenhubIssue = response.json().await?;
        Ok(body.pipeline.and_then(|p| Pipeline::new(p.name)))
    }
}

#[async_trait]
impl PipelineResolver for ZenhubClient {
    async fn classification(
        &self,
        issue: &IssueRef,
    ) -> Result<Option<Pipeline>, CollaboratorError> {
        let pipeline = self.fetch_pipeline(issue).await?;
        debug!(%issue, pipeline = ?pipeline, "Resolved pipeline");
        Ok(pipeline)
    }
}

/// Resolver used when no ZenHub token is configured: no issue has a pipeline.
#[derive(Debug, Default)]
pub struct NoPipelines;

impl NoPipelines {
    pub fn new() -> Self {
        warn!("No ZenHub token configured; every issue is treated as having no pipeline");
        Self
    }
}

#[async_trait]
impl PipelineResolver for NoPipelines {
    async fn classification(
        &self,
        _issue: &IssueRef,
    ) -> Result<Option<Pipeline>, CollaboratorError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_pipeline_names_mean_no_pipeline() {
        let body: ZenhubIssue =
            serde_json::from_str(r#"{"pipeline": {"name": "  "}, "estimate": null}"#).unwrap();
        assert_eq!(body.pipeline.and_then(|p| Pipeline::new(p.name)), None);

        let body: ZenhubIssue = serde_json::from_str(r#"{"is_epic": false}"#).unwrap();
        assert!(body.pipeline.is_none());
    }

    #[tokio::test]
    async fn no_pipelines_resolver_never_classifies() {
        let issue: IssueRef = "istio/istio#1".parse().unwrap();
        assert_eq!(NoPipelines.classification(&issue).await.unwrap(), None);
    }
}
