pub mod error;
pub mod retry;
pub mod types;

pub use error::{GithubError, Result};
pub use retry::{with_retries, Backoff};
pub use types::{RepoMetadata, StarEdge, StarredPage};

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::{
    GraphQlResponse, LoginViewer, ReposViewer, RestRepo, StarredViewer, ViewerData,
};

const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const REST_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "starfeed";

const LOGIN_QUERY: &str = "query { viewer { login } }";

const STARRED_QUERY: &str = "\
query($first: Int!, $after: String) { viewer { \
starredRepositories(first: $first, after: $after, orderBy: { field: STARRED_AT, direction: DESC }) { \
nodes { nameWithOwner } \
edges { starredAt } \
pageInfo { endCursor hasNextPage } } } }";

const OWNED_REPOS_QUERY: &str = "\
query($after: String) { viewer { \
repositories(first: 20, after: $after, ownerAffiliations: OWNER) { \
nodes { primaryLanguage { name } repositoryTopics(first: 20) { nodes { topic { name } } } } \
pageInfo { endCursor hasNextPage } } } }";

/// Credential-scoped client for the source graph API. Transient failures
/// (rate limits, network) are retried internally with backoff; terminal
/// classifications surface to the caller.
pub struct GithubClient {
    client: reqwest::Client,
    token: String,
    backoff: Backoff,
}

impl GithubClient {
    pub fn new(token: &str) -> Self {
        Self::with_backoff(token, Backoff::default())
    }

    pub fn with_backoff(token: &str, backoff: Backoff) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            token: token.to_string(),
            backoff,
        }
    }

    /// Canonical lowercase login for this credential.
    pub async fn viewer_login(&self) -> Result<String> {
        let data: ViewerData<LoginViewer> =
            self.graphql(LOGIN_QUERY, serde_json::Value::Null).await?;
        Ok(data.viewer.login.to_lowercase())
    }

    /// One page of the viewer's starred repositories, newest-first.
    /// An empty cursor requests the first page.
    pub async fn starred_page(&self, cursor: &str, page_size: u32) -> Result<StarredPage> {
        let after = if cursor.is_empty() {
            serde_json::Value::Null
        } else {
            cursor.into()
        };
        let variables = serde_json::json!({ "first": page_size, "after": after });
        let data: ViewerData<StarredViewer> = self.graphql(STARRED_QUERY, variables).await?;
        Ok(data.viewer.starred_repositories.into_page())
    }

    /// Topics and main languages across the viewer's own repositories,
    /// for cold-start seeding.
    pub async fn viewer_labels(&self) -> Result<Vec<String>> {
        let mut labels = BTreeSet::new();
        let mut cursor = String::new();
        loop {
            let after = if cursor.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::from(cursor.as_str())
            };
            let variables = serde_json::json!({ "after": after });
            let data: ViewerData<ReposViewer> = self.graphql(OWNED_REPOS_QUERY, variables).await?;
            let connection = data.viewer.repositories;
            for node in connection.nodes {
                if let Some(language) = node.primary_language {
                    labels.insert(language.name.to_lowercase());
                }
                for topic in node.repository_topics.nodes {
                    labels.insert(topic.topic.name.to_lowercase());
                }
            }
            if !connection.page_info.has_next_page {
                break;
            }
            cursor = connection.page_info.end_cursor.unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }
        Ok(labels.into_iter().collect())
    }

    /// Repository metadata for enrichment. `full_name` is `owner/name`;
    /// the returned metadata carries the canonical name the server
    /// reports, which differs when the repository was renamed.
    pub async fn repo(&self, full_name: &str) -> Result<RepoMetadata> {
        let repo: RestRepo = self
            .rest_get(&format!("{REST_BASE_URL}/repos/{full_name}"))
            .await?;
        let languages: HashMap<String, u64> = self
            .rest_get(&format!("{REST_BASE_URL}/repos/{full_name}/languages"))
            .await?;
        debug!(
            repo = repo.full_name.as_str(),
            stars = repo.stargazers_count,
            "fetched repository metadata"
        );
        Ok(RepoMetadata {
            full_name: repo.full_name,
            stargazers: repo.stargazers_count,
            topics: repo.topics,
            languages,
            description: repo.description,
            updated_at: repo.updated_at,
        })
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        with_retries(self.backoff, || {
            let body = serde_json::json!({ "query": query, "variables": &variables });
            async move {
                let resp = self
                    .client
                    .post(GRAPHQL_URL)
                    .bearer_auth(&self.token)
                    .header("User-Agent", USER_AGENT)
                    .json(&body)
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    return Err(error_from_response(resp).await);
                }
                let envelope: GraphQlResponse<T> = resp
                    .json()
                    .await
                    .map_err(|e| GithubError::Parse(e.to_string()))?;
                if !envelope.errors.is_empty() {
                    let messages: Vec<String> =
                        envelope.errors.into_iter().map(|e| e.message).collect();
                    return Err(GithubError::Parse(messages.join("; ")));
                }
                envelope
                    .data
                    .ok_or_else(|| GithubError::Parse("missing data in response".into()))
            }
        })
        .await
    }

    async fn rest_get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        with_retries(self.backoff, || async move {
            let resp = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "application/vnd.github+json")
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(error_from_response(resp).await);
            }
            resp.json()
                .await
                .map_err(|e| GithubError::Parse(e.to_string()))
        })
        .await
    }
}

/// Classify a non-2xx response, consuming the body as the error message.
async fn error_from_response(resp: reqwest::Response) -> GithubError {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let rate_limit_exhausted = resp
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");
    let message = resp.text().await.unwrap_or_default();
    error::classify_status(status, retry_after, rate_limit_exhausted, message)
}
