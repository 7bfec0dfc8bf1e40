use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

// --- Public types ---

/// One starred-repository edge as the source API reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct StarEdge {
    pub name_with_owner: String,
    pub starred_at: DateTime<Utc>,
}

/// One page of the viewer's starred repositories, newest-first.
#[derive(Debug, Clone)]
pub struct StarredPage {
    pub edges: Vec<StarEdge>,
    pub end_cursor: String,
    pub has_next_page: bool,
}

/// Repository metadata used for enrichment.
#[derive(Debug, Clone)]
pub struct RepoMetadata {
    /// Canonical `owner/name` as the server reports it. Differs from the
    /// requested name when the repository was renamed.
    pub full_name: String,
    pub stargazers: u32,
    pub topics: Vec<String>,
    /// Bytes of code per language.
    pub languages: HashMap<String, u64>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RepoMetadata {
    /// The language with the most bytes, lowercased. Ties break
    /// alphabetically for determinism.
    pub fn main_language(&self) -> Option<String> {
        self.languages
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(name, _)| name.to_lowercase())
    }
}

// --- GraphQL wire types ---

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewerData<T> {
    pub viewer: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginViewer {
    pub login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StarredViewer {
    pub starred_repositories: StarredConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StarredConnection {
    pub nodes: Vec<RepoNode>,
    pub edges: Vec<StarMeta>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepoNode {
    pub name_with_owner: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StarMeta {
    pub starred_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl StarredConnection {
    /// Zip parallel `nodes`/`edges` arrays into one page.
    pub fn into_page(self) -> StarredPage {
        let edges = self
            .nodes
            .into_iter()
            .zip(self.edges)
            .map(|(node, meta)| StarEdge {
                name_with_owner: node.name_with_owner,
                starred_at: meta.starred_at,
            })
            .collect();
        StarredPage {
            edges,
            end_cursor: self.page_info.end_cursor.unwrap_or_default(),
            has_next_page: self.page_info.has_next_page,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReposViewer {
    pub repositories: RepoConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepoConnection {
    pub nodes: Vec<OwnedRepoNode>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OwnedRepoNode {
    pub primary_language: Option<LanguageNode>,
    pub repository_topics: TopicConnection,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LanguageNode {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicConnection {
    pub nodes: Vec<TopicNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicNode {
    pub topic: TopicName,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicName {
    pub name: String,
}

// --- REST wire types ---

#[derive(Debug, Deserialize)]
pub(crate) struct RestRepo {
    pub full_name: String,
    pub stargazers_count: u32,
    #[serde(default)]
    pub topics: Vec<String>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_language_picks_most_bytes() {
        let meta = RepoMetadata {
            full_name: "octo/proj".into(),
            stargazers: 1,
            topics: vec![],
            languages: HashMap::from([("Rust".to_string(), 900), ("C".to_string(), 100)]),
            description: None,
            updated_at: Utc::now(),
        };
        assert_eq!(meta.main_language(), Some("rust".to_string()));
    }

    #[test]
    fn main_language_none_without_languages() {
        let meta = RepoMetadata {
            full_name: "octo/proj".into(),
            stargazers: 1,
            topics: vec![],
            languages: HashMap::new(),
            description: None,
            updated_at: Utc::now(),
        };
        assert_eq!(meta.main_language(), None);
    }

    #[test]
    fn starred_connection_zips_nodes_and_edges() {
        let raw = r#"{
            "nodes": [{"nameWithOwner": "Octo/Proj"}, {"nameWithOwner": "a/b"}],
            "edges": [{"starredAt": "2023-06-01T00:00:00Z"}, {"starredAt": "2023-05-01T00:00:00Z"}],
            "pageInfo": {"endCursor": "abc", "hasNextPage": true}
        }"#;
        let connection: StarredConnection = serde_json::from_str(raw).unwrap();
        let page = connection.into_page();
        assert_eq!(page.edges.len(), 2);
        assert_eq!(page.edges[0].name_with_owner, "Octo/Proj");
        assert_eq!(page.end_cursor, "abc");
        assert!(page.has_next_page);
    }

    #[test]
    fn exhausted_page_has_empty_cursor() {
        let raw = r#"{
            "nodes": [],
            "edges": [],
            "pageInfo": {"endCursor": null, "hasNextPage": false}
        }"#;
        let connection: StarredConnection = serde_json::from_str(raw).unwrap();
        let page = connection.into_page();
        assert!(page.edges.is_empty());
        assert_eq!(page.end_cursor, "");
        assert!(!page.has_next_page);
    }
}
