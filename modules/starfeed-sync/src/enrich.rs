use std::sync::Arc;

use tracing::debug;

use github_client::{GithubError, RepoMetadata};
use starfeed_common::{full_name_from_item_id, generate_categories, Item};

use crate::labels::Vocabulary;
use crate::traits::RepoSource;

/// Builds normalized catalog records from source-side metadata.
pub struct Enricher {
    repos: Arc<dyn RepoSource>,
    vocabulary: Arc<Vocabulary>,
    min_stars: u32,
    max_comment_len: usize,
}

impl Enricher {
    pub fn new(
        repos: Arc<dyn RepoSource>,
        vocabulary: Arc<Vocabulary>,
        min_stars: u32,
        max_comment_len: usize,
    ) -> Self {
        Self {
            repos,
            vocabulary,
            min_stars,
            max_comment_len,
        }
    }

    /// Build a catalog record for `item_id`, or `None` when the
    /// repository is below the popularity threshold. `NotFound`
    /// propagates unchanged — the removed/renamed signal maintenance
    /// jobs rely on.
    pub async fn enrich(&self, item_id: &str) -> Result<Option<Item>, GithubError> {
        let full_name = full_name_from_item_id(item_id);
        let meta = self.repos.repo(&full_name).await?;
        if meta.stargazers < self.min_stars {
            debug!(
                item = item_id,
                stars = meta.stargazers,
                threshold = self.min_stars,
                "below popularity threshold, not indexing"
            );
            return Ok(None);
        }
        Ok(Some(self.build_item(item_id, meta)))
    }

    fn build_item(&self, item_id: &str, meta: RepoMetadata) -> Item {
        let mut labels: Vec<String> = meta.topics.iter().map(|t| t.to_lowercase()).collect();
        if let Some(language) = meta.main_language() {
            if !labels.contains(&language) {
                labels.push(language);
            }
        }
        let draft = Item {
            item_id: item_id.to_string(),
            is_hidden: false,
            timestamp: meta.updated_at,
            categories: generate_categories(&labels),
            comment: meta
                .description
                .as_deref()
                .map(|d| truncate(d, self.max_comment_len)),
            labels,
        };
        self.vocabulary.optimize(&draft).unwrap_or(draft)
    }
}

/// Truncate to at most `max_chars` characters, respecting char
/// boundaries.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::testing::{repo_meta, MockRepoSource};

    fn empty_vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_counts(HashMap::new(), 5))
    }

    fn enricher(repos: MockRepoSource, vocabulary: Arc<Vocabulary>) -> Enricher {
        Enricher::new(Arc::new(repos), vocabulary, 100, 512)
    }

    #[tokio::test]
    async fn below_threshold_yields_no_item() {
        let repos = MockRepoSource::new().with_repo("octo/proj", repo_meta("octo/proj", 50));
        let result = enricher(repos, empty_vocab())
            .enrich("octo:proj")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn qualifying_repo_becomes_a_catalog_record() {
        let mut meta = repo_meta("octo/proj", 500);
        meta.topics = vec!["Parser".to_string()];
        meta.languages = HashMap::from([("Rust".to_string(), 1000)]);
        meta.description = Some("a fast parser".to_string());
        meta.updated_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let repos = MockRepoSource::new().with_repo("octo/proj", meta);

        let item = enricher(repos, empty_vocab())
            .enrich("octo:proj")
            .await
            .unwrap()
            .expect("500 stars passes the threshold");
        assert_eq!(item.item_id, "octo:proj");
        assert_eq!(item.labels, vec!["parser", "rust"]);
        assert_eq!(item.comment.as_deref(), Some("a fast parser"));
        assert_eq!(
            item.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn main_language_is_not_duplicated_into_labels() {
        let mut meta = repo_meta("octo/proj", 500);
        meta.topics = vec!["rust".to_string()];
        meta.languages = HashMap::from([("Rust".to_string(), 1000)]);
        let repos = MockRepoSource::new().with_repo("octo/proj", meta);

        let item = enricher(repos, empty_vocab())
            .enrich("octo:proj")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.labels, vec!["rust"]);
    }

    #[tokio::test]
    async fn comment_is_truncated_to_the_configured_bound() {
        let mut meta = repo_meta("octo/proj", 500);
        meta.description = Some("x".repeat(2000));
        let repos = MockRepoSource::new().with_repo("octo/proj", meta);

        let item = enricher(repos, empty_vocab())
            .enrich("octo:proj")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.comment.unwrap().chars().count(), 512);
    }

    #[tokio::test]
    async fn not_found_propagates_as_the_removed_signal() {
        let repos = MockRepoSource::new();
        let err = enricher(repos, empty_vocab())
            .enrich("octo:gone")
            .await
            .unwrap_err();
        assert!(matches!(err, GithubError::NotFound));
    }

    #[tokio::test]
    async fn matcher_improvements_are_applied() {
        let counts = HashMap::from([("game".to_string(), 10)]);
        let vocabulary = Arc::new(Vocabulary::from_counts(counts, 5));
        let mut meta = repo_meta("octo/proj", 500);
        meta.description = Some("a tiny game engine".to_string());
        let repos = MockRepoSource::new().with_repo("octo/proj", meta);

        let item = enricher(repos, vocabulary)
            .enrich("octo:proj")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.labels, vec!["game"]);
        assert_eq!(item.categories, vec!["game"]);
    }
}
