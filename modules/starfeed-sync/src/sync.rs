use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use github_client::GithubError;
use starfeed_common::{Feedback, Item, User};

use crate::crawler::{self, CrawlError};
use crate::enrich::Enricher;
use crate::error::SyncError;
use crate::traits::{CatalogStore, StarSource};

/// Counters for one sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub edges_fetched: u32,
    pub items_inserted: u32,
    pub items_seen: u32,
    pub items_below_threshold: u32,
    pub items_failed: u32,
    pub feedback_inserted: u32,
    pub user_labels: u32,
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "edges={} inserted={} seen={} below_threshold={} failed={} feedback={} user_labels={}",
            self.edges_fetched,
            self.items_inserted,
            self.items_seen,
            self.items_below_threshold,
            self.items_failed,
            self.feedback_inserted,
            self.user_labels,
        )
    }
}

/// Result of a committed sync run.
#[derive(Debug)]
pub struct SyncOutcome {
    pub user_id: String,
    /// The new checkpoint: the run's start time. Edges starred mid-run
    /// fall after it and are picked up next time. Persist only because
    /// the commit succeeded.
    pub checkpoint: DateTime<Utc>,
    pub report: SyncReport,
}

/// One full incremental sync for one identity:
/// crawl → dedup → enrich → commit.
pub struct SyncJob {
    stars: Arc<dyn StarSource>,
    store: Arc<dyn CatalogStore>,
    enricher: Enricher,
    max_items: usize,
}

impl SyncJob {
    pub fn new(
        stars: Arc<dyn StarSource>,
        store: Arc<dyn CatalogStore>,
        enricher: Enricher,
        max_items: usize,
    ) -> Self {
        Self {
            stars,
            store,
            enricher,
            max_items,
        }
    }

    pub async fn run(&self, checkpoint: Option<DateTime<Utc>>) -> Result<SyncOutcome, SyncError> {
        let started = Utc::now();
        let mut report = SyncReport::default();

        let user_id = self.stars.login().await?;

        self.seed_user_labels(&user_id, &mut report).await;

        let mut edges = match crawler::crawl(self.stars.as_ref(), &user_id, checkpoint).await {
            Ok(edges) => edges,
            Err(CrawlError { partial, source }) => {
                // Partial pages are discarded. The checkpoint stays put,
                // so the next run re-observes the same window.
                warn!(
                    user = user_id.as_str(),
                    fetched = partial.len(),
                    error = %source,
                    "crawl aborted"
                );
                return Err(source.into());
            }
        };
        report.edges_fetched = edges.len() as u32;

        // Enrich oldest-first so the per-run budget reaches long-standing
        // stars before recent ones on a backlogged first sync.
        edges.reverse();
        let staged = self.enrich_unseen(&edges, &mut report).await?;

        // Commit: items first, then all edges as feedback regardless of
        // enrichment outcome. Either write failing leaves the checkpoint
        // unadvanced.
        if !staged.is_empty() {
            self.store.insert_items(&staged).await?;
        }
        report.items_inserted = staged.len() as u32;
        if !edges.is_empty() {
            self.store.insert_feedback(&edges).await?;
        }
        report.feedback_inserted = edges.len() as u32;

        info!(user = user_id.as_str(), "{report}");
        Ok(SyncOutcome {
            user_id,
            checkpoint: started,
            report,
        })
    }

    /// Seed cold-start signal from the identity's own repositories.
    /// Best-effort: failures never abort the sync.
    async fn seed_user_labels(&self, user_id: &str, report: &mut SyncReport) {
        match self.stars.viewer_labels().await {
            Ok(labels) if !labels.is_empty() => {
                let user = User {
                    user_id: user_id.to_string(),
                    labels,
                };
                match self.store.insert_user(&user).await {
                    Ok(()) => report.user_labels = user.labels.len() as u32,
                    Err(err) => {
                        warn!(user = user_id, error = %err, "failed to seed user labels")
                    }
                }
            }
            Ok(_) => {}
            Err(err) => warn!(user = user_id, error = %err, "failed to fetch user labels"),
        }
    }

    /// Stage catalog records for edges whose items are not indexed yet,
    /// spending the metadata-fetch budget only on unseen items.
    /// Individual item failures are logged and skipped.
    async fn enrich_unseen(
        &self,
        edges: &[Feedback],
        report: &mut SyncReport,
    ) -> Result<Vec<Item>, SyncError> {
        let mut staged: Vec<Item> = Vec::new();
        let mut budget = self.max_items;
        for edge in edges {
            if budget == 0 {
                info!(
                    limit = self.max_items,
                    "per-run enrichment budget exhausted"
                );
                break;
            }
            match self.store.get_item(&edge.item_id).await {
                Ok(Some(_)) => {
                    report.items_seen += 1;
                    continue;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        item = edge.item_id.as_str(),
                        error = %err,
                        "existence check failed, skipping item"
                    );
                    report.items_failed += 1;
                    continue;
                }
            }
            budget -= 1;
            match self.enricher.enrich(&edge.item_id).await {
                Ok(Some(item)) => staged.push(item),
                Ok(None) => report.items_below_threshold += 1,
                Err(GithubError::AuthInvalid) => return Err(SyncError::AuthInvalid),
                Err(GithubError::NotFound) => {
                    info!(
                        item = edge.item_id.as_str(),
                        "repository removed or renamed, not indexing"
                    );
                    report.items_failed += 1;
                }
                Err(err) => {
                    warn!(
                        item = edge.item_id.as_str(),
                        error = %err,
                        "enrichment failed, skipping item"
                    );
                    report.items_failed += 1;
                }
            }
        }
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    use chrono::{Duration, TimeZone};
    use github_client::StarEdge;

    use super::*;
    use crate::labels::Vocabulary;
    use crate::testing::{repo_meta, InjectedFailure, MockCatalogStore, MockRepoSource, MockStarSource};

    fn starred(name: &str, days_ago: i64) -> StarEdge {
        StarEdge {
            name_with_owner: name.to_string(),
            starred_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
                - Duration::days(days_ago),
        }
    }

    fn job(
        stars: MockStarSource,
        repos: MockRepoSource,
        store: Arc<MockCatalogStore>,
        max_items: usize,
    ) -> SyncJob {
        let vocabulary = Arc::new(Vocabulary::from_counts(HashMap::new(), 5));
        let enricher = Enricher::new(Arc::new(repos), vocabulary, 100, 512);
        SyncJob::new(Arc::new(stars), store, enricher, max_items)
    }

    #[tokio::test]
    async fn first_sync_indexes_and_records_feedback() {
        let stars = MockStarSource::new("alice", vec![starred("octo/Proj", 1)]);
        let repos = MockRepoSource::new().with_repo("octo/proj", repo_meta("octo/proj", 500));
        let store = Arc::new(MockCatalogStore::new());

        let before = Utc::now();
        let outcome = job(stars, repos, store.clone(), 100)
            .run(None)
            .await
            .unwrap();

        assert_eq!(outcome.user_id, "alice");
        assert!(outcome.checkpoint >= before && outcome.checkpoint <= Utc::now());
        assert!(store.items.lock().unwrap().contains_key("octo:proj"));
        let feedback = store.feedback.lock().unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].feedback_type, "star");
        assert_eq!(feedback[0].user_id, "alice");
        assert_eq!(feedback[0].item_id, "octo:proj");
    }

    #[tokio::test]
    async fn second_run_stages_nothing_new() {
        let store = Arc::new(MockCatalogStore::new());

        let first = job(
            MockStarSource::new("alice", vec![starred("octo/proj", 1)]),
            MockRepoSource::new().with_repo("octo/proj", repo_meta("octo/proj", 500)),
            store.clone(),
            100,
        )
        .run(None)
        .await
        .unwrap();
        assert_eq!(store.insert_items_calls.load(Ordering::SeqCst), 1);

        // No new edges since the checkpoint; the boundary page is
        // re-observed, but the existence check stops re-indexing.
        let second = job(
            MockStarSource::new("alice", vec![starred("octo/proj", 1)]),
            MockRepoSource::new().with_repo("octo/proj", repo_meta("octo/proj", 500)),
            store.clone(),
            100,
        )
        .run(Some(first.checkpoint))
        .await
        .unwrap();

        assert_eq!(second.report.items_seen, 1);
        assert_eq!(second.report.items_inserted, 0);
        assert_eq!(store.items.lock().unwrap().len(), 1);
        assert_eq!(store.insert_items_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn below_threshold_items_keep_their_feedback() {
        let stars = MockStarSource::new("alice", vec![starred("small/repo", 1)]);
        let repos = MockRepoSource::new().with_repo("small/repo", repo_meta("small/repo", 50));
        let store = Arc::new(MockCatalogStore::new());

        let outcome = job(stars, repos, store.clone(), 100)
            .run(None)
            .await
            .unwrap();

        assert_eq!(outcome.report.items_below_threshold, 1);
        assert!(store.items.lock().unwrap().is_empty());
        assert_eq!(store.feedback.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_credential_is_terminal() {
        let stars = MockStarSource::new("alice", Vec::new())
            .failing_login(InjectedFailure::AuthInvalid);
        let store = Arc::new(MockCatalogStore::new());

        let err = job(stars, MockRepoSource::new(), store, 100)
            .run(None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AuthInvalid));
    }

    #[tokio::test]
    async fn auth_failure_mid_crawl_is_terminal() {
        let history = (0..15).map(|i| starred(&format!("o/r{i}"), i)).collect();
        let stars = MockStarSource::new("alice", history)
            .failing_on_page(1, InjectedFailure::AuthInvalid);
        let store = Arc::new(MockCatalogStore::new());

        let err = job(stars, MockRepoSource::new(), store, 100)
            .run(None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AuthInvalid));
    }

    #[tokio::test]
    async fn store_write_failure_aborts_the_run() {
        let stars = MockStarSource::new("alice", vec![starred("octo/proj", 1)]);
        let repos = MockRepoSource::new().with_repo("octo/proj", repo_meta("octo/proj", 500));
        let store = Arc::new(MockCatalogStore::new());
        store.fail_insert_feedback.store(true, Ordering::SeqCst);

        let err = job(stars, repos, store, 100).run(None).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
    }

    #[tokio::test]
    async fn enrichment_budget_caps_metadata_fetches() {
        let history: Vec<StarEdge> =
            (0..5).map(|i| starred(&format!("o/r{i}"), i)).collect();
        let mut repos = MockRepoSource::new();
        for i in 0..5 {
            repos = repos.with_repo(&format!("o/r{i}"), repo_meta(&format!("o/r{i}"), 500));
        }
        let store = Arc::new(MockCatalogStore::new());

        let outcome = job(
            MockStarSource::new("alice", history),
            repos,
            store.clone(),
            2,
        )
        .run(None)
        .await
        .unwrap();

        assert_eq!(outcome.report.items_inserted, 2);
        // Feedback keeps every edge regardless of the budget.
        assert_eq!(store.feedback.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn one_bad_item_does_not_abort_the_run() {
        let history = vec![starred("octo/good", 1), starred("octo/gone", 2)];
        let repos = MockRepoSource::new().with_repo("octo/good", repo_meta("octo/good", 500));
        let store = Arc::new(MockCatalogStore::new());

        let outcome = job(
            MockStarSource::new("alice", history),
            repos,
            store.clone(),
            100,
        )
        .run(None)
        .await
        .unwrap();

        assert_eq!(outcome.report.items_inserted, 1);
        assert_eq!(outcome.report.items_failed, 1);
        assert!(store.items.lock().unwrap().contains_key("octo:good"));
    }

    #[tokio::test]
    async fn viewer_labels_seed_the_user_record() {
        let stars = MockStarSource::new("alice", Vec::new())
            .with_labels(&["rust", "parser"]);
        let store = Arc::new(MockCatalogStore::new());

        let outcome = job(stars, MockRepoSource::new(), store.clone(), 100)
            .run(None)
            .await
            .unwrap();

        assert_eq!(outcome.report.user_labels, 2);
        let users = store.users.lock().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, "alice");
        assert_eq!(users[0].labels, vec!["rust", "parser"]);
    }
}
