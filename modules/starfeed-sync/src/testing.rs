// Test mocks for the sync pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockStarSource (StarSource) — paged in-memory star history
// - MockRepoSource (RepoSource) — HashMap-based metadata, NotFound otherwise
// - MockCatalogStore (CatalogStore) — stateful in-memory store with
//   call counters and failure flags
//
// No network, no database. `cargo test` in seconds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use github_client::{GithubError, RepoMetadata, StarEdge, StarredPage};
use gorse_client::GorseError;
use starfeed_common::{Feedback, Item, ItemPatch, User};

use crate::traits::{CatalogStore, RepoSource, StarSource};

/// Failure kinds a mock can inject. The real error type is not `Clone`,
/// so mocks store the kind and build the error per call.
#[derive(Debug, Clone, Copy)]
pub enum InjectedFailure {
    AuthInvalid,
    RateLimited,
    Network,
}

impl InjectedFailure {
    pub fn to_error(self) -> GithubError {
        match self {
            InjectedFailure::AuthInvalid => GithubError::AuthInvalid,
            InjectedFailure::RateLimited => GithubError::RateLimited { retry_after: None },
            InjectedFailure::Network => GithubError::Network("injected failure".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStarSource
// ---------------------------------------------------------------------------

/// Paged newest-first star history. Cursors are plain offsets.
pub struct MockStarSource {
    login: String,
    history: Vec<StarEdge>,
    labels: Vec<String>,
    fail_on_page: Option<(usize, InjectedFailure)>,
    fail_login: Option<InjectedFailure>,
    pub pages_served: AtomicU32,
}

impl MockStarSource {
    pub fn new(login: &str, history: Vec<StarEdge>) -> Self {
        Self {
            login: login.to_string(),
            history,
            labels: Vec::new(),
            fail_on_page: None,
            fail_login: None,
            pages_served: AtomicU32::new(0),
        }
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Fail the request for the zero-based `page` index.
    pub fn failing_on_page(mut self, page: usize, failure: InjectedFailure) -> Self {
        self.fail_on_page = Some((page, failure));
        self
    }

    pub fn failing_login(mut self, failure: InjectedFailure) -> Self {
        self.fail_login = Some(failure);
        self
    }
}

#[async_trait]
impl StarSource for MockStarSource {
    async fn login(&self) -> Result<String, GithubError> {
        if let Some(failure) = self.fail_login {
            return Err(failure.to_error());
        }
        Ok(self.login.to_lowercase())
    }

    async fn starred_page(
        &self,
        cursor: &str,
        page_size: u32,
    ) -> Result<StarredPage, GithubError> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        let offset: usize = if cursor.is_empty() {
            0
        } else {
            cursor.parse().expect("mock cursor is an offset")
        };
        if let Some((fail_page, failure)) = self.fail_on_page {
            if offset / page_size as usize == fail_page {
                return Err(failure.to_error());
            }
        }
        let end = (offset + page_size as usize).min(self.history.len());
        Ok(StarredPage {
            edges: self.history[offset..end].to_vec(),
            end_cursor: end.to_string(),
            has_next_page: end < self.history.len(),
        })
    }

    async fn viewer_labels(&self) -> Result<Vec<String>, GithubError> {
        Ok(self.labels.clone())
    }
}

// ---------------------------------------------------------------------------
// MockRepoSource
// ---------------------------------------------------------------------------

/// `owner/name` → metadata. Unregistered repositories are `NotFound`.
/// Register metadata under a different canonical `full_name` to simulate
/// a rename redirect.
#[derive(Default)]
pub struct MockRepoSource {
    repos: HashMap<String, RepoMetadata>,
}

impl MockRepoSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, requested: &str, meta: RepoMetadata) -> Self {
        self.repos.insert(requested.to_string(), meta);
        self
    }
}

#[async_trait]
impl RepoSource for MockRepoSource {
    async fn repo(&self, full_name: &str) -> Result<RepoMetadata, GithubError> {
        self.repos
            .get(full_name)
            .cloned()
            .ok_or(GithubError::NotFound)
    }
}

/// Plain repository metadata with the given stargazer count.
pub fn repo_meta(full_name: &str, stargazers: u32) -> RepoMetadata {
    RepoMetadata {
        full_name: full_name.to_string(),
        stargazers,
        topics: Vec::new(),
        languages: HashMap::new(),
        description: None,
        updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

// ---------------------------------------------------------------------------
// MockCatalogStore
// ---------------------------------------------------------------------------

/// Stateful in-memory catalog store.
#[derive(Default)]
pub struct MockCatalogStore {
    pub items: Mutex<HashMap<String, Item>>,
    pub feedback: Mutex<Vec<Feedback>>,
    pub users: Mutex<Vec<User>>,
    pub insert_items_calls: AtomicU32,
    pub update_item_calls: AtomicU32,
    pub fail_insert_items: AtomicBool,
    pub fail_insert_feedback: AtomicBool,
}

impl MockCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn injected_store_error() -> GorseError {
    GorseError::Api {
        status: 500,
        message: "injected store failure".into(),
    }
}

#[async_trait]
impl CatalogStore for MockCatalogStore {
    async fn get_item(&self, item_id: &str) -> Result<Option<Item>, GorseError> {
        Ok(self.items.lock().unwrap().get(item_id).cloned())
    }

    async fn insert_items(&self, items: &[Item]) -> Result<(), GorseError> {
        self.insert_items_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_items.load(Ordering::SeqCst) {
            return Err(injected_store_error());
        }
        let mut map = self.items.lock().unwrap();
        for item in items {
            map.insert(item.item_id.clone(), item.clone());
        }
        Ok(())
    }

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> Result<(), GorseError> {
        self.update_item_calls.fetch_add(1, Ordering::SeqCst);
        let mut map = self.items.lock().unwrap();
        let item = map.get_mut(item_id).ok_or(GorseError::NotFound)?;
        if let Some(is_hidden) = patch.is_hidden {
            item.is_hidden = is_hidden;
        }
        if let Some(timestamp) = patch.timestamp {
            item.timestamp = timestamp;
        }
        if let Some(labels) = &patch.labels {
            item.labels = labels.clone();
        }
        if let Some(categories) = &patch.categories {
            item.categories = categories.clone();
        }
        if let Some(comment) = &patch.comment {
            item.comment = Some(comment.clone());
        }
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), GorseError> {
        self.items
            .lock()
            .unwrap()
            .remove(item_id)
            .map(|_| ())
            .ok_or(GorseError::NotFound)
    }

    async fn insert_feedback(&self, feedback: &[Feedback]) -> Result<(), GorseError> {
        if self.fail_insert_feedback.load(Ordering::SeqCst) {
            return Err(injected_store_error());
        }
        self.feedback.lock().unwrap().extend_from_slice(feedback);
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), GorseError> {
        self.users.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn items_page(
        &self,
        n: usize,
        cursor: &str,
    ) -> Result<(Vec<Item>, String), GorseError> {
        let map = self.items.lock().unwrap();
        let mut all: Vec<Item> = map.values().cloned().collect();
        all.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        let offset: usize = if cursor.is_empty() {
            0
        } else {
            cursor.parse().expect("mock cursor is an offset")
        };
        let end = (offset + n).min(all.len());
        let page = all[offset..end].to_vec();
        let next = if end < all.len() {
            end.to_string()
        } else {
            String::new()
        };
        Ok((page, next))
    }
}
