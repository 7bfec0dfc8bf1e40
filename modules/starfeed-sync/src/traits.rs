// Trait abstractions for the sync pipeline's network dependencies.
//
// StarSource covers the identity-scoped reads (login, starred edges, own
// repositories). RepoSource covers item metadata. CatalogStore covers the
// recommendation store. The concrete clients implement them below; tests
// use the in-memory mocks in `testing.rs`.

use async_trait::async_trait;

use github_client::{GithubClient, GithubError, RepoMetadata, StarredPage};
use gorse_client::{Gorse, GorseError};
use starfeed_common::{Feedback, Item, ItemPatch, User};

#[async_trait]
pub trait StarSource: Send + Sync {
    /// Canonical lowercase login for this credential.
    async fn login(&self) -> Result<String, GithubError>;

    /// One page of starred repositories, newest-first. Empty cursor
    /// requests the first page.
    async fn starred_page(&self, cursor: &str, page_size: u32)
        -> Result<StarredPage, GithubError>;

    /// Topics and main languages of the identity's own repositories.
    async fn viewer_labels(&self) -> Result<Vec<String>, GithubError>;
}

#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Metadata for `owner/name`. `NotFound` when removed; a renamed
    /// repository comes back under a different canonical name.
    async fn repo(&self, full_name: &str) -> Result<RepoMetadata, GithubError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Existence check. The store's 404 is absence, not failure.
    async fn get_item(&self, item_id: &str) -> Result<Option<Item>, GorseError>;

    async fn insert_items(&self, items: &[Item]) -> Result<(), GorseError>;

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> Result<(), GorseError>;

    async fn delete_item(&self, item_id: &str) -> Result<(), GorseError>;

    async fn insert_feedback(&self, feedback: &[Feedback]) -> Result<(), GorseError>;

    async fn insert_user(&self, user: &User) -> Result<(), GorseError>;

    /// One page of the catalog. An empty returned cursor signals the end.
    async fn items_page(&self, n: usize, cursor: &str)
        -> Result<(Vec<Item>, String), GorseError>;
}

#[async_trait]
impl StarSource for GithubClient {
    async fn login(&self) -> Result<String, GithubError> {
        self.viewer_login().await
    }

    async fn starred_page(
        &self,
        cursor: &str,
        page_size: u32,
    ) -> Result<StarredPage, GithubError> {
        GithubClient::starred_page(self, cursor, page_size).await
    }

    async fn viewer_labels(&self) -> Result<Vec<String>, GithubError> {
        GithubClient::viewer_labels(self).await
    }
}

#[async_trait]
impl RepoSource for GithubClient {
    async fn repo(&self, full_name: &str) -> Result<RepoMetadata, GithubError> {
        GithubClient::repo(self, full_name).await
    }
}

#[async_trait]
impl CatalogStore for Gorse {
    async fn get_item(&self, item_id: &str) -> Result<Option<Item>, GorseError> {
        match Gorse::get_item(self, item_id).await {
            Ok(item) => Ok(Some(item)),
            Err(GorseError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn insert_items(&self, items: &[Item]) -> Result<(), GorseError> {
        Gorse::insert_items(self, items).await.map(|_| ())
    }

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> Result<(), GorseError> {
        Gorse::update_item(self, item_id, patch).await.map(|_| ())
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), GorseError> {
        Gorse::delete_item(self, item_id).await.map(|_| ())
    }

    async fn insert_feedback(&self, feedback: &[Feedback]) -> Result<(), GorseError> {
        Gorse::insert_feedback(self, feedback).await.map(|_| ())
    }

    async fn insert_user(&self, user: &User) -> Result<(), GorseError> {
        Gorse::insert_user(self, user).await.map(|_| ())
    }

    async fn items_page(
        &self,
        n: usize,
        cursor: &str,
    ) -> Result<(Vec<Item>, String), GorseError> {
        Gorse::get_items(self, n, cursor).await
    }
}
