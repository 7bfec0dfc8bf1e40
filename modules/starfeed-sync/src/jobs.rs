//! Maintenance jobs over the catalog, run out-of-band from the sync
//! schedule.

use anyhow::Result;
use tracing::{info, warn};

use github_client::GithubError;
use starfeed_common::{full_name_from_item_id, item_id_from_full_name, ItemPatch};

use crate::labels::Vocabulary;
use crate::traits::{CatalogStore, RepoSource};

const SCAN_PAGE_SIZE: usize = 500;

#[derive(Debug, Default)]
pub struct PruneStats {
    pub scanned: u32,
    pub kept: u32,
    pub removed: u32,
    pub failed: u32,
}

/// Retire catalog entries whose repositories were removed or renamed.
/// A rename surfaces as metadata coming back under a different canonical
/// name; a removal as `NotFound`. Per-item failures are logged and
/// skipped.
pub async fn prune(store: &dyn CatalogStore, repos: &dyn RepoSource) -> Result<PruneStats> {
    let mut stats = PruneStats::default();
    let mut cursor = String::new();
    loop {
        let (items, next) = store.items_page(SCAN_PAGE_SIZE, &cursor).await?;
        for item in items {
            stats.scanned += 1;
            let full_name = full_name_from_item_id(&item.item_id);
            let stale = match repos.repo(&full_name).await {
                Ok(meta) => item_id_from_full_name(&meta.full_name) != item.item_id,
                Err(GithubError::NotFound) => true,
                Err(err) => {
                    warn!(
                        item = item.item_id.as_str(),
                        error = %err,
                        "metadata fetch failed, keeping item"
                    );
                    stats.failed += 1;
                    continue;
                }
            };
            if stale {
                match store.delete_item(&item.item_id).await {
                    Ok(()) => {
                        info!(item = item.item_id.as_str(), "pruned stale catalog entry");
                        stats.removed += 1;
                    }
                    Err(err) => {
                        warn!(
                            item = item.item_id.as_str(),
                            error = %err,
                            "failed to delete stale item"
                        );
                        stats.failed += 1;
                    }
                }
            } else {
                stats.kept += 1;
            }
        }
        if next.is_empty() {
            break;
        }
        cursor = next;
    }
    info!(
        scanned = stats.scanned,
        removed = stats.removed,
        kept = stats.kept,
        failed = stats.failed,
        "prune complete"
    );
    Ok(stats)
}

#[derive(Debug, Default)]
pub struct RefreshStats {
    pub scanned: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

/// Re-run taxonomy optimization across the whole catalog. The matcher's
/// no-op signal skips redundant store writes.
pub async fn refresh_labels(
    store: &dyn CatalogStore,
    vocabulary: &Vocabulary,
) -> Result<RefreshStats> {
    let mut stats = RefreshStats::default();
    let mut cursor = String::new();
    loop {
        let (items, next) = store.items_page(SCAN_PAGE_SIZE, &cursor).await?;
        for item in items {
            stats.scanned += 1;
            match vocabulary.optimize(&item) {
                Some(updated) => {
                    let patch = ItemPatch {
                        labels: Some(updated.labels),
                        categories: Some(updated.categories),
                        ..Default::default()
                    };
                    match store.update_item(&item.item_id, &patch).await {
                        Ok(()) => stats.updated += 1,
                        Err(err) => {
                            warn!(
                                item = item.item_id.as_str(),
                                error = %err,
                                "failed to update labels"
                            );
                            stats.failed += 1;
                        }
                    }
                }
                None => stats.unchanged += 1,
            }
        }
        if next.is_empty() {
            break;
        }
        cursor = next;
    }
    info!(
        scanned = stats.scanned,
        updated = stats.updated,
        unchanged = stats.unchanged,
        failed = stats.failed,
        "label refresh complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    use chrono::{TimeZone, Utc};
    use starfeed_common::Item;

    use super::*;
    use crate::testing::{repo_meta, MockCatalogStore, MockRepoSource};

    fn catalog_item(item_id: &str, labels: &[&str], comment: Option<&str>) -> Item {
        Item {
            item_id: item_id.to_string(),
            is_hidden: false,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            categories: Vec::new(),
            comment: comment.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn prune_removes_missing_and_renamed_entries() {
        let store = MockCatalogStore::new();
        {
            let mut items = store.items.lock().unwrap();
            items.insert("octo:gone".into(), catalog_item("octo:gone", &[], None));
            items.insert("octo:moved".into(), catalog_item("octo:moved", &[], None));
            items.insert("octo:kept".into(), catalog_item("octo:kept", &[], None));
        }
        // `octo/moved` now redirects to a different canonical name;
        // `octo/gone` is absent entirely.
        let repos = MockRepoSource::new()
            .with_repo("octo/moved", repo_meta("octo/newname", 500))
            .with_repo("octo/kept", repo_meta("octo/kept", 500));

        let stats = prune(&store, &repos).await.unwrap();

        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.removed, 2);
        assert_eq!(stats.kept, 1);
        let items = store.items.lock().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items.contains_key("octo:kept"));
    }

    #[tokio::test]
    async fn refresh_skips_items_the_matcher_leaves_unchanged() {
        let store = MockCatalogStore::new();
        {
            let mut items = store.items.lock().unwrap();
            // No vocabulary terms in the comment: optimize is a no-op.
            items.insert(
                "octo:stable".into(),
                catalog_item("octo:stable", &["zig"], Some("an obscure thing")),
            );
            // "game" will be extracted and added.
            items.insert(
                "octo:fresh".into(),
                catalog_item("octo:fresh", &[], Some("a tiny game engine")),
            );
        }
        let counts = HashMap::from([("game".to_string(), 10)]);
        let vocabulary = Vocabulary::from_counts(counts, 5);

        let stats = refresh_labels(&store, &vocabulary).await.unwrap();

        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(store.update_item_calls.load(Ordering::SeqCst), 1);
        let items = store.items.lock().unwrap();
        assert_eq!(items["octo:fresh"].labels, vec!["game"]);
        assert_eq!(items["octo:fresh"].categories, vec!["game"]);
    }
}
