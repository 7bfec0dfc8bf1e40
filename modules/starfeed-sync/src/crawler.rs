use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use github_client::GithubError;
use starfeed_common::Feedback;

use crate::traits::StarSource;

/// Edges fetched per page request.
pub const PAGE_SIZE: u32 = 10;

/// A crawl aborted mid-pagination. Carries whatever was accumulated
/// before the failure; the caller decides whether to keep it.
#[derive(Debug, Error)]
#[error("starred crawl aborted after {} edges: {source}", .partial.len())]
pub struct CrawlError {
    pub partial: Vec<Feedback>,
    #[source]
    pub source: GithubError,
}

/// Walk `user_id`'s starred edges newest-first, bounded by `checkpoint`.
///
/// The boundary is approximate: paging stops once the oldest edge seen so
/// far is strictly older than the checkpoint, so edges at or just before
/// the boundary can be re-observed on the next run. The orchestrator's
/// existence check absorbs the duplicates. Without a checkpoint the full
/// history is crawled.
pub async fn crawl(
    source: &dyn StarSource,
    user_id: &str,
    checkpoint: Option<DateTime<Utc>>,
) -> Result<Vec<Feedback>, CrawlError> {
    let mut edges: Vec<Feedback> = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = match source.starred_page(&cursor, PAGE_SIZE).await {
            Ok(page) => page,
            Err(source) => {
                return Err(CrawlError {
                    partial: edges,
                    source,
                })
            }
        };
        for edge in &page.edges {
            edges.push(Feedback::star(
                user_id,
                &edge.name_with_owner,
                edge.starred_at,
            ));
        }
        if !page.has_next_page {
            break;
        }
        // Newest-first ordering means the last accumulated edge is the
        // oldest seen so far.
        if let (Some(boundary), Some(oldest)) = (checkpoint, edges.last()) {
            if oldest.timestamp < boundary {
                debug!(
                    user = user_id,
                    oldest = %oldest.timestamp,
                    boundary = %boundary,
                    "crawl reached checkpoint boundary"
                );
                break;
            }
        }
        cursor = page.end_cursor;
    }
    info!(user = user_id, count = edges.len(), "crawled starred edges");
    Ok(edges)
}
