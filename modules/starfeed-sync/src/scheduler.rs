use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use tracing::{info, warn};

use github_client::GithubClient;
use starfeed_common::Config;

use crate::enrich::Enricher;
use crate::error::SyncError;
use crate::labels::Vocabulary;
use crate::sync::{SyncJob, SyncOutcome};
use crate::traits::CatalogStore;

/// One row of the identity table. Written by the web app during the
/// OAuth handshake; this pipeline only reads tokens and advances
/// `pulled_at`.
///
/// Expected schema:
/// `oauth_identities(login TEXT PRIMARY KEY, access_token TEXT NOT NULL,
/// pulled_at TIMESTAMPTZ)`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Identity {
    pub login: String,
    pub access_token: String,
    pub pulled_at: Option<DateTime<Utc>>,
}

pub struct IdentityStore {
    pool: PgPool,
}

impl IdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Identities whose checkpoint is absent or older than the resync
    /// interval, stalest first.
    pub async fn due(
        &self,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> Result<Vec<Identity>, sqlx::Error> {
        let cutoff = now - interval;
        sqlx::query_as::<_, Identity>(
            r#"
            SELECT login, access_token, pulled_at
            FROM oauth_identities
            WHERE pulled_at IS NULL OR pulled_at < $1
            ORDER BY pulled_at ASC NULLS FIRST
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, login: &str) -> Result<Option<Identity>, sqlx::Error> {
        sqlx::query_as::<_, Identity>(
            "SELECT login, access_token, pulled_at FROM oauth_identities WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
    }

    /// Advance the identity's checkpoint. Called only after a fully
    /// committed sync run.
    pub async fn mark_pulled(
        &self,
        login: &str,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE oauth_identities SET pulled_at = $2 WHERE login = $1")
            .bind(login)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop the identity from future scheduling. The row reappears when
    /// the user re-authenticates through the web app.
    pub async fn deactivate(&self, login: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM oauth_identities WHERE login = $1")
            .bind(login)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub synced: u32,
    pub deactivated: u32,
    pub failed: u32,
}

/// Runs one `SyncJob` per due identity through a bounded worker pool.
/// Crawling within one identity stays sequential; identities run
/// concurrently.
pub struct Scheduler {
    identities: IdentityStore,
    store: Arc<dyn CatalogStore>,
    vocabulary: Arc<Vocabulary>,
    config: Config,
}

impl Scheduler {
    pub fn new(
        identities: IdentityStore,
        store: Arc<dyn CatalogStore>,
        vocabulary: Arc<Vocabulary>,
        config: Config,
    ) -> Self {
        Self {
            identities,
            store,
            vocabulary,
            config,
        }
    }

    /// Sync every identity due for a refresh.
    pub async fn run(&self, full: bool) -> Result<SchedulerStats> {
        let due = self
            .identities
            .due(
                Utc::now(),
                Duration::hours(self.config.resync_interval_hours),
            )
            .await
            .context("Failed to query due identities")?;
        info!(count = due.len(), "identities due for sync");
        self.run_batch(due, full).await
    }

    /// Sync a single identity by login, regardless of its checkpoint age.
    pub async fn run_one(&self, login: &str, full: bool) -> Result<SchedulerStats> {
        let identity = self
            .identities
            .get(login)
            .await?
            .with_context(|| format!("no identity with login `{login}`"))?;
        self.run_batch(vec![identity], full).await
    }

    async fn run_batch(&self, identities: Vec<Identity>, full: bool) -> Result<SchedulerStats> {
        let mut stats = SchedulerStats::default();

        let results: Vec<(Identity, Result<SyncOutcome, SyncError>)> =
            stream::iter(identities.into_iter().map(|identity| async move {
                let outcome = self.sync_identity(&identity, full).await;
                (identity, outcome)
            }))
            .buffer_unordered(self.config.sync_concurrency)
            .collect()
            .await;

        for (identity, outcome) in results {
            match outcome {
                Ok(outcome) => {
                    self.identities
                        .mark_pulled(&identity.login, outcome.checkpoint)
                        .await?;
                    info!(user = identity.login.as_str(), "{}", outcome.report);
                    stats.synced += 1;
                }
                Err(SyncError::AuthInvalid) => {
                    warn!(
                        user = identity.login.as_str(),
                        "credential rejected, deactivating identity"
                    );
                    self.identities.deactivate(&identity.login).await?;
                    stats.deactivated += 1;
                }
                Err(err) => {
                    warn!(
                        user = identity.login.as_str(),
                        error = %err,
                        "sync failed, checkpoint unadvanced"
                    );
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn sync_identity(
        &self,
        identity: &Identity,
        full: bool,
    ) -> Result<SyncOutcome, SyncError> {
        let github = Arc::new(GithubClient::new(&identity.access_token));
        let enricher = Enricher::new(
            github.clone(),
            self.vocabulary.clone(),
            self.config.min_stars,
            self.config.max_comment_len,
        );
        let job = SyncJob::new(
            github,
            self.store.clone(),
            enricher,
            self.config.max_items_per_sync,
        );
        let checkpoint = if full { None } else { identity.pulled_at };
        job.run(checkpoint).await
    }
}
