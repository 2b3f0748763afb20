//! Periodic pruning of old event rows. Runs independently of the reorg
//! delete path: retention removes rows because they are old, regardless of
//! whether they were ever affected by a reorg.

use {
    crate::{events, metrics::Metrics},
    chrono::Duration as ChronoDuration,
    indexer_core::supervisor::BackgroundService,
    sqlx::PgPool,
    std::{sync::Arc, time::Duration},
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
};

/// One chain's set of contracts to prune, and how old a row must be before
/// it is removed.
pub struct RetentionPolicy {
    pub chain: String,
    pub contracts: Vec<String>,
    pub retention: Duration,
}

pub struct RetentionPruner {
    pool: PgPool,
    policies: Vec<RetentionPolicy>,
    interval: Duration,
}

impl RetentionPruner {
    pub fn new(pool: PgPool, policies: Vec<RetentionPolicy>, interval: Duration) -> Self {
        Self {
            pool,
            policies,
            interval,
        }
    }

    async fn prune_once(&self) {
        for policy in &self.policies {
            let retention = ChronoDuration::from_std(policy.retention).unwrap_or(ChronoDuration::hours(24));
            let Some(older_than) = chrono::Utc::now().checked_sub_signed(retention) else {
                continue;
            };
            for contract in &policy.contracts {
                let mut conn = match self.pool.acquire().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::error!(chain = %policy.chain, error = %err, "retention pruner failed to acquire connection");
                        continue;
                    }
                };
                match events::delete_older_than(&mut conn, &policy.chain, contract, older_than).await {
                    Ok(rows) => {
                        if rows > 0 {
                            tracing::info!(chain = %policy.chain, contract, rows, "pruned expired event rows");
                        }
                        Metrics::get()
                            .rows_deleted_retention
                            .with_label_values(&[&policy.chain, contract])
                            .inc_by(rows);
                    }
                    Err(err) => {
                        tracing::error!(chain = %policy.chain, contract, error = %err, "retention prune failed");
                    }
                }
            }
        }
    }
}

impl BackgroundService for RetentionPruner {
    fn name(&self) -> String {
        "retention-pruner".to_string()
    }

    fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => self.prune_once().await,
                }
            }
        })
    }
}
