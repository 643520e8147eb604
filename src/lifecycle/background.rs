//! Background scheduler (spec §4.6.8): a periodic, cancellable task that
//! drives the evaluator and cleanup service across every workspace.
//! Grounded on the teacher's `sync::worker::SyncWorker`: a spawned loop
//! selecting between a shutdown channel and interval timers, rather than a
//! bare `tokio::spawn` + `sleep` loop with no way to stop it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::warn;

use super::retention::RetentionPolicies;
use super::{archival, evaluator};
use crate::config::{LifecycleConfig, StoreConfig};
use crate::error::Result;
use crate::relational::SqliteStore;
use crate::types::TriggeredBy;
use crate::vector::VectorAdapter;

/// Handle to a running background scheduler. Dropping it does not stop the
/// task (the teacher's worker has the same property); call `stop` for a
/// clean shutdown.
pub struct LifecycleScheduler {
    shutdown_tx: mpsc::Sender<()>,
}

impl LifecycleScheduler {
    /// Spawn the scheduler. `config.evaluation_interval_secs` (>= 60 by
    /// `LifecycleConfig::validate`) paces the evaluator; cleanup runs at
    /// 10x that cadence since it only needs to catch up with whatever the
    /// evaluator archived since the last pass.
    pub fn start(
        relational: SqliteStore,
        vector: Arc<dyn VectorAdapter>,
        config: LifecycleConfig,
        store_config: StoreConfig,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let policies = RetentionPolicies::from_store_config(&store_config);

        tokio::spawn(async move {
            let mut eval_interval = interval(StdDuration::from_secs(config.evaluation_interval_secs));
            let mut cleanup_interval = interval(StdDuration::from_secs(config.evaluation_interval_secs * 10));

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    _ = eval_interval.tick() => {
                        if let Err(e) = run_evaluation_pass(&relational, vector.as_ref(), &config, &policies).await {
                            warn!(error = %e, "lifecycle evaluation pass failed");
                        }
                    }
                    _ = cleanup_interval.tick() => {
                        if let Err(e) = run_cleanup_pass(&relational, &config) {
                            warn!(error = %e, "lifecycle cleanup pass failed");
                        }
                    }
                }
            }
        });

        Self { shutdown_tx }
    }

    /// Signal the background task to stop after its current tick.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// One evaluator pass across every workspace, archiving anything the
/// evaluator flagged. Per-workspace and per-memory errors are logged and
/// swallowed so one bad row never stalls the rest of the batch (spec
/// §4.6.8: "errors in one workspace do not halt the others").
async fn run_evaluation_pass(
    relational: &SqliteStore,
    vector: &dyn VectorAdapter,
    config: &LifecycleConfig,
    policies: &RetentionPolicies,
) -> Result<()> {
    let workspace_ids = list_workspace_ids(relational)?;
    let now = Utc::now();

    // Every workspace is still covered in one pass; batching only bounds how
    // many are touched between log lines (spec §4.6.8: "batches of
    // batch_size"), which matters once a deployment has far more workspaces
    // than fit comfortably in one scan.
    for batch in workspace_ids.chunks(config.batch_size.max(1)) {
        for workspace_id in batch {
            let result = match relational.with_connection(|conn| evaluator::tick(conn, workspace_id, now, config, policies)) {
                Ok(r) => r,
                Err(e) => {
                    warn!(workspace_id = %workspace_id, error = %e, "evaluator tick failed for workspace");
                    continue;
                }
            };

            for err in &result.errors {
                warn!(workspace_id = %workspace_id, error = %err, "per-memory evaluation error");
            }

            for memory_id in result.to_archive {
                if let Err(e) = archival::archive_memory(
                    relational,
                    vector,
                    &memory_id,
                    workspace_id,
                    "effective ttl exceeded",
                    TriggeredBy::System,
                    now,
                )
                .await
                {
                    warn!(memory_id = %memory_id, error = %e, "scheduled archival failed");
                }
            }
        }
    }

    Ok(())
}

fn run_cleanup_pass(relational: &SqliteStore, config: &LifecycleConfig) -> Result<()> {
    let workspace_ids = list_workspace_ids(relational)?;
    let now = Utc::now();

    for workspace_id in workspace_ids {
        match relational.with_connection(|conn| super::cleanup::run_cleanup(conn, &workspace_id, now, config)) {
            Ok(result) => {
                tracing::debug!(
                    workspace_id = %workspace_id,
                    hard_deleted = result.hard_deleted,
                    events_pruned = result.events_pruned,
                    "cleanup pass complete"
                );
            }
            Err(e) => warn!(workspace_id = %workspace_id, error = %e, "cleanup pass failed for workspace"),
        }
    }

    Ok(())
}

fn list_workspace_ids(relational: &SqliteStore) -> Result<Vec<String>> {
    relational.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT id FROM workspaces")?;
        let rows = stmt
            .query_map([], |r| r.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
