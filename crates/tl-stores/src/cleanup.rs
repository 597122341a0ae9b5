//! Periodic sweep that expires completed [`TaskState`] entries and the
//! artifacts scoped to them (spec §4.10, §5, §7 error kind Cleanup).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use tracing::{info, warn};

use tl_core::store::{ArtifactStore, TaskStateStore};

pub struct CleanupConfig {
    pub ttl: ChronoDuration,
    pub sweep_interval: StdDuration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig { ttl: ChronoDuration::hours(1), sweep_interval: StdDuration::from_secs(3600) }
    }
}

/// Owns no state itself — it drives a [`TaskStateStore`] and [`ArtifactStore`]
/// pair on a timer. Construct with `spawn` to run it in the background, or
/// call `sweep_once` directly from a test.
pub struct StateCleanupService<T, A> {
    task_states: Arc<T>,
    artifacts: Arc<A>,
    config: CleanupConfig,
}

impl<T, A> StateCleanupService<T, A>
where
    T: TaskStateStore + 'static,
    A: ArtifactStore + 'static,
{
    pub fn new(task_states: Arc<T>, artifacts: Arc<A>, config: CleanupConfig) -> Self {
        StateCleanupService { task_states, artifacts, config }
    }

    /// Runs one sweep pass, returning the number of task states reaped.
    /// A failure on any individual entry is logged at `warn` and does not
    /// abort the rest of the sweep (§7: Cleanup errors are swallowed).
    pub async fn sweep_once(&self) -> usize {
        let now = chrono::Utc::now();
        let expired = match self.task_states.list_expired(self.config.ttl, now).await {
            Ok(expired) => expired,
            Err(err) => {
                warn!(error = %err, "cleanup sweep failed to list expired task states");
                return 0;
            }
        };

        let mut reaped = 0;
        for state in &expired {
            if let Err(err) = self.artifacts.delete_context(&state.context_id).await {
                warn!(error = %err, context_id = %state.context_id, "cleanup sweep failed to delete artifacts");
                continue;
            }
            if let Err(err) = self.task_states.delete(&state.task_id).await {
                warn!(error = %err, task_id = %state.task_id, "cleanup sweep failed to delete task state");
                continue;
            }
            reaped += 1;
        }
        if reaped > 0 {
            info!(reaped, "cleanup sweep reaped expired task states");
        }
        reaped
    }

    /// Spawns the periodic sweep as a background task and returns its handle.
    /// Dropping the handle does not stop the sweep; abort it explicitly if
    /// the caller needs a clean shutdown.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.sweep_interval);
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact_store::InMemoryArtifactStore;
    use crate::task_state_store::InMemoryTaskStateStore;
    use tl_core::artifact::CreateArtifactRequest;
    use tl_core::task_state::TaskState;

    #[tokio::test]
    async fn sweep_reaps_expired_and_their_artifacts() {
        let task_states = Arc::new(InMemoryTaskStateStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());

        let now = chrono::Utc::now();
        let mut expired = TaskState::new("t1", "ctx-1", now);
        expired.completed = true;
        expired.completed_at = Some(now - ChronoDuration::hours(2));
        task_states.save(expired).await.unwrap();

        artifacts
            .create_data_artifact(CreateArtifactRequest {
                artifact_id: "a1".into(),
                task_id: "t1".into(),
                context_id: "ctx-1".into(),
                name: None,
                r#override: false,
            })
            .await
            .unwrap();

        let service = StateCleanupService::new(
            task_states.clone(),
            artifacts.clone(),
            CleanupConfig { ttl: ChronoDuration::hours(1), sweep_interval: StdDuration::from_secs(3600) },
        );

        let reaped = service.sweep_once().await;
        assert_eq!(reaped, 1);
        assert!(task_states.get("t1").await.unwrap().is_none());
        assert!(artifacts.list_artifacts("ctx-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_leaves_non_expired_alone() {
        let task_states = Arc::new(InMemoryTaskStateStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let running = TaskState::new("t1", "ctx-1", chrono::Utc::now());
        task_states.save(running).await.unwrap();

        let service = StateCleanupService::new(task_states.clone(), artifacts, CleanupConfig::default());
        let reaped = service.sweep_once().await;
        assert_eq!(reaped, 0);
        assert!(task_states.get("t1").await.unwrap().is_some());
    }
}
