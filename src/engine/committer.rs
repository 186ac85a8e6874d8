//! Assignment committer.
//!
//! Writes the winning candidate back to the store, one conditional update per
//! task. A task whose state changed since the snapshot is skipped and logged,
//! never aborting the rest of the batch. Tasks the optimizer left unassigned
//! are untouched and picked up by the next run.

use tracing::warn;

use crate::store::{Snapshot, StoreResult, TaskStore};

use super::codec::Chromosome;

/// Per-run commit tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Assignments written to the store.
    pub committed: usize,
    /// Assignments skipped because the task changed concurrently.
    pub conflicts: usize,
    /// Tasks the optimizer left without a worker.
    pub unassigned: usize,
}

/// Commit every assigned gene of the winning candidate.
pub async fn commit(
    store: &TaskStore,
    snapshot: &Snapshot,
    winner: &Chromosome,
) -> StoreResult<CommitSummary> {
    let mut summary = CommitSummary::default();

    for (t, gene) in winner.iter().enumerate() {
        let Some(w) = *gene else {
            summary.unassigned += 1;
            continue;
        };

        let task = &snapshot.tasks[t];
        let worker = &snapshot.workers[w];

        if store.commit_assignment(task.id, worker.id).await? {
            summary.committed += 1;
        } else {
            warn!(
                task = %task.id,
                worker = %worker.id,
                "task changed since snapshot, skipping assignment"
            );
            summary.conflicts += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{sample_task, sample_worker};
    use crate::store::{Department, Level, Shift, TaskStatus};

    #[tokio::test]
    async fn test_commit_writes_assignments() {
        let store = TaskStore::open_in_memory().unwrap();
        store
            .insert_task(sample_task(Department::Cleaning, Level::High))
            .await
            .unwrap();
        store
            .insert_worker(sample_worker(Department::Cleaning, Shift::Morning))
            .await
            .unwrap();
        let snapshot = store.snapshot().await.unwrap();

        let summary = commit(&store, &snapshot, &vec![Some(0)]).await.unwrap();
        assert_eq!(
            summary,
            CommitSummary {
                committed: 1,
                conflicts: 0,
                unassigned: 0
            }
        );

        let task = store.get_task(snapshot.tasks[0].id).await.unwrap().unwrap();
        assert!(task.assigned);
        assert_eq!(task.assigned_worker, Some(snapshot.workers[0].id));
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_concurrent_change_is_skipped_not_fatal() {
        let store = TaskStore::open_in_memory().unwrap();
        store
            .insert_task(sample_task(Department::Cleaning, Level::High))
            .await
            .unwrap();
        store
            .insert_task(sample_task(Department::Cleaning, Level::Low))
            .await
            .unwrap();
        store
            .insert_worker(sample_worker(Department::Cleaning, Shift::Morning))
            .await
            .unwrap();
        store
            .insert_worker(sample_worker(Department::Cleaning, Shift::Evening))
            .await
            .unwrap();
        let snapshot = store.snapshot().await.unwrap();

        // An admin cancels the first task between snapshot and commit.
        store
            .set_task_status(snapshot.tasks[0].id, TaskStatus::Cancelled)
            .await
            .unwrap();

        let summary = commit(&store, &snapshot, &vec![Some(0), Some(1)])
            .await
            .unwrap();
        assert_eq!(summary.conflicts, 1);
        assert_eq!(summary.committed, 1, "remaining tasks still commit");

        let cancelled = store.get_task(snapshot.tasks[0].id).await.unwrap().unwrap();
        assert!(!cancelled.assigned, "skipped task is left untouched");
    }

    #[tokio::test]
    async fn test_unassigned_genes_leave_tasks_alone() {
        let store = TaskStore::open_in_memory().unwrap();
        store
            .insert_task(sample_task(Department::Spill, Level::High))
            .await
            .unwrap();
        let snapshot = store.snapshot().await.unwrap();

        let summary = commit(&store, &snapshot, &vec![None]).await.unwrap();
        assert_eq!(summary.unassigned, 1);

        let task = store.get_task(snapshot.tasks[0].id).await.unwrap().unwrap();
        assert!(!task.assigned);
        assert_eq!(task.status, TaskStatus::Incomplete);
        assert_eq!(task.assigned_worker, None);
    }
}
