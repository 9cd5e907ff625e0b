//! Sync coordinator: pushes locally applied batches to the backend.
//!
//! [`SyncCoordinator::commit`] returns immediately with a [`PendingCommit`]
//! future; the board stays interactive while it runs. Every dispatched change
//! is stamped with a monotonic sequence number, and [`SyncCoordinator::settle`]
//! discards outcomes that a later dispatch for the same application has
//! already superseded.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use hireboard_remote::DynBackend;
use hireboard_types::{Application, ApplicationId, Batch, Direction, Result, Status, StatusChange};

use crate::events::{ItemFailure, Notification, NotificationEmitter};
use crate::store::EntityStore;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of one remote status update.
#[derive(Debug)]
pub struct ItemOutcome {
    /// The change as dispatched: `from` is the status before the dispatch,
    /// `to` is the status sent to the backend.
    pub change: StatusChange,
    pub seq: u64,
    pub result: Result<Application>,
}

/// Every item of one batch dispatch, after all of them have settled.
#[derive(Debug)]
#[must_use = "pass the report to settle_commit so the batch leaves the in-flight count"]
pub struct CommitReport {
    pub batch_id: uuid::Uuid,
    pub direction: Direction,
    pub items: Vec<ItemOutcome>,
}

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.items.iter().all(|i| i.result.is_ok())
    }

    pub fn failures(&self) -> Vec<ItemFailure> {
        self.items
            .iter()
            .filter_map(|i| {
                i.result.as_ref().err().map(|e| ItemFailure {
                    id: i.change.id.clone(),
                    error: e.to_string(),
                })
            })
            .collect()
    }
}

/// What [`SyncCoordinator::settle`] did with a report.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SettleSummary {
    /// Server copies merged into the store.
    pub confirmed: Vec<Application>,
    /// Items whose outcome arrived after a newer dispatch for the same id.
    pub stale: Vec<ApplicationId>,
    /// Failed items reverted to their pre-dispatch status.
    pub rolled_back: Vec<(ApplicationId, Status)>,
    /// Failed items left in their optimistic state.
    pub kept: Vec<ApplicationId>,
}

/// A batch's remote calls in flight. Await it, or spawn it, then hand the
/// report back to the board.
#[must_use = "a commit does nothing until awaited and settled"]
pub struct PendingCommit {
    batch_id: uuid::Uuid,
    direction: Direction,
    future: BoxFuture<'static, CommitReport>,
}

impl PendingCommit {
    pub fn batch_id(&self) -> uuid::Uuid {
        self.batch_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Future for PendingCommit {
    type Output = CommitReport;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for PendingCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCommit")
            .field("batch_id", &self.batch_id)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SyncCoordinator
// ---------------------------------------------------------------------------

pub struct SyncCoordinator {
    backend: DynBackend,
    events: NotificationEmitter,
    rollback_on_failure: bool,
    next_seq: u64,
    latest: HashMap<ApplicationId, u64>,
    in_flight: usize,
}

impl SyncCoordinator {
    pub fn new(backend: DynBackend, events: NotificationEmitter, rollback_on_failure: bool) -> Self {
        Self {
            backend,
            events,
            rollback_on_failure,
            next_seq: 0,
            latest: HashMap::new(),
            in_flight: 0,
        }
    }

    /// Dispatch one remote update per change of `batch` in `direction`,
    /// concurrently. Changes for which `live` returns `false` are skipped;
    /// returns `None` when nothing is left to send.
    pub fn commit(
        &mut self,
        batch: &Batch,
        direction: Direction,
        live: impl Fn(&ApplicationId) -> bool,
    ) -> Option<PendingCommit> {
        let stamped: Vec<(StatusChange, u64)> = batch
            .effective(direction)
            .into_iter()
            .filter(|c| live(&c.id))
            .map(|change| {
                self.next_seq += 1;
                self.latest.insert(change.id.clone(), self.next_seq);
                (change, self.next_seq)
            })
            .collect();
        if stamped.is_empty() {
            tracing::debug!(batch = %batch.id(), "Nothing live to sync");
            return None;
        }

        let batch_id = batch.id();
        let count = stamped.len();
        tracing::info!(batch = %batch_id, ?direction, count, "Dispatching batch");
        self.events.emit(Notification::BatchPending {
            batch_id,
            direction,
            count,
        });
        self.in_flight += 1;

        let backend = self.backend.clone();
        let events = self.events.clone();
        let future = async move {
            let calls = stamped.into_iter().map(|(change, seq)| {
                let backend = backend.clone();
                async move {
                    let result = backend.update_status(&change.id, change.to).await;
                    ItemOutcome {
                        change,
                        seq,
                        result,
                    }
                }
            });
            let items = join_all(calls).await;
            let report = CommitReport {
                batch_id,
                direction,
                items,
            };

            let failed = report.failures();
            if failed.is_empty() {
                events.emit(Notification::BatchSucceeded {
                    batch_id,
                    direction,
                    count,
                });
            } else {
                tracing::warn!(batch = %batch_id, failed = failed.len(), count, "Batch partially failed");
                events.emit(Notification::BatchFailed {
                    batch_id,
                    direction,
                    count,
                    failed,
                });
            }
            report
        }
        .boxed();

        Some(PendingCommit {
            batch_id,
            direction,
            future,
        })
    }

    /// Fold a settled report back into the store.
    pub fn settle(&mut self, report: CommitReport, store: &mut EntityStore) -> SettleSummary {
        self.in_flight = self.in_flight.saturating_sub(1);
        let mut summary = SettleSummary::default();
        let mut restored = Vec::new();

        for item in report.items {
            let id = item.change.id.clone();
            if self.latest.get(&id) != Some(&item.seq) {
                tracing::warn!(batch = %report.batch_id, %id, seq = item.seq, "Discarding stale confirmation");
                self.events.emit(Notification::StaleConfirmation {
                    batch_id: report.batch_id,
                    id: id.clone(),
                });
                summary.stale.push(id);
                continue;
            }
            self.latest.remove(&id);

            match item.result {
                Ok(remote) => {
                    store.merge_remote(remote.clone());
                    summary.confirmed.push(remote);
                }
                Err(err) => {
                    let still_optimistic = store.status_of(&id) == Some(item.change.to);
                    if self.rollback_on_failure && still_optimistic {
                        store.set_status(&id, item.change.from);
                        tracing::info!(%id, status = %item.change.from, error = %err, "Rolled back failed update");
                        restored.push((id.clone(), item.change.from));
                        summary.rolled_back.push((id, item.change.from));
                    } else {
                        summary.kept.push(id);
                    }
                }
            }
        }

        if !restored.is_empty() {
            self.events.emit(Notification::RolledBack {
                batch_id: report.batch_id,
                restored,
            });
        }
        summary
    }

    /// Number of dispatched batches not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn rollback_on_failure(&self) -> bool {
        self.rollback_on_failure
    }
}
