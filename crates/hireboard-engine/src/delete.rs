//! Remote deletion of confirmed applications.
//!
//! Deletes fan out one call per id, like batch commits, and report back in a
//! single [`DeleteReport`]. The board only prunes what the server confirmed.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use hireboard_remote::DynBackend;
use hireboard_types::{ApplicationId, Result};

use crate::events::{ItemFailure, Notification, NotificationEmitter};

#[derive(Debug)]
pub struct DeleteReport {
    pub items: Vec<(ApplicationId, Result<()>)>,
}

impl DeleteReport {
    pub fn deleted(&self) -> Vec<ApplicationId> {
        self.items
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn failures(&self) -> Vec<ItemFailure> {
        self.items
            .iter()
            .filter_map(|(id, r)| {
                r.as_ref().err().map(|e| ItemFailure {
                    id: id.clone(),
                    error: e.to_string(),
                })
            })
            .collect()
    }
}

/// A confirmed delete in flight.
#[must_use = "a delete does nothing until awaited and passed to settle_delete"]
pub struct PendingDelete {
    count: usize,
    future: BoxFuture<'static, DeleteReport>,
}

impl PendingDelete {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Future for PendingDelete {
    type Output = DeleteReport;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for PendingDelete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDelete")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

pub(crate) fn dispatch(
    backend: DynBackend,
    events: NotificationEmitter,
    ids: Vec<ApplicationId>,
) -> PendingDelete {
    let count = ids.len();
    tracing::info!(count, "Dispatching delete");
    let future = async move {
        let calls = ids.into_iter().map(|id| {
            let backend = backend.clone();
            async move {
                let result = backend.delete_application(&id).await;
                (id, result)
            }
        });
        let report = DeleteReport {
            items: join_all(calls).await,
        };

        let failed = report.failures();
        if failed.is_empty() {
            events.emit(Notification::DeleteSucceeded {
                ids: report.deleted(),
            });
        } else {
            events.emit(Notification::DeleteFailed { count, failed });
        }
        report
    }
    .boxed();
    PendingDelete { count, future }
}
