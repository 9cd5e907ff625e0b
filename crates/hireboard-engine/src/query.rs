//! Query channel: ad-hoc server-side searches that override the grouping.
//!
//! Runs are not queued. Each dispatch bumps a generation counter, and an
//! outcome is only accepted if no newer query (or filter reset) was issued
//! after it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;

use hireboard_remote::DynBackend;
use hireboard_types::{Application, JobId, Result, SearchCriteria};

use crate::events::{Notification, NotificationEmitter};
use crate::view::FilteredView;

#[derive(Debug)]
pub struct QueryOutcome {
    pub generation: u64,
    pub criteria: SearchCriteria,
    pub result: Result<Vec<Application>>,
}

/// A search in flight. Await it, then pass the outcome to the board.
#[must_use = "a search does nothing until awaited and passed to receive_query"]
pub struct PendingQuery {
    generation: u64,
    future: BoxFuture<'static, QueryOutcome>,
}

impl PendingQuery {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Future for PendingQuery {
    type Output = QueryOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for PendingQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQuery")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

pub struct QueryChannel {
    backend: DynBackend,
    job_id: JobId,
    events: NotificationEmitter,
    generation: u64,
    pending: bool,
}

impl QueryChannel {
    pub fn new(backend: DynBackend, job_id: JobId, events: NotificationEmitter) -> Self {
        Self {
            backend,
            job_id,
            events,
            generation: 0,
            pending: false,
        }
    }

    /// Start a search. Empty criteria mean "no filter": nothing is sent, any
    /// in-flight query is abandoned, and `None` is returned.
    pub fn run_query(&mut self, criteria: SearchCriteria) -> Option<PendingQuery> {
        self.generation += 1;
        if criteria.is_empty() {
            self.pending = false;
            return None;
        }
        self.pending = true;

        let generation = self.generation;
        let backend = self.backend.clone();
        let job_id = self.job_id.clone();
        tracing::info!(generation, job = %job_id, "Dispatching query");
        let future = async move {
            let result = backend.search(&job_id, &criteria).await;
            QueryOutcome {
                generation,
                criteria,
                result,
            }
        }
        .boxed();
        Some(PendingQuery { generation, future })
    }

    /// Drop whatever is in flight; its outcome will be ignored.
    pub fn abandon(&mut self) {
        self.generation += 1;
        self.pending = false;
    }

    /// Turn an outcome into the filtered view to show, or `None` when a newer
    /// query has superseded it. A failed query still yields a view, empty and
    /// carrying the error.
    pub fn accept(&mut self, outcome: QueryOutcome) -> Option<FilteredView> {
        if outcome.generation != self.generation {
            tracing::debug!(
                generation = outcome.generation,
                current = self.generation,
                "Dropping superseded query result"
            );
            return None;
        }
        self.pending = false;

        match outcome.result {
            Ok(applications) => {
                tracing::info!(generation = outcome.generation, results = applications.len(), "Query accepted");
                Some(FilteredView {
                    criteria: outcome.criteria,
                    applications,
                    error: None,
                })
            }
            Err(err) => {
                let error = err.to_string();
                self.events.emit(Notification::QueryFailed {
                    generation: outcome.generation,
                    error: error.clone(),
                });
                Some(FilteredView {
                    criteria: outcome.criteria,
                    applications: Vec::new(),
                    error: Some(error),
                })
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
