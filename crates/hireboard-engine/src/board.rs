//! The pipeline board: the single owner of store, selection, view and history.
//!
//! Every method here is synchronous and mutates local state immediately.
//! Remote work comes back as a pending future ([`PendingCommit`],
//! [`PendingQuery`], [`PendingDelete`]) that the caller awaits or spawns, then
//! feeds back through the matching `settle_*` / `receive_query` method.

use std::collections::{HashMap, HashSet};

use hireboard_remote::DynBackend;
use hireboard_types::{
    Application, ApplicationId, Batch, Direction, HireboardError, JobId, Result, SearchCriteria,
    StageMetrics, Status, StatusChange,
};

use crate::config::EngineConfig;
use crate::delete::{self, DeleteReport, PendingDelete};
use crate::events::{Notification, NotificationEmitter};
use crate::history::CommandHistory;
use crate::query::{PendingQuery, QueryChannel, QueryOutcome};
use crate::selection::SelectionModel;
use crate::store::{apply_to, EntityStore};
use crate::sync::{CommitReport, PendingCommit, SettleSummary, SyncCoordinator};
use crate::view::{Projection, ViewMode, ViewResolver};

/// Interaction phase of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardPhase {
    Idle,
    Dragging,
    /// At least one batch is in flight. Input is not blocked.
    Committing,
}

// ---------------------------------------------------------------------------
// PipelineBoard
// ---------------------------------------------------------------------------

pub struct PipelineBoard {
    job_id: JobId,
    config: EngineConfig,
    backend: DynBackend,
    events: NotificationEmitter,
    store: EntityStore,
    selection: SelectionModel,
    view: ViewResolver,
    history: CommandHistory<Batch>,
    sync: SyncCoordinator,
    query: QueryChannel,
    dragging: Option<Vec<ApplicationId>>,
    pending_delete: Option<Vec<ApplicationId>>,
    deleting: usize,
}

impl PipelineBoard {
    /// Build a board over an already loaded set of applications.
    pub fn new(
        job_id: JobId,
        backend: DynBackend,
        config: EngineConfig,
        applications: Vec<Application>,
    ) -> Self {
        let events = NotificationEmitter::new(config.event_capacity.max(1));
        let sync = SyncCoordinator::new(backend.clone(), events.clone(), config.rollback_on_failure);
        let query = QueryChannel::new(backend.clone(), job_id.clone(), events.clone());
        Self {
            history: CommandHistory::with_limit(config.history_limit),
            store: EntityStore::new(applications),
            selection: SelectionModel::new(),
            view: ViewResolver::new(),
            dragging: None,
            pending_delete: None,
            deleting: 0,
            job_id,
            config,
            backend,
            events,
            sync,
            query,
        }
    }

    /// Load the job posting's pipeline from `backend` and open a board on it.
    ///
    /// Stage metrics are best-effort: a failing analytics source only means
    /// focused columns carry no metrics.
    pub async fn open(job_id: JobId, backend: DynBackend, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let applications = backend.load_pipeline(&job_id).await?;
        tracing::info!(
            job = %job_id,
            backend = backend.name(),
            applications = applications.len(),
            "Pipeline opened"
        );
        let metrics = load_metrics(&backend, &job_id).await;
        let mut board = Self::new(job_id, backend, config, applications);
        board.view.set_metrics(metrics);
        Ok(board)
    }

    /// Replace the store with a fresh snapshot. Selected ids that no longer
    /// exist are dropped.
    pub async fn reload(&mut self) -> Result<()> {
        let applications = self.backend.load_pipeline(&self.job_id).await?;
        let metrics = load_metrics(&self.backend, &self.job_id).await;
        self.store.replace(applications);
        self.view.set_metrics(metrics);
        let store = &self.store;
        self.selection.retain(|id| store.contains(id));
        if let Some(ids) = self.pending_delete.as_mut() {
            ids.retain(|id| store.contains(id));
            if ids.is_empty() {
                self.pending_delete = None;
            }
        }
        Ok(())
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    // --- read side ---

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn history(&self) -> &CommandHistory<Batch> {
        &self.history
    }

    pub fn mode(&self) -> &ViewMode {
        self.view.mode()
    }

    pub fn metrics(&self, stage: Status) -> Option<StageMetrics> {
        self.view.metrics(stage)
    }

    pub fn projection(&self) -> Projection<'_> {
        self.view.projection(self.store.applications())
    }

    pub fn navigable(&self) -> Vec<Vec<ApplicationId>> {
        self.view.navigable(self.store.applications())
    }

    pub fn visible_ids(&self) -> Vec<ApplicationId> {
        self.view.visible_ids(self.store.applications())
    }

    /// Selected ids that are visible in the active view, in view order.
    pub fn selected_ids(&self) -> Vec<ApplicationId> {
        self.selection.ordered(&self.visible_ids())
    }

    pub fn phase(&self) -> BoardPhase {
        if self.dragging.is_some() {
            BoardPhase::Dragging
        } else if self.sync.in_flight() > 0 {
            BoardPhase::Committing
        } else {
            BoardPhase::Idle
        }
    }

    /// The ids being dragged, if a drag is in progress.
    pub fn dragging(&self) -> Option<&[ApplicationId]> {
        self.dragging.as_deref()
    }

    /// Ids armed for deletion and awaiting confirmation.
    pub fn pending_delete(&self) -> Option<&[ApplicationId]> {
        self.pending_delete.as_deref()
    }

    pub fn is_query_pending(&self) -> bool {
        self.query.is_pending()
    }

    fn is_visible(&self, id: &ApplicationId) -> bool {
        self.visible_ids().contains(id)
    }

    fn is_known(&self, id: &ApplicationId) -> bool {
        self.store.contains(id) || in_filtered(self.view.mode(), id)
    }

    // --- selection ---

    /// Flip `id` in the selection. Ids outside the active view are ignored.
    pub fn toggle(&mut self, id: &ApplicationId) -> bool {
        if !self.is_visible(id) {
            return false;
        }
        self.selection.toggle(id.clone())
    }

    pub fn range_select(&mut self, id: &ApplicationId) {
        let order = self.visible_ids();
        if !order.contains(id) {
            return;
        }
        self.selection.range_select(id.clone(), &order);
    }

    pub fn select_exactly(&mut self, ids: &[ApplicationId]) {
        let visible: HashSet<ApplicationId> = self.visible_ids().into_iter().collect();
        self.selection
            .select_exactly(ids.iter().filter(|id| visible.contains(*id)).cloned());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- view mode ---

    /// Drill into one column. Withdrawn has no column and is rejected.
    pub fn focus_stage(&mut self, stage: Status) -> Result<()> {
        if !stage.is_column() {
            return Err(HireboardError::NotAColumn(stage));
        }
        self.switch_mode(ViewMode::Focused(stage));
        Ok(())
    }

    pub fn show_canonical(&mut self) {
        self.switch_mode(ViewMode::Canonical);
    }

    fn switch_mode(&mut self, mode: ViewMode) {
        self.query.abandon();
        self.dragging = None;
        self.selection.clear();
        self.view.set_mode(mode);
    }

    // --- drag gestures ---

    /// Begin dragging from `id`. An unselected card becomes the only
    /// selection first. Returns how many cards are being dragged.
    pub fn start_drag(&mut self, id: &ApplicationId) -> usize {
        let order = self.visible_ids();
        if !order.contains(id) {
            return 0;
        }
        if !self.selection.contains(id) {
            self.selection.select_exactly([id.clone()]);
        }
        let ids = self.selection.ordered(&order);
        let count = ids.len();
        tracing::debug!(%id, count, "Drag started");
        self.dragging = Some(ids);
        count
    }

    pub fn cancel_drag(&mut self) {
        if self.dragging.take().is_some() {
            tracing::debug!("Drag cancelled");
        }
    }

    /// Release the drag over `target`. Dropping over nothing, over Withdrawn
    /// or back onto the cards' own column returns to idle without a batch.
    pub fn end_drag(&mut self, target: Option<Status>) -> Option<PendingCommit> {
        let ids = self.dragging.take()?;
        let to = target.filter(|s| s.is_column())?;
        self.move_ids(&ids, to)
    }

    /// Move the current selection to `to`, exactly as dropping it there would.
    pub fn move_selection(&mut self, to: Status) -> Option<PendingCommit> {
        self.dragging = None;
        if !to.is_column() {
            return None;
        }
        let ids = self.selected_ids();
        self.move_ids(&ids, to)
    }

    fn move_ids(&mut self, ids: &[ApplicationId], to: Status) -> Option<PendingCommit> {
        let store = self.store.applications();
        let changes: Vec<StatusChange> = ids
            .iter()
            .filter_map(|id| {
                let shown = self.view.visible_status(store, id)?;
                // The store is authoritative; filtered rows only cover ids it lacks.
                let from = self.store.status_of(id).unwrap_or(shown);
                (from != to).then(|| StatusChange::new(id.clone(), from, to))
            })
            .collect();
        if changes.is_empty() {
            tracing::debug!(target = %to, "Nothing to move");
            return None;
        }
        let batch = match Batch::new(changes) {
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected batch");
                return None;
            }
        };

        self.history.record(batch.clone());
        self.apply_locally(&batch, Direction::Forward);
        self.selection.clear();
        self.dispatch(&batch, Direction::Forward)
    }

    // --- history ---

    /// Revert the most recent batch locally and on the server.
    pub fn undo(&mut self) -> Option<PendingCommit> {
        let replay = self.history.undo()?;
        self.apply_locally(&replay.command, replay.direction);
        self.dispatch(&replay.command, replay.direction)
    }

    pub fn redo(&mut self) -> Option<PendingCommit> {
        let replay = self.history.redo()?;
        self.apply_locally(&replay.command, replay.direction);
        self.dispatch(&replay.command, replay.direction)
    }

    fn apply_locally(&mut self, batch: &Batch, direction: Direction) {
        self.store.apply_batch(batch, direction);
        if let ViewMode::Filtered(view) = self.view.mode_mut() {
            apply_to(&mut view.applications, batch, direction);
        }
    }

    fn dispatch(&mut self, batch: &Batch, direction: Direction) -> Option<PendingCommit> {
        let store = &self.store;
        let mode = self.view.mode();
        self.sync
            .commit(batch, direction, |id| store.contains(id) || in_filtered(mode, id))
    }

    /// Fold a finished commit back into the board.
    pub fn settle_commit(&mut self, report: CommitReport) -> SettleSummary {
        let summary = self.sync.settle(report, &mut self.store);
        if let ViewMode::Filtered(view) = self.view.mode_mut() {
            for remote in &summary.confirmed {
                if let Some(row) = view.applications.iter_mut().find(|a| a.id == remote.id) {
                    *row = remote.clone();
                }
            }
            for (id, status) in &summary.rolled_back {
                if let Some(row) = view.applications.iter_mut().find(|a| &a.id == id) {
                    row.status = *status;
                }
            }
        }
        summary
    }

    // --- filters ---

    /// Run a server-side search. Empty criteria clear the filter instead.
    pub fn apply_filters(&mut self, criteria: SearchCriteria) -> Option<PendingQuery> {
        self.selection.clear();
        if criteria.is_empty() {
            self.clear_filters();
            return None;
        }
        self.query.run_query(criteria)
    }

    /// Leave Filtered mode and drop any search still in flight.
    pub fn clear_filters(&mut self) {
        self.query.abandon();
        self.selection.clear();
        if self.view.mode().is_filtered() {
            self.view.set_mode(ViewMode::Canonical);
        }
    }

    /// Install a finished search. Returns `false` when a newer search or a
    /// mode switch superseded it.
    pub fn receive_query(&mut self, outcome: QueryOutcome) -> bool {
        match self.query.accept(outcome) {
            Some(mut filtered) => {
                for row in &mut filtered.applications {
                    if let Some(status) = self.store.status_of(&row.id) {
                        row.status = status;
                    }
                }
                self.dragging = None;
                self.selection.clear();
                self.view.set_mode(ViewMode::Filtered(filtered));
                true
            }
            None => false,
        }
    }

    // --- two-phase delete ---

    /// Arm a delete for `ids`, or for the visible selection when `None`.
    /// Returns how many applications are awaiting confirmation.
    pub fn request_delete(&mut self, ids: Option<Vec<ApplicationId>>) -> usize {
        let candidates = ids.unwrap_or_else(|| self.selected_ids());
        let mut seen = HashSet::new();
        let armed: Vec<ApplicationId> = candidates
            .into_iter()
            .filter(|id| self.is_known(id) && seen.insert(id.clone()))
            .collect();
        let count = armed.len();
        self.pending_delete = (!armed.is_empty()).then_some(armed);
        count
    }

    pub fn cancel_delete(&mut self) -> bool {
        self.pending_delete.take().is_some()
    }

    /// Send the armed delete. Nothing is removed locally until it settles.
    pub fn confirm_delete(&mut self) -> Option<PendingDelete> {
        let ids = self.pending_delete.take()?;
        self.deleting += 1;
        Some(delete::dispatch(self.backend.clone(), self.events.clone(), ids))
    }

    /// Prune every id the server deleted from the store, the selection and
    /// the filtered rows. Ids that failed are armed again so the user can
    /// retry the confirmation.
    pub fn settle_delete(&mut self, report: DeleteReport) -> Vec<ApplicationId> {
        self.deleting = self.deleting.saturating_sub(1);
        let deleted = report.deleted();
        let failed: Vec<ApplicationId> = report.failures().into_iter().map(|f| f.id).collect();

        self.store.remove(&deleted);
        self.selection.remove(&deleted);
        if let Some(dragged) = self.dragging.as_mut() {
            dragged.retain(|id| !deleted.contains(id));
        }
        if let ViewMode::Filtered(view) = self.view.mode_mut() {
            view.applications.retain(|a| !deleted.contains(&a.id));
        }
        if !deleted.is_empty() && failed.is_empty() {
            self.selection.clear();
        }
        if !failed.is_empty() && self.pending_delete.is_none() {
            tracing::warn!(failed = failed.len(), "Delete left armed for retry");
            self.pending_delete = Some(failed);
        }
        deleted
    }

    /// Number of confirmed deletes not yet settled.
    pub fn deletes_in_flight(&self) -> usize {
        self.deleting
    }
}

fn in_filtered(mode: &ViewMode, id: &ApplicationId) -> bool {
    match mode {
        ViewMode::Filtered(view) => view.applications.iter().any(|a| &a.id == id),
        ViewMode::Canonical | ViewMode::Focused(_) => false,
    }
}

async fn load_metrics(backend: &DynBackend, job_id: &JobId) -> HashMap<Status, StageMetrics> {
    match backend.stage_metrics(job_id).await {
        Ok(metrics) => metrics,
        Err(err) => {
            tracing::warn!(job = %job_id, error = %err, "Stage metrics unavailable");
            HashMap::new()
        }
    }
}
