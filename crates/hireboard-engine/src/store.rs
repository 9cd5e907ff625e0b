//! Entity store: the locally cached applications of the open job posting.
//!
//! Every mutation here is synchronous and total. Ids the store does not know
//! are skipped, since the local and remote views can diverge transiently.

use std::collections::{HashMap, HashSet};

use hireboard_types::{Application, ApplicationId, Batch, Direction, Status};

#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    applications: Vec<Application>,
}

/// Set the status of every application named in `batch` to its target for
/// `direction`. Returns how many records changed.
pub(crate) fn apply_to(applications: &mut [Application], batch: &Batch, direction: Direction) -> usize {
    let targets: HashMap<&ApplicationId, Status> = batch
        .changes()
        .iter()
        .map(|c| (&c.id, c.target(direction)))
        .collect();
    let mut applied = 0;
    for app in applications.iter_mut() {
        if let Some(status) = targets.get(&app.id) {
            app.status = *status;
            applied += 1;
        }
    }
    applied
}

impl EntityStore {
    pub fn new(applications: Vec<Application>) -> Self {
        Self { applications }
    }

    /// Full reload from a fresh snapshot.
    pub fn replace(&mut self, applications: Vec<Application>) {
        tracing::debug!(count = applications.len(), "Entity store replaced");
        self.applications = applications;
    }

    pub fn apply_batch(&mut self, batch: &Batch, direction: Direction) -> usize {
        let applied = apply_to(&mut self.applications, batch, direction);
        tracing::debug!(
            batch = %batch.id(),
            ?direction,
            applied,
            skipped = batch.len().saturating_sub(applied),
            "Batch applied locally"
        );
        applied
    }

    /// Remove every listed id; returns the records that were removed.
    pub fn remove(&mut self, ids: &[ApplicationId]) -> Vec<Application> {
        let doomed: HashSet<&ApplicationId> = ids.iter().collect();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.applications)
            .into_iter()
            .partition(|a| doomed.contains(&a.id));
        self.applications = kept;
        removed
    }

    /// Overwrite one record's status. Returns `false` for unknown ids.
    pub fn set_status(&mut self, id: &ApplicationId, status: Status) -> bool {
        match self.applications.iter_mut().find(|a| &a.id == id) {
            Some(app) => {
                app.status = status;
                true
            }
            None => false,
        }
    }

    /// Replace a record with the server's confirmed copy, keeping its
    /// position. Unknown ids are ignored rather than inserted.
    pub fn merge_remote(&mut self, remote: Application) -> bool {
        match self.applications.iter_mut().find(|a| a.id == remote.id) {
            Some(app) => {
                *app = remote;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ApplicationId) -> Option<&Application> {
        self.applications.iter().find(|a| &a.id == id)
    }

    pub fn status_of(&self, id: &ApplicationId) -> Option<Status> {
        self.get(id).map(|a| a.status)
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        self.get(id).is_some()
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}
