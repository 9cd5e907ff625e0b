use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use hireboard_types::{
    Application, ApplicationId, HireboardError, JobId, PipelineSnapshot, Result, SearchCriteria,
    StageMetrics, Status,
};

use crate::PipelineBackend;

/// One recorded `update_status` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub id: ApplicationId,
    pub status: Status,
}

struct MemoryState {
    snapshot: PipelineSnapshot,
    failing_updates: HashSet<ApplicationId>,
    failing_deletes: HashSet<ApplicationId>,
    search_failure: Option<String>,
    update_calls: Vec<UpdateCall>,
    delete_calls: Vec<ApplicationId>,
}

/// A system of record held in memory, seeded from a [`PipelineSnapshot`].
///
/// Failures can be injected per application id, and every call is recorded
/// so callers can check exactly what reached the "server".
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new(snapshot: PipelineSnapshot) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                snapshot,
                failing_updates: HashSet::new(),
                failing_deletes: HashSet::new(),
                search_failure: None,
                update_calls: Vec::new(),
                delete_calls: Vec::new(),
            }),
        }
    }

    pub fn with_applications(job_id: JobId, applications: Vec<Application>) -> Self {
        Self::new(PipelineSnapshot::new(job_id, applications))
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_updates_for(&self, id: impl Into<ApplicationId>) {
        self.state().failing_updates.insert(id.into());
    }

    pub fn fail_deletes_for(&self, id: impl Into<ApplicationId>) {
        self.state().failing_deletes.insert(id.into());
    }

    pub fn fail_searches(&self, message: impl Into<String>) {
        self.state().search_failure = Some(message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_updates.clear();
        state.failing_deletes.clear();
        state.search_failure = None;
    }

    pub fn update_calls(&self) -> Vec<UpdateCall> {
        self.state().update_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<ApplicationId> {
        self.state().delete_calls.clone()
    }

    pub fn set_metrics(&self, metrics: HashMap<Status, StageMetrics>) {
        self.state().snapshot.metrics = metrics;
    }

    /// The server-side state as it stands now.
    pub fn snapshot(&self) -> PipelineSnapshot {
        let mut snapshot = self.state().snapshot.clone();
        snapshot.taken_at = chrono::Utc::now();
        snapshot
    }

    pub fn status_of(&self, id: &ApplicationId) -> Option<Status> {
        self.state()
            .snapshot
            .applications
            .iter()
            .find(|a| &a.id == id)
            .map(|a| a.status)
    }
}

fn injected_failure(operation: &str, id: &ApplicationId) -> HireboardError {
    HireboardError::Backend {
        operation: operation.into(),
        status: 503,
        message: format!("injected failure for {id}"),
        retryable: true,
    }
}

// ---------------------------------------------------------------------------
// Search emulation
// ---------------------------------------------------------------------------

fn payload_str<'a>(app: &'a Application, key: &str) -> Option<&'a str> {
    app.payload.get(key).and_then(|v| v.as_str())
}

fn text_matches(app: &Application, needle: &str) -> bool {
    fn contains(value: &serde_json::Value, needle: &str) -> bool {
        match value {
            serde_json::Value::String(s) => s.to_lowercase().contains(needle),
            serde_json::Value::Array(items) => items.iter().any(|v| contains(v, needle)),
            serde_json::Value::Object(map) => map.values().any(|v| contains(v, needle)),
            _ => false,
        }
    }
    app.id.as_str().to_lowercase().contains(needle)
        || app.payload.values().any(|v| contains(v, needle))
}

fn applied_on(app: &Application) -> Option<chrono::NaiveDate> {
    let raw = payload_str(app, "applied_at")?;
    let date = raw.get(..10).unwrap_or(raw);
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn satisfies(app: &Application, criteria: &SearchCriteria) -> bool {
    if let Some(text) = criteria.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        if !text_matches(app, &text.to_lowercase()) {
            return false;
        }
    }

    let wanted: Vec<String> = criteria
        .skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if !wanted.is_empty() {
        let have: HashSet<String> = app
            .payload
            .get("skills")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        if !wanted.iter().all(|s| have.contains(s)) {
            return false;
        }
    }

    if let Some(institution) = criteria
        .institution
        .as_deref()
        .map(str::trim)
        .filter(|i| !i.is_empty())
    {
        match payload_str(app, "institution") {
            Some(value) if value.eq_ignore_ascii_case(institution) => {}
            _ => return false,
        }
    }

    if criteria.applied_from.is_some() || criteria.applied_to.is_some() {
        let Some(date) = applied_on(app) else {
            return false;
        };
        if criteria.applied_from.is_some_and(|from| date < from) {
            return false;
        }
        if criteria.applied_to.is_some_and(|to| date > to) {
            return false;
        }
    }

    true
}

// ---------------------------------------------------------------------------
// PipelineBackend impl
// ---------------------------------------------------------------------------

#[async_trait]
impl PipelineBackend for InMemoryBackend {
    async fn load_pipeline(&self, job_id: &JobId) -> Result<Vec<Application>> {
        let state = self.state();
        if &state.snapshot.job_id != job_id {
            tracing::warn!(requested = %job_id, held = %state.snapshot.job_id, "Unknown job posting");
            return Ok(Vec::new());
        }
        Ok(state.snapshot.applications.clone())
    }

    async fn update_status(&self, id: &ApplicationId, status: Status) -> Result<Application> {
        let mut state = self.state();
        state.update_calls.push(UpdateCall {
            id: id.clone(),
            status,
        });
        if state.failing_updates.contains(id) {
            return Err(injected_failure("update_status", id));
        }
        let app = state
            .snapshot
            .applications
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| HireboardError::NotFound { id: id.to_string() })?;
        app.status = status;
        Ok(app.clone())
    }

    async fn search(
        &self,
        job_id: &JobId,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Application>> {
        let state = self.state();
        if let Some(ref message) = state.search_failure {
            return Err(HireboardError::Backend {
                operation: "search".into(),
                status: 500,
                message: message.clone(),
                retryable: true,
            });
        }
        if &state.snapshot.job_id != job_id {
            return Ok(Vec::new());
        }
        Ok(state
            .snapshot
            .applications
            .iter()
            .filter(|a| satisfies(a, criteria))
            .cloned()
            .collect())
    }

    async fn delete_application(&self, id: &ApplicationId) -> Result<()> {
        let mut state = self.state();
        state.delete_calls.push(id.clone());
        if state.failing_deletes.contains(id) {
            return Err(injected_failure("delete_application", id));
        }
        let before = state.snapshot.applications.len();
        state.snapshot.applications.retain(|a| &a.id != id);
        if state.snapshot.applications.len() == before {
            return Err(HireboardError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn stage_metrics(&self, job_id: &JobId) -> Result<HashMap<Status, StageMetrics>> {
        let state = self.state();
        if &state.snapshot.job_id != job_id {
            return Ok(HashMap::new());
        }
        Ok(state.snapshot.metrics.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
