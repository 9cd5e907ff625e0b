use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use hireboard_types::{
    Application, ApplicationId, JobId, Result, SearchCriteria, StageMetrics, Status,
};

// ---------------------------------------------------------------------------
// PipelineBackend
// ---------------------------------------------------------------------------

/// The remote system of record the board keeps itself consistent with.
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    /// Full snapshot of every application for the job posting.
    async fn load_pipeline(&self, job_id: &JobId) -> Result<Vec<Application>>;

    /// Move one application to `status`, returning the server's copy.
    async fn update_status(&self, id: &ApplicationId, status: Status) -> Result<Application>;

    /// Server-side filtered search, scoped to the job posting.
    async fn search(&self, job_id: &JobId, criteria: &SearchCriteria)
        -> Result<Vec<Application>>;

    async fn delete_application(&self, id: &ApplicationId) -> Result<()>;

    /// Per-stage analytics. Backends without an analytics source return nothing.
    async fn stage_metrics(&self, _job_id: &JobId) -> Result<HashMap<Status, StageMetrics>> {
        Ok(HashMap::new())
    }

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// DynBackend
// ---------------------------------------------------------------------------

/// Cheaply clonable handle to a backend, so in-flight requests can outlive
/// the borrow of whoever dispatched them.
#[derive(Clone)]
pub struct DynBackend(Arc<dyn PipelineBackend>);

impl DynBackend {
    pub fn new(backend: impl PipelineBackend + 'static) -> Self {
        Self(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn PipelineBackend>) -> Self {
        Self(backend)
    }

    pub async fn load_pipeline(&self, job_id: &JobId) -> Result<Vec<Application>> {
        self.0.load_pipeline(job_id).await
    }

    pub async fn update_status(&self, id: &ApplicationId, status: Status) -> Result<Application> {
        self.0.update_status(id, status).await
    }

    pub async fn search(
        &self,
        job_id: &JobId,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Application>> {
        self.0.search(job_id, criteria).await
    }

    pub async fn delete_application(&self, id: &ApplicationId) -> Result<()> {
        self.0.delete_application(id).await
    }

    pub async fn stage_metrics(&self, job_id: &JobId) -> Result<HashMap<Status, StageMetrics>> {
        self.0.stage_metrics(job_id).await
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }
}

impl std::fmt::Debug for DynBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynBackend").field(&self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
