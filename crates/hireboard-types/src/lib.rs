//! Shared types, errors, batches, and snapshots for the Hireboard applicant pipeline.
//!
//! This crate provides the foundational types used across all other Hireboard crates:
//! - `HireboardError`: unified error taxonomy
//! - `Status` / `Application`: the records the pipeline board organizes
//! - `StatusChange` / `Batch` / `Direction`: the immutable units of mutation
//! - `PipelineSnapshot`: serializable pipeline state for offline use

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unified error type for all Hireboard subsystems.
#[derive(Debug, thiserror::Error)]
pub enum HireboardError {
    // === Remote Errors ===
    #[error("Backend {operation} returned HTTP {status}: {message}")]
    Backend {
        operation: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Backend rejected the credentials for {operation}")]
    AuthError { operation: String },

    #[error("Application '{id}' not found")]
    NotFound { id: String },

    // === Engine Errors ===
    #[error("A batch must contain at least one status change")]
    EmptyBatch,

    #[error("Batch contains more than one change for application '{id}'")]
    DuplicateChange { id: String },

    #[error("Status '{0}' has no pipeline column")]
    NotAColumn(Status),

    #[error("Unknown application status '{0}'")]
    UnknownStatus(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl HireboardError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HireboardError::Backend { retryable: true, .. })
    }

    /// Returns `true` if the error refers to a record the backend no longer knows.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HireboardError::NotFound { .. })
    }
}

/// A convenience alias for `Result<T, HireboardError>`.
pub type Result<T> = std::result::Result<T, HireboardError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque identifier of one application, unique within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ApplicationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of the job posting whose pipeline is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Status: the stage an application sits in
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Applied,
    Reviewing,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
}

impl Status {
    /// The statuses that own a column on the board, in display order.
    pub const COLUMNS: [Status; 5] = [
        Status::Applied,
        Status::Reviewing,
        Status::Interview,
        Status::Offer,
        Status::Rejected,
    ];

    /// Withdrawn applications are tracked but never rendered in a column.
    pub fn is_column(self) -> bool {
        self.column_index().is_some()
    }

    /// Position of this status in [`Status::COLUMNS`].
    pub fn column_index(self) -> Option<usize> {
        Self::COLUMNS.iter().position(|s| *s == self)
    }

    /// The lowercase wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Applied => "applied",
            Status::Reviewing => "reviewing",
            Status::Interview => "interview",
            Status::Offer => "offer",
            Status::Rejected => "rejected",
            Status::Withdrawn => "withdrawn",
        }
    }

    /// Human-readable column heading.
    pub fn label(self) -> &'static str {
        match self {
            Status::Applied => "Applied",
            Status::Reviewing => "Reviewing",
            Status::Interview => "Interview",
            Status::Offer => "Offer",
            Status::Rejected => "Rejected",
            Status::Withdrawn => "Withdrawn",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = HireboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "applied" => Ok(Status::Applied),
            "reviewing" | "review" => Ok(Status::Reviewing),
            "interview" => Ok(Status::Interview),
            "offer" => Ok(Status::Offer),
            "rejected" => Ok(Status::Rejected),
            "withdrawn" => Ok(Status::Withdrawn),
            other => Err(HireboardError::UnknownStatus(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Application: one candidate's application to the open job posting
// ---------------------------------------------------------------------------

/// An application record. Everything except `id` and `status` is carried in
/// `payload` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub status: Status,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Application {
    pub fn new(id: impl Into<ApplicationId>, status: Status) -> Self {
        Self {
            id: id.into(),
            status,
            payload: serde_json::Map::new(),
        }
    }

    /// Builder-style helper for attaching a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// StatusChange / Direction / Batch
// ---------------------------------------------------------------------------

/// Which way a batch is applied: `Forward` moves `from → to`, `Reverse` moves `to → from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn inverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: ApplicationId,
    pub from: Status,
    pub to: Status,
}

impl StatusChange {
    pub fn new(id: impl Into<ApplicationId>, from: Status, to: Status) -> Self {
        Self {
            id: id.into(),
            from,
            to,
        }
    }

    /// The status this change leaves the application in.
    pub fn target(&self, direction: Direction) -> Status {
        match direction {
            Direction::Forward => self.to,
            Direction::Reverse => self.from,
        }
    }

    /// The status the application held before this change was applied.
    pub fn origin(&self, direction: Direction) -> Status {
        self.target(direction.inverse())
    }

    pub fn reversed(&self) -> Self {
        Self {
            id: self.id.clone(),
            from: self.to,
            to: self.from,
        }
    }
}

/// An immutable, non-empty group of status changes produced by one gesture.
///
/// No two changes share an application id. Undo and redo never mutate a
/// batch; they only choose the [`Direction`] it is applied in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    id: uuid::Uuid,
    changes: Vec<StatusChange>,
}

impl Batch {
    pub fn new(changes: Vec<StatusChange>) -> Result<Self> {
        if changes.is_empty() {
            return Err(HireboardError::EmptyBatch);
        }
        let mut seen = HashSet::with_capacity(changes.len());
        for change in &changes {
            if !seen.insert(&change.id) {
                return Err(HireboardError::DuplicateChange {
                    id: change.id.to_string(),
                });
            }
        }
        Ok(Self {
            id: uuid::Uuid::new_v4(),
            changes,
        })
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn changes(&self) -> &[StatusChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        self.changes.iter().any(|c| &c.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ApplicationId> {
        self.changes.iter().map(|c| &c.id)
    }

    /// The inverse batch. It keeps the same id: it is the same unit of work
    /// travelling the other way.
    pub fn reverse(&self) -> Self {
        Self {
            id: self.id,
            changes: self.changes.iter().map(StatusChange::reversed).collect(),
        }
    }

    /// The changes as they take effect when applied in `direction`.
    pub fn effective(&self, direction: Direction) -> Vec<StatusChange> {
        match direction {
            Direction::Forward => self.changes.clone(),
            Direction::Reverse => self.reverse().changes,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchCriteria: filters passed verbatim to the search collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_from: Option<chrono::NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_to: Option<chrono::NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
}

impl SearchCriteria {
    /// No field carries a value, i.e. "no active filter".
    pub fn is_empty(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map_or(true, |v| v.trim().is_empty());
        blank(&self.text)
            && self.skills.iter().all(|s| s.trim().is_empty())
            && self.applied_from.is_none()
            && self.applied_to.is_none()
            && blank(&self.institution)
    }
}

// ---------------------------------------------------------------------------
// StageMetrics: analytics passed through for the focused column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub avg_days_in_stage: f64,
}

// ---------------------------------------------------------------------------
// PipelineSnapshot: serializable pipeline state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub job_id: JobId,
    pub applications: Vec<Application>,
    #[serde(default)]
    pub metrics: HashMap<Status, StageMetrics>,
    pub taken_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineSnapshot {
    pub fn new(job_id: JobId, applications: Vec<Application>) -> Self {
        Self {
            job_id,
            applications,
            metrics: HashMap::new(),
            taken_at: chrono::Utc::now(),
        }
    }

    /// Serialize this snapshot to JSON and write it to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), applications = self.applications.len(), "Snapshot saved");
        Ok(())
    }

    /// Read a snapshot from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&data)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- HireboardError ---

    #[test]
    fn error_display_backend() {
        let err = HireboardError::Backend {
            operation: "update_status".into(),
            status: 503,
            message: "unavailable".into(),
            retryable: true,
        };
        assert_eq!(
            err.to_string(),
            "Backend update_status returned HTTP 503: unavailable"
        );
    }

    #[test]
    fn error_display_duplicate_change() {
        let err = HireboardError::DuplicateChange { id: "a-1".into() };
        assert_eq!(
            err.to_string(),
            "Batch contains more than one change for application 'a-1'"
        );
    }

    #[test]
    fn error_display_not_a_column() {
        let err = HireboardError::NotAColumn(Status::Withdrawn);
        assert_eq!(err.to_string(), "Status 'withdrawn' has no pipeline column");
    }

    #[test]
    fn retryable_only_when_flagged() {
        let transient = HireboardError::Backend {
            operation: "search".into(),
            status: 502,
            message: "bad gateway".into(),
            retryable: true,
        };
        let permanent = HireboardError::Backend {
            operation: "search".into(),
            status: 400,
            message: "bad request".into(),
            retryable: false,
        };
        assert!(transient.is_retryable());
        assert!(!permanent.is_retryable());
        assert!(!HireboardError::EmptyBatch.is_retryable());
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: HireboardError = json_err.into();
        assert!(matches!(err, HireboardError::Json(_)));
    }

    // --- Status ---

    #[test]
    fn status_serializes_to_snake_case() {
        assert_eq!(serde_json::to_string(&Status::Interview).unwrap(), "\"interview\"");
        let parsed: Status = serde_json::from_str("\"withdrawn\"").unwrap();
        assert_eq!(parsed, Status::Withdrawn);
    }

    #[test]
    fn status_from_str_is_case_insensitive() {
        assert_eq!("Offer".parse::<Status>().unwrap(), Status::Offer);
        assert_eq!(" REVIEWING ".parse::<Status>().unwrap(), Status::Reviewing);
        assert!(matches!(
            "hired".parse::<Status>(),
            Err(HireboardError::UnknownStatus(s)) if s == "hired"
        ));
    }

    #[test]
    fn withdrawn_has_no_column() {
        assert!(!Status::Withdrawn.is_column());
        assert_eq!(Status::COLUMNS.len(), 5);
        assert_eq!(Status::Rejected.column_index(), Some(4));
    }

    // --- Application ---

    #[test]
    fn application_payload_is_flattened() {
        let app = Application::new("a-1", Status::Applied)
            .with_field("candidate", serde_json::json!("Ada"));
        let json = serde_json::to_value(&app).unwrap();
        assert_eq!(json["id"], "a-1");
        assert_eq!(json["status"], "applied");
        assert_eq!(json["candidate"], "Ada");

        let back: Application = serde_json::from_value(json).unwrap();
        assert_eq!(back, app);
    }

    // --- Batch ---

    #[test]
    fn batch_rejects_empty() {
        assert!(matches!(Batch::new(vec![]), Err(HireboardError::EmptyBatch)));
    }

    #[test]
    fn batch_rejects_duplicate_ids() {
        let result = Batch::new(vec![
            StatusChange::new("x", Status::Applied, Status::Offer),
            StatusChange::new("x", Status::Offer, Status::Rejected),
        ]);
        assert!(matches!(result, Err(HireboardError::DuplicateChange { id }) if id == "x"));
    }

    #[test]
    fn batch_reverse_swaps_every_change_and_keeps_id() {
        let batch = Batch::new(vec![
            StatusChange::new("x", Status::Applied, Status::Interview),
            StatusChange::new("y", Status::Reviewing, Status::Interview),
        ])
        .unwrap();
        let reversed = batch.reverse();
        assert_eq!(reversed.id(), batch.id());
        assert_eq!(reversed.changes()[0].to, Status::Applied);
        assert_eq!(reversed.changes()[1].from, Status::Interview);
        assert_eq!(reversed.reverse(), batch);
    }

    #[test]
    fn change_target_follows_direction() {
        let change = StatusChange::new("x", Status::Applied, Status::Offer);
        assert_eq!(change.target(Direction::Forward), Status::Offer);
        assert_eq!(change.target(Direction::Reverse), Status::Applied);
        assert_eq!(change.origin(Direction::Reverse), Status::Offer);
    }

    // --- SearchCriteria ---

    #[test]
    fn blank_criteria_is_empty() {
        let criteria = SearchCriteria {
            text: Some("   ".into()),
            skills: vec!["".into()],
            ..Default::default()
        };
        assert!(criteria.is_empty());
        assert!(SearchCriteria::default().is_empty());
    }

    #[test]
    fn criteria_with_skill_is_not_empty() {
        let criteria = SearchCriteria {
            skills: vec!["rust".into()],
            ..Default::default()
        };
        assert!(!criteria.is_empty());
        let json = serde_json::to_value(&criteria).unwrap();
        assert_eq!(json, serde_json::json!({ "skills": ["rust"] }));
    }

    // --- PipelineSnapshot ---

    #[test]
    fn snapshot_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        let mut snapshot = PipelineSnapshot::new(
            JobId::new("job-7"),
            vec![
                Application::new("a-1", Status::Applied),
                Application::new("a-2", Status::Offer).with_field("notes", serde_json::json!("strong")),
            ],
        );
        snapshot
            .metrics
            .insert(Status::Offer, StageMetrics { avg_days_in_stage: 2.5 });

        snapshot.save(&path).unwrap();
        let loaded = PipelineSnapshot::load(&path).unwrap();

        assert_eq!(loaded.job_id, JobId::new("job-7"));
        assert_eq!(loaded.applications, snapshot.applications);
        assert_eq!(
            loaded.metrics.get(&Status::Offer),
            Some(&StageMetrics { avg_days_in_stage: 2.5 })
        );
    }
}
