//! Applicant pipeline engine.
//!
//! This crate holds the client-side state of one job posting's pipeline: the
//! entity store, multi-select, the canonical/focused/filtered views, undo and
//! redo of status batches, and the coordinators that keep all of it in step
//! with the remote system of record.

pub mod board;
pub mod config;
pub mod delete;
pub mod events;
pub mod history;
pub mod query;
pub mod selection;
pub mod store;
pub mod sync;
pub mod view;

pub use board::{BoardPhase, PipelineBoard};
pub use config::EngineConfig;
pub use delete::{DeleteReport, PendingDelete};
pub use events::{ItemFailure, Notification, NotificationEmitter};
pub use history::{CommandHistory, Replay};
pub use query::{PendingQuery, QueryChannel, QueryOutcome};
pub use selection::SelectionModel;
pub use store::EntityStore;
pub use sync::{CommitReport, ItemOutcome, PendingCommit, SettleSummary, SyncCoordinator};
pub use view::{Column, FilteredView, FocusedColumn, Projection, ViewMode, ViewResolver};
