//! User-facing notifications for the pipeline board.
//!
//! Emits [`Notification`]s via a [`tokio::sync::broadcast`] channel so that
//! the UI (toasts, status bars, loggers) can follow batch, query and delete
//! progress without coupling to the board internals. One batch produces one
//! pending notification and one aggregated result, never one per item.

use serde::{Deserialize, Serialize};

use hireboard_types::{ApplicationId, Direction, Status};

/// A single item that failed inside an aggregated operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: ApplicationId,
    pub error: String,
}

/// Notifications emitted by the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    BatchPending {
        batch_id: uuid::Uuid,
        direction: Direction,
        count: usize,
    },
    BatchSucceeded {
        batch_id: uuid::Uuid,
        direction: Direction,
        count: usize,
    },
    BatchFailed {
        batch_id: uuid::Uuid,
        direction: Direction,
        count: usize,
        failed: Vec<ItemFailure>,
    },
    StaleConfirmation {
        batch_id: uuid::Uuid,
        id: ApplicationId,
    },
    RolledBack {
        batch_id: uuid::Uuid,
        restored: Vec<(ApplicationId, Status)>,
    },
    QueryFailed {
        generation: u64,
        error: String,
    },
    DeleteSucceeded {
        ids: Vec<ApplicationId>,
    },
    DeleteFailed {
        count: usize,
        failed: Vec<ItemFailure>,
    },
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "application"
    } else {
        "applications"
    }
}

fn list_failures(failed: &[ItemFailure]) -> String {
    failed
        .iter()
        .map(|f| format!("{}: {}", f.id, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Notification {
    /// The one-line message shown to the recruiter.
    pub fn message(&self) -> String {
        match self {
            Notification::BatchPending {
                direction, count, ..
            } => match direction {
                Direction::Forward => format!("Moving {count} {}…", plural(*count)),
                Direction::Reverse => format!("Reverting {count} {}…", plural(*count)),
            },
            Notification::BatchSucceeded {
                direction, count, ..
            } => match direction {
                Direction::Forward => format!("Moved {count} {}", plural(*count)),
                Direction::Reverse => format!("Reverted {count} {}", plural(*count)),
            },
            Notification::BatchFailed { count, failed, .. } => format!(
                "{} of {count} updates failed: {}",
                failed.len(),
                list_failures(failed)
            ),
            Notification::StaleConfirmation { id, .. } => {
                format!("Ignored an out-of-date confirmation for {id}")
            }
            Notification::RolledBack { restored, .. } => {
                format!("Restored {} {} after failed updates", restored.len(), plural(restored.len()))
            }
            Notification::QueryFailed { error, .. } => format!("Search failed: {error}"),
            Notification::DeleteSucceeded { ids } => {
                format!("Deleted {} {}", ids.len(), plural(ids.len()))
            }
            Notification::DeleteFailed { count, failed } => format!(
                "{} of {count} deletions failed: {}",
                failed.len(),
                list_failures(failed)
            ),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notification::BatchFailed { .. }
                | Notification::QueryFailed { .. }
                | Notification::DeleteFailed { .. }
        )
    }
}

/// Notification emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct NotificationEmitter {
    sender: tokio::sync::broadcast::Sender<Notification>,
}

impl NotificationEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit a notification to all current subscribers.
    ///
    /// If there are no active receivers the notification is silently dropped.
    pub fn emit(&self, notification: Notification) {
        if notification.is_error() {
            tracing::warn!(message = %notification.message(), "Notification");
        } else {
            tracing::debug!(message = %notification.message(), "Notification");
        }
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_sends_and_receives() {
        let emitter = NotificationEmitter::new(16);
        let mut rx = emitter.subscribe();
        let batch_id = uuid::Uuid::new_v4();

        emitter.emit(Notification::BatchPending {
            batch_id,
            direction: Direction::Forward,
            count: 3,
        });

        match rx.recv().await.unwrap() {
            Notification::BatchPending {
                batch_id: got, count, ..
            } => {
                assert_eq!(got, batch_id);
                assert_eq!(count, 3);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn emit_with_no_subscribers_does_not_panic() {
        let emitter = NotificationEmitter::new(4);
        emitter.emit(Notification::QueryFailed {
            generation: 1,
            error: "timeout".into(),
        });
    }

    #[test]
    fn batch_messages_read_as_one_unit() {
        let id = uuid::Uuid::new_v4();
        let pending = Notification::BatchPending {
            batch_id: id,
            direction: Direction::Forward,
            count: 1,
        };
        assert_eq!(pending.message(), "Moving 1 application…");

        let undone = Notification::BatchSucceeded {
            batch_id: id,
            direction: Direction::Reverse,
            count: 3,
        };
        assert_eq!(undone.message(), "Reverted 3 applications");
    }

    #[test]
    fn failed_batch_lists_each_failure() {
        let n = Notification::BatchFailed {
            batch_id: uuid::Uuid::new_v4(),
            direction: Direction::Forward,
            count: 3,
            failed: vec![
                ItemFailure {
                    id: ApplicationId::new("a-1"),
                    error: "timeout".into(),
                },
                ItemFailure {
                    id: ApplicationId::new("a-3"),
                    error: "conflict".into(),
                },
            ],
        };
        assert!(n.is_error());
        assert_eq!(n.message(), "2 of 3 updates failed: a-1: timeout; a-3: conflict");
    }

    #[test]
    fn notification_serialization_round_trip() {
        let n = Notification::DeleteSucceeded {
            ids: vec![ApplicationId::new("a-9")],
        };
        let json = serde_json::to_string(&n).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
