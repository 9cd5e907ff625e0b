//! Linear undo/redo history of recorded commands.
//!
//! Commands are stored as-is and never mutated. Moving a command between the
//! stacks only changes the [`Direction`] it is replayed in.

use hireboard_types::Direction;

/// A command handed back by [`CommandHistory::undo`] or [`CommandHistory::redo`],
/// together with the direction the caller must apply it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay<C> {
    pub command: C,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
pub struct CommandHistory<C> {
    undo: Vec<C>,
    redo: Vec<C>,
    limit: Option<usize>,
}

impl<C: Clone> CommandHistory<C> {
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// History keeping at most `limit` undoable commands; the oldest are dropped.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Record a new user action. Any redo path is invalidated.
    pub fn record(&mut self, command: C) {
        self.undo.push(command);
        self.redo.clear();
        if let Some(limit) = self.limit {
            if self.undo.len() > limit {
                let excess = self.undo.len() - limit;
                self.undo.drain(..excess);
            }
        }
    }

    pub fn undo(&mut self) -> Option<Replay<C>> {
        let command = self.undo.pop()?;
        self.redo.push(command.clone());
        Some(Replay {
            command,
            direction: Direction::Reverse,
        })
    }

    pub fn redo(&mut self) -> Option<Replay<C>> {
        let command = self.redo.pop()?;
        self.undo.push(command.clone());
        Some(Replay {
            command,
            direction: Direction::Forward,
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// The command the next `undo` would replay.
    pub fn peek_undo(&self) -> Option<&C> {
        self.undo.last()
    }

    pub fn peek_redo(&self) -> Option<&C> {
        self.redo.last()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl<C: Clone> Default for CommandHistory<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireboard_types::{Batch, Status, StatusChange};

    fn batch(id: &str, from: Status, to: Status) -> Batch {
        Batch::new(vec![StatusChange::new(id, from, to)]).unwrap()
    }

    #[test]
    fn empty_history_is_a_no_op() {
        let mut history: CommandHistory<Batch> = CommandHistory::new();
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_then_redo_moves_the_same_batch() {
        let mut history = CommandHistory::new();
        let b = batch("x", Status::Applied, Status::Interview);
        history.record(b.clone());

        let undone = history.undo().unwrap();
        assert_eq!(undone.command, b);
        assert_eq!(undone.direction, Direction::Reverse);
        assert_eq!(history.redo_len(), 1);

        let redone = history.redo().unwrap();
        assert_eq!(redone.command, b);
        assert_eq!(redone.direction, Direction::Forward);
        assert_eq!(history.undo_len(), 1);
        assert!(!history.can_redo());
    }

    #[test]
    fn recording_after_undo_clears_redo() {
        let mut history = CommandHistory::new();
        history.record(batch("x", Status::Applied, Status::Interview));
        history.record(batch("y", Status::Applied, Status::Offer));
        history.undo();
        history.undo();
        assert_eq!(history.redo_len(), 2);

        history.record(batch("z", Status::Reviewing, Status::Rejected));
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn limit_drops_oldest() {
        let mut history = CommandHistory::with_limit(Some(2));
        history.record(batch("a", Status::Applied, Status::Offer));
        history.record(batch("b", Status::Applied, Status::Offer));
        history.record(batch("c", Status::Applied, Status::Offer));
        assert_eq!(history.undo_len(), 2);
        let top = history.peek_undo().unwrap();
        assert!(top.contains(&"c".into()));
        history.undo();
        history.undo();
        assert!(history.undo().is_none());
    }
}
