use crate::network::ConnectionState;
use log::debug;
use shared::{Board, GameStatePatch, Player, TilePlacement, ACTIVITY_LOG_CAPACITY};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("cell ({row}, {col}) is outside the board")]
    OutOfBounds { row: usize, col: usize },
    #[error("cell ({row}, {col}) is already occupied")]
    Occupied { row: usize, col: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Error,
    Info,
}

/// Transient user-facing message, replaced by the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Reconciled read model for one game session.
///
/// The board, roster and turn pointer only ever change through
/// [`GameStore::apply_state_update`]. Staged placements are the local,
/// unconfirmed layer on top and never touch the board.
#[derive(Debug, Clone)]
pub struct GameStore {
    players: Vec<Player>,
    board: Board,
    current_turn: Option<String>,
    staged: Vec<TilePlacement>,
    activity: VecDeque<String>,
    connection_status: ConnectionState,
    connection_lost: bool,
    notification: Option<Notification>,
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            board: Board::new(),
            current_turn: None,
            staged: Vec::new(),
            activity: VecDeque::with_capacity(ACTIVITY_LOG_CAPACITY),
            connection_status: ConnectionState::Disconnected,
            connection_lost: false,
            notification: None,
        }
    }

    /// Stages a letter, replacing any letter already staged on that cell.
    /// Cells occupied on the authoritative board are rejected.
    pub fn stage_placement(&mut self, row: usize, col: usize, letter: char) -> Result<(), StageError> {
        if !Board::in_bounds(row, col) {
            return Err(StageError::OutOfBounds { row, col });
        }
        if self.board.is_occupied(row, col) {
            return Err(StageError::Occupied { row, col });
        }

        let placement = TilePlacement::new(row, col, letter);
        match self.staged.iter_mut().find(|p| p.row == row && p.col == col) {
            Some(existing) => *existing = placement,
            None => self.staged.push(placement),
        }
        Ok(())
    }

    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }

    /// Shallow merge of an authoritative snapshot.
    pub fn apply_state_update(&mut self, patch: GameStatePatch) {
        if let Some(players) = patch.players {
            self.players = players;
        }
        if let Some(current_turn) = patch.current_turn {
            self.current_turn = current_turn;
        }
        if let Some(board) = patch.board {
            self.board = board;

            let before = self.staged.len();
            let board = &self.board;
            self.staged.retain(|p| !board.is_occupied(p.row, p.col));
            if self.staged.len() != before {
                debug!(
                    "Dropped {} staged placement(s) now occupied on the board",
                    before - self.staged.len()
                );
            }
        }
    }

    pub fn record_activity(&mut self, text: impl Into<String>) {
        if self.activity.len() == ACTIVITY_LOG_CAPACITY {
            self.activity.pop_front();
        }
        self.activity.push_back(text.into());
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn set_connection_status(&mut self, status: ConnectionState) {
        self.connection_status = status;
        if status == ConnectionState::Connected {
            self.connection_lost = false;
        }
    }

    pub fn mark_connection_lost(&mut self) {
        self.connection_lost = true;
    }

    pub fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.notification = Some(Notification {
            kind,
            message: message.into(),
        });
    }

    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_turn(&self) -> Option<&str> {
        self.current_turn.as_deref()
    }

    pub fn staged(&self) -> &[TilePlacement] {
        &self.staged
    }

    pub fn staged_at(&self, row: usize, col: usize) -> Option<char> {
        self.staged
            .iter()
            .find(|p| p.row == row && p.col == col)
            .map(|p| p.letter)
    }

    pub fn activity(&self) -> impl Iterator<Item = &str> {
        self.activity.iter().map(String::as_str)
    }

    pub fn activity_len(&self) -> usize {
        self.activity.len()
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.connection_status
    }

    pub fn connection_lost(&self) -> bool {
        self.connection_lost
    }
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}
