use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const BOARD_SIZE: usize = 15;
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const ACTIVITY_LOG_CAPACITY: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardShapeError {
    #[error("expected 15 rows, got {0}")]
    Rows(usize),
    #[error("row {row} has {len} cells, expected 15")]
    Width { row: usize, len: usize },
}

/// Authoritative 15x15 letter grid.
///
/// Serialized as an array of rows, each row an array of `string | null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<Vec<Option<char>>>",
    into = "Vec<Vec<Option<char>>>"
)]
pub struct Board {
    cells: [[Option<char>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    pub fn in_bounds(row: usize, col: usize) -> bool {
        row < BOARD_SIZE && col < BOARD_SIZE
    }

    /// Letter at `(row, col)`, `None` for empty or out-of-range cells.
    pub fn get(&self, row: usize, col: usize) -> Option<char> {
        if !Self::in_bounds(row, col) {
            return None;
        }
        self.cells[row][col]
    }

    pub fn is_occupied(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_some()
    }

    /// Writes a letter into the grid. Returns false when out of range.
    pub fn place(&mut self, row: usize, col: usize, letter: char) -> bool {
        if !Self::in_bounds(row, col) {
            return false;
        }
        self.cells[row][col] = Some(letter);
        true
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<char>; BOARD_SIZE]> {
        self.cells.iter()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| cell.is_some())
            .count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<Vec<Option<char>>>> for Board {
    type Error = BoardShapeError;

    fn try_from(rows: Vec<Vec<Option<char>>>) -> Result<Self, Self::Error> {
        if rows.len() != BOARD_SIZE {
            return Err(BoardShapeError::Rows(rows.len()));
        }

        let mut board = Board::new();
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != BOARD_SIZE {
                return Err(BoardShapeError::Width {
                    row: r,
                    len: row.len(),
                });
            }
            for (c, cell) in row.into_iter().enumerate() {
                board.cells[r][c] = cell;
            }
        }
        Ok(board)
    }
}

impl From<Board> for Vec<Vec<Option<char>>> {
    fn from(board: Board) -> Self {
        board.cells.iter().map(|row| row.to_vec()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePlacement {
    pub row: usize,
    pub col: usize,
    pub letter: char,
}

impl TilePlacement {
    pub fn new(row: usize, col: usize, letter: char) -> Self {
        Self { row, col, letter }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Partial authoritative snapshot carried by `state_updated`.
///
/// Absent fields leave the local value untouched. `current_turn` is
/// `Some(None)` when the server sends an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<Player>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<Board>,
    #[serde(
        rename = "currentTurn",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub current_turn: Option<Option<String>>,
}

impl GameStatePatch {
    pub fn is_empty(&self) -> bool {
        self.players.is_none() && self.board.is_none() && self.current_turn.is_none()
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutgoingKind {
    JoinGame,
    LeaveGame,
    RequestState,
    PlaceTiles,
    Heartbeat,
}

/// Client-to-server frame.
///
/// Every frame carries the session identity next to its `type`; kind-specific
/// data lives under `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(rename = "type")]
    pub kind: OutgoingKind,
    #[serde(rename = "gameId")]
    pub game_id: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl OutgoingMessage {
    pub fn new(kind: OutgoingKind, game_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            kind,
            game_id: game_id.into(),
            player_id: player_id.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn join_game(game_id: &str, player_id: &str, player_name: &str) -> Self {
        Self::new(OutgoingKind::JoinGame, game_id, player_id)
            .with_payload(json!({ "playerName": player_name }))
    }

    pub fn place_tiles(game_id: &str, player_id: &str, placements: &[TilePlacement]) -> Self {
        Self::new(OutgoingKind::PlaceTiles, game_id, player_id)
            .with_payload(json!({ "placements": placements }))
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Deserialize)]
struct IncomingFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// Server-to-client frame, decoded by `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Ack,
    Error { message: Option<String> },
    PlayerJoined { name: Option<String> },
    PlayerLeft { name: Option<String> },
    StateUpdated(GameStatePatch),
    Pong,
    Unknown { kind: String },
}

impl IncomingMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let frame: IncomingFrame = serde_json::from_str(text)?;
        let message = match frame.kind.as_str() {
            "ack" => IncomingMessage::Ack,
            "error" => IncomingMessage::Error {
                message: payload_str(&frame.payload, "message"),
            },
            "player_joined" => IncomingMessage::PlayerJoined {
                name: payload_str(&frame.payload, "name"),
            },
            "player_left" => IncomingMessage::PlayerLeft {
                name: payload_str(&frame.payload, "name"),
            },
            "state_updated" => match frame.payload {
                Some(payload) => IncomingMessage::StateUpdated(serde_json::from_value(payload)?),
                None => IncomingMessage::StateUpdated(GameStatePatch::default()),
            },
            "pong" => IncomingMessage::Pong,
            _ => IncomingMessage::Unknown { kind: frame.kind },
        };
        Ok(message)
    }

    pub fn kind(&self) -> &str {
        match self {
            IncomingMessage::Ack => "ack",
            IncomingMessage::Error { .. } => "error",
            IncomingMessage::PlayerJoined { .. } => "player_joined",
            IncomingMessage::PlayerLeft { .. } => "player_left",
            IncomingMessage::StateUpdated(_) => "state_updated",
            IncomingMessage::Pong => "pong",
            IncomingMessage::Unknown { kind } => kind,
        }
    }
}

fn payload_str(payload: &Option<Value>, key: &str) -> Option<String> {
    payload
        .as_ref()
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Response of `POST /api/games`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    pub game_id: String,
    #[serde(alias = "websocketUrl")]
    pub ws_url: String,
}

/// Response of `POST /api/games/{id}/join`. The game id is the one the
/// caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameResponse {
    #[serde(alias = "websocketUrl")]
    pub ws_url: String,
}
