use crate::game::{GameStore, NotificationKind, StageError};
use crate::network::{ConnectionEvent, ConnectionHandle, ConnectionState};
use log::{debug, info};
use rand::Rng;
use shared::{IncomingMessage, OutgoingKind, OutgoingMessage};

pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Return to the lobby to rejoin.";
pub const NOTHING_STAGED_MESSAGE: &str = "No tiles staged for placement";
pub const NOT_CONNECTED_MESSAGE: &str = "Not connected; staged tiles kept for resend";

const PLAYER_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const PLAYER_ID_LEN: usize = 13;

/// Fresh base-36 player id. The allocation API never assigns one.
pub fn generate_player_id() -> String {
    let mut rng = rand::thread_rng();
    (0..PLAYER_ID_LEN)
        .map(|_| PLAYER_ID_ALPHABET[rng.gen_range(0..PLAYER_ID_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub endpoint: String,
    pub game_id: String,
    pub player_id: String,
    pub player_name: String,
}

impl SessionIdentity {
    pub fn new(
        endpoint: impl Into<String>,
        game_id: impl Into<String>,
        player_id: impl Into<String>,
        player_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            game_id: game_id.into(),
            player_id: player_id.into(),
            player_name: player_name.into(),
        }
    }

    /// Frame of `kind` stamped with this identity and no payload.
    pub fn message(&self, kind: OutgoingKind) -> OutgoingMessage {
        OutgoingMessage::new(kind, &self.game_id, &self.player_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent(usize),
    NothingStaged,
    NotConnected,
}

/// One player's live participation in one game.
pub struct GameSession {
    connection: ConnectionHandle,
    store: GameStore,
}

impl GameSession {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            store: GameStore::new(),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        self.connection.identity()
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GameStore {
        &mut self.store
    }

    pub fn connect(&self) {
        self.connection.connect();
    }

    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Status(state) => self.store.set_connection_status(state),
            ConnectionEvent::Message(message) => self.dispatch(message),
            ConnectionEvent::ReconnectExhausted { attempts } => {
                info!("Connection lost after {} reconnect attempts", attempts);
                self.store.mark_connection_lost();
                self.store
                    .notify(NotificationKind::Error, CONNECTION_LOST_MESSAGE);
            }
        }
    }

    fn dispatch(&mut self, message: IncomingMessage) {
        match message {
            IncomingMessage::Ack => self.store.record_activity("Action acknowledged"),
            IncomingMessage::Error { message } => self.store.notify(
                NotificationKind::Error,
                message.unwrap_or_else(|| "Server error".to_string()),
            ),
            IncomingMessage::PlayerJoined { name } => self.store.record_activity(format!(
                "{} joined the game",
                name.as_deref().unwrap_or("Player")
            )),
            IncomingMessage::PlayerLeft { name } => self.store.record_activity(format!(
                "{} left the game",
                name.as_deref().unwrap_or("Player")
            )),
            IncomingMessage::StateUpdated(patch) => self.store.apply_state_update(patch),
            IncomingMessage::Pong => {}
            IncomingMessage::Unknown { kind } => info!("Unknown message type: {}", kind),
        }
    }

    pub fn stage(&mut self, row: usize, col: usize, letter: char) -> Result<(), StageError> {
        self.store.stage_placement(row, col, letter)
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        if self.store.staged().is_empty() {
            self.store
                .notify(NotificationKind::Error, NOTHING_STAGED_MESSAGE);
            return SubmitOutcome::NothingStaged;
        }
        // Keep the staged set: the manager drops frames while offline.
        if self.store.connection_status() != ConnectionState::Connected {
            self.store
                .notify(NotificationKind::Error, NOT_CONNECTED_MESSAGE);
            return SubmitOutcome::NotConnected;
        }

        let count = self.store.staged().len();
        self.connection.place_tiles(self.store.staged());
        self.store.clear_staged();
        debug!("Submitted {} placement(s)", count);
        self.store
            .notify(NotificationKind::Info, format!("Submitted {} tile(s)", count));
        SubmitOutcome::Sent(count)
    }

    pub fn request_state(&self) {
        self.connection.request_state();
    }

    pub fn leave(&mut self) {
        self.connection.disconnect();
        self.store.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Notification;
    use crate::network::{ConnectionConfig, ConnectionManager};
    use crate::transport::mock::{MockConnector, MockPeer};
    use serde_json::Value;
    use shared::{Board, GameStatePatch, TilePlacement};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    fn identity() -> SessionIdentity {
        SessionIdentity::new("ws://game.test/ws/GAME123", "GAME123", "player-1", "Alice")
    }

    fn offline_session() -> GameSession {
        let (connector, _peers) = MockConnector::new(&[]);
        let (handle, _events) =
            ConnectionManager::spawn(connector, identity(), ConnectionConfig::default());
        GameSession::new(handle)
    }

    async fn live_session() -> (
        GameSession,
        mpsc::UnboundedReceiver<ConnectionEvent>,
        MockPeer,
    ) {
        let (connector, mut peers) = MockConnector::new(&[true]);
        let (handle, mut events) =
            ConnectionManager::spawn(connector, identity(), ConnectionConfig::default());
        let mut session = GameSession::new(handle);
        session.connect();

        while session.store().connection_status() != ConnectionState::Connected {
            let event = events.recv().await.unwrap();
            session.handle_event(event);
        }
        let mut peer = peers.recv().await.unwrap();
        sleep(Duration::from_millis(1)).await;
        peer.drain();
        (session, events, peer)
    }

    #[test]
    fn test_identity_stamps_messages() {
        let message = identity().message(OutgoingKind::Heartbeat);
        assert_eq!(message.kind, OutgoingKind::Heartbeat);
        assert_eq!(message.game_id, "GAME123");
        assert_eq!(message.player_id, "player-1");
        assert!(message.payload.is_none());
    }

    #[test]
    fn test_generated_player_ids_are_base36() {
        let first = generate_player_id();
        let second = generate_player_id();

        assert_eq!(first.len(), PLAYER_ID_LEN);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_error_goes_to_notification_not_log() {
        let mut session = offline_session();
        session.handle_event(ConnectionEvent::Message(IncomingMessage::Error {
            message: Some("game full".to_string()),
        }));

        assert_eq!(
            session.store_mut().take_notification(),
            Some(Notification {
                kind: NotificationKind::Error,
                message: "game full".to_string()
            })
        );
        assert_eq!(session.store().activity_len(), 0);
    }

    #[tokio::test]
    async fn test_error_without_message_uses_default() {
        let mut session = offline_session();
        session.handle_event(ConnectionEvent::Message(IncomingMessage::Error { message: None }));
        assert_eq!(
            session.store().notification().map(|n| n.message.as_str()),
            Some("Server error")
        );
    }

    #[tokio::test]
    async fn test_presence_and_ack_are_logged() {
        let mut session = offline_session();
        session.handle_event(ConnectionEvent::Message(IncomingMessage::PlayerJoined {
            name: Some("Bob".to_string()),
        }));
        session.handle_event(ConnectionEvent::Message(IncomingMessage::Ack));
        session.handle_event(ConnectionEvent::Message(IncomingMessage::PlayerLeft {
            name: None,
        }));
        session.handle_event(ConnectionEvent::Message(IncomingMessage::Pong));
        session.handle_event(ConnectionEvent::Message(IncomingMessage::Unknown {
            kind: "mystery".to_string(),
        }));

        let log: Vec<&str> = session.store().activity().collect();
        assert_eq!(
            log,
            vec!["Bob joined the game", "Action acknowledged", "Player left the game"]
        );
        assert!(session.store().notification().is_none());
    }

    #[tokio::test]
    async fn test_exhaustion_marks_connection_lost() {
        let mut session = offline_session();
        session.handle_event(ConnectionEvent::ReconnectExhausted { attempts: 5 });

        assert!(session.store().connection_lost());
        assert_eq!(
            session.store().notification().map(|n| n.message.as_str()),
            Some(CONNECTION_LOST_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_submit_with_nothing_staged() {
        let mut session = offline_session();
        assert_eq!(session.submit(), SubmitOutcome::NothingStaged);
        assert_eq!(
            session.store().notification().map(|n| n.message.as_str()),
            Some(NOTHING_STAGED_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_submit_while_disconnected_keeps_staged() {
        let mut session = offline_session();
        session.stage(7, 7, 'A').unwrap();

        assert_eq!(session.submit(), SubmitOutcome::NotConnected);
        assert_eq!(session.store().staged(), &[TilePlacement::new(7, 7, 'A')]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_clears_staged_and_state_merges_cleanly() {
        let (mut session, _events, mut peer) = live_session().await;

        session.stage(7, 7, 'A').unwrap();
        assert_eq!(session.submit(), SubmitOutcome::Sent(1));
        assert!(session.store().staged().is_empty());

        sleep(Duration::from_millis(1)).await;
        let frames = peer.drain();
        assert_eq!(frames.len(), 1);
        let sent: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(sent["type"], "place_tiles");
        assert_eq!(sent["payload"]["placements"][0]["letter"], "A");

        let mut board = Board::new();
        board.place(7, 7, 'A');
        session.handle_event(ConnectionEvent::Message(IncomingMessage::StateUpdated(
            GameStatePatch {
                board: Some(board),
                ..GameStatePatch::default()
            },
        )));

        assert_eq!(session.store().board().get(7, 7), Some('A'));
        assert!(session.store().staged().is_empty());
        assert_eq!(
            session.store().notification().map(|n| n.kind),
            Some(NotificationKind::Info)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_state_reaches_transport() {
        let (session, _events, mut peer) = live_session().await;

        session.request_state();
        sleep(Duration::from_millis(1)).await;

        let frames = peer.drain();
        let sent: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(sent["type"], "request_state");
        assert_eq!(sent["gameId"], "GAME123");
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_disconnects_and_resets() {
        let (mut session, mut events, mut peer) = live_session().await;
        session.stage(1, 1, 'B').unwrap();
        session.store_mut().record_activity("Bob joined the game");

        session.leave();
        assert!(session.store().staged().is_empty());
        assert_eq!(session.store().activity_len(), 0);

        while let Some(event) = events.recv().await {
            if event == ConnectionEvent::Status(ConnectionState::Disconnected) {
                break;
            }
        }
        let frames = peer.drain();
        let sent: Value = serde_json::from_str(frames.last().unwrap()).unwrap();
        assert_eq!(sent["type"], "leave_game");
        assert!(peer.client_closed());
    }
}
