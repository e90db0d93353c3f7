use crate::session::SessionIdentity;
use crate::transport::{Connector, Transport};
use log::{debug, error, info, warn};
use shared::{
    IncomingMessage, OutgoingKind, OutgoingMessage, TilePlacement, HEARTBEAT_INTERVAL,
    MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Status(ConnectionState),
    Message(IncomingMessage),
    /// Automatic reconnection gave up. Emitted once per connect cycle.
    ReconnectExhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub heartbeat_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// Pull a fresh snapshot right after every `join_game`.
    pub request_state_on_connect: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            reconnect_base_delay: RECONNECT_BASE_DELAY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            request_state_on_connect: true,
        }
    }
}

impl ConnectionConfig {
    /// Delay before reconnect attempt `attempt` (1-based): base, 2x, 4x, ...
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.reconnect_base_delay * (1u32 << exponent)
    }
}

#[derive(Debug)]
enum Command {
    Connect,
    Send(OutgoingMessage),
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Closed,
    Manual,
    // every handle dropped
    Shutdown,
}

#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionState>,
    identity: Arc<SessionIdentity>,
}

impl ConnectionHandle {
    /// Starts a connect cycle. Ignored while a cycle is already running.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    pub fn send(&self, message: OutgoingMessage) {
        self.command(Command::Send(message));
    }

    pub fn request_state(&self) {
        self.send(self.identity.message(OutgoingKind::RequestState));
    }

    pub fn place_tiles(&self, placements: &[TilePlacement]) {
        self.send(OutgoingMessage::place_tiles(
            &self.identity.game_id,
            &self.identity.player_id,
            placements,
        ));
    }

    /// Leaves the game and stops all automatic reconnection.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    pub fn status(&self) -> ConnectionState {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionState::Connected
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Connection manager already stopped");
        }
    }
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    identity: Arc<SessionIdentity>,
    config: ConnectionConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    status: watch::Sender<ConnectionState>,
    reconnect_attempts: u32,
}

impl<C: Connector> ConnectionManager<C> {
    /// Spawns the manager task. Nothing is dialed until
    /// [`ConnectionHandle::connect`] is called.
    pub fn spawn(
        connector: C,
        identity: SessionIdentity,
        config: ConnectionConfig,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionState::Disconnected);
        let identity = Arc::new(identity);

        let manager = ConnectionManager {
            connector,
            identity: Arc::clone(&identity),
            config,
            commands: command_rx,
            events: event_tx,
            status: status_tx,
            reconnect_attempts: 0,
        };
        tokio::spawn(manager.run());

        let handle = ConnectionHandle {
            commands: command_tx,
            status: status_rx,
            identity,
        };
        (handle, event_rx)
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Connect => {
                    if self.run_cycle().await == Exit::Shutdown {
                        break;
                    }
                }
                Command::Send(message) => drop_unsent(&message),
                Command::Disconnect => debug!("disconnect() while idle"),
            }
        }
        info!(
            "Connection manager for game {} stopped",
            self.identity.game_id
        );
    }

    // Returns `Manual` for both disconnect() and an exhausted budget.
    async fn run_cycle(&mut self) -> Exit {
        self.reconnect_attempts = 0;

        loop {
            self.set_status(ConnectionState::Connecting);

            let exit = match self.establish().await {
                Ok(Some(transport)) => {
                    info!(
                        "Connected to game {} as {}",
                        self.identity.game_id, self.identity.player_name
                    );
                    self.set_status(ConnectionState::Connected);
                    self.reconnect_attempts = 0;
                    self.run_connected(transport).await
                }
                Ok(None) => Exit::Closed,
                Err(exit) => exit,
            };

            self.set_status(ConnectionState::Disconnected);

            if exit != Exit::Closed {
                return exit;
            }

            if self.reconnect_attempts >= self.config.max_reconnect_attempts {
                warn!(
                    "Giving up on game {} after {} reconnect attempts",
                    self.identity.game_id, self.reconnect_attempts
                );
                self.emit(ConnectionEvent::ReconnectExhausted {
                    attempts: self.reconnect_attempts,
                });
                return Exit::Manual;
            }

            self.reconnect_attempts += 1;
            let delay = self.config.reconnect_delay(self.reconnect_attempts);
            info!(
                "Reconnecting in {:?} (attempt {}/{})",
                delay, self.reconnect_attempts, self.config.max_reconnect_attempts
            );

            if let Some(exit) = self.backoff(delay).await {
                return exit;
            }
        }
    }

    async fn establish(&mut self) -> Result<Option<C::Transport>, Exit> {
        let dial = self.connector.connect(&self.identity.endpoint);
        tokio::pin!(dial);

        loop {
            tokio::select! {
                result = &mut dial => {
                    return match result {
                        Ok(transport) => Ok(Some(transport)),
                        Err(e) => {
                            warn!("Connect to {} failed: {}", self.identity.endpoint, e);
                            Ok(None)
                        }
                    };
                }
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) => {
                        info!("Connect aborted by disconnect()");
                        return Err(Exit::Manual);
                    }
                    Some(Command::Connect) => debug!("connect() ignored: handshake in flight"),
                    Some(Command::Send(message)) => drop_unsent(&message),
                    None => return Err(Exit::Shutdown),
                },
            }
        }
    }

    async fn run_connected(&mut self, mut transport: C::Transport) -> Exit {
        let join = OutgoingMessage::join_game(
            &self.identity.game_id,
            &self.identity.player_id,
            &self.identity.player_name,
        );
        transmit(&mut transport, &join).await;
        if self.config.request_state_on_connect {
            transmit(
                &mut transport,
                &self.identity.message(OutgoingKind::RequestState),
            )
            .await;
        }

        let period = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                inbound = transport.recv() => match inbound {
                    Some(Ok(text)) => self.deliver(&text),
                    Some(Err(e)) => warn!("Transport error: {}", e),
                    None => {
                        info!("Connection to game {} closed", self.identity.game_id);
                        return Exit::Closed;
                    }
                },

                _ = heartbeat.tick() => {
                    transmit(&mut transport, &self.identity.message(OutgoingKind::Heartbeat)).await;
                }

                command = self.commands.recv() => match command {
                    Some(Command::Send(message)) => transmit(&mut transport, &message).await,
                    Some(Command::Connect) => debug!("connect() ignored: already connected"),
                    Some(Command::Disconnect) => {
                        self.leave(&mut transport).await;
                        return Exit::Manual;
                    }
                    None => {
                        self.leave(&mut transport).await;
                        return Exit::Shutdown;
                    }
                },
            }
        }
    }

    async fn leave(&self, transport: &mut C::Transport) {
        info!("Leaving game {}", self.identity.game_id);
        transmit(transport, &self.identity.message(OutgoingKind::LeaveGame)).await;
        transport.close().await;
    }

    async fn backoff(&mut self, delay: Duration) -> Option<Exit> {
        let wake = sleep(delay);
        tokio::pin!(wake);

        loop {
            tokio::select! {
                _ = &mut wake => return None,
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) => {
                        info!("Pending reconnect cancelled by disconnect()");
                        return Some(Exit::Manual);
                    }
                    Some(Command::Connect) => debug!("connect() ignored: reconnect scheduled"),
                    Some(Command::Send(message)) => drop_unsent(&message),
                    None => return Some(Exit::Shutdown),
                },
            }
        }
    }

    fn deliver(&self, text: &str) {
        match IncomingMessage::decode(text) {
            Ok(message) => self.emit(ConnectionEvent::Message(message)),
            Err(e) => warn!("Dropping undecodable frame: {}", e),
        }
    }

    fn set_status(&self, state: ConnectionState) {
        debug!("Connection state -> {}", state.label());
        self.status.send_replace(state);
        self.emit(ConnectionEvent::Status(state));
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

async fn transmit<T: Transport>(transport: &mut T, message: &OutgoingMessage) {
    match message.to_json() {
        Ok(text) => {
            if let Err(e) = transport.send(text).await {
                warn!("Failed to send {:?}: {}", message.kind, e);
            }
        }
        Err(e) => error!("Failed to encode {:?}: {}", message.kind, e),
    }
}

fn drop_unsent(message: &OutgoingMessage) {
    debug!("Dropping {:?}: not connected", message.kind);
}
