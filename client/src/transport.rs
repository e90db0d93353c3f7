use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(String),
    #[error("websocket send failed: {0}")]
    Send(String),
    #[error("websocket receive failed: {0}")]
    Receive(String),
}

#[async_trait]
pub trait Transport: Send + 'static {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame. `None` means the transport is closed.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    async fn connect(&self, endpoint: &str) -> Result<Self::Transport, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct WsConnector;

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, endpoint: &str) -> Result<WsTransport, TransportError> {
        let (stream, response) = connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!("WebSocket handshake with {} ({})", endpoint, response.status());
        Ok(WsTransport { stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!("Close frame received: {:?}", frame);
                    return None;
                }
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None
                }
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory connector for driving the state machine in tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    pub struct MockPeer {
        pub outbound: mpsc::UnboundedReceiver<String>,
        inbound: mpsc::UnboundedSender<String>,
        closed: Arc<Mutex<bool>>,
    }

    impl MockPeer {
        pub fn push(&self, text: &str) {
            let _ = self.inbound.send(text.to_string());
        }

        /// Drops the inbound side, which the client observes as a remote close.
        pub fn hang_up(self) {}

        pub fn client_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }

        pub fn drain(&mut self) -> Vec<String> {
            let mut sent = Vec::new();
            while let Ok(text) = self.outbound.try_recv() {
                sent.push(text);
            }
            sent
        }
    }

    pub struct MockTransport {
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, text: String) -> Result<(), TransportError> {
            self.outbound
                .send(text)
                .map_err(|e| TransportError::Send(e.to_string()))
        }

        async fn recv(&mut self) -> Option<Result<String, TransportError>> {
            self.inbound.recv().await.map(Ok)
        }

        async fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
            self.inbound.close();
        }
    }

    #[derive(Default)]
    struct Script {
        outcomes: VecDeque<bool>,
        attempts: Vec<Instant>,
        stall: bool,
    }

    /// Attempts past the end of the script fail.
    #[derive(Clone)]
    pub struct MockConnector {
        script: Arc<Mutex<Script>>,
        peers: mpsc::UnboundedSender<MockPeer>,
    }

    impl MockConnector {
        pub fn new(outcomes: &[bool]) -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
            let (peers, peer_rx) = mpsc::unbounded_channel();
            let script = Script {
                outcomes: outcomes.iter().copied().collect(),
                ..Script::default()
            };
            let connector = Self {
                script: Arc::new(Mutex::new(script)),
                peers,
            };
            (connector, peer_rx)
        }

        /// Every attempt hangs in the handshake forever.
        pub fn stalled() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
            let (connector, peer_rx) = Self::new(&[]);
            connector.script.lock().unwrap().stall = true;
            (connector, peer_rx)
        }

        pub fn attempts(&self) -> Vec<Instant> {
            self.script.lock().unwrap().attempts.clone()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&self, endpoint: &str) -> Result<MockTransport, TransportError> {
            let (accept, stall) = {
                let mut script = self.script.lock().unwrap();
                script.attempts.push(Instant::now());
                (script.outcomes.pop_front().unwrap_or(false), script.stall)
            };
            if stall {
                std::future::pending::<()>().await;
            }
            if !accept {
                return Err(TransportError::Connect(format!("{endpoint} refused")));
            }

            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let closed = Arc::new(Mutex::new(false));
            let _ = self.peers.send(MockPeer {
                outbound: out_rx,
                inbound: in_tx,
                closed: Arc::clone(&closed),
            });
            Ok(MockTransport {
                outbound: out_tx,
                inbound: in_rx,
                closed,
            })
        }
    }
}
