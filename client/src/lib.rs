//! # Word Bash Client Library
//!
//! Client-side implementation of the Word Bash multiplayer word-placement
//! game: one persistent connection per game, a reconciled local view of the
//! authoritative game state, and a small terminal front end.
//!
//! ## Architecture Overview
//!
//! ### Optimistic Staging
//! Tile placements are staged locally and shown immediately. They live in a
//! layer of their own above the board and are never written into it.
//!
//! ### Authoritative Merge
//! `state_updated` frames from the server are merged field by field into the
//! store. The board always wins: a staged tile on a cell the server has since
//! filled is dropped.
//!
//! ### Connection Recovery
//! The connection manager reconnects after involuntary closes with
//! exponential backoff (1s, 2s, 4s, 8s, 16s) and rejoins with the same
//! session identity. After five failed attempts it gives up and says so once.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The connection state machine, run as a tokio task:
//! - Connect / reconnect / heartbeat / leave
//! - Typed outbound sends through [`network::ConnectionHandle`]
//! - Inbound frames and status changes as [`network::ConnectionEvent`]s
//!
//! ### Transport Module (`transport`)
//! The seam under the manager: [`transport::Connector`] and
//! [`transport::Transport`], with a WebSocket implementation.
//!
//! ### Game Module (`game`)
//! [`game::GameStore`], the read model for presentation: roster, board, turn,
//! staged placements, activity log and notifications.
//!
//! ### Session Module (`session`)
//! [`session::GameSession`] ties a connection handle and a store together and
//! turns inbound messages and user actions into store mutations.
//!
//! ### Collaborators
//! - `api`: game allocation over HTTP
//! - `storage`: display name persistence
//! - `input` / `rendering`: terminal command parsing and text output
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{ConnectionConfig, ConnectionManager};
//! use client::session::{GameSession, SessionIdentity};
//! use client::transport::WsConnector;
//!
//! # async fn run() {
//! let identity = SessionIdentity::new("ws://localhost:3000/ws/GAME123", "GAME123", "player-1", "Alice");
//! let (handle, mut events) =
//!     ConnectionManager::spawn(WsConnector, identity, ConnectionConfig::default());
//! let mut session = GameSession::new(handle);
//! session.connect();
//!
//! while let Some(event) = events.recv().await {
//!     session.handle_event(event);
//!     if session.store().connection_lost() {
//!         break;
//!     }
//! }
//! # }
//! ```

pub mod api;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
pub mod session;
pub mod storage;
pub mod transport;
