//! Connection tracking for the trivia server
//!
//! This module owns the identity half of every player session:
//! - Player ID generation and assignment on connect
//! - The outbound channel used to reach each live connection
//! - Population signals when the first player arrives or the last one leaves
//!
//! Scores and answer flags are deliberately not stored here; the round state
//! machine keys those by the [`PlayerId`] handed out by this registry.

use log::info;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const PLAYER_ID_LEN: usize = 7;

/// Opaque unique token identifying a connected player
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Generates a random lowercase alphanumeric token
    pub fn random() -> Self {
        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PLAYER_ID_LEN)
            .map(char::from)
            .collect();
        Self(token.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a registry change that the supervisor may act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationSignal {
    /// The registry went from empty to one connection
    GameShouldStart,
    /// The last live connection left
    GameShouldPause,
    Unchanged,
}

/// A live connection and the channel feeding its socket writer
///
/// Cloning a connection clones the sending half only, which is how
/// snapshot iteration stays independent of later registry changes.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Player identifier assigned by the registry
    pub id: PlayerId,
    /// Remote address, kept for diagnostics
    pub addr: SocketAddr,
    /// When the connection was registered
    pub connected_at: Instant,
    sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a frame for the connection's writer task
    ///
    /// Fails only when the writer has already gone away, which means the
    /// socket is closed or broken.
    pub fn send(&self, message: Message) -> Result<(), mpsc::error::SendError<Message>> {
        self.sender.send(message)
    }

    /// Returns true if the writer task has dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Tracks every currently connected player
///
/// The registry is the ground truth for "how many players are live". The
/// round state machine re-reads [`ConnectionRegistry::live_count`] on every
/// answer submission instead of caching it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<PlayerId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Registers a new connection and assigns it a fresh player ID
    ///
    /// Returns the ID together with [`PopulationSignal::GameShouldStart`] when
    /// this was the first live connection.
    pub fn register(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> (PlayerId, PopulationSignal) {
        let mut id = PlayerId::random();
        while self.connections.contains_key(&id) {
            id = PlayerId::random();
        }

        let signal = if self.connections.is_empty() {
            PopulationSignal::GameShouldStart
        } else {
            PopulationSignal::Unchanged
        };

        info!("Player {} connected from {}", id, addr);
        self.connections
            .insert(id.clone(), Connection::new(id.clone(), addr, sender));

        (id, signal)
    }

    /// Removes a connection
    ///
    /// Idempotent: removing an unknown ID is a no-op that reports
    /// [`PopulationSignal::Unchanged`].
    pub fn unregister(&mut self, id: &PlayerId) -> PopulationSignal {
        match self.connections.remove(id) {
            Some(connection) => {
                info!(
                    "Player {} disconnected after {:.1}s",
                    id,
                    connection.connected_at.elapsed().as_secs_f32()
                );
                if self.connections.is_empty() {
                    PopulationSignal::GameShouldPause
                } else {
                    PopulationSignal::Unchanged
                }
            }
            None => PopulationSignal::Unchanged,
        }
    }

    pub fn live_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn connection(&self, id: &PlayerId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Copies the current live set
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections.values().cloned().collect()
    }

    /// Calls `f` for every connection that was live when the call started
    pub fn for_each_live<F>(&self, mut f: F)
    where
        F: FnMut(&Connection),
    {
        for connection in self.snapshot() {
            f(&connection);
        }
    }
}
