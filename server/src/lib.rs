//! # Trivia Server Library
//!
//! This library provides the authoritative server for a real-time multiplayer
//! trivia game. It owns the canonical round state, accepts answers from
//! connected players and pushes synchronized updates to every client over
//! WebSockets.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rounds
//! The server decides which question is active, how much time is left and who
//! scored. Clients only render what they are told and submit answers.
//!
//! ### Player Management
//! Handles the lifecycle of every connection:
//! - Player ID assignment on connect
//! - Duplicate answer suppression
//! - Disconnection handling and cleanup
//!
//! ### State Broadcasting
//! Every transition of the round (new question, timer tick, expiry, game over)
//! is fanned out to all live connections. Answer verdicts go only to the
//! player who answered.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Connection tasks never touch game state. They forward frames to one event
//! loop, which also waits on the round's single pending timer. Connects,
//! disconnects, answers and timer wakeups are therefore processed strictly one
//! after another, with no locks around the round.
//!
//! ### One Timer Slot
//! The round machine keeps at most one pending wakeup. Scheduling a new one
//! replaces the old, so a stale countdown can never advance the round twice.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Live connections, player IDs and population signals.
//!
//! ### Round Module (`round`)
//! The round state machine: questions, phases, countdown, scores.
//!
//! ### Broadcaster Module (`broadcaster`)
//! Best-effort fan-out and unicast of server messages.
//!
//! ### Supervisor Module (`supervisor`)
//! Wires registry, round machine, broadcaster and question source together.
//!
//! ### Question Source Module (`question_source`)
//! Random question batches from an in-memory bank.
//!
//! ### Network Module (`network`)
//! WebSocket listener, per-connection tasks and the event loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//! use server::question_source::QuestionBank;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(
//!         "127.0.0.1:3000",
//!         GameConfig::default(),
//!         QuestionBank::builtin(),
//!     )
//!     .await?;
//!
//!     // Accepts players, runs rounds and broadcasts until shut down
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod config;
pub mod network;
pub mod question_source;
pub mod registry;
pub mod round;
pub mod supervisor;
