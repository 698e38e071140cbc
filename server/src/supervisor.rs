//! Top-level coordination of registry, round machine and broadcaster
//!
//! Every input reaches the game through one of the `on_*` methods below, and
//! the network layer calls them from a single task. That serialization is the
//! only synchronization the round state needs.

use crate::broadcaster::Broadcaster;
use crate::config::GameConfig;
use crate::question_source::QuestionSource;
use crate::registry::{ConnectionRegistry, PlayerId, PopulationSignal};
use crate::round::{Phase, RoundStateMachine, Wakeup};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub fn welcome_text(id: &PlayerId) -> String {
    format!("Welcome to the game! Your player id is: {}", id)
}

pub struct GameSupervisor<S> {
    registry: ConnectionRegistry,
    machine: RoundStateMachine,
    broadcaster: Broadcaster,
    source: S,
    config: GameConfig,
}

impl<S: QuestionSource> GameSupervisor<S> {
    pub fn new(config: GameConfig, source: S) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            machine: RoundStateMachine::new(config.timings),
            broadcaster: Broadcaster::new(),
            source,
            config,
        }
    }

    /// Registers a new player and starts a round if none is running
    ///
    /// The round is (re)started whenever the machine is idle, which covers
    /// the first player arriving and retrying after a failed question fetch.
    pub fn on_connect(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
        now: Instant,
    ) -> PlayerId {
        let (id, signal) = self.registry.register(addr, sender);
        self.machine.add_player(id.clone());

        self.broadcaster.unicast(
            &self.registry,
            &id,
            &ServerMessage::Message {
                text: welcome_text(&id),
            },
        );

        if signal == PopulationSignal::GameShouldStart {
            info!("First player joined, starting a game");
        }
        if self.machine.phase() == Phase::Idle {
            self.start_new_round(now);
        }

        id
    }

    pub fn on_disconnect(&mut self, id: &PlayerId) {
        let signal = self.registry.unregister(id);
        self.machine.remove_player(id);

        if signal == PopulationSignal::GameShouldPause {
            info!("No players left, pausing the game");
            self.machine.halt();
        }
        self.flush_events();
    }

    /// Handles one inbound text frame from `id`
    pub fn on_message(&mut self, id: &PlayerId, text: &str, now: Instant) {
        if !self.registry.contains(id) {
            debug!("Ignoring message from unregistered player {}", id);
            return;
        }

        match ClientMessage::parse(text) {
            Ok(Some(ClientMessage::Answer(payload))) => {
                let live_players = self.registry.live_count();
                if !self
                    .machine
                    .submit_answer(id, &payload.answer, live_players, now)
                {
                    debug!("Ignored answer from player {}", id);
                }
            }
            Ok(None) => debug!("Ignoring unrecognized message from player {}", id),
            Err(e) => warn!("Dropping malformed message from player {}: {}", id, e),
        }

        self.flush_events();
    }

    /// Fires the pending timer if it is due
    pub fn on_timer(&mut self, now: Instant) {
        let Some(wakeup) = self.machine.take_due_wakeup(now) else {
            return;
        };

        match wakeup {
            Wakeup::Tick => self.machine.tick(now),
            Wakeup::Advance => self.machine.advance(now),
            Wakeup::Restart => self.start_new_round(now),
        }
        self.flush_events();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.machine.next_deadline()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn machine(&self) -> &RoundStateMachine {
        &self.machine
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    fn start_new_round(&mut self, now: Instant) {
        let started = self
            .source
            .fetch_random_questions(self.config.batch_size)
            .map_err(|e| e.to_string())
            .and_then(|questions| {
                self.machine
                    .start_round(questions, now)
                    .map_err(|e| e.to_string())
            });

        if let Err(reason) = started {
            error!("Could not start a round, game stays idle: {}", reason);
            self.machine.halt();
        }
        self.flush_events();
    }

    fn flush_events(&mut self) {
        for event in self.machine.drain_events() {
            self.broadcaster.dispatch(&self.registry, event);
        }
    }
}
