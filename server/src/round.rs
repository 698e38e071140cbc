//! Authoritative round state and its transitions
//!
//! [`RoundStateMachine`] owns the current [`Round`], every player's standing
//! and the single pending timer. Transitions never touch the network; they
//! append [`RoundEvent`]s to an outbox that the supervisor drains and hands to
//! the broadcaster.
//!
//! Time is passed in explicitly. The machine never sleeps, it only records
//! the deadline of its next [`Wakeup`] and lets the event loop wait for it.

use crate::registry::PlayerId;
use log::{debug, info, warn};
use shared::{
    Question, ANSWERED_GRACE, QUESTION_DURATION_SECS, RESTART_COOLDOWN, TIMEOUT_GRACE,
};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    QuestionActive,
    Transitioning,
    Finished,
}

/// What the pending timer does when its deadline passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// One second of the countdown has elapsed
    Tick,
    /// Grace delay after a question concluded
    Advance,
    /// Cooldown after game over; a fresh batch is needed
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTimer {
    deadline: Instant,
    wakeup: Wakeup,
}

/// Durations driving the round clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTimings {
    pub question_duration_secs: u32,
    pub tick_interval: Duration,
    pub timeout_grace: Duration,
    pub answered_grace: Duration,
    pub restart_cooldown: Duration,
}

impl Default for RoundTimings {
    fn default() -> Self {
        Self {
            question_duration_secs: QUESTION_DURATION_SECS,
            tick_interval: Duration::from_secs(1),
            timeout_grace: TIMEOUT_GRACE,
            answered_grace: ANSWERED_GRACE,
            restart_cooldown: RESTART_COOLDOWN,
        }
    }
}

/// State changes produced by the machine, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEvent {
    NewQuestion {
        prompt: String,
        options: Vec<String>,
        duration: u32,
    },
    TimerTick {
        remaining: u32,
    },
    TimeExpired,
    /// Addressed only to `player_id`
    AnswerResult {
        player_id: PlayerId,
        correct: bool,
    },
    GameOver {
        scores: BTreeMap<PlayerId, u32>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoundError {
    #[error("cannot start a round without questions")]
    EmptyBatch,
    #[error("cannot start a round while in phase {0:?}")]
    RoundInProgress(Phase),
}

/// One play-through of a fixed batch of questions
#[derive(Debug, Clone)]
pub struct Round {
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub phase: Phase,
    pub time_remaining: u32,
}

impl Round {
    fn idle() -> Self {
        Self {
            questions: Vec::new(),
            current_index: 0,
            phase: Phase::Idle,
            time_remaining: 0,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }
}

/// Per-player score and answer flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standing {
    pub score: u32,
    pub answered_current: bool,
}

pub struct RoundStateMachine {
    round: Round,
    standings: HashMap<PlayerId, Standing>,
    timer: Option<PendingTimer>,
    timings: RoundTimings,
    outbox: Vec<RoundEvent>,
}

impl RoundStateMachine {
    pub fn new(timings: RoundTimings) -> Self {
        Self {
            round: Round::idle(),
            standings: HashMap::new(),
            timer: None,
            timings,
            outbox: Vec::new(),
        }
    }

    pub fn add_player(&mut self, id: PlayerId) {
        self.standings.entry(id).or_default();
    }

    pub fn remove_player(&mut self, id: &PlayerId) {
        self.standings.remove(id);
    }

    /// Starts a new round from question 0 with every score reset
    ///
    /// Only allowed from `Idle` or `Finished`. An empty batch is rejected and
    /// leaves the machine untouched.
    pub fn start_round(&mut self, questions: Vec<Question>, now: Instant) -> Result<(), RoundError> {
        match self.round.phase {
            Phase::Idle | Phase::Finished => {}
            phase => return Err(RoundError::RoundInProgress(phase)),
        }
        if questions.is_empty() {
            return Err(RoundError::EmptyBatch);
        }

        info!("Starting round with {} questions", questions.len());
        for standing in self.standings.values_mut() {
            standing.score = 0;
        }
        self.round = Round {
            questions,
            current_index: 0,
            phase: Phase::QuestionActive,
            time_remaining: 0,
        };
        self.begin_question(now);
        Ok(())
    }

    /// Announces the current question and starts its countdown
    pub fn begin_question(&mut self, now: Instant) {
        self.cancel_timer();

        let Some(question) = self.round.current_question() else {
            warn!(
                "No question at index {}, not starting a countdown",
                self.round.current_index
            );
            return;
        };
        let event = RoundEvent::NewQuestion {
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            duration: self.timings.question_duration_secs,
        };

        debug!(
            "Question {}/{}: {}",
            self.round.current_index + 1,
            self.round.questions.len(),
            question.prompt
        );

        self.round.phase = Phase::QuestionActive;
        self.round.time_remaining = self.timings.question_duration_secs;
        for standing in self.standings.values_mut() {
            standing.answered_current = false;
        }
        self.outbox.push(event);
        self.schedule(now + self.timings.tick_interval, Wakeup::Tick);
    }

    /// Advances the countdown by one second
    pub fn tick(&mut self, now: Instant) {
        if self.round.phase != Phase::QuestionActive {
            debug!("Ignoring tick in phase {:?}", self.round.phase);
            return;
        }

        self.round.time_remaining = self.round.time_remaining.saturating_sub(1);
        self.outbox.push(RoundEvent::TimerTick {
            remaining: self.round.time_remaining,
        });

        if self.round.time_remaining == 0 {
            info!("Time expired, moving to the next question");
            self.cancel_timer();
            self.round.phase = Phase::Transitioning;
            self.outbox.push(RoundEvent::TimeExpired);
            self.schedule(now + self.timings.timeout_grace, Wakeup::Advance);
        } else {
            self.schedule(now + self.timings.tick_interval, Wakeup::Tick);
        }
    }

    /// Records a player's answer to the active question
    ///
    /// Returns false when the submission was ignored: wrong phase, unknown
    /// player, no current question or a repeated answer. `live_players` is the
    /// registry's live count at the time of the call.
    pub fn submit_answer(
        &mut self,
        player_id: &PlayerId,
        answer: &str,
        live_players: usize,
        now: Instant,
    ) -> bool {
        if self.round.phase != Phase::QuestionActive {
            return false;
        }
        let Some(question) = self.round.questions.get(self.round.current_index) else {
            return false;
        };
        let Some(standing) = self.standings.get_mut(player_id) else {
            return false;
        };
        if standing.answered_current {
            debug!("Player {} already answered, ignoring", player_id);
            return false;
        }

        let correct = question.is_correct(answer);
        standing.answered_current = true;
        if correct {
            standing.score += 1;
        }
        self.outbox.push(RoundEvent::AnswerResult {
            player_id: player_id.clone(),
            correct,
        });

        let answered = self
            .standings
            .values()
            .filter(|standing| standing.answered_current)
            .count();
        if live_players > 0 && answered >= live_players {
            info!("All {} players answered, moving to the next question", live_players);
            self.cancel_timer();
            self.round.phase = Phase::Transitioning;
            self.schedule(now + self.timings.answered_grace, Wakeup::Advance);
        }

        true
    }

    /// Moves to the next question, or finishes the round
    pub fn advance(&mut self, now: Instant) {
        self.cancel_timer();

        if self.round.phase == Phase::Idle || self.round.phase == Phase::Finished {
            debug!("Ignoring advance in phase {:?}", self.round.phase);
            return;
        }

        self.round.current_index += 1;
        if self.round.current_index >= self.round.questions.len() {
            self.round.current_index = self.round.questions.len();
            self.round.phase = Phase::Finished;
            self.round.time_remaining = 0;

            let scores = self.scores();
            info!("Round finished: {:?}", scores);
            self.outbox.push(RoundEvent::GameOver { scores });
            self.schedule(now + self.timings.restart_cooldown, Wakeup::Restart);
        } else {
            self.begin_question(now);
        }
    }

    /// Drops any pending timer and returns to `Idle`
    pub fn halt(&mut self) {
        if self.round.phase != Phase::Idle {
            info!("Halting round in phase {:?}", self.round.phase);
        }
        self.cancel_timer();
        self.round = Round::idle();
        for standing in self.standings.values_mut() {
            standing.answered_current = false;
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|timer| timer.deadline)
    }

    /// Takes the pending wakeup if its deadline has passed
    pub fn take_due_wakeup(&mut self, now: Instant) -> Option<Wakeup> {
        match self.timer {
            Some(timer) if timer.deadline <= now => {
                self.timer = None;
                Some(timer.wakeup)
            }
            _ => None,
        }
    }

    pub fn drain_events(&mut self) -> Vec<RoundEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn phase(&self) -> Phase {
        self.round.phase
    }

    pub fn current_index(&self) -> usize {
        self.round.current_index
    }

    pub fn time_remaining(&self) -> u32 {
        self.round.time_remaining
    }

    pub fn standing(&self, id: &PlayerId) -> Option<Standing> {
        self.standings.get(id).copied()
    }

    pub fn scores(&self) -> BTreeMap<PlayerId, u32> {
        self.standings
            .iter()
            .map(|(id, standing)| (id.clone(), standing.score))
            .collect()
    }

    pub fn pending_wakeup(&self) -> Option<Wakeup> {
        self.timer.map(|timer| timer.wakeup)
    }

    fn schedule(&mut self, deadline: Instant, wakeup: Wakeup) {
        self.timer = Some(PendingTimer { deadline, wakeup });
    }

    fn cancel_timer(&mut self) {
        self.timer = None;
    }
}
