use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;

pub const QUESTION_DURATION_SECS: u32 = 15;
pub const TIMEOUT_GRACE: Duration = Duration::from_millis(2000);
pub const ANSWERED_GRACE: Duration = Duration::from_millis(1000);
pub const RESTART_COOLDOWN: Duration = Duration::from_millis(2500);
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const MAX_BATCH_SIZE: usize = 20;
pub const MIN_OPTIONS: usize = 2;

/// A single multiple choice question.
///
/// The serialized field names (`question`, `options`, `answer`) match the
/// question bank file format.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Question {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(rename = "answer")]
    pub correct_answer: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question prompt is empty")]
    EmptyPrompt,
    #[error("question has {0} options, at least two are required")]
    TooFewOptions(usize),
    #[error("option {0:?} appears more than once")]
    DuplicateOption(String),
    #[error("correct answer {0:?} is not one of the options")]
    AnswerNotAnOption(String),
}

impl Question {
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let question = Self {
            prompt: prompt.into(),
            options,
            correct_answer: correct_answer.into(),
        };
        question.validate()?;
        Ok(question)
    }

    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if self.options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions(self.options.len()));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if !seen.insert(option.as_str()) {
                return Err(QuestionError::DuplicateOption(option.clone()));
            }
        }

        if !seen.contains(self.correct_answer.as_str()) {
            return Err(QuestionError::AnswerNotAnOption(
                self.correct_answer.clone(),
            ));
        }
        Ok(())
    }

    /// Exact string comparison against the correct answer
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }
}

/// Messages sent from a client to the server
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Answer(AnswerPayload),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AnswerPayload {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("{0} message has no payload")]
    MissingPayload(&'static str),
    #[error("{kind} payload does not match the expected schema: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

impl ClientMessage {
    /// Parses an inbound text frame.
    ///
    /// Returns `Ok(None)` for well-formed envelopes whose `type` is not
    /// recognized, so callers can ignore them without treating them as errors.
    pub fn parse(text: &str) -> Result<Option<Self>, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;

        match envelope.kind.as_str() {
            "answer" => {
                let payload = envelope
                    .payload
                    .ok_or(ProtocolError::MissingPayload("answer"))?;
                let answer = serde_json::from_value(payload).map_err(|source| {
                    ProtocolError::InvalidPayload {
                        kind: "answer",
                        source,
                    }
                })?;
                Ok(Some(ClientMessage::Answer(answer)))
            }
            _ => Ok(None),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerVerdict {
    Correct,
    Wrong,
}

impl From<bool> for AnswerVerdict {
    fn from(correct: bool) -> Self {
        if correct {
            AnswerVerdict::Correct
        } else {
            AnswerVerdict::Wrong
        }
    }
}

/// Messages sent from the server to clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Message {
        text: String,
    },
    NewQuestion {
        question: String,
        options: Vec<String>,
        timer: u32,
    },
    TimerTick {
        time: u32,
    },
    AnswerResult {
        result: AnswerVerdict,
    },
    GameOver {
        scores: BTreeMap<String, u32>,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
