//! Question supply for rounds
//!
//! The round machinery only needs [`QuestionSource::fetch_random_questions`].
//! [`QuestionBank`] is the in-memory implementation, filled either from the
//! built-in set or from a JSON file of `{question, options, answer}` objects.

use log::{info, warn};
use rand::seq::SliceRandom;
use rand::thread_rng;
use shared::{Question, MAX_BATCH_SIZE};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("question bank is empty")]
    Empty,
    #[error("failed to read question file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse question file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("question source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies random question batches for new rounds
pub trait QuestionSource {
    /// Returns up to `count` distinct questions in random order
    ///
    /// `count` is clamped to `1..=MAX_BATCH_SIZE`. Implementations return an
    /// error rather than an empty batch.
    fn fetch_random_questions(&self, count: usize) -> Result<Vec<Question>, SourceError>;
}

/// In-memory question bank
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Builds a bank, discarding questions that fail validation
    pub fn from_questions(questions: Vec<Question>) -> Self {
        let questions = questions
            .into_iter()
            .filter(|question| match question.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping invalid question {:?}: {}", question.prompt, e);
                    false
                }
            })
            .collect();
        Self { questions }
    }

    /// Loads a JSON array of questions from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let questions: Vec<Question> =
            serde_json::from_str(&raw).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let bank = Self::from_questions(questions);
        info!(
            "Loaded {} questions from {}",
            bank.len(),
            path.display()
        );
        Ok(bank)
    }

    /// The general knowledge set shipped with the server
    pub fn builtin() -> Self {
        Self::from_questions(vec![
            builtin_question(
                "What is the longest river in the world?",
                &["Nile", "Amazon", "Yangtze", "Mississippi"],
                "Amazon",
            ),
            builtin_question(
                "In what year did humans first land on the Moon?",
                &["1965", "1969", "1972", "1980"],
                "1969",
            ),
            builtin_question(
                "Which planet is known as the \"Red Planet\"?",
                &["Mars", "Jupiter", "Venus", "Saturn"],
                "Mars",
            ),
            builtin_question(
                "How many bones are in the adult human body?",
                &["206", "300", "198", "212"],
                "206",
            ),
            builtin_question(
                "Who painted the \"Mona Lisa\"?",
                &["Van Gogh", "Picasso", "Michelangelo", "Leonardo da Vinci"],
                "Leonardo da Vinci",
            ),
            builtin_question(
                "In which city is the Eiffel Tower?",
                &["London", "Rome", "Paris", "Tokyo"],
                "Paris",
            ),
            builtin_question(
                "What is the largest ocean?",
                &["Atlantic", "Indian", "Arctic", "Pacific"],
                "Pacific",
            ),
            builtin_question(
                "What is the largest animal in the world?",
                &["Elephant", "Blue whale", "Giraffe", "Great white shark"],
                "Blue whale",
            ),
            builtin_question(
                "Which is the most populous country in the world?",
                &["United States", "India", "China", "Russia"],
                "India",
            ),
            builtin_question(
                "What is the smallest continent?",
                &["Asia", "Europe", "Australia", "Africa"],
                "Australia",
            ),
            builtin_question(
                "What is the most abundant metal in the Earth's crust?",
                &["Iron", "Copper", "Aluminium", "Gold"],
                "Aluminium",
            ),
            builtin_question(
                "In what year was Google founded?",
                &["1995", "1998", "2001", "2004"],
                "1998",
            ),
            builtin_question(
                "What is the capital of Japan?",
                &["Seoul", "Beijing", "Tokyo", "Bangkok"],
                "Tokyo",
            ),
            builtin_question(
                "Which gas do plants absorb from the air?",
                &["Oxygen", "Nitrogen", "Carbon dioxide", "Methane"],
                "Carbon dioxide",
            ),
            builtin_question(
                "What is the fastest land animal?",
                &["Lion", "Cheetah", "Antelope", "Horse"],
                "Cheetah",
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

fn builtin_question(prompt: &str, options: &[&str], answer: &str) -> Question {
    Question {
        prompt: prompt.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: answer.to_string(),
    }
}

impl QuestionSource for QuestionBank {
    fn fetch_random_questions(&self, count: usize) -> Result<Vec<Question>, SourceError> {
        if self.questions.is_empty() {
            return Err(SourceError::Empty);
        }

        let count = count.clamp(1, MAX_BATCH_SIZE);
        let mut rng = thread_rng();
        let mut batch: Vec<Question> = self
            .questions
            .choose_multiple(&mut rng, count)
            .cloned()
            .collect();
        batch.shuffle(&mut rng);

        Ok(batch)
    }
}
