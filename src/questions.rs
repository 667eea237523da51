//! Question bank: loads the topic-tagged question set and serves
//! non-repeating random questions per topic.
//!
//! The bank itself is immutable and shared across all rooms; exhaustion
//! tracking is a per-room used-id set passed into [`QuestionBank::select`],
//! so one room cycling through a topic never starves another.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{Question, QuestionId};

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read question file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse question file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),
}

/// On-disk format: `{"questions": [...]}`.
#[derive(Debug, Deserialize)]
struct QuestionFile {
    questions: Vec<Question>,
}

#[derive(Debug, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
    by_topic: HashMap<String, Vec<usize>>,
}

impl QuestionBank {
    /// A bank with no questions. Every selection fails until a real file is
    /// configured; the server still runs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the bank from a JSON question file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionBankError> {
        let raw = std::fs::read_to_string(path)?;
        let file: QuestionFile = serde_json::from_str(&raw)?;
        Self::from_questions(file.questions)
    }

    /// Build a bank from an in-memory question list. Ids must be unique.
    pub fn from_questions(questions: Vec<Question>) -> Result<Self, QuestionBankError> {
        let mut seen = HashSet::new();
        let mut by_topic: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, q) in questions.iter().enumerate() {
            if !seen.insert(q.id.clone()) {
                return Err(QuestionBankError::DuplicateId(q.id.clone()));
            }
            by_topic.entry(q.topic.clone()).or_default().push(idx);
        }

        Ok(Self {
            questions,
            by_topic,
        })
    }

    /// Pick a uniformly random unused question for `topic`, marking it used.
    ///
    /// When every question of the topic has been used, the topic's entries
    /// are cleared from `used` first (the pool is cyclic). Returns `None`
    /// only if the topic has no questions defined at all — a configuration
    /// error the caller surfaces, not a retriable condition.
    pub fn select(
        &self,
        topic: &str,
        used: &mut HashSet<QuestionId>,
        rng: &mut impl Rng,
    ) -> Option<&Question> {
        let indices = self.by_topic.get(topic)?;

        let mut fresh: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| !used.contains(&self.questions[i].id))
            .collect();

        if fresh.is_empty() {
            for &i in indices {
                used.remove(&self.questions[i].id);
            }
            fresh = indices.clone();
        }

        let pick = fresh[rng.random_range(0..fresh.len())];
        let question = &self.questions[pick];
        used.insert(question.id.clone());
        Some(question)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn topic_count(&self, topic: &str) -> usize {
        self.by_topic.get(topic).map(Vec::len).unwrap_or(0)
    }

    pub fn topics(&self) -> Vec<&str> {
        self.by_topic.keys().map(String::as_str).collect()
    }

    /// Look up a question by id (used by tests to resolve the correct
    /// answer for a question a room has broadcast).
    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}
