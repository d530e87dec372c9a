use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub votes: HashMap<String, u64>,
    #[serde(
        rename = "createdAt",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Reasons a poll cannot be created. Checked in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("at least 2 options required, got {0}")]
    TooFewOptions(usize),
    #[error("duplicate option: {0}")]
    DuplicateOption(String),
}

pub const MIN_OPTIONS: usize = 2;

/// Checks that a question and option list may form a poll.
///
/// The question is not trimmed: `" "` is accepted. Duplicate option text is
/// rejected because two identical options would share one counter.
pub fn validate(question: &str, options: &[String]) -> Result<(), ValidationError> {
    if question.is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    if options.len() < MIN_OPTIONS {
        return Err(ValidationError::TooFewOptions(options.len()));
    }

    let mut seen = HashSet::with_capacity(options.len());
    for option in options {
        if !seen.insert(option.as_str()) {
            return Err(ValidationError::DuplicateOption(option.clone()));
        }
    }

    Ok(())
}

impl Poll {
    // Builds a poll with every option's count set to zero. Callers validate first.
    pub fn new(id: String, question: String, options: Vec<String>) -> Self {
        let votes = options.iter().map(|text| (text.clone(), 0)).collect();

        Self {
            id,
            question,
            options,
            votes,
            created_at: Some(Utc::now()),
        }
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    pub fn total_votes(&self) -> u64 {
        self.votes.values().sum()
    }
}
