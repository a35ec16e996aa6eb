//! The final accusation questionnaire.

use crate::character::ActorId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccusationError {
    #[error("All questions are already answered")]
    AlreadyComplete,

    #[error("Question {question} has no option {option}")]
    NoSuchOption { question: usize, option: usize },

    #[error("Answered {answered} of {total} questions")]
    Incomplete { answered: usize, total: usize },
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
}

/// The actor who reacts to the player's deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealConfig {
    pub actor: ActorId,
    #[serde(default = "default_preamble")]
    pub preamble: String,
}

fn default_preamble() -> String {
    "Here is my deduction.".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccusationConfig {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub reveal: Option<RevealConfig>,
}

/// Answers given so far, one option index per question, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccusationSheet {
    answers: Vec<usize>,
}

impl AccusationSheet {
    pub fn answers(&self) -> &[usize] {
        &self.answers
    }

    /// Index of the question awaiting an answer.
    pub fn current<'a>(&self, config: &'a AccusationConfig) -> Option<(usize, &'a Question)> {
        let index = self.answers.len();
        config.questions.get(index).map(|q| (index, q))
    }

    pub fn is_complete(&self, config: &AccusationConfig) -> bool {
        self.answers.len() >= config.questions.len()
    }

    /// Answer the current question.
    pub fn choose(&mut self, config: &AccusationConfig, option: usize) -> Result<(), AccusationError> {
        let (question, current) = self
            .current(config)
            .ok_or(AccusationError::AlreadyComplete)?;
        if option >= current.options.len() {
            return Err(AccusationError::NoSuchOption { question, option });
        }
        self.answers.push(option);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.answers.clear();
    }

    /// The chat line that presents the player's deduction.
    pub fn compose_deduction(&self, config: &AccusationConfig) -> Result<String, AccusationError> {
        if !self.is_complete(config) {
            return Err(AccusationError::Incomplete {
                answered: self.answers.len(),
                total: config.questions.len(),
            });
        }

        let preamble = config
            .reveal
            .as_ref()
            .map_or_else(default_preamble, |r| r.preamble.clone());
        let mut lines = vec![preamble];
        for (question, &answer) in config.questions.iter().zip(&self.answers) {
            let choice = question.options.get(answer).map_or("", String::as_str);
            lines.push(format!("{} {}", question.prompt, choice));
        }
        Ok(lines.join("\n"))
    }
}
