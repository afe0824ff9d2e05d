use std::collections::HashSet;
use std::fmt;

use formhive_schema::Choice;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    FreeText,
    SingleChoice,
    Photo,
    /// A photo, or a text code typed instead of one
    PhotoOrCode,
}

impl AnswerKind {
    pub fn accepts_text(self) -> bool {
        matches!(self, AnswerKind::FreeText | AnswerKind::PhotoOrCode)
    }

    pub fn accepts_photo(self) -> bool {
        matches!(self, AnswerKind::Photo | AnswerKind::PhotoOrCode)
    }

    pub fn accepts_choice(self) -> bool {
        matches!(self, AnswerKind::SingleChoice)
    }
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnswerKind::FreeText => "free_text",
            AnswerKind::SingleChoice => "single_choice",
            AnswerKind::Photo => "photo",
            AnswerKind::PhotoOrCode => "photo_or_code",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub kind: AnswerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl Question {
    pub fn free_text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::FreeText,
            choices: vec![],
        }
    }

    pub fn single_choice(prompt: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::SingleChoice,
            choices,
        }
    }

    pub fn photo(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::Photo,
            choices: vec![],
        }
    }

    pub fn photo_or_code(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::PhotoOrCode,
            choices: vec![],
        }
    }

    /// Buttons to render with the prompt, if any.
    pub fn choice_set(&self) -> Option<&[Choice]> {
        if self.kind.accepts_choice() {
            Some(&self.choices)
        } else {
            None
        }
    }

    pub fn has_choice(&self, value: &str) -> bool {
        self.choices.iter().any(|choice| choice.value == value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("flow has no questions")]
    Empty,
    #[error("question {index} is single_choice but has no choices")]
    MissingChoices { index: usize },
    #[error("question {index} is {kind} and must not define choices")]
    UnexpectedChoices { index: usize, kind: AnswerKind },
    #[error("question {index} has an empty choice value")]
    EmptyChoiceValue { index: usize },
    #[error("question {index} repeats choice value: {value}")]
    DuplicateChoice { index: usize, value: String },
}

/// The fixed, ordered list of questions. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    questions: Vec<Question>,
}

impl Flow {
    pub fn new(questions: Vec<Question>) -> Result<Self, FlowError> {
        if questions.is_empty() {
            return Err(FlowError::Empty);
        }

        for (index, question) in questions.iter().enumerate() {
            if !question.kind.accepts_choice() {
                if !question.choices.is_empty() {
                    return Err(FlowError::UnexpectedChoices {
                        index,
                        kind: question.kind,
                    });
                }
                continue;
            }

            if question.choices.is_empty() {
                return Err(FlowError::MissingChoices { index });
            }
            let mut seen = HashSet::new();
            for choice in &question.choices {
                if choice.value.trim().is_empty() {
                    return Err(FlowError::EmptyChoiceValue { index });
                }
                if !seen.insert(choice.value.as_str()) {
                    return Err(FlowError::DuplicateChoice {
                        index,
                        value: choice.value.clone(),
                    });
                }
            }
        }

        Ok(Self { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    // A Flow is never empty; kept for clippy's len_without_is_empty.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.questions.len()
    }
}
