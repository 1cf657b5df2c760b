//! The fixed, linear phrase sequence a training session walks through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::CONVERSATION_COURSE;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson must contain at least one sentence")]
    Empty,
    #[error("lesson sentence {index} has an empty phrase")]
    BlankSentence { index: usize },
    #[error("invalid lesson file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A Doric phrase paired with its English translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub doric: String,
    pub translation: String,
}

impl Sentence {
    #[must_use]
    pub fn new(doric: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            doric: doric.into(),
            translation: translation.into(),
        }
    }
}

/// Ordered, non-empty list of sentences for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LessonFile")]
pub struct LessonSequence {
    course: String,
    sentences: Vec<Sentence>,
}

#[derive(Deserialize)]
struct LessonFile {
    #[serde(default = "default_course")]
    course: String,
    sentences: Vec<Sentence>,
}

fn default_course() -> String {
    CONVERSATION_COURSE.to_owned()
}

impl TryFrom<LessonFile> for LessonSequence {
    type Error = LessonError;

    fn try_from(file: LessonFile) -> Result<Self, Self::Error> {
        Self::new(file.course, file.sentences)
    }
}

impl LessonSequence {
    /// # Errors
    ///
    /// Returns `LessonError::Empty` for an empty list and
    /// `LessonError::BlankSentence` if any Doric phrase is blank.
    pub fn new(course: impl Into<String>, sentences: Vec<Sentence>) -> Result<Self, LessonError> {
        if sentences.is_empty() {
            return Err(LessonError::Empty);
        }
        if let Some(index) = sentences.iter().position(|s| s.doric.trim().is_empty()) {
            return Err(LessonError::BlankSentence { index });
        }
        Ok(Self {
            course: course.into(),
            sentences,
        })
    }

    /// Parses a lesson from JSON: `{"course": "...", "sentences": [{"doric", "translation"}]}`.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` on malformed JSON or an invalid sequence.
    pub fn from_json(raw: &str) -> Result<Self, LessonError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The built-in conversation course, ending with a completion card.
    #[must_use]
    pub fn conversation() -> Self {
        let sentences = [
            ("Aye aye min", "Hello sir"),
            ("Foo's yer doos?", "How are you?"),
            ("Aye pechin, and yersel'", "I'm fine, how are you?"),
            ("I dinna ken", "I don't know"),
            ("Fit like i' day?", "How are you doing today?"),
            ("Nae spikkin'", "Not speaking"),
            ("Loon", "A boy"),
            ("Quine", "A girl"),
            ("Feel", "Stupid"),
            ("Teuchter", "Someone who lives in the countryside"),
            ("Congratulations!", "You have completed the course"),
        ]
        .into_iter()
        .map(|(doric, translation)| Sentence::new(doric, translation))
        .collect();

        Self {
            course: CONVERSATION_COURSE.to_owned(),
            sentences,
        }
    }

    #[must_use]
    pub fn course(&self) -> &str {
        &self.course
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    /// Always false; construction rejects empty lessons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    #[must_use]
    pub fn last_index(&self) -> u32 {
        u32::try_from(self.sentences.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn clamp(&self, index: u32) -> u32 {
        index.min(self.last_index())
    }

    /// Index after `current`, held at the final sentence.
    #[must_use]
    pub fn next_index(&self, current: u32) -> u32 {
        self.clamp(current.saturating_add(1))
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&Sentence> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.sentences.get(i))
    }

    #[must_use]
    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }
}
