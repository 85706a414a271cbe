//! Quiz model consumed by the session engine
//!
//! This module defines the read-side view of a quiz that a live
//! session runs against: the ordered question list with per-question
//! timing, point values and answer options. Authoring and validating
//! quizzes is the business of the surrounding system; the engine only
//! reads them.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::{AnswerId, QuestionId, QuizId};

/// A single answer option of a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Identifier of this answer option
    pub answer_id: AnswerId,
    /// The answer text shown to players
    pub text: String,
    /// Whether selecting this option counts towards a correct submission
    pub correct: bool,
}

/// A question within a quiz
///
/// `duration` is how long the question stays answerable once open;
/// `points` is the full award for the first correct submission.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier of this question
    pub question_id: QuestionId,
    /// The question text
    pub text: String,
    /// How long the question stays open for answers
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub duration: Duration,
    /// Full point value awarded to the first correct submission
    pub points: f64,
    /// The available answer options
    pub answers: Vec<Answer>,
}

impl Question {
    /// Returns the set of all answer ids this question has.
    pub fn answer_ids(&self) -> HashSet<AnswerId> {
        self.answers.iter().map(|a| a.answer_id).collect()
    }

    /// Returns the set of answer ids flagged as correct.
    pub fn correct_answer_ids(&self) -> HashSet<AnswerId> {
        self.answers
            .iter()
            .filter(|a| a.correct)
            .map(|a| a.answer_id)
            .collect()
    }
}

/// The read-side quiz aggregate a session runs against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    /// Identifier of this quiz
    pub quiz_id: QuizId,
    /// The quiz name (not used by the engine beyond reporting)
    pub name: String,
    /// The ordered question list
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Returns the number of questions in this quiz.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks whether this quiz has no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question at a 1-based position.
    pub fn question_at(&self, position: usize) -> Option<&Question> {
        position
            .checked_sub(1)
            .and_then(|index| self.questions.get(index))
    }

    /// Returns the question with the given id.
    pub fn question_by_id(&self, question_id: QuestionId) -> Option<&Question> {
        self.questions
            .iter()
            .find(|q| q.question_id == question_id)
    }

    /// Returns the 0-based index of the question with the given id.
    pub fn index_of(&self, question_id: QuestionId) -> Option<usize> {
        self.questions
            .iter()
            .position(|q| q.question_id == question_id)
    }
}
