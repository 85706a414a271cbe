//! Error types for the session engine
//!
//! Every fallible operation in the engine fails with [`Error`], a
//! single enum of specific conditions. Callers that need to map
//! failures onto a transport (HTTP statuses, RPC codes) classify them
//! through [`Error::kind`]. All errors are surfaced synchronously and
//! an operation that fails leaves the session untouched.

use serde::Serialize;
use thiserror::Error;

/// Broad classification of an [`Error`], for callers mapping failures
/// onto transport-level codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// A referenced session, quiz, player or question does not exist
    NotFound,
    /// The operation is not legal in the session's current state
    InvalidState,
    /// The operation's input is malformed or out of range
    InvalidInput,
    /// The operation collides with existing state (duplicates, limits)
    Conflict,
}

/// Errors produced by the session engine
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No session with the given id exists
    #[error("session does not exist")]
    SessionNotFound,
    /// No quiz with the given id exists
    #[error("quiz does not exist")]
    QuizNotFound,
    /// No player with the given id exists
    #[error("player does not exist")]
    PlayerNotFound,
    /// The question position is outside the quiz's question list
    #[error("question position is out of range")]
    QuestionOutOfRange,
    /// The action is not present in the transition table for the current state
    #[error("action cannot be performed in the current state")]
    InvalidAction,
    /// `NEXT_QUESTION` was attempted while already on the last question
    #[error("already at the last question")]
    OutOfQuestions,
    /// A player tried to join a session that has left the lobby
    #[error("session is not in LOBBY state")]
    NotInLobby,
    /// An answer was submitted while the question is not open
    #[error("session is not in QUESTION_OPEN state")]
    NotOpenForAnswers,
    /// The session or the player is not on the submitted question
    #[error("session or player is at a different question")]
    WrongQuestion,
    /// The submission contains the same answer id more than once
    #[error("duplicate answer ids in submission")]
    DuplicateAnswers,
    /// The submission contains an answer id the question does not have
    #[error("answer id does not belong to the question")]
    UnknownAnswerId,
    /// The submission contains no answer ids
    #[error("no answer submitted")]
    EmptyAnswer,
    /// The requested player name is already used within the session
    #[error("name is already in use")]
    NameTaken,
    /// The quiz already has the maximum number of active sessions
    #[error("too many active sessions for this quiz")]
    TooManySessions,
    /// A session cannot be started for a quiz without questions
    #[error("quiz has no questions")]
    NoQuestions,
    /// The auto-start threshold is outside the allowed bounds
    #[error("auto-start threshold is out of bounds")]
    AutoStartOutOfRange,
    /// Results were requested in a state where they are not available
    #[error("results are not available in the current state")]
    ResultsUnavailable,
    /// Question information was requested in a state where it is hidden
    #[error("question is not visible in the current state")]
    QuestionUnavailable,
    /// A chat message is shorter or longer than allowed
    #[error("message length is out of bounds")]
    MessageLength,
}

impl Error {
    /// Classifies this error into the coarse [`ErrorKind`] taxonomy.
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::SessionNotFound | Self::QuizNotFound | Self::PlayerNotFound => {
                ErrorKind::NotFound
            }
            Self::InvalidAction
            | Self::OutOfQuestions
            | Self::NotInLobby
            | Self::NotOpenForAnswers
            | Self::ResultsUnavailable
            | Self::QuestionUnavailable => ErrorKind::InvalidState,
            Self::QuestionOutOfRange
            | Self::WrongQuestion
            | Self::DuplicateAnswers
            | Self::UnknownAnswerId
            | Self::EmptyAnswer
            | Self::NoQuestions
            | Self::AutoStartOutOfRange
            | Self::MessageLength => ErrorKind::InvalidInput,
            Self::NameTaken | Self::TooManySessions => ErrorKind::Conflict,
        }
    }
}
