//! The persistence seam
//!
//! The engine reads and mutates sessions through [`Repository`], the
//! surface the surrounding persistence layer implements. The contract
//! mirrors the engine's read-modify-write discipline: load the
//! session (with its quiz) for one operation, mutate it, then
//! [`Repository::checkpoint`] — the checkpoint is assumed durable
//! before the operation returns.
//!
//! [`InMemoryStore`] is the bundled implementation; real deployments
//! put a database behind the same trait.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::ids::{IdCounter, PlayerId, QuizId, SessionId};
use crate::quiz::Quiz;
use crate::session::QuizSession;

/// Load/persist surface the engine drives sessions through.
///
/// Implementations also issue the monotonically increasing session and
/// player ids, so that the engine never invents identifiers.
pub trait Repository {
    /// Returns the quiz with the given id.
    fn quiz(&self, quiz_id: QuizId) -> Result<&Quiz, Error>;

    /// Returns the session with the given id.
    fn session(&self, session_id: SessionId) -> Result<&QuizSession, Error>;

    /// Returns the session mutably together with the quiz it runs.
    fn session_and_quiz_mut(
        &mut self,
        session_id: SessionId,
    ) -> Result<(&mut QuizSession, &Quiz), Error>;

    /// Returns every session of a quiz, ascending by session id.
    fn sessions_of(&self, quiz_id: QuizId) -> Vec<&QuizSession>;

    /// Returns the id of the session the player belongs to.
    fn session_id_by_player(&self, player_id: PlayerId) -> Result<SessionId, Error>;

    /// Stores a freshly created session.
    fn insert_session(&mut self, session: QuizSession);

    /// Issues the next session id.
    fn next_session_id(&mut self) -> SessionId;

    /// Issues the next player id.
    fn next_player_id(&mut self) -> PlayerId;

    /// Makes the current state durable. Called by the engine after
    /// every mutating operation.
    fn checkpoint(&mut self);
}

/// A process-local [`Repository`]
///
/// Keeps quizzes and sessions in ordered maps and counts checkpoints
/// instead of writing anywhere. [`InMemoryStore::snapshot`] serializes
/// the whole store to JSON for callers that want an actual file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InMemoryStore {
    quizzes: BTreeMap<QuizId, Quiz>,
    sessions: BTreeMap<SessionId, QuizSession>,
    session_ids: IdCounter,
    player_ids: IdCounter,
    #[serde(skip)]
    checkpoints: u64,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a quiz created by the authoring layer.
    pub fn insert_quiz(&mut self, quiz: Quiz) {
        self.quizzes.insert(quiz.quiz_id, quiz);
    }

    /// Number of checkpoints taken so far.
    pub fn checkpoint_count(&self) -> u64 {
        self.checkpoints
    }

    /// Serializes the whole store to JSON.
    pub fn snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Repository for InMemoryStore {
    fn quiz(&self, quiz_id: QuizId) -> Result<&Quiz, Error> {
        self.quizzes.get(&quiz_id).ok_or(Error::QuizNotFound)
    }

    fn session(&self, session_id: SessionId) -> Result<&QuizSession, Error> {
        self.sessions.get(&session_id).ok_or(Error::SessionNotFound)
    }

    fn session_and_quiz_mut(
        &mut self,
        session_id: SessionId,
    ) -> Result<(&mut QuizSession, &Quiz), Error> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::SessionNotFound)?;
        let quiz = self.quizzes.get(&session.quiz_id).ok_or(Error::QuizNotFound)?;
        Ok((session, quiz))
    }

    fn sessions_of(&self, quiz_id: QuizId) -> Vec<&QuizSession> {
        self.sessions
            .values()
            .filter(|s| s.quiz_id == quiz_id)
            .collect()
    }

    fn session_id_by_player(&self, player_id: PlayerId) -> Result<SessionId, Error> {
        self.sessions
            .values()
            .find(|s| s.player(player_id).is_some())
            .map(|s| s.session_id)
            .ok_or(Error::PlayerNotFound)
    }

    fn insert_session(&mut self, session: QuizSession) {
        self.sessions.insert(session.session_id, session);
    }

    fn next_session_id(&mut self) -> SessionId {
        SessionId(self.session_ids.issue())
    }

    fn next_player_id(&mut self) -> PlayerId {
        PlayerId(self.player_ids.issue())
    }

    fn checkpoint(&mut self) {
        self.checkpoints += 1;
        log::trace!("checkpoint {}", self.checkpoints);
    }
}
