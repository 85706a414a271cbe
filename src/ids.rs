//! Identifier newtypes and issuance
//!
//! Every entity the engine touches is addressed by a numeric id issued
//! by the surrounding system as a monotonically increasing counter.
//! The engine only consumes freshly issued ids; it never invents them.
//! [`IdCounter`] is the issuing half, used by the in-memory store and
//! by tests.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            Display,
            From,
        )]
        pub struct $name(pub u64);
    };
}

id_type!(
    /// Identifier of a quiz (authoring-side aggregate)
    QuizId
);
id_type!(
    /// Identifier of a question within a quiz
    QuestionId
);
id_type!(
    /// Identifier of an answer option within a question
    AnswerId
);
id_type!(
    /// Identifier of a live quiz session, unique across all quizzes
    SessionId
);
id_type!(
    /// Identifier of a player, unique across all sessions
    PlayerId
);

/// A monotonically increasing id source.
///
/// One counter is kept per id kind; [`IdCounter::issue`] never returns
/// the same value twice.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IdCounter {
    next: u64,
}

impl IdCounter {
    /// Returns the next id value and advances the counter.
    pub fn issue(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}
