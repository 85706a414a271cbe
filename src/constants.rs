//! Configuration constants for the session engine
//!
//! This module contains the fixed durations and limits used throughout
//! the engine to ensure consistent boundaries for sessions, players,
//! and chat.

/// Session lifecycle constants
pub mod session {
    use std::time::Duration;

    /// Fixed delay between selecting a question and it becoming answerable
    pub const COUNTDOWN: Duration = Duration::from_secs(3);
    /// Maximum number of concurrently active (non-END) sessions per quiz
    pub const MAX_ACTIVE_SESSIONS: usize = 10;
    /// Lowest allowed auto-start threshold
    pub const MIN_AUTO_START: u32 = 0;
    /// Highest allowed auto-start threshold
    pub const MAX_AUTO_START: u32 = 50;
}

/// Guest display-name shape constants
pub mod names {
    /// Number of distinct lowercase letters a generated name starts with
    pub const LETTER_COUNT: usize = 5;
    /// Number of distinct digits a generated name ends with
    pub const DIGIT_COUNT: usize = 3;
}

/// Chat message constants
pub mod chat {
    /// Minimum length of a chat message in characters
    pub const MIN_MESSAGE_LENGTH: usize = 1;
    /// Maximum length of a chat message in characters
    pub const MAX_MESSAGE_LENGTH: usize = 100;
}
