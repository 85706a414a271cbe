//! Session state machine
//!
//! This module owns the per-session state of a live quiz run: the
//! [`SessionState`] progression from lobby to end, the operator
//! [`Action`]s that drive it, and the side effects of every
//! transition — arming and cancelling timers, keeping player states in
//! lock-step, and bumping the transition epoch that invalidates stale
//! alarms.
//!
//! Validation is strict and atomic: an action not present in the
//! transition table for the current state fails with
//! [`Error::InvalidAction`] and mutates nothing.

use once_cell_serde::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::Error;
use crate::ids::{PlayerId, QuestionId, QuizId, SessionId};
use crate::names;
use crate::quiz::Quiz;
use crate::results::{FinalResults, QuestionSummary};
use crate::scoring::QuestionRecord;
use crate::timer::{Alarm, Scheduler};

/// The phase a live quiz session is in
///
/// States move strictly forward through this list, except that `END`
/// is reachable from every other state and is terminal. Serialized as
/// the upper-case wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Waiting for players to join
    Lobby,
    /// A question has been selected; the 3-second countdown is running
    QuestionCountdown,
    /// The current question is accepting answers
    QuestionOpen,
    /// The current question's time limit elapsed; answers are closed
    QuestionClose,
    /// The correct answers for the current question are on display
    AnswerShow,
    /// The final leaderboard is on display
    FinalResults,
    /// The session is over; no further transitions are possible
    End,
}

/// An operator action against a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Select the next question and start its countdown
    NextQuestion,
    /// Cut the countdown short and open the question now
    SkipCountdown,
    /// Reveal the correct answers for the closed question
    GoToAnswer,
    /// Show the final leaderboard
    GoToFinalResults,
    /// End the session permanently
    End,
}

impl SessionState {
    /// The transition table: whether `action` is legal in this state.
    ///
    /// `QUESTION_OPEN` is left out of every row except `END` on
    /// purpose — it closes only through its timer, never by operator
    /// action.
    fn allows(self, action: Action) -> bool {
        matches!(
            (self, action),
            (Self::Lobby, Action::NextQuestion | Action::End)
                | (Self::QuestionCountdown, Action::SkipCountdown | Action::End)
                | (Self::QuestionOpen, Action::End)
                | (
                    Self::QuestionClose,
                    Action::NextQuestion
                        | Action::GoToAnswer
                        | Action::GoToFinalResults
                        | Action::End
                )
                | (
                    Self::AnswerShow,
                    Action::NextQuestion | Action::GoToFinalResults | Action::End
                )
                | (Self::FinalResults, Action::End)
        )
    }
}

/// A chat message sent by a player during a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The message body
    pub message: String,
    /// Id of the sending player
    pub player_id: PlayerId,
    /// Display name of the sending player at send time
    pub player_name: String,
    /// Epoch seconds when the message was sent
    pub time_sent: u64,
}

/// A participant in exactly one session
///
/// `state` mirrors the owning session's state and is kept in lock-step
/// by every transition. `question_scores` and `question_ranks` gain
/// one entry per question the player has submitted for (the rank
/// back-fill pass later replaces the rank sequence with a
/// question-aligned one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier of this player, unique across all sessions
    pub player_id: PlayerId,
    /// Display name, unique within the session
    pub name: String,
    /// Mirror of the owning session's state
    pub state: SessionState,
    /// Cumulative score; never decreases
    pub score: f64,
    /// Score earned per submitted question, in submission order
    pub question_scores: Vec<f64>,
    /// Rank earned per submitted question, in submission order
    pub question_ranks: Vec<usize>,
    /// Number of questions in the quiz this session runs
    pub num_questions: usize,
    /// 1-based question position the player has progressed to (0 in lobby)
    pub at_question: usize,
}

/// One live run-through of a quiz
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizSession {
    /// Identifier of this session, unique across all quizzes
    pub session_id: SessionId,
    /// The quiz this session runs
    pub quiz_id: QuizId,
    /// Current phase of the session
    pub state: SessionState,
    /// Id of the question currently active (not a position index)
    pub at_question: QuestionId,
    /// Player count at which the lobby auto-starts
    pub auto_start_num: u32,
    /// Epoch seconds when the current question became answerable
    pub question_open_time: u64,
    /// Players in join order
    pub players: Vec<Player>,
    /// Per-question aggregate accumulators, created lazily on first
    /// submission
    pub result_data: Vec<QuestionRecord>,
    /// Per-question summaries published so far
    pub results: Vec<QuestionSummary>,
    /// Final summary, computed once on first request
    pub final_results: OnceCell<FinalResults>,
    /// Append-only chronological chat log
    pub messages: Vec<ChatMessage>,
    /// Transition epoch; bumped on every state change and carried by
    /// armed alarms so that superseded timers fire as no-ops
    pub epoch: u64,
}

impl QuizSession {
    /// Creates a session in `LOBBY` for the given quiz.
    ///
    /// The caller (the engine) has already verified that the quiz has
    /// at least one question and that the auto-start threshold is in
    /// bounds; `at_question` starts at the first question's id.
    pub fn new(session_id: SessionId, quiz: &Quiz, auto_start_num: u32) -> Self {
        Self {
            session_id,
            quiz_id: quiz.quiz_id,
            state: SessionState::Lobby,
            at_question: quiz.questions[0].question_id,
            auto_start_num,
            question_open_time: 0,
            players: Vec::new(),
            result_data: Vec::new(),
            results: Vec::new(),
            final_results: OnceCell::new(),
            messages: Vec::new(),
            epoch: 0,
        }
    }

    /// Whether the session has not reached `END`.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::End)
    }

    /// Returns the player with the given id.
    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    /// Player display names in join order.
    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    /// Returns the accumulator for a question, if any answer has been
    /// submitted for it.
    pub fn record_for(&self, question_id: QuestionId) -> Option<&QuestionRecord> {
        self.result_data
            .iter()
            .find(|r| r.question_id == question_id)
    }

    fn set_state(&mut self, state: SessionState) {
        log::debug!(
            "session {}: {:?} -> {state:?}",
            self.session_id,
            self.state
        );
        self.state = state;
        self.epoch += 1;
        for player in &mut self.players {
            player.state = state;
        }
    }

    fn alarm(&self, to: SessionState) -> Alarm {
        Alarm {
            session_id: self.session_id,
            question_id: self.at_question,
            to,
            epoch: self.epoch,
        }
    }

    /// Applies an operator action, performing the transition's side
    /// effects.
    ///
    /// Fails with [`Error::InvalidAction`] when the action is not in
    /// the transition table for the current state, and with
    /// [`Error::OutOfQuestions`] for `NEXT_QUESTION` on the last
    /// question. On failure nothing is mutated.
    pub fn apply(
        &mut self,
        action: Action,
        quiz: &Quiz,
        scheduler: &mut impl Scheduler,
        now_secs: u64,
    ) -> Result<(), Error> {
        if !self.state.allows(action) {
            return Err(Error::InvalidAction);
        }

        match action {
            Action::End => self.end(scheduler),
            Action::NextQuestion => {
                let next_id = if matches!(self.state, SessionState::Lobby) {
                    // first countdown runs against the question set at
                    // session start
                    self.at_question
                } else {
                    let index = quiz
                        .index_of(self.at_question)
                        .ok_or(Error::QuestionOutOfRange)?;
                    quiz.questions
                        .get(index + 1)
                        .ok_or(Error::OutOfQuestions)?
                        .question_id
                };
                self.begin_countdown(next_id, scheduler);
            }
            Action::SkipCountdown => self.open_question(quiz, scheduler, now_secs)?,
            Action::GoToAnswer => self.show_answer(scheduler),
            Action::GoToFinalResults => self.set_state(SessionState::FinalResults),
        }

        Ok(())
    }

    /// Enters `QUESTION_COUNTDOWN` for `question_id` and arms the
    /// 3-second countdown into `QUESTION_OPEN`.
    fn begin_countdown(&mut self, question_id: QuestionId, scheduler: &mut impl Scheduler) {
        self.at_question = question_id;
        for player in &mut self.players {
            player.at_question += 1;
        }
        self.set_state(SessionState::QuestionCountdown);
        scheduler.schedule_once(
            self.alarm(SessionState::QuestionOpen),
            constants::session::COUNTDOWN,
        );
    }

    /// Enters `QUESTION_OPEN`: cancels the pending countdown, stamps
    /// the answer-latency origin and arms the question-duration
    /// timeout into `QUESTION_CLOSE`.
    fn open_question(
        &mut self,
        quiz: &Quiz,
        scheduler: &mut impl Scheduler,
        now_secs: u64,
    ) -> Result<(), Error> {
        let duration = quiz
            .question_by_id(self.at_question)
            .ok_or(Error::QuestionOutOfRange)?
            .duration;

        scheduler.cancel(self.at_question);
        self.question_open_time = now_secs;
        self.set_state(SessionState::QuestionOpen);
        scheduler.schedule_once(self.alarm(SessionState::QuestionClose), duration);
        Ok(())
    }

    fn show_answer(&mut self, scheduler: &mut impl Scheduler) {
        scheduler.cancel(self.at_question);
        self.set_state(SessionState::AnswerShow);
    }

    fn end(&mut self, scheduler: &mut impl Scheduler) {
        scheduler.cancel(self.at_question);
        self.set_state(SessionState::End);
    }

    /// Adds a player to the lobby, generating a guest name when
    /// `requested_name` is empty.
    ///
    /// When the new player count reaches the auto-start threshold, the
    /// join itself performs the `LOBBY -> QUESTION_COUNTDOWN`
    /// transition, countdown timer included.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        requested_name: &str,
        quiz: &Quiz,
        scheduler: &mut impl Scheduler,
    ) -> Result<PlayerId, Error> {
        if !matches!(self.state, SessionState::Lobby) {
            return Err(Error::NotInLobby);
        }
        if self.players.iter().any(|p| p.name == requested_name) {
            return Err(Error::NameTaken);
        }

        let name = if requested_name.is_empty() {
            let taken = self.players.iter().map(|p| p.name.as_str()).collect();
            names::unique_guest_name(&taken)
        } else {
            requested_name.to_string()
        };

        let auto_start = self.players.len() + 1 >= self.auto_start_num as usize;
        if auto_start {
            self.begin_countdown(self.at_question, scheduler);
        }

        self.players.push(Player {
            player_id,
            name,
            state: self.state,
            score: 0.0,
            question_scores: Vec::new(),
            question_ranks: Vec::new(),
            num_questions: quiz.len(),
            at_question: usize::from(auto_start),
        });
        log::info!(
            "session {}: player {player_id} joined ({} total)",
            self.session_id,
            self.players.len()
        );

        Ok(player_id)
    }

    /// Handles a fired alarm.
    ///
    /// A stale alarm — one whose epoch no longer matches the session,
    /// or one arriving after `END` — is discarded without touching the
    /// session. Valid alarms perform the transition they were armed
    /// for.
    pub fn receive_alarm(
        &mut self,
        alarm: Alarm,
        quiz: &Quiz,
        scheduler: &mut impl Scheduler,
        now_secs: u64,
    ) {
        if alarm.epoch != self.epoch || !self.is_active() {
            log::debug!(
                "session {}: stale alarm for question {} ignored",
                self.session_id,
                alarm.question_id
            );
            return;
        }

        match (alarm.to, self.state) {
            (SessionState::QuestionOpen, SessionState::QuestionCountdown) => {
                if let Err(err) = self.open_question(quiz, scheduler, now_secs) {
                    log::warn!("session {}: alarm could not open question: {err}", self.session_id);
                }
            }
            (SessionState::QuestionClose, SessionState::QuestionOpen) => {
                self.set_state(SessionState::QuestionClose);
            }
            _ => log::debug!(
                "session {}: alarm target {:?} does not follow {:?}, ignored",
                self.session_id,
                alarm.to,
                self.state
            ),
        }
    }

    /// Appends a chat message from a player.
    pub fn send_chat(
        &mut self,
        player_id: PlayerId,
        message: &str,
        now_secs: u64,
    ) -> Result<(), Error> {
        let length = message.chars().count();
        if !(constants::chat::MIN_MESSAGE_LENGTH..=constants::chat::MAX_MESSAGE_LENGTH)
            .contains(&length)
        {
            return Err(Error::MessageLength);
        }
        let player = self.player(player_id).ok_or(Error::PlayerNotFound)?;
        self.messages.push(ChatMessage {
            message: message.to_string(),
            player_id: player.player_id,
            player_name: player.name.clone(),
            time_sent: now_secs,
        });
        Ok(())
    }
}
