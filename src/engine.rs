//! The operator- and player-facing engine API
//!
//! [`Engine`] binds a [`Repository`] and a [`Scheduler`] and exposes
//! every session operation: starting sessions, driving the state
//! machine, joining, answering, results, chat and status views. Each
//! mutating operation follows the same discipline — load, validate,
//! mutate, checkpoint — so a failed validation leaves the store
//! untouched.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::Error;
use crate::ids::{AnswerId, PlayerId, QuestionId, QuizId, SessionId};
use crate::results::{self, ExportRow, FinalResults, QuestionSummary};
use crate::scoring;
use crate::session::{Action, ChatMessage, QuizSession, SessionState};
use crate::store::Repository;
use crate::timer::{Alarm, AlarmQueue, Scheduler};

/// Operator-supplied options for starting a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct StartOptions {
    /// Player count at which the lobby auto-starts
    #[garde(range(
        min = constants::session::MIN_AUTO_START,
        max = constants::session::MAX_AUTO_START
    ))]
    pub auto_start_num: u32,
}

/// A player's progress through their session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStatus {
    /// The player's current state (mirrors the session)
    pub state: SessionState,
    /// Number of questions in the quiz
    pub num_questions: usize,
    /// 1-based question position the player has progressed to
    pub at_question: usize,
}

/// An operator's view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Current phase of the session
    pub state: SessionState,
    /// Id of the question currently active
    pub at_question: QuestionId,
    /// Player names in join order
    pub players: Vec<String>,
}

/// Active and finished sessions of one quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLists {
    /// Sessions not yet ended, ascending by id
    pub active_sessions: Vec<SessionId>,
    /// Ended sessions, ascending by id
    pub inactive_sessions: Vec<SessionId>,
}

/// An answer option as shown to players (no correctness flag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerView {
    /// Identifier of the answer option
    pub answer_id: AnswerId,
    /// The answer text
    pub text: String,
}

/// The question a player is on, as shown to them
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    /// Identifier of the question
    pub question_id: QuestionId,
    /// The question text
    pub text: String,
    /// How long the question stays open
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub duration: Duration,
    /// Full point value of the question
    pub points: f64,
    /// The answer options, correctness withheld
    pub answers: Vec<AnswerView>,
}

/// The session engine
///
/// Generic over the repository and scheduler collaborators; tests and
/// single-process hosts use [`crate::store::InMemoryStore`] and
/// [`AlarmQueue`].
pub struct Engine<R: Repository, S: Scheduler> {
    repository: R,
    scheduler: S,
}

impl<R: Repository, S: Scheduler> Engine<R, S> {
    /// Creates an engine over the given collaborators.
    pub fn new(repository: R, scheduler: S) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    /// Read access to the repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Read access to the scheduler.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Starts a new session for a quiz.
    ///
    /// Requires the quiz to have at least one question, the auto-start
    /// threshold to be within bounds, and fewer than the maximum
    /// number of concurrently active sessions for the quiz.
    pub fn start_session(
        &mut self,
        quiz_id: QuizId,
        options: StartOptions,
    ) -> Result<SessionId, Error> {
        options
            .validate()
            .map_err(|_| Error::AutoStartOutOfRange)?;

        let quiz = self.repository.quiz(quiz_id)?;
        if quiz.is_empty() {
            return Err(Error::NoQuestions);
        }
        let active = self
            .repository
            .sessions_of(quiz_id)
            .iter()
            .filter(|s| s.is_active())
            .count();
        if active >= constants::session::MAX_ACTIVE_SESSIONS {
            return Err(Error::TooManySessions);
        }

        let session_id = self.repository.next_session_id();
        let session = QuizSession::new(
            session_id,
            self.repository.quiz(quiz_id)?,
            options.auto_start_num,
        );
        self.repository.insert_session(session);
        self.repository.checkpoint();
        log::info!("started session {session_id} for quiz {quiz_id}");
        Ok(session_id)
    }

    /// Applies an operator action to a session.
    pub fn update_session(
        &mut self,
        session_id: SessionId,
        action: Action,
        now_secs: u64,
    ) -> Result<(), Error> {
        let (session, quiz) = self.repository.session_and_quiz_mut(session_id)?;
        session.apply(action, quiz, &mut self.scheduler, now_secs)?;
        self.repository.checkpoint();
        Ok(())
    }

    /// Joins a player into a session's lobby.
    ///
    /// An empty `name` gets a generated guest name. Reaching the
    /// auto-start threshold starts the session as part of the join.
    pub fn player_join(&mut self, session_id: SessionId, name: &str) -> Result<PlayerId, Error> {
        let player_id = self.repository.next_player_id();
        let (session, quiz) = self.repository.session_and_quiz_mut(session_id)?;
        session.join(player_id, name, quiz, &mut self.scheduler)?;
        self.repository.checkpoint();
        Ok(player_id)
    }

    /// Scores a player's answer submission for the question at a
    /// 1-based position.
    pub fn submit_answer(
        &mut self,
        player_id: PlayerId,
        question_position: usize,
        answer_ids: &[AnswerId],
        now_secs: u64,
    ) -> Result<(), Error> {
        let session_id = self.repository.session_id_by_player(player_id)?;
        let (session, quiz) = self.repository.session_and_quiz_mut(session_id)?;
        scoring::submit_answer(
            session,
            quiz,
            player_id,
            question_position,
            answer_ids,
            now_secs,
        )?;
        self.repository.checkpoint();
        Ok(())
    }

    /// Computes and publishes the results of the question a player's
    /// session is showing answers for.
    pub fn question_results(
        &mut self,
        player_id: PlayerId,
        question_position: usize,
    ) -> Result<QuestionSummary, Error> {
        let session_id = self.repository.session_id_by_player(player_id)?;
        let (session, quiz) = self.repository.session_and_quiz_mut(session_id)?;
        let summary = results::question_results(session, quiz, question_position)?;
        self.repository.checkpoint();
        Ok(summary)
    }

    /// The final report of the session a player belongs to.
    pub fn player_final_results(&mut self, player_id: PlayerId) -> Result<FinalResults, Error> {
        let session_id = self.repository.session_id_by_player(player_id)?;
        self.session_results(session_id)
    }

    /// The final report of a session, for the operator.
    pub fn session_results(&mut self, session_id: SessionId) -> Result<FinalResults, Error> {
        let (session, quiz) = self.repository.session_and_quiz_mut(session_id)?;
        let report = results::final_results(session, quiz)?;
        self.repository.checkpoint();
        Ok(report)
    }

    /// Runs the rank back-fill and returns the per-player score/rank
    /// table for export, rows ordered by player name.
    ///
    /// Only available once the session shows its final results.
    pub fn export_score_ranks(&mut self, session_id: SessionId) -> Result<Vec<ExportRow>, Error> {
        let (session, quiz) = self.repository.session_and_quiz_mut(session_id)?;
        if !matches!(session.state, SessionState::FinalResults) {
            return Err(Error::ResultsUnavailable);
        }
        results::apply_rank_backfill(session, quiz);
        let rows = results::export_rows(session, quiz);
        self.repository.checkpoint();
        Ok(rows)
    }

    /// A player's progress view.
    pub fn player_status(&self, player_id: PlayerId) -> Result<PlayerStatus, Error> {
        let session_id = self.repository.session_id_by_player(player_id)?;
        let session = self.repository.session(session_id)?;
        let player = session.player(player_id).ok_or(Error::PlayerNotFound)?;
        Ok(PlayerStatus {
            state: player.state,
            num_questions: player.num_questions,
            at_question: player.at_question,
        })
    }

    /// The operator's view of a session.
    pub fn session_status(&self, session_id: SessionId) -> Result<SessionStatus, Error> {
        let session = self.repository.session(session_id)?;
        Ok(SessionStatus {
            state: session.state,
            at_question: session.at_question,
            players: session.player_names(),
        })
    }

    /// The question a player is on, without correctness information.
    ///
    /// Hidden while the session is in `LOBBY`, `QUESTION_COUNTDOWN` or
    /// `END`, and when the session is not on the requested question.
    pub fn question_info(
        &self,
        player_id: PlayerId,
        question_position: usize,
    ) -> Result<QuestionView, Error> {
        let session_id = self.repository.session_id_by_player(player_id)?;
        let session = self.repository.session(session_id)?;
        let quiz = self.repository.quiz(session.quiz_id)?;

        let question = quiz
            .question_at(question_position)
            .ok_or(Error::QuestionOutOfRange)?;
        if question.question_id != session.at_question {
            return Err(Error::WrongQuestion);
        }
        if matches!(
            session.state,
            SessionState::Lobby | SessionState::QuestionCountdown | SessionState::End
        ) {
            return Err(Error::QuestionUnavailable);
        }

        Ok(QuestionView {
            question_id: question.question_id,
            text: question.text.clone(),
            duration: question.duration,
            points: question.points,
            answers: question
                .answers
                .iter()
                .map(|a| AnswerView {
                    answer_id: a.answer_id,
                    text: a.text.clone(),
                })
                .collect(),
        })
    }

    /// Active and finished sessions of a quiz, ids ascending.
    pub fn session_list(&self, quiz_id: QuizId) -> Result<SessionLists, Error> {
        self.repository.quiz(quiz_id)?;
        let mut active_sessions = Vec::new();
        let mut inactive_sessions = Vec::new();
        for session in self.repository.sessions_of(quiz_id) {
            if session.is_active() {
                active_sessions.push(session.session_id);
            } else {
                inactive_sessions.push(session.session_id);
            }
        }
        active_sessions.sort_unstable();
        inactive_sessions.sort_unstable();
        Ok(SessionLists {
            active_sessions,
            inactive_sessions,
        })
    }

    /// Sends a chat message into the sender's session.
    pub fn chat_send(
        &mut self,
        player_id: PlayerId,
        message: &str,
        now_secs: u64,
    ) -> Result<(), Error> {
        let session_id = self.repository.session_id_by_player(player_id)?;
        let (session, _) = self.repository.session_and_quiz_mut(session_id)?;
        session.send_chat(player_id, message, now_secs)?;
        self.repository.checkpoint();
        Ok(())
    }

    /// The chronological chat log of the session a player belongs to.
    pub fn chat_view(&self, player_id: PlayerId) -> Result<Vec<ChatMessage>, Error> {
        let session_id = self.repository.session_id_by_player(player_id)?;
        Ok(self.repository.session(session_id)?.messages.clone())
    }

    /// Delivers a fired alarm to its session.
    ///
    /// Alarms cannot surface errors to anyone; a stale alarm or one
    /// for a vanished session is logged and dropped.
    pub fn handle_alarm(&mut self, alarm: Alarm, now_secs: u64) {
        match self.repository.session_and_quiz_mut(alarm.session_id) {
            Ok((session, quiz)) => {
                session.receive_alarm(alarm, quiz, &mut self.scheduler, now_secs);
                self.repository.checkpoint();
            }
            Err(err) => log::warn!("alarm for session {}: {err}", alarm.session_id),
        }
    }
}

impl<R: Repository> Engine<R, AlarmQueue> {
    /// Advances the alarm queue by `elapsed` and delivers every alarm
    /// that came due.
    pub fn tick(&mut self, elapsed: Duration, now_secs: u64) {
        for alarm in self.scheduler.advance(elapsed) {
            self.handle_alarm(alarm, now_secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Answer, Question, Quiz};
    use crate::store::InMemoryStore;

    /// Quiz with two questions worth 10 points, one correct answer
    /// each, 30 second durations.
    fn two_question_quiz() -> Quiz {
        let question = |id: u64| Question {
            question_id: QuestionId(id),
            text: format!("question {id}"),
            duration: Duration::from_secs(30),
            points: 10.0,
            answers: vec![
                Answer {
                    answer_id: AnswerId(id * 10),
                    text: "right".to_string(),
                    correct: true,
                },
                Answer {
                    answer_id: AnswerId(id * 10 + 1),
                    text: "wrong".to_string(),
                    correct: false,
                },
            ],
        };
        Quiz {
            quiz_id: QuizId(0),
            name: "finals".to_string(),
            questions: vec![question(1), question(2)],
        }
    }

    fn engine_with_quiz() -> Engine<InMemoryStore, AlarmQueue> {
        let mut store = InMemoryStore::new();
        store.insert_quiz(two_question_quiz());
        Engine::new(store, AlarmQueue::new())
    }

    #[test]
    fn test_start_session_gates() {
        let mut engine = engine_with_quiz();

        assert_eq!(
            engine
                .start_session(QuizId(9), StartOptions { auto_start_num: 3 })
                .unwrap_err(),
            Error::QuizNotFound
        );
        assert_eq!(
            engine
                .start_session(QuizId(0), StartOptions { auto_start_num: 51 })
                .unwrap_err(),
            Error::AutoStartOutOfRange
        );
        assert!(
            engine
                .start_session(QuizId(0), StartOptions { auto_start_num: 3 })
                .is_ok()
        );
    }

    #[test]
    fn test_start_session_rejects_empty_quiz() {
        let mut store = InMemoryStore::new();
        store.insert_quiz(Quiz {
            quiz_id: QuizId(1),
            name: "empty".to_string(),
            questions: Vec::new(),
        });
        let mut engine = Engine::new(store, AlarmQueue::new());
        assert_eq!(
            engine
                .start_session(QuizId(1), StartOptions { auto_start_num: 3 })
                .unwrap_err(),
            Error::NoQuestions
        );
    }

    #[test]
    fn test_start_session_caps_active_sessions() {
        let mut engine = engine_with_quiz();
        for _ in 0..10 {
            engine
                .start_session(QuizId(0), StartOptions { auto_start_num: 50 })
                .unwrap();
        }
        assert_eq!(
            engine
                .start_session(QuizId(0), StartOptions { auto_start_num: 50 })
                .unwrap_err(),
            Error::TooManySessions
        );

        // ending one frees a slot
        let lists = engine.session_list(QuizId(0)).unwrap();
        engine
            .update_session(lists.active_sessions[0], Action::End, 0)
            .unwrap();
        assert!(
            engine
                .start_session(QuizId(0), StartOptions { auto_start_num: 50 })
                .is_ok()
        );
    }

    #[test]
    fn test_auto_start_scenario() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 2 })
            .unwrap();

        engine.player_join(session_id, "alice").unwrap();
        assert_eq!(
            engine.session_status(session_id).unwrap().state,
            SessionState::Lobby
        );

        engine.player_join(session_id, "bob").unwrap();
        let status = engine.session_status(session_id).unwrap();
        assert_eq!(status.state, SessionState::QuestionCountdown);
        assert_eq!(status.players, vec!["alice", "bob"]);

        for player in &engine.repository().session(session_id).unwrap().players {
            assert_eq!(player.at_question, 1);
        }
    }

    #[test]
    fn test_timer_cancellation_on_end() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 1 })
            .unwrap();
        // auto-start armed the countdown
        engine.player_join(session_id, "alice").unwrap();
        assert!(engine.scheduler().is_armed(QuestionId(1)));

        engine.update_session(session_id, Action::End, 0).unwrap();

        // the original delay elapsing must not resurrect the session
        engine.tick(Duration::from_secs(60), 60);
        assert_eq!(
            engine.session_status(session_id).unwrap().state,
            SessionState::End
        );
    }

    /// Full session run: three players, auto-start at 3, one round of
    /// answers, final leaderboard and export table.
    #[test]
    fn test_end_to_end_session() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 3 })
            .unwrap();

        let p1 = engine.player_join(session_id, "p1").unwrap();
        let p2 = engine.player_join(session_id, "p2").unwrap();
        let p3 = engine.player_join(session_id, "p3").unwrap();

        // third join auto-started the countdown
        assert_eq!(
            engine.session_status(session_id).unwrap().state,
            SessionState::QuestionCountdown
        );

        // countdown elapses, question 1 opens at t=100
        engine.tick(Duration::from_secs(3), 100);
        assert_eq!(
            engine.session_status(session_id).unwrap().state,
            SessionState::QuestionOpen
        );

        // p1 answers correctly first, p2 second, p3 never answers
        engine
            .submit_answer(p1, 1, &[AnswerId(10)], 102)
            .unwrap();
        engine
            .submit_answer(p2, 1, &[AnswerId(10)], 105)
            .unwrap();

        // question times out
        engine.tick(Duration::from_secs(30), 130);
        assert_eq!(
            engine.session_status(session_id).unwrap().state,
            SessionState::QuestionClose
        );

        // show answers and publish question 1 results
        engine
            .update_session(session_id, Action::GoToAnswer, 130)
            .unwrap();
        let summary = engine.question_results(p1, 1).unwrap();
        assert_eq!(summary.players_correct_list, vec!["p1", "p2"]);
        assert_eq!(summary.percent_correct, 67);
        assert_eq!(summary.average_answer_time, 4); // (2 + 5) / 2 rounds up

        // run question 2 with nobody answering
        engine
            .update_session(session_id, Action::NextQuestion, 130)
            .unwrap();
        engine
            .update_session(session_id, Action::SkipCountdown, 131)
            .unwrap();
        engine.tick(Duration::from_secs(30), 161);
        engine
            .update_session(session_id, Action::GoToFinalResults, 161)
            .unwrap();

        // a stale submission against question 1 is rejected outright
        assert_eq!(
            engine.submit_answer(p3, 1, &[AnswerId(10)], 161).unwrap_err(),
            Error::NotOpenForAnswers
        );

        let report = engine.session_results(session_id).unwrap();
        let names: Vec<&str> = report
            .users_ranked_by_score
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["p1", "p2", "p3"]);
        assert_eq!(report.users_ranked_by_score[0].score, 10.0);
        assert_eq!(report.users_ranked_by_score[1].score, 5.0);
        assert_eq!(report.users_ranked_by_score[2].score, 0.0);
        assert_eq!(report.question_results.len(), 2);
        assert_eq!(report.question_results[1].percent_correct, 0);

        // players see the same report
        assert_eq!(engine.player_final_results(p2).unwrap(), report);

        // export: back-fill assigns p3 the tied-last rank 3-2+1 = 2
        let rows = engine.export_score_ranks(session_id).unwrap();
        assert_eq!(rows.len(), 3);
        let p3_row = rows.iter().find(|r| r.name == "p3").unwrap();
        assert_eq!(p3_row.cells[0].rank, 2);
        assert_eq!(p3_row.cells[0].score, 0.0);
        let p1_row = rows.iter().find(|r| r.name == "p1").unwrap();
        assert_eq!(p1_row.cells[0].rank, 1);
        assert_eq!(p1_row.cells[0].score, 10.0);
        // nobody answered question 2: everyone ties at rank 4
        assert_eq!(p1_row.cells[1].rank, 4);
    }

    #[test]
    fn test_wrong_question_submission() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 1 })
            .unwrap();
        let p1 = engine.player_join(session_id, "p1").unwrap();

        // reach question 2 open
        engine
            .update_session(session_id, Action::SkipCountdown, 10)
            .unwrap();
        engine.tick(Duration::from_secs(30), 40);
        engine
            .update_session(session_id, Action::NextQuestion, 40)
            .unwrap();
        engine
            .update_session(session_id, Action::SkipCountdown, 43)
            .unwrap();

        assert_eq!(
            engine.submit_answer(p1, 1, &[AnswerId(10)], 44).unwrap_err(),
            Error::WrongQuestion
        );
        assert!(engine.submit_answer(p1, 2, &[AnswerId(20)], 44).is_ok());
    }

    #[test]
    fn test_question_info_visibility() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 1 })
            .unwrap();
        let p1 = engine.player_join(session_id, "p1").unwrap();

        // hidden during the countdown
        assert_eq!(
            engine.question_info(p1, 1).unwrap_err(),
            Error::QuestionUnavailable
        );

        engine
            .update_session(session_id, Action::SkipCountdown, 10)
            .unwrap();
        let view = engine.question_info(p1, 1).unwrap();
        assert_eq!(view.question_id, QuestionId(1));
        assert_eq!(view.answers.len(), 2);
        assert_eq!(view.points, 10.0);

        assert_eq!(
            engine.question_info(p1, 2).unwrap_err(),
            Error::WrongQuestion
        );
    }

    #[test]
    fn test_player_status_view() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 5 })
            .unwrap();
        let p1 = engine.player_join(session_id, "p1").unwrap();

        let status = engine.player_status(p1).unwrap();
        assert_eq!(status.state, SessionState::Lobby);
        assert_eq!(status.num_questions, 2);
        assert_eq!(status.at_question, 0);

        assert_eq!(
            engine.player_status(PlayerId(99)).unwrap_err(),
            Error::PlayerNotFound
        );
    }

    #[test]
    fn test_session_list_partitions_by_state() {
        let mut engine = engine_with_quiz();
        let a = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 3 })
            .unwrap();
        let b = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 3 })
            .unwrap();
        engine.update_session(a, Action::End, 0).unwrap();

        let lists = engine.session_list(QuizId(0)).unwrap();
        assert_eq!(lists.active_sessions, vec![b]);
        assert_eq!(lists.inactive_sessions, vec![a]);
    }

    #[test]
    fn test_chat_round_trip() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 5 })
            .unwrap();
        let p1 = engine.player_join(session_id, "p1").unwrap();
        let p2 = engine.player_join(session_id, "p2").unwrap();

        engine.chat_send(p1, "hello", 10).unwrap();
        engine.chat_send(p2, "hi p1", 11).unwrap();

        let log = engine.chat_view(p1).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].player_name, "p1");
        assert_eq!(log[1].message, "hi p1");
        assert_eq!(log[1].time_sent, 11);
    }

    #[test]
    fn test_mutations_checkpoint_the_store() {
        let mut engine = engine_with_quiz();
        let session_id = engine
            .start_session(QuizId(0), StartOptions { auto_start_num: 5 })
            .unwrap();
        engine.player_join(session_id, "p1").unwrap();
        assert_eq!(engine.repository().checkpoint_count(), 2);

        // failed validation does not checkpoint
        let _ = engine.update_session(session_id, Action::GoToAnswer, 0);
        assert_eq!(engine.repository().checkpoint_count(), 2);
    }
}
