//! Answer scoring and ranking
//!
//! This module evaluates a player's answer submission against the
//! current question and maintains the per-question aggregate record:
//! who answered correctly in what order, every submission's latency,
//! and the running correct counter that doubles as the rank of the
//! latest correct submitter.
//!
//! The payout is order-dependent: the first fully correct submission
//! earns the question's full point value, the Nth earns `points / N`.
//! An incorrect submission earns nothing and ranks last.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::ids::{AnswerId, PlayerId, QuestionId};
use crate::quiz::Quiz;
use crate::session::{QuizSession, SessionState};

/// Per-question aggregate accumulator
///
/// Created lazily when the first answer for the question arrives. The
/// order of `players_correct_list` is the arrival order of correct
/// answers and is the rank order; `answer_times` records every
/// submission's latency, correct or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// The question this record accumulates for
    pub question_id: QuestionId,
    /// Names of players who answered correctly, first-correct first
    pub players_correct_list: Vec<String>,
    /// Latency in whole seconds of every submission
    pub answer_times: Vec<u64>,
    /// Running count of correct submissions; also the rank assigned to
    /// the most recent correct submitter
    pub correct_answers: usize,
}

impl QuestionRecord {
    fn new(question_id: QuestionId) -> Self {
        Self {
            question_id,
            players_correct_list: Vec::new(),
            answer_times: Vec::new(),
            correct_answers: 0,
        }
    }
}

/// Scores one answer submission.
///
/// Preconditions are checked in order, each with a distinct error, and
/// the session is untouched unless all pass: the session must be in
/// `QUESTION_OPEN`; the 1-based `question_position` must be within the
/// quiz; the question there must be the one both the session and the
/// player are on; the submitted ids must be free of duplicates, all
/// belong to the question, and be non-empty.
///
/// A submission is fully correct iff every submitted id is one of the
/// question's correct answers — extra wrong ids disqualify it, while
/// covering only some of the correct answers still passes.
pub fn submit_answer(
    session: &mut QuizSession,
    quiz: &Quiz,
    player_id: PlayerId,
    question_position: usize,
    answer_ids: &[AnswerId],
    now_secs: u64,
) -> Result<(), Error> {
    let player_index = session
        .players
        .iter()
        .position(|p| p.player_id == player_id)
        .ok_or(Error::PlayerNotFound)?;

    if !matches!(session.state, SessionState::QuestionOpen) {
        return Err(Error::NotOpenForAnswers);
    }

    let question = quiz
        .question_at(question_position)
        .ok_or(Error::QuestionOutOfRange)?;

    if question.question_id != session.at_question
        || question_position != session.players[player_index].at_question
    {
        return Err(Error::WrongQuestion);
    }

    let mut seen: HashSet<AnswerId> = HashSet::new();
    if !answer_ids.iter().all(|id| seen.insert(*id)) {
        return Err(Error::DuplicateAnswers);
    }

    let valid_ids = question.answer_ids();
    if !answer_ids.iter().all(|id| valid_ids.contains(id)) {
        return Err(Error::UnknownAnswerId);
    }

    if answer_ids.is_empty() {
        return Err(Error::EmptyAnswer);
    }

    let correct_ids = question.correct_answer_ids();
    let correct = answer_ids.iter().all(|id| correct_ids.contains(id));
    let latency = now_secs.saturating_sub(session.question_open_time);
    let player_count = session.players.len();
    let points = question.points;

    let existing = session
        .result_data
        .iter()
        .position(|r| r.question_id == question.question_id);
    let record_index = existing.unwrap_or_else(|| {
        session
            .result_data
            .push(QuestionRecord::new(question.question_id));
        session.result_data.len() - 1
    });
    let record = &mut session.result_data[record_index];
    record.answer_times.push(latency);

    let (score, rank) = if correct {
        let name = session.players[player_index].name.clone();
        record.players_correct_list.push(name);
        record.correct_answers += 1;
        (points / record.correct_answers as f64, record.correct_answers)
    } else {
        (0.0, player_count)
    };

    let player = &mut session.players[player_index];
    player.score += score;
    player.question_scores.push(score);
    player.question_ranks.push(rank);
    log::debug!(
        "session {}: player {player_id} scored {score} (rank {rank}) on question {}",
        session.session_id,
        question.question_id
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{QuizId, SessionId};
    use crate::quiz::{Answer, Question};
    use crate::session::Action;
    use crate::timer::AlarmQueue;
    use std::time::Duration;

    /// One question worth 10 points with two correct answers (ids 1
    /// and 2) and one incorrect (id 3).
    fn quiz() -> Quiz {
        Quiz {
            quiz_id: QuizId(0),
            name: "scoring quiz".to_string(),
            questions: vec![Question {
                question_id: QuestionId(1),
                text: "pick the right ones".to_string(),
                duration: Duration::from_secs(30),
                points: 10.0,
                answers: vec![
                    Answer {
                        answer_id: AnswerId(1),
                        text: "yes".to_string(),
                        correct: true,
                    },
                    Answer {
                        answer_id: AnswerId(2),
                        text: "also yes".to_string(),
                        correct: true,
                    },
                    Answer {
                        answer_id: AnswerId(3),
                        text: "no".to_string(),
                        correct: false,
                    },
                ],
            }],
        }
    }

    /// Session with three players on an open question (opened at t=100).
    fn open_session(quiz: &Quiz) -> QuizSession {
        let mut queue = AlarmQueue::new();
        let mut session = QuizSession::new(SessionId(0), quiz, 10);
        session.join(PlayerId(0), "alice", quiz, &mut queue).unwrap();
        session.join(PlayerId(1), "bob", quiz, &mut queue).unwrap();
        session.join(PlayerId(2), "carol", quiz, &mut queue).unwrap();
        session
            .apply(Action::NextQuestion, quiz, &mut queue, 100)
            .unwrap();
        session
            .apply(Action::SkipCountdown, quiz, &mut queue, 100)
            .unwrap();
        session
    }

    #[test]
    fn test_first_correct_gets_full_points_and_rank_one() {
        let quiz = quiz();
        let mut session = open_session(&quiz);

        submit_answer(&mut session, &quiz, PlayerId(0), 1, &[AnswerId(1)], 103).unwrap();

        let player = session.player(PlayerId(0)).unwrap();
        assert_eq!(player.score, 10.0);
        assert_eq!(player.question_scores, vec![10.0]);
        assert_eq!(player.question_ranks, vec![1]);

        let record = session.record_for(QuestionId(1)).unwrap();
        assert_eq!(record.players_correct_list, vec!["alice"]);
        assert_eq!(record.answer_times, vec![3]);
        assert_eq!(record.correct_answers, 1);
    }

    #[test]
    fn test_later_correct_answers_decay_harmonically() {
        let quiz = quiz();
        let mut session = open_session(&quiz);

        submit_answer(&mut session, &quiz, PlayerId(0), 1, &[AnswerId(1)], 101).unwrap();
        submit_answer(&mut session, &quiz, PlayerId(1), 1, &[AnswerId(2)], 104).unwrap();
        submit_answer(&mut session, &quiz, PlayerId(2), 1, &[AnswerId(1)], 110).unwrap();

        assert_eq!(session.player(PlayerId(0)).unwrap().score, 10.0);
        assert_eq!(session.player(PlayerId(1)).unwrap().score, 5.0);
        assert!((session.player(PlayerId(2)).unwrap().score - 10.0 / 3.0).abs() < 1e-9);

        let record = session.record_for(QuestionId(1)).unwrap();
        assert_eq!(record.players_correct_list, vec!["alice", "bob", "carol"]);
        assert_eq!(record.answer_times, vec![1, 4, 10]);
        assert_eq!(record.correct_answers, 3);
        assert_eq!(session.player(PlayerId(2)).unwrap().question_ranks, vec![3]);
    }

    #[test]
    fn test_subset_of_correct_answers_counts_as_correct() {
        let quiz = quiz();
        let mut session = open_session(&quiz);

        // only one of the two correct ids, no wrong ones: correct
        submit_answer(&mut session, &quiz, PlayerId(0), 1, &[AnswerId(2)], 101).unwrap();
        assert_eq!(session.player(PlayerId(0)).unwrap().score, 10.0);
    }

    #[test]
    fn test_any_wrong_id_makes_submission_incorrect() {
        let quiz = quiz();
        let mut session = open_session(&quiz);

        submit_answer(
            &mut session,
            &quiz,
            PlayerId(0),
            1,
            &[AnswerId(1), AnswerId(3)],
            101,
        )
        .unwrap();

        let player = session.player(PlayerId(0)).unwrap();
        assert_eq!(player.score, 0.0);
        assert_eq!(player.question_scores, vec![0.0]);
        // last place: rank equals the player count
        assert_eq!(player.question_ranks, vec![3]);

        let record = session.record_for(QuestionId(1)).unwrap();
        assert!(record.players_correct_list.is_empty());
        assert_eq!(record.answer_times, vec![1]);
        assert_eq!(record.correct_answers, 0);
    }

    #[test]
    fn test_incorrect_then_correct_share_one_record() {
        let quiz = quiz();
        let mut session = open_session(&quiz);

        submit_answer(&mut session, &quiz, PlayerId(0), 1, &[AnswerId(3)], 101).unwrap();
        submit_answer(&mut session, &quiz, PlayerId(1), 1, &[AnswerId(1)], 105).unwrap();

        let record = session.record_for(QuestionId(1)).unwrap();
        assert_eq!(record.players_correct_list, vec!["bob"]);
        assert_eq!(record.answer_times, vec![1, 5]);
        assert_eq!(record.correct_answers, 1);
        // bob is the first correct answer despite submitting second
        assert_eq!(session.player(PlayerId(1)).unwrap().score, 10.0);
        assert_eq!(session.player(PlayerId(1)).unwrap().question_ranks, vec![1]);
    }

    #[test]
    fn test_precondition_failures_in_order() {
        let quiz = quiz();
        let mut session = open_session(&quiz);

        assert_eq!(
            submit_answer(&mut session, &quiz, PlayerId(9), 1, &[AnswerId(1)], 101).unwrap_err(),
            Error::PlayerNotFound
        );
        assert_eq!(
            submit_answer(&mut session, &quiz, PlayerId(0), 2, &[AnswerId(1)], 101).unwrap_err(),
            Error::QuestionOutOfRange
        );
        assert_eq!(
            submit_answer(
                &mut session,
                &quiz,
                PlayerId(0),
                1,
                &[AnswerId(1), AnswerId(1)],
                101
            )
            .unwrap_err(),
            Error::DuplicateAnswers
        );
        assert_eq!(
            submit_answer(&mut session, &quiz, PlayerId(0), 1, &[AnswerId(9)], 101).unwrap_err(),
            Error::UnknownAnswerId
        );
        assert_eq!(
            submit_answer(&mut session, &quiz, PlayerId(0), 1, &[], 101).unwrap_err(),
            Error::EmptyAnswer
        );

        // none of the rejected submissions created a record
        assert!(session.record_for(QuestionId(1)).is_none());
        assert!(session.player(PlayerId(0)).unwrap().question_scores.is_empty());
    }

    #[test]
    fn test_submission_outside_question_open_fails() {
        let quiz = quiz();
        let mut queue = AlarmQueue::new();
        let mut session = QuizSession::new(SessionId(0), &quiz, 10);
        session.join(PlayerId(0), "alice", &quiz, &mut queue).unwrap();

        assert_eq!(
            submit_answer(&mut session, &quiz, PlayerId(0), 1, &[AnswerId(1)], 101).unwrap_err(),
            Error::NotOpenForAnswers
        );
    }

    #[test]
    fn test_latency_is_measured_from_question_open() {
        let quiz = quiz();
        let mut session = open_session(&quiz);

        submit_answer(&mut session, &quiz, PlayerId(0), 1, &[AnswerId(1)], 127).unwrap();
        let record = session.record_for(QuestionId(1)).unwrap();
        assert_eq!(record.answer_times, vec![27]);
    }
}
