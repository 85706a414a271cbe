//! Result aggregation and ranking
//!
//! This module turns the per-question accumulators into the summaries
//! the outside world sees: per-question percent-correct and average
//! answer time, the final score-descending leaderboard, and the
//! question-aligned rank back-fill that must run before a per-player
//! score/rank table is exported.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::ids::QuestionId;
use crate::quiz::Quiz;
use crate::scoring::QuestionRecord;
use crate::session::{Player, QuizSession, SessionState};

/// Published result summary of one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    /// The question summarized
    pub question_id: QuestionId,
    /// Names of players who answered correctly, in arrival order
    pub players_correct_list: Vec<String>,
    /// Mean latency over every submission, rounded to whole seconds
    pub average_answer_time: u64,
    /// Share of the session's players that answered correctly, rounded
    /// to whole percent
    pub percent_correct: u32,
}

/// One leaderboard entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPlayer {
    /// The player's display name
    pub name: String,
    /// The player's cumulative score
    pub score: f64,
}

/// The final report of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    /// Players ordered by score descending; ties keep join order
    pub users_ranked_by_score: Vec<RankedPlayer>,
    /// Summaries of every question in quiz order
    pub question_results: Vec<QuestionSummary>,
}

/// One player's score and rank for one question, as exported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRank {
    /// Points the player earned on the question
    pub score: f64,
    /// The player's rank on the question
    pub rank: usize,
}

/// One row of the per-player score/rank table handed to the exporting
/// layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    /// The player's display name
    pub name: String,
    /// Score and rank per question, in quiz order
    pub cells: Vec<ScoreRank>,
}

/// Summarizes one question's record.
///
/// A question nobody submitted for has no record; it summarizes to an
/// empty correct-list, 0 % and 0 s.
pub fn summarize(
    record: Option<&QuestionRecord>,
    question_id: QuestionId,
    player_count: usize,
) -> QuestionSummary {
    let Some(record) = record else {
        return QuestionSummary {
            question_id,
            players_correct_list: Vec::new(),
            average_answer_time: 0,
            percent_correct: 0,
        };
    };

    let average_answer_time = if record.answer_times.is_empty() {
        0
    } else {
        let sum: u64 = record.answer_times.iter().sum();
        (sum as f64 / record.answer_times.len() as f64).round() as u64
    };
    let percent_correct = if player_count == 0 {
        0
    } else {
        (record.correct_answers as f64 / player_count as f64 * 100.0).round() as u32
    };

    QuestionSummary {
        question_id,
        players_correct_list: record.players_correct_list.clone(),
        average_answer_time,
        percent_correct,
    }
}

/// Computes and publishes the results of the question at a 1-based
/// position.
///
/// Only available while the session shows that question's answers:
/// the state must be `ANSWER_SHOW` and the session must still be on
/// the question. The summary is appended to the session's published
/// results.
pub fn question_results(
    session: &mut QuizSession,
    quiz: &Quiz,
    question_position: usize,
) -> Result<QuestionSummary, Error> {
    if !matches!(session.state, SessionState::AnswerShow) {
        return Err(Error::ResultsUnavailable);
    }
    let question = quiz
        .question_at(question_position)
        .ok_or(Error::QuestionOutOfRange)?;
    if question.question_id != session.at_question {
        return Err(Error::WrongQuestion);
    }

    let summary = summarize(
        session.record_for(question.question_id),
        question.question_id,
        session.players.len(),
    );
    session.results.push(summary.clone());
    Ok(summary)
}

/// Orders players by cumulative score descending.
///
/// The sort is stable and has no secondary key: players with equal
/// scores keep their join order.
pub fn leaderboard(players: &[Player]) -> Vec<RankedPlayer> {
    players
        .iter()
        .map(|p| RankedPlayer {
            name: p.name.clone(),
            score: p.score,
        })
        .sorted_by(|a, b| b.score.total_cmp(&a.score))
        .collect()
}

/// Computes the final report of a session in `FINAL_RESULTS` state.
///
/// The report is computed once per session and cached; repeated calls
/// return the published copy.
pub fn final_results(session: &QuizSession, quiz: &Quiz) -> Result<FinalResults, Error> {
    if !matches!(session.state, SessionState::FinalResults) {
        return Err(Error::ResultsUnavailable);
    }

    Ok(session
        .final_results
        .get_or_init(|| FinalResults {
            users_ranked_by_score: leaderboard(&session.players),
            question_results: quiz
                .questions
                .iter()
                .map(|q| {
                    summarize(
                        session.record_for(q.question_id),
                        q.question_id,
                        session.players.len(),
                    )
                })
                .collect(),
        })
        .clone())
}

/// Computes question-aligned rank vectors for every player, in join
/// order.
///
/// For each question, a player in its correct-list ranks at their
/// 1-based arrival position; every other player — wrong or silent —
/// ties for last at `players − correct + 1`.
pub fn backfilled_ranks(session: &QuizSession, quiz: &Quiz) -> Vec<Vec<usize>> {
    let player_count = session.players.len();
    session
        .players
        .iter()
        .map(|player| {
            quiz.questions
                .iter()
                .map(|question| {
                    let record = session.record_for(question.question_id);
                    let correct = record.map_or(0, |r| r.correct_answers);
                    record
                        .and_then(|r| {
                            r.players_correct_list
                                .iter()
                                .position(|name| *name == player.name)
                        })
                        .map_or(player_count - correct + 1, |position| position + 1)
                })
                .collect()
        })
        .collect()
}

/// Replaces every player's stored rank sequence with the
/// question-aligned back-filled one.
///
/// Must run before [`export_rows`]; the replacement is wholesale, so
/// running it again is harmless.
pub fn apply_rank_backfill(session: &mut QuizSession, quiz: &Quiz) {
    let ranks = backfilled_ranks(session, quiz);
    for (player, player_ranks) in session.players.iter_mut().zip(ranks) {
        player.question_ranks = player_ranks;
    }
}

/// Builds the per-player score/rank table the exporting layer
/// serializes, rows ordered by player name.
///
/// Scores are derived from each question's correct-list (arrival
/// position `n` earned `points / n`); ranks are read from the
/// players' back-filled rank sequences.
pub fn export_rows(session: &QuizSession, quiz: &Quiz) -> Vec<ExportRow> {
    session
        .players
        .iter()
        .map(|player| ExportRow {
            name: player.name.clone(),
            cells: quiz
                .questions
                .iter()
                .enumerate()
                .map(|(index, question)| {
                    let score = session
                        .record_for(question.question_id)
                        .and_then(|r| {
                            r.players_correct_list
                                .iter()
                                .position(|name| *name == player.name)
                        })
                        .map_or(0.0, |position| question.points / (position + 1) as f64);
                    ScoreRank {
                        score,
                        rank: player.question_ranks.get(index).copied().unwrap_or(0),
                    }
                })
                .collect(),
        })
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect()
}
