//! One-shot transition timers
//!
//! A running session arms at most one delayed transition per active
//! question: the 3-second countdown into `QUESTION_OPEN`, and the
//! question-duration timeout into `QUESTION_CLOSE`. This module
//! defines the [`Alarm`] payload those timers deliver, the
//! [`Scheduler`] seam the state machine arms them through, and
//! [`AlarmQueue`], a deterministic implementation driven by
//! [`AlarmQueue::advance`] rather than a runtime. An embedding server
//! can drive the queue from its event loop; tests drive it by hand.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::{QuestionId, SessionId};
use crate::session::SessionState;

/// A scheduled state transition for a session
///
/// The `epoch` records the session's transition epoch at arming time;
/// a fired alarm whose epoch no longer matches the session is stale
/// and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    /// The session this alarm advances
    pub session_id: SessionId,
    /// The question this alarm was armed for
    pub question_id: QuestionId,
    /// The state the session should transition into
    pub to: SessionState,
    /// The session epoch at arming time
    pub epoch: u64,
}

/// The scheduling seam the state machine arms timers through.
///
/// Arming a new alarm for a question that already has one outstanding
/// must replace it; a cancelled alarm must never fire.
pub trait Scheduler {
    /// Schedules `alarm` to fire once after `delay`.
    fn schedule_once(&mut self, alarm: Alarm, delay: Duration);

    /// Cancels the outstanding alarm for `question_id`, if any.
    fn cancel(&mut self, question_id: QuestionId);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingAlarm {
    alarm: Alarm,
    remaining: Duration,
}

/// A deterministic alarm queue
///
/// Holds at most one pending alarm per question id. Time passes only
/// through [`AlarmQueue::advance`], which returns the alarms that came
/// due, in firing order; the caller feeds them back into the engine.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AlarmQueue {
    pending: Vec<PendingAlarm>,
}

impl AlarmQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of outstanding alarms.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Checks whether an alarm is outstanding for `question_id`.
    pub fn is_armed(&self, question_id: QuestionId) -> bool {
        self.pending.iter().any(|p| p.alarm.question_id == question_id)
    }

    /// Advances the queue's clock by `elapsed` and drains every alarm
    /// that came due, in firing order.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Alarm> {
        let mut due: Vec<PendingAlarm> = Vec::new();
        self.pending.retain_mut(|p| {
            if p.remaining <= elapsed {
                due.push(p.clone());
                false
            } else {
                p.remaining -= elapsed;
                true
            }
        });
        due.sort_by_key(|p| p.remaining);
        due.into_iter().map(|p| p.alarm).collect()
    }
}

impl Scheduler for AlarmQueue {
    fn schedule_once(&mut self, alarm: Alarm, delay: Duration) {
        // one outstanding alarm per question
        self.cancel(alarm.question_id);
        log::debug!(
            "armed alarm for session {} question {} -> {:?} in {delay:?}",
            alarm.session_id,
            alarm.question_id,
            alarm.to,
        );
        self.pending.push(PendingAlarm {
            alarm,
            remaining: delay,
        });
    }

    fn cancel(&mut self, question_id: QuestionId) {
        let before = self.pending.len();
        self.pending.retain(|p| p.alarm.question_id != question_id);
        if self.pending.len() != before {
            log::debug!("cancelled alarm for question {question_id}");
        }
    }
}
