//! # Kwiz Session Engine
//!
//! This library implements the live-session core of a quiz hosting
//! system: the state machine that drives a running session from lobby
//! to final results, the timers that auto-advance it, the scoring and
//! ranking of player answers, and the aggregation of per-question and
//! final results.
//!
//! Everything around it — accounts, quiz authoring, transport,
//! durable storage — is a collaborator behind the [`store::Repository`]
//! and [`timer::Scheduler`] seams. The engine never performs I/O of
//! its own and takes wall-clock instants as arguments, which keeps it
//! deterministic under test.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod constants;
pub mod engine;
pub mod error;
pub mod ids;
pub mod names;
pub mod quiz;
pub mod results;
pub mod scoring;
pub mod session;
pub mod store;
pub mod timer;

pub use engine::Engine;
pub use error::{Error, ErrorKind};
pub use session::{Action, QuizSession, SessionState};
