#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Conversation session engine.
//!
//! This crate owns the single linear conversation of a running client:
//! the in-memory transcript, its persistence round-trip, and the
//! turn-taking state machine that calls the model.
//!
//! # Key Features
//! - Append-only transcript, restored in stored order on start-up
//! - One turn in flight at a time; overlapping sends are rejected
//! - Every transcript change is persisted before the next one is made
//! - Replies arriving after a clear are discarded, never appended
//! - State and failures published to observers instead of shared fields

mod controller;
mod events;
mod store;

pub use controller::{ControllerConfig, ConversationController, TurnOutcome};
pub use events::{EventBus, SessionEvent};
pub use store::{LoadReport, MessageStore};
