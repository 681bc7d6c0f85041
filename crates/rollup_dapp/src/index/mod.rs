//! GraphQL notice index: query client and notice polling.

mod client;
mod poll;

pub use client::{IndexConfig, IndexError, Notice, NoticeIndexClient, NoticeKeys};
pub use poll::{poll_notice, NoticeResponse, PollConfig, PollError, PollOutcome};
