//! Document store for conversation messages.
//!
//! Holds the message collection and per-conversation analysis records,
//! persisted as JSON files, and answers the queries the dashboard API
//! exposes: all messages, latest message per conversation, and one
//! conversation's history with tolerant id matching.

pub mod matching;
pub mod store;

pub use matching::GroupMatcher;
pub use store::MessageStore;
