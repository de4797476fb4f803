//! Client for the message store REST API.
//!
//! Read calls back the dashboard and degrade to empty results when the API
//! is unreachable; mutations surface their errors.

pub mod client;

pub use client::DashClient;
