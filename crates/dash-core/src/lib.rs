pub mod config;
pub mod error;
pub mod refresh;
pub mod time;
pub mod types;

pub use config::AppConfig;
pub use error::DashError;
pub use types::{DateRange, Message, MessageStatus};
