//! Messenger abstractions (Telegram today; other chat networks behind the same port).

pub mod port;
pub mod sink;
pub mod throttled;
pub mod types;
