pub mod config;
pub mod habit;
pub mod partner;
pub mod watch;
