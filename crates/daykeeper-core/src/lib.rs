//! # Daykeeper Core Library
//!
//! This library provides the core business logic for Daykeeper, a habit
//! tracker with streaks and accountability partners. It implements a
//! CLI-first philosophy where all operations are available via a
//! standalone CLI binary; any outer surface (GUI, HTTP) is a thin layer
//! over the same core library.
//!
//! ## Architecture
//!
//! - **Streak Engine**: A pure function over a completion record and a
//!   cadence, computing the current streak from an injected reference
//!   date. No clock access, no side effects.
//! - **Habit**: The owning entity; every mutation goes through explicit
//!   entry points that refresh the cached streak and bump `updated_at`
//! - **Storage**: SQLite-based habit/partnership storage and TOML-based
//!   configuration
//! - **Change Feed**: Polls `updated_at` watermarks to emit partner and
//!   habit update events
//!
//! ## Key Components
//!
//! - [`streak::compute`]: The streak engine
//! - [`Habit`]: Habit entity and mutation entry points
//! - [`Database`]: Habit and partnership persistence
//! - [`Config`]: Application configuration management
//! - [`ChangeFeed`]: Accountability change polling

pub mod error;
pub mod feed;
pub mod habit;
pub mod partner;
pub mod storage;
pub mod streak;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use feed::{ChangeFeed, FeedEvent, HabitSummary};
pub use habit::Habit;
pub use partner::Partnership;
pub use storage::{Config, Database};
pub use streak::{Cadence, CompletionRecord, StreakResult};
