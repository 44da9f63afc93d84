//! `hearingrecorder` - Record and review hearing test results
//!
//! This library persists completed hearing tests for an authenticated user
//! and reads back their most recent tests. Both operations go through an
//! [`IdentityDataService`]; [`Storage`] is the bundled `SQLite` implementation.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod reader;
pub mod record;
pub mod recorder;
pub mod service;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use history::HistoryEntry;
pub use logging::init_logging;
pub use reader::ResultReader;
pub use record::{EarResults, FrequencyResponse, HearingTestRecord, StoredEarResults, TestOutcome};
pub use recorder::ResultRecorder;
pub use service::IdentityDataService;
pub use session::{Session, User, UserId};
pub use storage::{Storage, StorageStats};
