//! `SQLite` schema definitions for hearingrecorder.
//!
//! The `hearing_tests` table and its column names are shared with every
//! client that reads the same records; renaming them breaks existing rows.

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the sessions table.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
)
";

/// SQL statement to create the hearing tests table.
pub const CREATE_HEARING_TESTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS hearing_tests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL CHECK (length(trim(user_id)) > 0),
    test_date TEXT NOT NULL,
    left_ear_results TEXT,
    right_ear_results TEXT,
    overall_score REAL,
    test_type TEXT NOT NULL DEFAULT 'audiometry'
)
";

/// SQL statement to create an index for per-user newest-first reads.
pub const CREATE_USER_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_hearing_tests_user_date
ON hearing_tests(user_id, test_date DESC)
";

/// SQL statement to create an index on `user_id` for session lookups.
pub const CREATE_SESSION_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_SESSIONS_TABLE,
    CREATE_HEARING_TESTS_TABLE,
    CREATE_USER_DATE_INDEX,
    CREATE_SESSION_USER_INDEX,
    CREATE_METADATA_TABLE,
];
