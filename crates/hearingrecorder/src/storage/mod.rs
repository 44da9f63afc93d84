//! Storage layer for hearingrecorder.
//!
//! This module provides a `SQLite`-backed identity and data service: local
//! user accounts, expiring sessions, and the `hearing_tests` table.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{HearingTestRecord, NewHearingTest, StoredEarResults};
use crate::service::{HearingTestQuery, IdentityDataService, HEARING_TESTS_TABLE};
use crate::session::{Session, User, UserId};

const HEARING_TEST_COLUMNS: &str =
    "id, user_id, test_date, left_ear_results, right_ear_results, overall_score, test_type";

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local identity and data service.
///
/// The connection sits behind a mutex so one `Storage` can be shared
/// between tasks.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the schema version of the open database.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;
        migrations::get_schema_version(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    // === Users and sessions ===

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the email is malformed or already
    /// registered.
    pub fn create_user(&self, email: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let now = Utc::now();
        let id = UserId::new(derive_hex("user", &email, 32))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
            params![id.as_str(), email, format_timestamp(now)],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::invalid_input(format!("a user with email {email} already exists"))
            }
            other => other.into(),
        })?;

        info!("Created user {}", id);
        Ok(User {
            id,
            email: Some(email),
        })
    }

    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is malformed or the query fails.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email)?;
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, email FROM users WHERE email = ?1",
                [email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Start a session for the user with `email`, valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no user has that email or the
    /// expiry would fall after the year 9999.
    pub fn sign_in(&self, email: &str, ttl: Duration) -> Result<Session> {
        let user = self
            .find_user_by_email(email)?
            .ok_or_else(|| Error::invalid_input(format!("no account registered for {email}")))?;

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .filter(|at| at.year() <= 9999)
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "session lifetime of {} hours is out of range",
                    ttl.num_hours()
                ))
            })?;
        let token = derive_hex("session", user.id.as_str(), 64);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                token,
                user.id.as_str(),
                format_timestamp(now),
                format_timestamp(expires_at)
            ],
        )?;

        info!("Signed in user {}", user.id);
        Ok(Session::new(token))
    }

    /// Revoke a session. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn sign_out(&self, session: &Session) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM sessions WHERE token = ?1",
            [session.access_token()],
        )?;
        Ok(affected > 0)
    }

    /// Resolve a session to its user, ignoring expired sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn user_for_session(&self, session: &Session) -> Result<Option<User>> {
        if session.is_empty() {
            return Ok(None);
        }

        let conn = self.lock()?;
        let user = conn
            .query_row(
                r"
                SELECT u.id, u.email FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.token = ?1 AND s.expires_at > ?2
                ",
                params![session.access_token(), format_timestamp(Utc::now())],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Delete expired sessions. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_expired_sessions(&self) -> Result<usize> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            [format_timestamp(Utc::now())],
        )?;

        if affected > 0 {
            info!("Pruned {} expired sessions", affected);
        }
        Ok(affected)
    }

    // === Hearing tests ===

    /// Insert a hearing test and return it as stored.
    ///
    /// The store assigns `id` and `test_date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert(&self, row: &NewHearingTest) -> Result<HearingTestRecord> {
        let left = encode_ear_results(&row.left_ear_results)?;
        let right = encode_ear_results(&row.right_ear_results)?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {HEARING_TESTS_TABLE} \
                 (user_id, test_date, left_ear_results, right_ear_results, overall_score, test_type) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                row.user_id.as_str(),
                format_timestamp(Utc::now()),
                left,
                right,
                row.overall_score,
                row.test_type,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted hearing test with id {}", id);

        fetch_hearing_test(&conn, id)?
            .ok_or_else(|| Error::internal(format!("inserted hearing test {id} not found")))
    }

    /// Get a hearing test by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<HearingTestRecord>> {
        let conn = self.lock()?;
        fetch_hearing_test(&conn, id)
    }

    /// Get the newest `limit` hearing tests of one user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<HearingTestRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HEARING_TEST_COLUMNS} FROM {HEARING_TESTS_TABLE} \
             WHERE user_id = ?1 ORDER BY test_date DESC, id DESC LIMIT ?2"
        ))?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![user_id.as_str(), limit_i64], row_to_hearing_test)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count hearing tests in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {HEARING_TESTS_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.lock()?;
        let now = format_timestamp(Utc::now());

        let total_tests: i64 =
            conn.query_row(
                &format!("SELECT COUNT(*) FROM {HEARING_TESTS_TABLE}"),
                [],
                |row| row.get(0),
            )?;
        let total_users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let active_sessions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE expires_at > ?1",
            [now],
            |row| row.get(0),
        )?;
        let newest: Option<String> = conn
            .query_row(
                &format!("SELECT test_date FROM {HEARING_TESTS_TABLE} ORDER BY test_date DESC LIMIT 1"),
                [],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);

        let newest_test = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_tests,
            total_users,
            active_sessions,
            newest_test,
            db_size_bytes,
        })
    }
}

#[async_trait::async_trait]
impl IdentityDataService for Storage {
    async fn current_user(&self, session: &Session) -> Result<Option<User>> {
        self.user_for_session(session)
    }

    async fn insert_hearing_test(&self, row: &NewHearingTest) -> Result<HearingTestRecord> {
        self.insert(row).map_err(Error::into_store)
    }

    async fn query_hearing_tests(
        &self,
        query: &HearingTestQuery,
    ) -> Result<Vec<HearingTestRecord>> {
        self.recent_for_user(&query.user_id, query.limit)
            .map_err(Error::into_store)
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of hearing tests stored.
    pub total_tests: i64,
    /// Number of registered users.
    pub total_users: i64,
    /// Sessions that have not expired.
    pub active_sessions: i64,
    /// Date of the newest hearing test.
    pub newest_test: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Fixed-width UTC timestamps so that text order matches time order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::invalid_input(format!("invalid email address '{email}'"))),
    }
}

/// Derive an opaque hex identifier, unique per call.
fn derive_hex(kind: &str, seed: &str, len: usize) -> String {
    let counter = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let input = format!("{kind}:{seed}:{nanos}:{}:{counter}", std::process::id());
    let hex = blake3::hash(input.as_bytes()).to_hex();
    let hex = hex.as_str();
    hex[..len.min(hex.len())].to_string()
}

fn encode_ear_results(stored: &StoredEarResults) -> Result<Option<String>> {
    if stored.is_absent() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&Value::from(stored.clone()))?))
}

/// Column text that is not JSON is kept as an undecoded payload.
fn decode_ear_results(column: Option<String>) -> StoredEarResults {
    match column {
        None => StoredEarResults::Absent,
        Some(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => StoredEarResults::from(value),
            Err(_) => StoredEarResults::Encoded(text),
        },
    }
}

fn fetch_hearing_test(conn: &Connection, id: i64) -> Result<Option<HearingTestRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {HEARING_TEST_COLUMNS} FROM {HEARING_TESTS_TABLE} WHERE id = ?1"),
            [id],
            row_to_hearing_test,
        )
        .optional()?;
    Ok(record)
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let email: Option<String> = row.get(1)?;
    let id = UserId::new(id).map_err(|e| conversion_error(0, e.to_string()))?;
    Ok(User { id, email })
}

fn row_to_hearing_test(row: &rusqlite::Row) -> rusqlite::Result<HearingTestRecord> {
    let id: i64 = row.get(0)?;
    let user_id: String = row.get(1)?;
    let test_date: String = row.get(2)?;
    let left: Option<String> = row.get(3)?;
    let right: Option<String> = row.get(4)?;
    let overall_score: Option<f64> = row.get(5)?;
    let test_type: String = row.get(6)?;

    let user_id = UserId::new(user_id).map_err(|e| conversion_error(1, e.to_string()))?;
    let test_date = DateTime::parse_from_rfc3339(&test_date)
        .map_err(|e| conversion_error(2, format!("invalid test_date '{test_date}': {e}")))?
        .with_timezone(&Utc);

    Ok(HearingTestRecord {
        id,
        user_id,
        test_date,
        left_ear_results: decode_ear_results(left),
        right_ear_results: decode_ear_results(right),
        overall_score,
        test_type,
    })
}
