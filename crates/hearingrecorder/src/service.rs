//! The identity and data service the core operations depend on.
//!
//! The service is a collaborator: it resolves sessions to users and stores
//! `hearing_tests` rows. [`crate::storage::Storage`] is the bundled
//! implementation; a hosted backend can be plugged in by implementing
//! [`IdentityDataService`].

use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{HearingTestRecord, NewHearingTest};
use crate::session::{Session, User, UserId};

/// Name of the table holding hearing test records.
pub const HEARING_TESTS_TABLE: &str = "hearing_tests";

/// Select the most recent records of one user.
///
/// Results are ordered by `test_date` descending and hold at most `limit`
/// rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HearingTestQuery {
    /// Only rows with this `user_id` are returned.
    pub user_id: UserId,
    /// Maximum number of rows.
    pub limit: usize,
}

impl HearingTestQuery {
    /// Create a query for the newest `limit` records of `user_id`.
    #[must_use]
    pub fn recent(user_id: UserId, limit: usize) -> Self {
        Self { user_id, limit }
    }
}

/// Session lookup, user identity and hearing-test storage.
#[async_trait::async_trait]
pub trait IdentityDataService: Send + Sync {
    /// Resolve a session to its user.
    ///
    /// Returns `Ok(None)` when the session is unknown or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    async fn current_user(&self, session: &Session) -> Result<Option<User>>;

    /// Insert one row and return the stored representation, including the
    /// store-assigned `id` and `test_date`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the insert fails.
    async fn insert_hearing_test(&self, row: &NewHearingTest) -> Result<HearingTestRecord>;

    /// Run a [`HearingTestQuery`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the query fails.
    async fn query_hearing_tests(&self, query: &HearingTestQuery)
        -> Result<Vec<HearingTestRecord>>;
}

/// Resolve `session` to a user or fail with [`Error::AuthenticationMissing`].
///
/// A failing lookup is reported the same way as a missing user.
///
/// # Errors
///
/// Returns [`Error::AuthenticationMissing`] if no user can be identified.
pub async fn authenticate(service: &dyn IdentityDataService, session: &Session) -> Result<User> {
    if session.is_empty() {
        return Err(Error::AuthenticationMissing);
    }

    match service.current_user(session).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(Error::AuthenticationMissing),
        Err(err) => {
            debug!("Session lookup failed: {err}");
            Err(Error::AuthenticationMissing)
        }
    }
}
