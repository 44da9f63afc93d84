//! Reading a user's recent hearing tests.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::history::HistoryEntry;
use crate::record::HearingTestRecord;
use crate::service::{authenticate, HearingTestQuery, IdentityDataService};
use crate::session::Session;

/// Number of records returned when the caller does not pass a limit.
pub const DEFAULT_LIMIT: usize = 3;

/// Reads the most recent hearing tests of the session's user.
///
/// Every call goes to the service; nothing is cached between calls.
#[derive(Clone)]
pub struct ResultReader {
    service: Arc<dyn IdentityDataService>,
}

impl ResultReader {
    /// Create a reader backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn IdentityDataService>) -> Self {
        Self { service }
    }

    /// Fetch up to `limit` records (default [`DEFAULT_LIMIT`]), newest first.
    ///
    /// A user with no records gets an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AuthenticationMissing`] if the session does not
    /// identify a user (no query is issued), or [`crate::Error::Store`] with
    /// the service's message if the query fails.
    pub async fn recent(
        &self,
        session: &Session,
        limit: Option<usize>,
    ) -> Result<Vec<HearingTestRecord>> {
        let user = match authenticate(self.service.as_ref(), session).await {
            Ok(user) => user,
            Err(err) => {
                warn!("Error fetching hearing tests: {err}");
                return Err(err);
            }
        };

        let query = HearingTestQuery::recent(user.id, limit.unwrap_or(DEFAULT_LIMIT));
        debug!(
            "Fetching up to {} hearing tests for user {}",
            query.limit, query.user_id
        );

        match self.service.query_hearing_tests(&query).await {
            Ok(records) => {
                debug!("Fetched {} hearing tests", records.len());
                Ok(records)
            }
            Err(err) => {
                let err = err.into_store();
                warn!("Error fetching hearing tests: {err}");
                Err(err)
            }
        }
    }

    /// Fetch recent records and normalize them for display.
    ///
    /// # Errors
    ///
    /// Fails exactly when [`ResultReader::recent`] fails.
    pub async fn history(
        &self,
        session: &Session,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        let records = self.recent(session, limit).await?;
        Ok(HistoryEntry::from_records(&records))
    }
}

impl fmt::Debug for ResultReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultReader").finish_non_exhaustive()
    }
}
