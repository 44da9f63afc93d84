//! Persisting completed hearing tests.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::record::{HearingTestRecord, NewHearingTest, TestOutcome};
use crate::service::{authenticate, IdentityDataService};
use crate::session::Session;

/// Records hearing-test outcomes for the session's user.
///
/// Each call to [`ResultRecorder::record`] appends exactly one row. There is
/// no idempotency key: recording the same outcome twice stores two records.
#[derive(Clone)]
pub struct ResultRecorder {
    service: Arc<dyn IdentityDataService>,
}

impl ResultRecorder {
    /// Create a recorder backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn IdentityDataService>) -> Self {
        Self { service }
    }

    /// Persist `outcome` for the user behind `session`.
    ///
    /// Absent ears are stored as null and a missing test type becomes
    /// `"audiometry"`. Nothing is written unless the session resolves to a
    /// user.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AuthenticationMissing`] if the session does not
    /// identify a user, [`crate::Error::InvalidInput`] if a frequency or the
    /// score is not finite, or [`crate::Error::Store`] with the service's
    /// message if the insert fails.
    pub async fn record(
        &self,
        session: &Session,
        outcome: TestOutcome,
    ) -> Result<HearingTestRecord> {
        let user = match authenticate(self.service.as_ref(), session).await {
            Ok(user) => user,
            Err(err) => {
                warn!("Error saving hearing test: {err}");
                return Err(err);
            }
        };

        let row = match NewHearingTest::from_outcome(user.id, outcome) {
            Ok(row) => row,
            Err(err) => {
                warn!("Error saving hearing test: {err}");
                return Err(err);
            }
        };
        debug!(
            "Saving {} hearing test for user {}",
            row.test_type, row.user_id
        );

        match self.service.insert_hearing_test(&row).await {
            Ok(record) => {
                info!("Saved hearing test {} for user {}", record.id, record.user_id);
                Ok(record)
            }
            Err(err) => {
                let err = err.into_store();
                warn!("Error saving hearing test: {err}");
                Err(err)
            }
        }
    }
}

impl fmt::Debug for ResultRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRecorder").finish_non_exhaustive()
    }
}
