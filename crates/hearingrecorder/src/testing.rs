//! Test doubles for the identity and data service.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::record::{HearingTestRecord, NewHearingTest};
use crate::service::{HearingTestQuery, IdentityDataService};
use crate::session::{Session, User, UserId};

/// How many times each service method was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub lookups: usize,
    pub inserts: usize,
    pub queries: usize,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<HearingTestRecord>,
    calls: CallCounts,
}

/// In-memory service with one known session and switchable failures.
#[derive(Debug)]
pub struct FakeService {
    user: User,
    token: String,
    lookup_error: Option<String>,
    insert_error: Option<String>,
    query_error: Option<String>,
    state: Mutex<State>,
}

impl FakeService {
    pub fn with_user(user_id: &str, token: &str) -> Self {
        Self {
            user: User {
                id: UserId::new(user_id).expect("test user id"),
                email: Some(format!("{user_id}@example.com")),
            },
            token: token.to_string(),
            lookup_error: None,
            insert_error: None,
            query_error: None,
            state: Mutex::new(State::default()),
        }
    }

    pub fn failing_lookup(mut self, message: &str) -> Self {
        self.lookup_error = Some(message.to_string());
        self
    }

    pub fn failing_insert(mut self, message: &str) -> Self {
        self.insert_error = Some(message.to_string());
        self
    }

    pub fn failing_query(mut self, message: &str) -> Self {
        self.query_error = Some(message.to_string());
        self
    }

    /// Seed a stored record directly, bypassing call counting.
    pub fn seed(&self, record: HearingTestRecord) {
        self.state.lock().unwrap().records.push(record);
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    pub fn stored(&self) -> Vec<HearingTestRecord> {
        self.state.lock().unwrap().records.clone()
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn lookup(&self, session: &Session) -> Result<Option<User>> {
        self.state.lock().unwrap().calls.lookups += 1;
        if let Some(message) = &self.lookup_error {
            return Err(Error::store(message.clone()));
        }
        Ok((session.access_token() == self.token).then(|| self.user.clone()))
    }

    fn insert(&self, row: &NewHearingTest) -> Result<HearingTestRecord> {
        let mut state = self.state.lock().unwrap();
        state.calls.inserts += 1;
        if let Some(message) = &self.insert_error {
            return Err(Error::store(message.clone()));
        }

        let id = i64::try_from(state.records.len()).unwrap() + 1;
        let record = HearingTestRecord {
            id,
            user_id: row.user_id.clone(),
            test_date: Self::base_time() + Duration::minutes(id),
            left_ear_results: row.left_ear_results.clone(),
            right_ear_results: row.right_ear_results.clone(),
            overall_score: row.overall_score,
            test_type: row.test_type.clone(),
        };
        state.records.push(record.clone());
        Ok(record)
    }

    fn query(&self, query: &HearingTestQuery) -> Result<Vec<HearingTestRecord>> {
        let mut state = self.state.lock().unwrap();
        state.calls.queries += 1;
        if let Some(message) = &self.query_error {
            return Err(Error::store(message.clone()));
        }

        let mut records: Vec<_> = state
            .records
            .iter()
            .filter(|r| r.user_id == query.user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.test_date.cmp(&a.test_date).then(b.id.cmp(&a.id)));
        records.truncate(query.limit);
        Ok(records)
    }
}

#[async_trait::async_trait]
impl IdentityDataService for FakeService {
    async fn current_user(&self, session: &Session) -> Result<Option<User>> {
        self.lookup(session)
    }

    async fn insert_hearing_test(&self, row: &NewHearingTest) -> Result<HearingTestRecord> {
        self.insert(row)
    }

    async fn query_hearing_tests(
        &self,
        query: &HearingTestQuery,
    ) -> Result<Vec<HearingTestRecord>> {
        self.query(query)
    }
}
