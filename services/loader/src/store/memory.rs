//! In-memory session backing `--dry-run` and the test suite.
//!
//! Mirrors the constraints of the Postgres schema closely enough that a row
//! rejected here would be rejected by Postgres as well.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use super::{NewReview, ReviewStore, StoreError, Table};

const BANK_NAME_MAX: usize = 50;
const SENTIMENT_LABEL_MAX: usize = 20;
const THEME_MAX: usize = 4000;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredReview {
    pub id: i64,
    pub review_text: String,
    pub rating: i16,
    pub review_date: NaiveDate,
    pub bank_id: i64,
    pub sentiment_label: String,
    pub sentiment_score: f64,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct State {
    banks_table: bool,
    reviews_table: bool,
    banks: Vec<(i64, String)>,
    reviews: Vec<StoredReview>,
    next_bank_id: i64,
    next_review_id: i64,
}

#[derive(Debug, Default)]
struct Shared {
    committed: State,
    #[cfg(test)]
    entity_lookups: usize,
    #[cfg(test)]
    commits: usize,
    /// Inserts allowed before the session reports a lost connection.
    #[cfg(test)]
    inserts_until_disconnect: Option<usize>,
}

/// A session over shared committed state. Sessions created with
/// [`MemoryStore::session`] see each other's commits, like separate runs
/// against one database.
#[derive(Debug)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
    pending: Option<State>,
    closed: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            pending: None,
            closed: false,
        }
    }

    /// Opens another session over the same committed state.
    pub fn session(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            pending: None,
            closed: false,
        }
    }

    /// Simulates the connection dropping after `n` more review inserts.
    #[cfg(test)]
    pub fn disconnect_after_inserts(&self, n: usize) {
        self.lock().inserts_until_disconnect = Some(n);
    }

    /// Committed dimension rows as `(id, name)`.
    pub fn committed_banks(&self) -> Vec<(i64, String)> {
        self.lock().committed.banks.clone()
    }

    pub fn committed_reviews(&self) -> Vec<StoredReview> {
        self.lock().committed.reviews.clone()
    }

    #[cfg(test)]
    pub fn committed_tables(&self) -> (bool, bool) {
        let shared = self.lock();
        (shared.committed.banks_table, shared.committed.reviews_table)
    }

    /// Number of `find_entity` calls across all sessions.
    #[cfg(test)]
    pub fn entity_lookups(&self) -> usize {
        self.lock().entity_lookups
    }

    #[cfg(test)]
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::ConnectionLost("session is closed".into()));
        }
        Ok(())
    }

    #[cfg(test)]
    fn simulate_disconnect(&mut self) -> Result<(), StoreError> {
        let disconnect = match self.lock().inserts_until_disconnect.as_mut() {
            Some(n) if *n == 0 => true,
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        };
        if disconnect {
            self.closed = true;
            self.pending = None;
            return Err(StoreError::ConnectionLost("server closed the connection".into()));
        }

        Ok(())
    }

    /// The transaction's view of the data, opened from committed state.
    fn pending(&mut self) -> Result<&mut State, StoreError> {
        self.check_open()?;
        let state = match self.pending.take() {
            Some(state) => state,
            None => self.lock().committed.clone(),
        };
        Ok(self.pending.insert(state))
    }
}

fn validate_review(state: &State, review: &NewReview<'_>) -> Result<StoredReview, StoreError> {
    fn not_null<T>(value: Option<T>, column: &str) -> Result<T, StoreError> {
        value.ok_or_else(|| {
            StoreError::Constraint(format!(
                "null value in column \"{column}\" violates not-null constraint"
            ))
        })
    }

    fn max_len(value: &str, column: &str, max: usize) -> Result<(), StoreError> {
        if value.chars().count() > max {
            return Err(StoreError::Constraint(format!(
                "value too long for type character varying({max}) in column \"{column}\""
            )));
        }
        Ok(())
    }

    if !state.reviews_table {
        return Err(StoreError::Constraint(
            "relation \"reviews\" does not exist".into(),
        ));
    }

    let review_text = not_null(review.review_text, "review_text")?;
    let review_date = not_null(review.review_date, "review_date")?;
    let sentiment_label = not_null(review.sentiment_label, "sentiment_label")?;
    let sentiment_score = not_null(review.sentiment_score, "sentiment_score")?;
    max_len(sentiment_label, "sentiment_label", SENTIMENT_LABEL_MAX)?;
    if let Some(theme) = review.theme {
        max_len(theme, "theme", THEME_MAX)?;
    }

    if !state.banks.iter().any(|(id, _)| *id == review.bank_id) {
        return Err(StoreError::Constraint(format!(
            "insert or update on table \"reviews\" violates foreign key constraint \"fk_bank\" (bank_id={})",
            review.bank_id
        )));
    }

    Ok(StoredReview {
        id: 0,
        review_text: review_text.to_string(),
        rating: review.rating,
        review_date,
        bank_id: review.bank_id,
        sentiment_label: sentiment_label.to_string(),
        sentiment_score,
        theme: review.theme.map(str::to_string),
    })
}

impl ReviewStore for MemoryStore {
    async fn table_exists(&mut self, table: Table) -> Result<bool, StoreError> {
        let state = self.pending()?;
        Ok(match table {
            Table::Banks => state.banks_table,
            Table::Reviews => state.reviews_table,
        })
    }

    async fn create_tables(&mut self) -> Result<(), StoreError> {
        let state = self.pending()?;
        state.banks_table = true;
        state.reviews_table = true;
        Ok(())
    }

    async fn find_entity(&mut self, name: &str) -> Result<Option<i64>, StoreError> {
        #[cfg(test)]
        {
            self.lock().entity_lookups += 1;
        }
        let state = self.pending()?;
        if !state.banks_table {
            return Err(StoreError::Constraint("relation \"banks\" does not exist".into()));
        }
        Ok(state
            .banks
            .iter()
            .find(|(_, existing)| existing == name)
            .map(|(id, _)| *id))
    }

    async fn create_entity(&mut self, name: &str) -> Result<i64, StoreError> {
        let state = self.pending()?;
        if !state.banks_table {
            return Err(StoreError::Constraint("relation \"banks\" does not exist".into()));
        }
        if name.chars().count() > BANK_NAME_MAX {
            return Err(StoreError::Constraint(format!(
                "value too long for type character varying({BANK_NAME_MAX}) in column \"name\""
            )));
        }
        if state.banks.iter().any(|(_, existing)| existing == name) {
            return Err(StoreError::Constraint(format!(
                "duplicate key value violates unique constraint on banks.name ({name})"
            )));
        }
        state.next_bank_id += 1;
        let id = state.next_bank_id;
        state.banks.push((id, name.to_string()));
        Ok(id)
    }

    async fn insert_review(&mut self, review: &NewReview<'_>) -> Result<(), StoreError> {
        self.check_open()?;
        #[cfg(test)]
        self.simulate_disconnect()?;

        let state = self.pending()?;
        let mut stored = validate_review(state, review)?;
        state.next_review_id += 1;
        stored.id = state.next_review_id;
        state.reviews.push(stored);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.check_open()?;
        if let Some(state) = self.pending.take() {
            let mut shared = self.lock();
            shared.committed = state;
            #[cfg(test)]
            {
                shared.commits += 1;
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.pending = None;
        Ok(())
    }

    async fn close(mut self) -> Result<(), StoreError> {
        self.pending = None;
        self.closed = true;
        Ok(())
    }
}
