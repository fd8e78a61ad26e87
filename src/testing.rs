// Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::filter;
use crate::models::store::{ListQuery, VacancyPage, VacancyStore, VacancyTx};
use crate::models::vacancy::{CanonicalVacancy, Vacancy, WorkMode};
use crate::sources::hh::DEFAULT_USER_AGENT;
use crate::sources::http::{FetchError, FetchRequest, Fetcher};
use crate::sources::{SourceError, VacancySource};

/// A valid record; the url is unique per `(id, source)`.
pub fn vacancy(id: &str, source: &str) -> CanonicalVacancy {
    CanonicalVacancy {
        title: "Backend Developer".to_string(),
        company_name: "Test Company".to_string(),
        description: "Test description".to_string(),
        salary_from: None,
        salary_to: None,
        currency: Some("RUB".to_string()),
        work_mode: Some(WorkMode::Remote),
        location: "Москва".to_string(),
        url: format!("https://example.com/{source}/vacancy/{id}"),
        external_id: id.to_string(),
        source: source.to_string(),
    }
}

pub fn test_config(superjob_api_key: Option<&str>) -> Config {
    Config {
        database_url: None,
        run_migrations: false,
        superjob_api_key: superjob_api_key.map(str::to_string),
        hh_user_agent: DEFAULT_USER_AGENT.to_string(),
        source_timeout_secs: 10,
        log_json: false,
        command: None,
    }
}

/// Fetcher that answers every request the same way and records what it got.
pub struct StubFetcher {
    response: Result<Value, FetchError>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StubFetcher {
    pub fn empty() -> Self {
        Self::with_json(Value::Null)
    }

    pub fn with_json(value: Value) -> Self {
        Self {
            response: Ok(value),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_error(error: FetchError) -> Self {
        Self {
            response: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn get_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone()
    }
}

/// Source returning a fixed batch (whatever `per_page` says) or a fixed error.
pub struct StubSource {
    label: String,
    response: Result<Vec<CanonicalVacancy>, SourceError>,
    calls: Mutex<Vec<(u32, u32)>>,
}

impl StubSource {
    pub fn new(label: &str, records: Vec<CanonicalVacancy>) -> Self {
        Self {
            label: label.to_string(),
            response: Ok(records),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(label: &str, error: SourceError) -> Self {
        Self {
            label: label.to_string(),
            response: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(page, per_page)` of every fetch so far.
    pub fn calls(&self) -> Vec<(u32, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VacancySource for StubSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(
        &self,
        _query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CanonicalVacancy>, SourceError> {
        self.calls.lock().unwrap().push((page, per_page));
        self.response.clone()
    }
}

#[derive(Clone, Default)]
struct MemoryState {
    rows: Vec<Vacancy>,
    next_id: i64,
}

impl MemoryState {
    fn push(&mut self, record: CanonicalVacancy) -> Vacancy {
        self.next_id += 1;
        let now = Utc::now();
        let row = Vacancy {
            id: self.next_id,
            record,
            posted_at: now,
            created_at: now,
            updated_at: now,
        };
        self.rows.push(row.clone());
        row
    }

    fn conflicts(&self, record: &CanonicalVacancy) -> bool {
        self.rows.iter().any(|row| {
            let same_identity = !record.external_id.is_empty()
                && row.record.source == record.source
                && row.record.external_id == record.external_id;
            same_identity || row.record.url.to_lowercase() == record.url.to_lowercase()
        })
    }
}

/// In-memory store with the same matching and batch semantics as Postgres.
/// Uniqueness is only enforced on writes, so tests can seed duplicate urls.
#[derive(Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_insert_of: Arc<Mutex<Option<String>>>,
    fail_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows directly, bypassing validation and uniqueness.
    pub fn seed(&self, records: Vec<CanonicalVacancy>) {
        let mut state = self.state.lock().unwrap();
        for record in records {
            state.push(record);
        }
    }

    /// Make inserts of this external_id fail.
    pub fn fail_insert_of(&self, external_id: &str) {
        *self.fail_insert_of.lock().unwrap() = Some(external_id.to_string());
    }

    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VacancyStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn VacancyTx>, AppError> {
        let working = self.state.lock().unwrap().clone();
        Ok(Box::new(MemoryTx {
            shared: self.state.clone(),
            working,
            checkpoint: None,
            fail_insert_of: self.fail_insert_of.lock().unwrap().clone(),
            fail_commit: self.fail_commit.load(Ordering::SeqCst),
        }))
    }

    async fn get(&self, id: i64) -> Result<Vacancy, AppError> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Vacancy {id} not found")))
    }

    async fn list(&self, query: &ListQuery) -> Result<VacancyPage, AppError> {
        let mut rows: Vec<Vacancy> = self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|row| query.filter.matches(&row.record))
            .cloned()
            .collect();

        rows.sort_by_key(|row| row.id);
        match query.sort {
            filter::SortKey::None => rows.sort_by(|a, b| {
                (b.posted_at, b.id).cmp(&(a.posted_at, a.id))
            }),
            key => filter::sort_with(&mut rows, key, |row| &row.record),
        }

        let count = rows.len() as i64;
        let vacancies = rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page.max(0) as usize)
            .collect();

        Ok(VacancyPage {
            vacancies,
            count,
            page: query.page,
            per_page: query.per_page,
        })
    }
}

struct MemoryTx {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    checkpoint: Option<MemoryState>,
    fail_insert_of: Option<String>,
    fail_commit: bool,
}

#[async_trait]
impl VacancyTx for MemoryTx {
    async fn find_by_identity(
        &mut self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Vacancy>, AppError> {
        Ok(self
            .working
            .rows
            .iter()
            .find(|row| row.record.source == source && row.record.external_id == external_id)
            .cloned())
    }

    async fn find_by_url(&mut self, url: &str) -> Result<Option<Vacancy>, AppError> {
        let url = url.to_lowercase();
        Ok(self
            .working
            .rows
            .iter()
            .filter(|row| row.record.url.to_lowercase() == url)
            .min_by_key(|row| row.id)
            .cloned())
    }

    async fn insert(&mut self, record: &CanonicalVacancy) -> Result<Vacancy, AppError> {
        if self.fail_insert_of.as_deref() == Some(record.external_id.as_str()) {
            return Err(AppError::Internal("insert failed".to_string()));
        }
        if self.working.conflicts(record) {
            return Err(AppError::Internal(format!(
                "duplicate vacancy {} ({})",
                record.external_id, record.url
            )));
        }
        Ok(self.working.push(record.clone()))
    }

    async fn update(&mut self, id: i64, record: &CanonicalVacancy) -> Result<Vacancy, AppError> {
        let current = self
            .working
            .rows
            .iter()
            .find(|row| row.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Vacancy {id} not found")))?;
        let url_changed = current.record.url.to_lowercase() != record.url.to_lowercase();
        if url_changed
            && self
                .working
                .rows
                .iter()
                .any(|row| row.id != id && row.record.url.to_lowercase() == record.url.to_lowercase())
        {
            return Err(AppError::Internal(format!("duplicate vacancy url {}", record.url)));
        }

        let row = self
            .working
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Vacancy {id} not found")))?;
        row.record = CanonicalVacancy {
            source: std::mem::take(&mut row.record.source),
            external_id: std::mem::take(&mut row.record.external_id),
            ..record.clone()
        };
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn checkpoint(&mut self) -> Result<(), AppError> {
        self.checkpoint = Some(self.working.clone());
        Ok(())
    }

    async fn release_checkpoint(&mut self) -> Result<(), AppError> {
        self.checkpoint = None;
        Ok(())
    }

    async fn rollback_to_checkpoint(&mut self) -> Result<(), AppError> {
        if let Some(saved) = self.checkpoint.take() {
            self.working = saved;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        if self.fail_commit {
            return Err(AppError::Internal("commit failed".to_string()));
        }
        *self.shared.lock().unwrap() = std::mem::take(&mut self.working);
        Ok(())
    }
}
