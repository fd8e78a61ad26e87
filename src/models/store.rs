use async_trait::async_trait;
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::AppError;
use crate::filter::{SortKey, VacancyFilter};
use crate::models::vacancy::{CanonicalVacancy, Vacancy};

/// Stored-listing request, already validated. `page` starts at 1.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: VacancyFilter,
    pub sort: SortKey,
    pub page: i64,
    pub per_page: i64,
}

impl ListQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct VacancyPage {
    pub vacancies: Vec<Vacancy>,
    pub count: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Persistent vacancy storage.
#[async_trait]
pub trait VacancyStore: Send + Sync {
    /// Open a write batch. Nothing is visible to readers until `commit`.
    async fn begin(&self) -> Result<Box<dyn VacancyTx>, AppError>;

    async fn get(&self, id: i64) -> Result<Vacancy, AppError>;

    async fn list(&self, query: &ListQuery) -> Result<VacancyPage, AppError>;
}

/// One write batch.
///
/// Records are applied between `checkpoint` and `release_checkpoint`; a
/// failing record is undone with `rollback_to_checkpoint` without losing
/// the rest of the batch.
#[async_trait]
pub trait VacancyTx: Send {
    async fn find_by_identity(
        &mut self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Vacancy>, AppError>;

    /// Case-insensitive; the oldest row wins if several share a url.
    async fn find_by_url(&mut self, url: &str) -> Result<Option<Vacancy>, AppError>;

    async fn insert(&mut self, record: &CanonicalVacancy) -> Result<Vacancy, AppError>;

    /// Overwrite a row with `record`, keeping its `(source, external_id)`
    /// identity and creation times.
    async fn update(&mut self, id: i64, record: &CanonicalVacancy) -> Result<Vacancy, AppError>;

    async fn checkpoint(&mut self) -> Result<(), AppError>;

    async fn release_checkpoint(&mut self) -> Result<(), AppError>;

    async fn rollback_to_checkpoint(&mut self) -> Result<(), AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgVacancyStore {
    pool: PgPool,
}

impl PgVacancyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LIST_WHERE: &str = "WHERE ($1::text IS NULL OR title ILIKE $1 ESCAPE '\\' OR description ILIKE $1 ESCAPE '\\') \
     AND ($2::text IS NULL OR location ILIKE $2 ESCAPE '\\') \
     AND ($3::work_mode IS NULL OR work_mode = $3) \
     AND ($4::text IS NULL OR company_name ILIKE $4 ESCAPE '\\') \
     AND ($5::numeric IS NULL OR salary_from >= $5 OR salary_to >= $5) \
     AND ($6::text IS NULL OR upper(currency) = upper($6))";

/// `ILIKE` pattern matching `text` literally anywhere in the column.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn order_by(sort: SortKey) -> &'static str {
    match sort {
        SortKey::SalaryDesc => "COALESCE(salary_to, salary_from, 0) DESC, id",
        SortKey::SalaryAsc => "COALESCE(salary_from, salary_to) ASC NULLS LAST, id",
        SortKey::Company => "lower(company_name), id",
        SortKey::Title => "lower(title), id",
        SortKey::None => "posted_at DESC, id DESC",
    }
}

#[async_trait]
impl VacancyStore for PgVacancyStore {
    async fn begin(&self) -> Result<Box<dyn VacancyTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgVacancyTx { tx: Some(tx) }))
    }

    async fn get(&self, id: i64) -> Result<Vacancy, AppError> {
        sqlx::query_as::<_, Vacancy>("SELECT * FROM vacancies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vacancy {id} not found")))
    }

    async fn list(&self, query: &ListQuery) -> Result<VacancyPage, AppError> {
        let f = &query.filter;
        let search = f.search.as_deref().map(contains_pattern);
        let location = f.location.as_deref().map(contains_pattern);
        let company = f.company.as_deref().map(contains_pattern);

        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM vacancies {LIST_WHERE}"))
            .bind(&search)
            .bind(&location)
            .bind(f.work_mode)
            .bind(&company)
            .bind(f.salary_min)
            .bind(&f.currency)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT * FROM vacancies {LIST_WHERE} ORDER BY {} LIMIT $7 OFFSET $8",
            order_by(query.sort)
        );
        let vacancies = sqlx::query_as::<_, Vacancy>(&sql)
            .bind(&search)
            .bind(&location)
            .bind(f.work_mode)
            .bind(&company)
            .bind(f.salary_min)
            .bind(&f.currency)
            .bind(query.per_page)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(VacancyPage {
            vacancies,
            count: count.0,
            page: query.page,
            per_page: query.per_page,
        })
    }
}

pub struct PgVacancyTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgVacancyTx {
    fn conn(&mut self) -> Result<&mut PgConnection, AppError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }
}

#[async_trait]
impl VacancyTx for PgVacancyTx {
    async fn find_by_identity(
        &mut self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Vacancy>, AppError> {
        let vacancy = sqlx::query_as::<_, Vacancy>(
            "SELECT * FROM vacancies WHERE source = $1 AND external_id = $2",
        )
        .bind(source)
        .bind(external_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(vacancy)
    }

    async fn find_by_url(&mut self, url: &str) -> Result<Option<Vacancy>, AppError> {
        let vacancy = sqlx::query_as::<_, Vacancy>(
            "SELECT * FROM vacancies WHERE lower(url) = lower($1) ORDER BY id LIMIT 1",
        )
        .bind(url)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(vacancy)
    }

    async fn insert(&mut self, record: &CanonicalVacancy) -> Result<Vacancy, AppError> {
        let vacancy = sqlx::query_as::<_, Vacancy>(
            "INSERT INTO vacancies (title, company_name, description, salary_from, salary_to, currency, work_mode, location, url, external_id, source) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(&record.title)
        .bind(&record.company_name)
        .bind(&record.description)
        .bind(record.salary_from)
        .bind(record.salary_to)
        .bind(&record.currency)
        .bind(record.work_mode)
        .bind(&record.location)
        .bind(&record.url)
        .bind(&record.external_id)
        .bind(&record.source)
        .fetch_one(self.conn()?)
        .await?;
        Ok(vacancy)
    }

    async fn update(&mut self, id: i64, record: &CanonicalVacancy) -> Result<Vacancy, AppError> {
        let vacancy = sqlx::query_as::<_, Vacancy>(
            "UPDATE vacancies SET title = $2, company_name = $3, description = $4, salary_from = $5, salary_to = $6, currency = $7, work_mode = $8, location = $9, url = $10, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&record.title)
        .bind(&record.company_name)
        .bind(&record.description)
        .bind(record.salary_from)
        .bind(record.salary_to)
        .bind(&record.currency)
        .bind(record.work_mode)
        .bind(&record.location)
        .bind(&record.url)
        .fetch_optional(self.conn()?)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vacancy {id} not found")))?;
        Ok(vacancy)
    }

    async fn checkpoint(&mut self) -> Result<(), AppError> {
        sqlx::query("SAVEPOINT vacancy_record")
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn release_checkpoint(&mut self) -> Result<(), AppError> {
        sqlx::query("RELEASE SAVEPOINT vacancy_record")
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn rollback_to_checkpoint(&mut self) -> Result<(), AppError> {
        sqlx::query("ROLLBACK TO SAVEPOINT vacancy_record")
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(AppError::Internal(
                "Transaction already committed".to_string(),
            )),
        }
    }
}
