use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// How the work is organised, as far as the provider lets us tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "work_mode", rename_all = "lowercase")]
pub enum WorkMode {
    Office,
    Remote,
    Hybrid,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkMode::Office => "office",
            WorkMode::Remote => "remote",
            WorkMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "office" => Ok(WorkMode::Office),
            "remote" => Ok(WorkMode::Remote),
            "hybrid" => Ok(WorkMode::Hybrid),
            other => Err(AppError::BadRequest(format!(
                "Unknown work mode '{other}', expected office, remote or hybrid"
            ))),
        }
    }
}

/// The one shape every source normalizes into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CanonicalVacancy {
    pub title: String,
    pub company_name: String,
    pub description: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub salary_from: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub salary_to: Option<Decimal>,
    pub currency: Option<String>,
    pub work_mode: Option<WorkMode>,
    pub location: String,
    pub url: String,
    pub external_id: String,
    pub source: String,
}

/// Column limits of the vacancies table.
const MAX_TEXT_LEN: usize = 255;
const MAX_URL_LEN: usize = 500;
const MAX_EXTERNAL_ID_LEN: usize = 50;
const MAX_CURRENCY_LEN: usize = 10;

impl CanonicalVacancy {
    /// Check the invariants the store relies on. Providers are allowed to
    /// hand us inconsistent data; it is only rejected here, at write time.
    pub fn validate(&self) -> Result<(), AppError> {
        if let (Some(from), Some(to)) = (self.salary_from, self.salary_to)
            && from > to
        {
            return Err(AppError::Validation(format!(
                "salary_from ({from}) is greater than salary_to ({to})"
            )));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| AppError::Validation(format!("Invalid url '{}': {e}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Unsupported url scheme '{}'",
                url.scheme()
            )));
        }

        let limits = [
            ("title", self.title.chars().count(), MAX_TEXT_LEN),
            ("company_name", self.company_name.chars().count(), MAX_TEXT_LEN),
            ("location", self.location.chars().count(), MAX_TEXT_LEN),
            ("url", self.url.chars().count(), MAX_URL_LEN),
            ("external_id", self.external_id.chars().count(), MAX_EXTERNAL_ID_LEN),
            (
                "currency",
                self.currency.as_deref().map_or(0, |c| c.chars().count()),
                MAX_CURRENCY_LEN,
            ),
        ];
        for (field, len, max) in limits {
            if len > max {
                return Err(AppError::Validation(format!(
                    "{field} is {len} characters long, limit is {max}"
                )));
            }
        }

        Ok(())
    }

    /// Key used to collapse duplicates coming from the same provider.
    pub fn identity(&self) -> (&str, &str) {
        (&self.external_id, &self.source)
    }
}

/// A stored vacancy.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vacancy {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: CanonicalVacancy,
    pub posted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome counters of one persistence batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveStats {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl SaveStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.created + self.updated + self.skipped == self.total
    }
}
