// Job-board adapters.
// Each source turns one provider's search API into CanonicalVacancy records.

pub mod aggregate;
pub mod hh;
pub mod http;
pub mod superjob;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::AppError;
use crate::models::vacancy::CanonicalVacancy;
use crate::sources::hh::{HH_BY, HH_RU, HhSource, RABOTA_BY};
use crate::sources::http::{Fetcher, HttpFetcher};
use crate::sources::superjob::SuperJobSource;

/// Largest page a single source may be asked for.
pub const MAX_PER_PAGE: u32 = 100;

/// Failures a source can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The adapter cannot be built, e.g. a mandatory API key is missing.
    #[error("{0}")]
    Config(String),

    #[error("request to {provider} timed out")]
    Timeout { provider: String },

    #[error("request to {provider} failed: {message}")]
    Request {
        provider: String,
        status_code: Option<u16>,
        message: String,
    },
}

/// Trait that all vacancy sources must implement.
#[async_trait]
pub trait VacancySource: Send + Sync {
    /// Label written into `CanonicalVacancy::source`, e.g. "HH.ru".
    fn label(&self) -> &str;

    /// Fetch one page of search results, normalized.
    async fn fetch(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CanonicalVacancy>, SourceError>;
}

/// Registered job boards, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Hh,
    HhBy,
    Superjob,
    Rabota,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Hh,
        SourceKind::HhBy,
        SourceKind::Superjob,
        SourceKind::Rabota,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SourceKind::Hh => "hh",
            SourceKind::HhBy => "hh_by",
            SourceKind::Superjob => "superjob",
            SourceKind::Rabota => "rabota",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What the caller asked to search: one board or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelector {
    One(SourceKind),
    All,
}

impl SourceSelector {
    pub fn key(&self) -> &'static str {
        match self {
            SourceSelector::One(kind) => kind.key(),
            SourceSelector::All => "all",
        }
    }
}

impl FromStr for SourceSelector {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        if key == "all" {
            return Ok(SourceSelector::All);
        }
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .map(SourceSelector::One)
            .ok_or_else(|| {
                AppError::UnknownSource(format!(
                    "Unknown source '{s}', expected one of: hh, hh_by, superjob, rabota, all"
                ))
            })
    }
}

enum Slot {
    Ready(Arc<dyn VacancySource>),
    Unavailable(SourceError),
}

/// Explicit source registry handed to the search layer.
///
/// Adapters are built once; a source that failed to build keeps its
/// construction error so single-source requests can report it while the
/// aggregate simply skips it.
#[derive(Default)]
pub struct SourceRegistry {
    entries: Vec<(SourceKind, Slot)>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the default registry: HH.ru, HH.by, SuperJob.ru, rabota.by.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.source_timeout())?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let user_agent = config.hh_user_agent.clone();
        let mut registry = Self::new();
        registry.register(
            SourceKind::Hh,
            Ok(Arc::new(HhSource::new(HH_RU, fetcher.clone(), user_agent.clone()))),
        );
        registry.register(
            SourceKind::HhBy,
            Ok(Arc::new(HhSource::new(HH_BY, fetcher.clone(), user_agent.clone()))),
        );
        registry.register(
            SourceKind::Superjob,
            SuperJobSource::new(config.superjob_api_key.as_deref(), fetcher.clone())
                .map(|s| Arc::new(s) as Arc<dyn VacancySource>),
        );
        registry.register(
            SourceKind::Rabota,
            Ok(Arc::new(HhSource::new(RABOTA_BY, fetcher, user_agent))),
        );
        registry
    }

    pub fn register(
        &mut self,
        kind: SourceKind,
        source: Result<Arc<dyn VacancySource>, SourceError>,
    ) {
        let slot = match source {
            Ok(source) => Slot::Ready(source),
            Err(e) => {
                tracing::warn!("Source '{kind}' is unavailable: {e}");
                Slot::Unavailable(e)
            }
        };
        self.entries.retain(|(k, _)| *k != kind);
        self.entries.push((kind, slot));
    }

    /// Look up a single source; a source that failed to build reports its
    /// construction error here.
    pub fn get(&self, kind: SourceKind) -> Result<Arc<dyn VacancySource>, AppError> {
        match self.entries.iter().find(|(k, _)| *k == kind) {
            Some((_, Slot::Ready(source))) => Ok(source.clone()),
            Some((_, Slot::Unavailable(e))) => Err(e.clone().into()),
            None => Err(AppError::UnknownSource(format!(
                "Source '{kind}' is not registered"
            ))),
        }
    }

    /// Every registered entry in registration order, including unavailable ones.
    pub fn entries(
        &self,
    ) -> impl Iterator<Item = (SourceKind, Result<Arc<dyn VacancySource>, SourceError>)> + '_ {
        self.entries.iter().map(|(kind, slot)| {
            let source = match slot {
                Slot::Ready(source) => Ok(source.clone()),
                Slot::Unavailable(e) => Err(e.clone()),
            };
            (*kind, source)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
