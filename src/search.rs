use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::filter::{self, SortKey, VacancyFilter};
use crate::models::store::VacancyStore;
use crate::models::vacancy::{CanonicalVacancy, SaveStats, WorkMode};
use crate::persist;
use crate::sources::aggregate::aggregate_all;
use crate::sources::{MAX_PER_PAGE, SourceRegistry, SourceSelector};

const DEFAULT_SOURCE: &str = "hh";
const DEFAULT_PER_PAGE: i64 = 20;

/// Raw search input, as sent by a query string or a JSON body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub search_phrase: Option<String>,
    pub source: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(default)]
    pub save: bool,
    #[serde(default)]
    pub update_existing: bool,
    pub work_mode: Option<WorkMode>,
    pub location: Option<String>,
    pub salary_min: Option<Decimal>,
    pub currency: Option<String>,
    pub sort: Option<SortKey>,
}

/// A validated search. Building one never touches the network.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub source: SourceSelector,
    pub page: u32,
    pub per_page: u32,
    pub save: bool,
    pub update_existing: bool,
    pub filter: VacancyFilter,
    pub sort: SortKey,
}

impl SearchRequest {
    pub fn from_params(params: SearchParams) -> Result<Self, AppError> {
        let query = params
            .search_phrase
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if query.is_empty() {
            return Err(AppError::BadRequest(
                "search_phrase is required".to_string(),
            ));
        }

        let source = params
            .source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SOURCE)
            .parse::<SourceSelector>()?;

        let page = params.page.unwrap_or(0);
        let page = u32::try_from(page).map_err(|_| {
            AppError::BadRequest(format!("page must be a non-negative integer, got {page}"))
        })?;

        let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let per_page = u32::try_from(per_page)
            .ok()
            .filter(|n| (1..=MAX_PER_PAGE).contains(n))
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "per_page must be between 1 and {MAX_PER_PAGE}, got {per_page}"
                ))
            })?;

        let filter = VacancyFilter {
            work_mode: params.work_mode,
            location: params.location,
            salary_min: params.salary_min,
            currency: params.currency,
            search: None,
            company: None,
        }
        .normalized();

        Ok(Self {
            query,
            source,
            page,
            per_page,
            save: params.save,
            update_existing: params.update_existing,
            filter,
            sort: params.sort.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub vacancies: Vec<CanonicalVacancy>,
    pub count: usize,
    pub page: u32,
    pub per_page: u32,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_stats: Option<SaveStats>,
}

/// Fetch, narrow, order and optionally persist one search.
///
/// A single-source search surfaces that source's failure; `all` never fails
/// on account of a source.
pub async fn run(
    sources: &SourceRegistry,
    store: Option<&dyn VacancyStore>,
    request: &SearchRequest,
) -> Result<SearchResults, AppError> {
    if request.save && store.is_none() {
        return Err(AppError::Internal(
            "Saving requires a database connection".to_string(),
        ));
    }

    let fetched = match request.source {
        SourceSelector::One(kind) => {
            let source = sources.get(kind)?;
            source
                .fetch(&request.query, request.page, request.per_page)
                .await?
        }
        SourceSelector::All => {
            aggregate_all(sources, &request.query, request.page, request.per_page).await
        }
    };
    let fetched_count = fetched.len();

    let mut vacancies = request.filter.apply(fetched);
    filter::sort(&mut vacancies, request.sort);

    tracing::info!(
        "Search '{}' on {}: {} fetched, {} after filters",
        request.query,
        request.source.key(),
        fetched_count,
        vacancies.len()
    );

    let save_stats = match store {
        Some(store) if request.save => {
            Some(persist::save_vacancies(store, &vacancies, request.update_existing).await?)
        }
        _ => None,
    };

    Ok(SearchResults {
        count: vacancies.len(),
        vacancies,
        page: request.page,
        per_page: request.per_page,
        source: request.source.key(),
        save_stats,
    })
}
