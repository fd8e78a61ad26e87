use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::AppError;
use crate::filter::{SortKey, VacancyFilter};
use crate::models::store::{ListQuery, VacancyPage};
use crate::models::vacancy::{Vacancy, WorkMode};
use crate::routes::AppState;
use crate::sources::MAX_PER_PAGE;

const DEFAULT_PER_PAGE: i64 = 20;
/// Largest page whose row offset still fits the database's bigint.
const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE as i64;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub location: Option<String>,
    pub work_mode: Option<WorkMode>,
    pub company: Option<String>,
    pub salary_min: Option<Decimal>,
    pub currency: Option<String>,
    pub sort: Option<SortKey>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl TryFrom<ListParams> for ListQuery {
    type Error = AppError;

    fn try_from(params: ListParams) -> Result<Self, Self::Error> {
        let page = params.page.unwrap_or(1);
        if !(1..=MAX_PAGE).contains(&page) {
            return Err(AppError::BadRequest(format!(
                "page must be between 1 and {MAX_PAGE}, got {page}"
            )));
        }
        let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=i64::from(MAX_PER_PAGE)).contains(&per_page) {
            return Err(AppError::BadRequest(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}, got {per_page}"
            )));
        }

        let filter = VacancyFilter {
            work_mode: params.work_mode,
            location: params.location,
            salary_min: params.salary_min,
            currency: params.currency,
            search: params.search,
            company: params.company,
        }
        .normalized();

        Ok(ListQuery {
            filter,
            sort: params.sort.unwrap_or_default(),
            page,
            per_page,
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<VacancyPage>, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let query = ListQuery::try_from(params)?;
    let page = state.store.list(&query).await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vacancy>, AppError> {
    let vacancy = state.store.get(id).await?;
    Ok(Json(vacancy))
}
