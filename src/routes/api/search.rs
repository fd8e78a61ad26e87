use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};

use crate::error::AppError;
use crate::routes::AppState;
use crate::search::{self, SearchParams, SearchRequest, SearchResults};

pub async fn search_get(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResults>, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    run(&state, params).await
}

pub async fn search_post(
    State(state): State<AppState>,
    params: Result<Json<SearchParams>, JsonRejection>,
) -> Result<Json<SearchResults>, AppError> {
    let Json(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    run(&state, params).await
}

async fn run(state: &AppState, params: SearchParams) -> Result<Json<SearchResults>, AppError> {
    let request = SearchRequest::from_params(params)?;
    let results = search::run(&state.sources, Some(state.store.as_ref()), &request).await?;
    Ok(Json(results))
}
