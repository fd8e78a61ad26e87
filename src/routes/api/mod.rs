pub mod search;
pub mod vacancies;

use axum::Router;
use axum::routing::get;

use crate::routes::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Live search across job boards
        .route(
            "/vacancies/search",
            get(search::search_get).post(search::search_post),
        )
        // Stored vacancies
        .route("/vacancies", get(vacancies::list))
        .route("/vacancies/{id}", get(vacancies::get))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::models::store::VacancyStore;
    use crate::sources::SourceRegistry;
    use crate::sources::http::{FetchError, Fetcher};
    use crate::testing::{MemoryStore, StubFetcher, test_config, vacancy};

    fn hh_item() -> Value {
        json!({
            "id": "123456",
            "name": "Python Developer",
            "employer": {"name": "Test Company"},
            "snippet": {"responsibility": "Разработка на Python", "requirement": null},
            "salary": {"from": 100000, "to": null, "currency": "RUR"},
            "schedule": {"id": "remote"},
            "area": {"name": "Москва"},
            "alternate_url": "https://hh.ru/vacancy/123456"
        })
    }

    fn app_with(fetcher: Arc<dyn Fetcher>, store: Arc<dyn VacancyStore>) -> Router {
        let sources = SourceRegistry::with_fetcher(&test_config(None), fetcher);
        router(AppState {
            sources: Arc::new(sources),
            store,
        })
    }

    fn app(fetcher: Arc<dyn Fetcher>) -> Router {
        app_with(fetcher, Arc::new(MemoryStore::new()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    #[tokio::test]
    async fn test_search_single_hh_item() {
        let fetcher = Arc::new(StubFetcher::with_json(json!({"items": [hh_item()]})));
        let (status, body) = get(
            app(fetcher),
            "/api/v1/vacancies/search?search_phrase=python&source=hh&per_page=20",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["per_page"], 20);
        assert_eq!(body["vacancies"][0]["title"], "Python Developer");
        assert_eq!(body["vacancies"][0]["work_mode"], "remote");
        assert_eq!(body["vacancies"][0]["currency"], "RUB");
        assert!(body.get("save_stats").is_none());
    }

    #[tokio::test]
    async fn test_search_rejects_bad_paging_before_network() {
        for query in ["per_page=101", "per_page=0", "page=-1"] {
            let fetcher = Arc::new(StubFetcher::with_json(json!({"items": []})));
            let (status, body) = get(
                app(fetcher.clone()),
                &format!("/api/v1/vacancies/search?search_phrase=python&{query}"),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
            assert!(body["error"].is_string());
            assert!(fetcher.requests().is_empty(), "{query}");
        }
    }

    #[tokio::test]
    async fn test_search_requires_phrase_and_known_source() {
        let fetcher = Arc::new(StubFetcher::empty());
        let (status, _) = get(app(fetcher.clone()), "/api/v1/vacancies/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(
            app(fetcher),
            "/api/v1/vacancies/search?search_phrase=python&source=linkedin",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("linkedin"));
    }

    #[tokio::test]
    async fn test_search_timeout_is_gateway_timeout() {
        let fetcher = Arc::new(StubFetcher::with_error(FetchError::Timeout));
        let (status, body) = get(
            app(fetcher),
            "/api/v1/vacancies/search?search_phrase=python",
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body["details"].as_str().unwrap().contains("HH.ru"));
    }

    #[tokio::test]
    async fn test_search_propagates_upstream_status() {
        let fetcher = Arc::new(StubFetcher::with_error(FetchError::Status(500)));
        let (status, _) = get(
            app(fetcher),
            "/api/v1/vacancies/search?search_phrase=python&source=hh_by",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let fetcher = Arc::new(StubFetcher::with_error(FetchError::Transport(
            "connection reset".to_string(),
        )));
        let (status, _) = get(
            app(fetcher),
            "/api/v1/vacancies/search?search_phrase=python&source=rabota",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_search_unconfigured_superjob() {
        let fetcher = Arc::new(StubFetcher::empty());
        let (status, _) = get(
            app(fetcher),
            "/api/v1/vacancies/search?search_phrase=python&source=superjob",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_search_all_survives_failures() {
        let fetcher = Arc::new(StubFetcher::with_error(FetchError::Timeout));
        let (status, body) = get(
            app(fetcher),
            "/api/v1/vacancies/search?search_phrase=python&source=all",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["source"], "all");
    }

    #[tokio::test]
    async fn test_post_search_saves_and_reports_stats() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(StubFetcher::with_json(json!({"items": [hh_item()]})));
        let request = Request::post("/api/v1/vacancies/search")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"search_phrase": "python", "save": true}).to_string(),
            ))
            .unwrap();

        let (status, body) = send(app_with(fetcher.clone(), store.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["save_stats"],
            json!({"total": 1, "created": 1, "updated": 0, "skipped": 0})
        );

        let (status, body) = get(
            app_with(fetcher, store),
            "/api/v1/vacancies?search=python",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["page"], 1);
        assert_eq!(body["vacancies"][0]["external_id"], "123456");
        assert_eq!(body["vacancies"][0]["id"], 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let store = Arc::new(MemoryStore::new());
        let mut office = vacancy("3", "HH.ru");
        office.work_mode = Some(crate::models::vacancy::WorkMode::Office);
        store.seed(vec![vacancy("1", "HH.ru"), vacancy("2", "HH.by"), office]);
        let fetcher = Arc::new(StubFetcher::empty());

        let (status, body) = get(
            app_with(fetcher.clone(), store.clone()),
            "/api/v1/vacancies?work_mode=remote&sort=title&per_page=1&page=2",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["vacancies"].as_array().unwrap().len(), 1);
        assert_eq!(body["vacancies"][0]["external_id"], "2");

        let (status, _) = get(app_with(fetcher, store), "/api/v1/vacancies?page=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_rejects_pages_past_the_offset_range() {
        let fetcher = Arc::new(StubFetcher::empty());
        let (status, body) = get(
            app(fetcher.clone()),
            "/api/v1/vacancies?page=9223372036854775807&per_page=100",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("page"));

        let (status, body) = get(app(fetcher), "/api/v1/vacancies?page=1000&per_page=100").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vacancies"], json!([]));
    }

    #[tokio::test]
    async fn test_get_vacancy_by_id() {
        let store = Arc::new(MemoryStore::new());
        store.seed(vec![vacancy("1", "HH.ru")]);
        let fetcher = Arc::new(StubFetcher::empty());

        let (status, body) = get(app_with(fetcher.clone(), store.clone()), "/api/v1/vacancies/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "HH.ru");

        let (status, body) = get(app_with(fetcher, store), "/api/v1/vacancies/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}
