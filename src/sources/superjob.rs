use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::vacancy::{CanonicalVacancy, WorkMode};
use crate::sources::hh::{decimal_from, id_string};
use crate::sources::http::{FetchRequest, Fetcher};
use crate::sources::{MAX_PER_PAGE, SourceError, VacancySource};

const BASE_URL: &str = "https://api.superjob.ru/2.0/vacancies/";
const LABEL: &str = "SuperJob.ru";

/// SuperJob search API. Every call must carry the registered app key.
pub struct SuperJobSource {
    api_key: String,
    fetcher: Arc<dyn Fetcher>,
}

impl SuperJobSource {
    pub fn new(api_key: Option<&str>, fetcher: Arc<dyn Fetcher>) -> Result<Self, SourceError> {
        let api_key = api_key.map(str::trim).unwrap_or_default();
        if api_key.is_empty() {
            return Err(SourceError::Config(
                "SUPERJOB_API_KEY is not set; register an app at https://api.superjob.ru/register/"
                    .to_string(),
            ));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            fetcher,
        })
    }

    fn request(&self, query: &str, page: u32, per_page: u32) -> FetchRequest {
        FetchRequest::get(BASE_URL)
            .query("keyword", query)
            .query("page", page)
            .query("count", per_page.min(MAX_PER_PAGE))
            .header("X-Api-App-Id", self.api_key.clone())
            .header("Accept", "application/json")
    }
}

#[async_trait]
impl VacancySource for SuperJobSource {
    fn label(&self) -> &str {
        LABEL
    }

    async fn fetch(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CanonicalVacancy>, SourceError> {
        let request = self.request(query, page, per_page);
        let data = self
            .fetcher
            .get_json(&request)
            .await
            .map_err(|e| e.into_source_error(LABEL))?;

        Ok(parse_response(&data))
    }
}

pub fn parse_response(data: &Value) -> Vec<CanonicalVacancy> {
    data.get("objects")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(normalize_item).collect())
        .unwrap_or_default()
}

pub fn normalize_item(item: &Value) -> CanonicalVacancy {
    let text = |key: &str| item.get(key).and_then(|v| v.as_str()).unwrap_or("");

    let description = ["work", "candidat", "compensation"]
        .into_iter()
        .map(text)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    // SuperJob sends 0 for "not specified".
    let payment = |key: &str| {
        item.get(key)
            .and_then(decimal_from)
            .filter(|amount| !amount.is_zero())
    };

    CanonicalVacancy {
        title: text("profession").to_string(),
        company_name: text("firm_name").to_string(),
        description,
        salary_from: payment("payment_from"),
        salary_to: payment("payment_to"),
        currency: Some(text("currency").trim().to_uppercase()).filter(|c| !c.is_empty()),
        work_mode: parse_work_mode(item),
        location: item
            .get("town")
            .and_then(|t| t.get("title"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        url: text("link").to_string(),
        external_id: id_string(item.get("id")),
        source: LABEL.to_string(),
    }
}

/// `place_of_work.id`: 1 on site, 2 from home, 3 travelling.
pub fn parse_work_mode(item: &Value) -> Option<WorkMode> {
    match item
        .get("place_of_work")
        .and_then(|p| p.get("id"))
        .and_then(|v| v.as_i64())
    {
        Some(1) => Some(WorkMode::Office),
        Some(2) => Some(WorkMode::Remote),
        Some(3) => Some(WorkMode::Hybrid),
        _ => None,
    }
}
