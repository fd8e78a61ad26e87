use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::vacancy::{CanonicalVacancy, WorkMode};
use crate::sources::http::{FetchRequest, Fetcher};
use crate::sources::{MAX_PER_PAGE, SourceError, VacancySource};

/// Default User-Agent; HH asks API clients to identify themselves.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 (+contact@example.com)";

/// Host substitution applied to item links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlRewrite {
    pub from: &'static str,
    pub to: &'static str,
}

impl UrlRewrite {
    fn apply(&self, url: &str) -> String {
        if !url.is_empty() && url.contains(self.from) {
            url.replace(self.from, self.to)
        } else {
            url.to_string()
        }
    }
}

/// Everything that differs between boards running the HH API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HhProfile {
    pub label: &'static str,
    pub base_url: &'static str,
    pub url_rewrite: Option<UrlRewrite>,
}

pub const HH_RU: HhProfile = HhProfile {
    label: "HH.ru",
    base_url: "https://api.hh.ru/vacancies",
    url_rewrite: None,
};

pub const HH_BY: HhProfile = HhProfile {
    label: "HH.by",
    base_url: "https://api.hh.by/vacancies",
    url_rewrite: None,
};

/// rabota.by serves the HH API but its items still link to hh.ru.
pub const RABOTA_BY: HhProfile = HhProfile {
    label: "rabota.by",
    base_url: "https://api.rabota.by/vacancies",
    url_rewrite: Some(UrlRewrite {
        from: "hh.ru",
        to: "rabota.by",
    }),
};

pub struct HhSource {
    profile: HhProfile,
    fetcher: Arc<dyn Fetcher>,
    user_agent: String,
}

impl HhSource {
    pub fn new(profile: HhProfile, fetcher: Arc<dyn Fetcher>, user_agent: String) -> Self {
        Self {
            profile,
            fetcher,
            user_agent,
        }
    }

    fn request(&self, query: &str, page: u32, per_page: u32) -> FetchRequest {
        FetchRequest::get(self.profile.base_url)
            .query("text", query)
            .query("page", page)
            .query("per_page", per_page.min(MAX_PER_PAGE))
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "application/json")
            .header("Accept-Language", "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7")
    }
}

#[async_trait]
impl VacancySource for HhSource {
    fn label(&self) -> &str {
        self.profile.label
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
            .map_err(|e| e.into_source_error(self.profile.label))?;

        let vacancies = parse_response(&data, &self.profile);
        tracing::debug!(
            "{} returned {} vacancies for '{query}'",
            self.profile.label,
            vacancies.len()
        );
        Ok(vacancies)
    }
}

/// Normalize a full search response. A missing `items` array yields nothing.
pub fn parse_response(data: &Value, profile: &HhProfile) -> Vec<CanonicalVacancy> {
    data.get("items")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(|item| normalize_item(item, profile)).collect())
        .unwrap_or_default()
}

/// Map one HH item onto the canonical record. Never fails: absent or
/// mistyped fields degrade to empty strings and `None`.
pub fn normalize_item(item: &Value, profile: &HhProfile) -> CanonicalVacancy {
    let salary = item.get("salary");
    let snippet = item.get("snippet");

    let description = ["responsibility", "requirement"]
        .into_iter()
        .filter_map(|key| str_at(snippet, key))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    let url = str_at(Some(item), "alternate_url").unwrap_or("");
    let url = match profile.url_rewrite {
        Some(rewrite) => rewrite.apply(url),
        None => url.to_string(),
    };

    CanonicalVacancy {
        title: str_at(Some(item), "name").unwrap_or("").to_string(),
        company_name: str_at(item.get("employer"), "name").unwrap_or("").to_string(),
        description,
        salary_from: salary.and_then(|s| s.get("from")).and_then(decimal_from),
        salary_to: salary.and_then(|s| s.get("to")).and_then(decimal_from),
        currency: str_at(salary, "currency").and_then(normalize_currency),
        work_mode: parse_work_mode(item),
        location: str_at(item.get("area"), "name").unwrap_or("").to_string(),
        url,
        external_id: id_string(item.get("id")),
        source: profile.label.to_string(),
    }
}

/// Derive the work mode.
///
/// `work_format` wins when it is conclusive: REMOTE alone is remote, any
/// HYBRID is hybrid. Otherwise `schedule.id` decides: `remote` is remote,
/// `flexible` and `flyAndDrive` are hybrid, any other value is office, and
/// no schedule at all is unknown.
pub fn parse_work_mode(item: &Value) -> Option<WorkMode> {
    if let Some(formats) = item.get("work_format").and_then(|v| v.as_array()) {
        let ids: Vec<&str> = formats
            .iter()
            .filter_map(|f| f.get("id").and_then(|v| v.as_str()))
            .collect();
        let has = |id: &str| ids.contains(&id);
        if has("REMOTE") && !has("ON_SITE") && !has("HYBRID") {
            return Some(WorkMode::Remote);
        }
        if has("HYBRID") {
            return Some(WorkMode::Hybrid);
        }
    }

    match str_at(item.get("schedule"), "id").unwrap_or("") {
        "" => None,
        "remote" => Some(WorkMode::Remote),
        "flexible" | "flyAndDrive" => Some(WorkMode::Hybrid),
        _ => Some(WorkMode::Office),
    }
}

/// HH still reports roubles under the retired code RUR.
pub fn normalize_currency(currency: &str) -> Option<String> {
    let code = currency.trim().to_uppercase();
    match code.as_str() {
        "" => None,
        "RUR" | "RUB" => Some("RUB".to_string()),
        _ => Some(code),
    }
}

fn str_at<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    value.and_then(|v| v.get(key)).and_then(|v| v.as_str())
}

pub(crate) fn decimal_from(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn id_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
