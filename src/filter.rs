use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::vacancy::{CanonicalVacancy, WorkMode};

/// User-supplied narrowing of a vacancy list. All present filters must hold.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VacancyFilter {
    pub work_mode: Option<WorkMode>,
    pub location: Option<String>,
    pub salary_min: Option<Decimal>,
    pub currency: Option<String>,
    pub search: Option<String>,
    pub company: Option<String>,
}

impl VacancyFilter {
    /// Drop blank text filters, as sent by empty form fields.
    pub fn normalized(self) -> Self {
        let text = |value: Option<String>| {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            work_mode: self.work_mode,
            location: text(self.location),
            salary_min: self.salary_min,
            currency: text(self.currency),
            search: text(self.search),
            company: text(self.company),
        }
    }

    pub fn matches(&self, vacancy: &CanonicalVacancy) -> bool {
        if let Some(mode) = self.work_mode
            && vacancy.work_mode != Some(mode)
        {
            return false;
        }
        if let Some(location) = &self.location
            && !contains_ci(&vacancy.location, location)
        {
            return false;
        }
        if let Some(min) = self.salary_min
            && !meets_salary(vacancy, min)
        {
            return false;
        }
        if let Some(currency) = &self.currency {
            let matches_currency = vacancy
                .currency
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(currency));
            if !matches_currency {
                return false;
            }
        }
        if let Some(company) = &self.company
            && !contains_ci(&vacancy.company_name, company)
        {
            return false;
        }
        if let Some(search) = &self.search
            && !contains_ci(&vacancy.title, search)
            && !contains_ci(&vacancy.description, search)
        {
            return false;
        }
        true
    }

    pub fn apply(&self, vacancies: Vec<CanonicalVacancy>) -> Vec<CanonicalVacancy> {
        vacancies.into_iter().filter(|v| self.matches(v)).collect()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Either end of the range reaching the threshold is enough.
fn meets_salary(vacancy: &CanonicalVacancy, min: Decimal) -> bool {
    [vacancy.salary_from, vacancy.salary_to]
        .into_iter()
        .flatten()
        .any(|amount| amount >= min)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SortKey {
    SalaryDesc,
    SalaryAsc,
    Company,
    Title,
    #[default]
    #[serde(alias = "unsorted")]
    #[value(alias = "unsorted")]
    None,
}

/// Salary used when ordering from the top: upper bound first.
fn salary_high(v: &CanonicalVacancy) -> Decimal {
    v.salary_to.or(v.salary_from).unwrap_or(Decimal::ZERO)
}

/// Salary used when ordering from the bottom; `None` sorts last.
fn salary_low(v: &CanonicalVacancy) -> Option<Decimal> {
    v.salary_from.or(v.salary_to)
}

fn cmp_low(a: Option<Decimal>, b: Option<Decimal>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort; equal keys keep their input order.
pub fn sort(vacancies: &mut [CanonicalVacancy], key: SortKey) {
    sort_with(vacancies, key, |v| v);
}

/// `sort` for anything that carries a vacancy, e.g. stored rows.
pub fn sort_with<T>(items: &mut [T], key: SortKey, record: impl Fn(&T) -> &CanonicalVacancy) {
    match key {
        SortKey::SalaryDesc => items.sort_by_key(|v| std::cmp::Reverse(salary_high(record(v)))),
        SortKey::SalaryAsc => {
            items.sort_by(|a, b| cmp_low(salary_low(record(a)), salary_low(record(b))))
        }
        SortKey::Company => items.sort_by_cached_key(|v| record(v).company_name.to_lowercase()),
        SortKey::Title => items.sort_by_cached_key(|v| record(v).title.to_lowercase()),
        SortKey::None => {}
    }
}
