use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::Config;
use crate::db;
use crate::error::AppError;
use crate::filter::SortKey;
use crate::models::store::{PgVacancyStore, VacancyStore};
use crate::models::vacancy::{CanonicalVacancy, SaveStats, WorkMode};
use crate::search::{self, SearchParams, SearchRequest, SearchResults};
use crate::sources::SourceRegistry;

const DESCRIPTION_PREVIEW: usize = 100;
const RULE_WIDTH: usize = 80;

#[derive(clap::Args, Debug, Clone)]
pub struct SearchArgs {
    /// Search phrase
    #[arg(long)]
    pub query: String,

    /// Job board to search: hh, hh_by, superjob, rabota or all
    #[arg(long, default_value = "hh")]
    pub source: String,

    /// Result page, starting at 0
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub page: i64,

    #[arg(long, default_value = "20", allow_negative_numbers = true)]
    pub per_page: i64,

    /// office, remote or hybrid
    #[arg(long)]
    pub work_mode: Option<String>,

    /// Substring of the city name
    #[arg(long)]
    pub location: Option<String>,

    /// Either end of the salary range must reach this amount
    #[arg(long)]
    pub salary_min: Option<Decimal>,

    #[arg(long)]
    pub currency: Option<String>,

    #[arg(long, value_enum, default_value = "none")]
    pub sort: SortKey,

    /// Persist the results (requires DATABASE_URL)
    #[arg(long)]
    pub save: bool,

    /// Overwrite vacancies that are already stored
    #[arg(long, requires = "save")]
    pub update: bool,

    /// Also write the listing to this file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl SearchArgs {
    fn to_params(&self) -> Result<SearchParams, AppError> {
        Ok(SearchParams {
            search_phrase: Some(self.query.clone()),
            source: Some(self.source.clone()),
            page: Some(self.page),
            per_page: Some(self.per_page),
            save: self.save,
            update_existing: self.update,
            work_mode: self
                .work_mode
                .as_deref()
                .map(str::parse::<WorkMode>)
                .transpose()?,
            location: self.location.clone(),
            salary_min: self.salary_min,
            currency: self.currency.clone(),
            sort: Some(self.sort),
        })
    }
}

pub async fn run(config: &Config, args: SearchArgs) -> anyhow::Result<()> {
    let request = SearchRequest::from_params(args.to_params()?)?;
    let sources = SourceRegistry::from_config(config)?;

    let store = if request.save {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL is required to save vacancies")?;
        let pool = db::create_pool(database_url).await?;
        if config.run_migrations {
            db::run_migrations(&pool).await?;
        }
        Some(PgVacancyStore::new(pool))
    } else {
        None
    };

    let results = search::run(
        &sources,
        store.as_ref().map(|s| s as &dyn VacancyStore),
        &request,
    )
    .await?;

    let listing = render_listing(&results.vacancies);
    print!("{}", render_summary(&results));
    print!("{listing}");
    if let Some(stats) = &results.save_stats {
        print!("{}", render_stats(stats, request.update_existing));
    }

    if let Some(path) = &args.output {
        tokio::fs::write(path, &listing)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Listing written to {}", path.display());
    }

    Ok(())
}

fn render_summary(results: &SearchResults) -> String {
    format!(
        "Found {} vacancies ({}, page {})\n",
        results.count, results.source, results.page
    )
}

/// Human-readable listing, one block per vacancy.
pub fn render_listing(vacancies: &[CanonicalVacancy]) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));

    for (idx, vacancy) in vacancies.iter().enumerate() {
        let title = non_empty(&vacancy.title).unwrap_or("Untitled");
        let company = non_empty(&vacancy.company_name).unwrap_or("not specified");
        let _ = writeln!(out, "{}. {title}", idx + 1);
        let _ = writeln!(out, "   Company: {company}");
        let _ = writeln!(out, "   Salary: {}", format_salary(vacancy));
        if let Some(mode) = vacancy.work_mode {
            let _ = writeln!(out, "   Work mode: {mode}");
        }
        if let Some(location) = non_empty(&vacancy.location) {
            let _ = writeln!(out, "   Location: {location}");
        }
        if let Some(description) = non_empty(&vacancy.description) {
            let _ = writeln!(out, "   Description: {}", preview(description));
        }
        if let Some(url) = non_empty(&vacancy.url) {
            let _ = writeln!(out, "   Link: {url}");
        }
        let _ = writeln!(out, "{rule}");
    }
    out
}

fn render_stats(stats: &SaveStats, update_existing: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Saved to database:");
    let _ = writeln!(out, "   Processed: {}", stats.total);
    let _ = writeln!(out, "   Created: {}", stats.created);
    if update_existing {
        let _ = writeln!(out, "   Updated: {}", stats.updated);
    }
    let _ = writeln!(out, "   Skipped: {}", stats.skipped);
    out
}

fn non_empty(s: &str) -> Option<&str> {
    Some(s.trim()).filter(|s| !s.is_empty())
}

fn preview(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_PREVIEW {
        let short: String = description.chars().take(DESCRIPTION_PREVIEW).collect();
        format!("{short}...")
    } else {
        description.to_string()
    }
}

pub fn format_salary(vacancy: &CanonicalVacancy) -> String {
    let currency = vacancy.currency.as_deref().unwrap_or("");
    let range = match (vacancy.salary_from, vacancy.salary_to) {
        (Some(from), Some(to)) => format!("{} - {}", format_amount(from), format_amount(to)),
        (Some(from), None) => format!("from {}", format_amount(from)),
        (None, Some(to)) => format!("up to {}", format_amount(to)),
        (None, None) => return "not specified".to_string(),
    };
    format!("{range} {currency}").trim_end().to_string()
}

/// Whole units with thousands separators, e.g. `150,000`.
fn format_amount(amount: Decimal) -> String {
    let whole = amount.trunc().to_i128().unwrap_or_default();
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
