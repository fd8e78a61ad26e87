use std::collections::HashSet;

use crate::models::vacancy::CanonicalVacancy;
use crate::sources::SourceRegistry;

/// Every source is asked for at least this many records.
const MIN_PER_SOURCE: u32 = 5;

/// Query every registered source in order and merge the results.
///
/// Sources are read one at a time from their first page, each asked for an
/// even share of `per_page`. A source that is unavailable or fails simply
/// contributes nothing. Results are deduplicated on `(external_id, source)`
/// keeping the first occurrence, and collection stops as soon as `per_page`
/// unique records are in hand, so later sources may not be queried at all.
pub async fn aggregate_all(
    registry: &SourceRegistry,
    query: &str,
    page: u32,
    per_page: u32,
) -> Vec<CanonicalVacancy> {
    if registry.is_empty() {
        tracing::warn!("No vacancy sources registered");
        return Vec::new();
    }

    let limit = per_page as usize;
    let share = (per_page / registry.len() as u32).max(MIN_PER_SOURCE);

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut merged = Vec::with_capacity(limit);

    tracing::debug!("Aggregating '{query}' (page {page} requested, {share} per source)");

    for (kind, source) in registry.entries() {
        if merged.len() >= limit {
            tracing::debug!("Result cap reached, skipping '{kind}'");
            continue;
        }

        let source = match source {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Skipping source '{kind}': {e}");
                continue;
            }
        };

        let batch = match source.fetch(query, 0, share).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(
                    "Source '{}' failed, continuing without it: {e}",
                    source.label()
                );
                continue;
            }
        };

        for vacancy in batch {
            let (external_id, label) = vacancy.identity();
            if seen.insert((external_id.to_string(), label.to_string())) {
                merged.push(vacancy);
                if merged.len() >= limit {
                    break;
                }
            }
        }
    }

    merged.truncate(limit);
    tracing::info!(
        "Aggregated {} vacancies for '{query}' from {} sources",
        merged.len(),
        registry.len()
    );
    merged
}
