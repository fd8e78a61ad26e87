use crate::error::AppError;
use crate::models::store::{VacancyStore, VacancyTx};
use crate::models::vacancy::{CanonicalVacancy, SaveStats, Vacancy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Skipped,
}

/// Persist a batch of normalized vacancies in one transaction.
///
/// Each record is matched against stored rows by `(source, external_id)`,
/// then by url (case-insensitive). Unmatched records are created; matched
/// ones are updated in place, keeping their stored identity, when
/// `update_existing` is set and skipped otherwise.
/// A record that fails validation or the write itself is rolled back on
/// its own and counted as skipped; only storage-level failures (opening,
/// committing) abort the batch.
pub async fn save_vacancies(
    store: &dyn VacancyStore,
    records: &[CanonicalVacancy],
    update_existing: bool,
) -> Result<SaveStats, AppError> {
    let mut stats = SaveStats::new(records.len());
    if records.is_empty() {
        return Ok(stats);
    }

    let mut tx = store.begin().await?;

    for record in records {
        tx.checkpoint().await?;
        match apply(tx.as_mut(), record, update_existing).await {
            Ok(outcome) => {
                tx.release_checkpoint().await?;
                match outcome {
                    Outcome::Created => stats.created += 1,
                    Outcome::Updated => stats.updated += 1,
                    Outcome::Skipped => stats.skipped += 1,
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to save vacancy '{}' ({} {}): {e}",
                    record.title,
                    record.source,
                    record.external_id
                );
                tx.rollback_to_checkpoint().await?;
                stats.skipped += 1;
            }
        }
    }

    tx.commit().await?;

    tracing::info!(
        "Saved vacancies: {} total, {} created, {} updated, {} skipped",
        stats.total,
        stats.created,
        stats.updated,
        stats.skipped
    );
    debug_assert!(stats.is_balanced());
    Ok(stats)
}

async fn find_existing(
    tx: &mut dyn VacancyTx,
    record: &CanonicalVacancy,
) -> Result<Option<Vacancy>, AppError> {
    if !record.external_id.is_empty()
        && let Some(existing) = tx
            .find_by_identity(&record.source, &record.external_id)
            .await?
    {
        return Ok(Some(existing));
    }
    if record.url.is_empty() {
        return Ok(None);
    }
    tx.find_by_url(&record.url).await
}

async fn apply(
    tx: &mut dyn VacancyTx,
    record: &CanonicalVacancy,
    update_existing: bool,
) -> Result<Outcome, AppError> {
    match find_existing(tx, record).await? {
        Some(existing) if update_existing => {
            record.validate()?;
            tx.update(existing.id, record).await?;
            tracing::debug!("Updated vacancy {} ({})", existing.id, record.title);
            Ok(Outcome::Updated)
        }
        Some(existing) => {
            tracing::debug!("Skipped duplicate of vacancy {} ({})", existing.id, record.title);
            Ok(Outcome::Skipped)
        }
        None => {
            record.validate()?;
            let created = tx.insert(record).await?;
            tracing::debug!("Created vacancy {} ({})", created.id, record.title);
            Ok(Outcome::Created)
        }
    }
}
