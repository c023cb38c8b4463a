//! Legacy credit import and deferred identity binding.
//!
//! Spreadsheet exports from the previous system are previewed, committed as
//! [`HistoricalCreditRecord`]s, and bound to practitioners either at import time or later,
//! when a matching identity is registered.

pub mod matcher;
pub mod normalizer;
pub mod parser;
pub mod preview;
pub mod record;

pub use parser::{ColumnMapping, ColumnRef};
pub use preview::{
    Binding, ImportPreview, ImportSummary, PreviewCounts, PreviewRow, ReconciliationReport,
    RowFailure, RowIssue, RowOutcome,
};
pub use record::{HistoricalCreditRecord, HistoricalRecordId, HistoricalRecordView, LinkFilter};

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use self::matcher::{IdentityIndex, MatchOutcome};
use self::parser::RawRow;
use self::record::DuplicateKey;
use crate::config::CreditPolicy;
use crate::workflows::credits::domain::CreditAmount;
use crate::workflows::credits::repository::{HistoricalRecordRepository, RepositoryError};
use crate::workflows::identity::{
    DirectoryError, IdentityDirectory, IdentityObserver, PractitionerIdentity,
};

pub const DEFAULT_DESCRIPTION: &str = "Historical credit import";

static HISTORICAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_historical_id() -> HistoricalRecordId {
    let id = HISTORICAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    HistoricalRecordId(format!("hist-{id:06}"))
}

#[derive(Debug)]
pub enum HistoricalImportError {
    /// Required columns could not be found in the header row.
    Schema { missing: Vec<&'static str> },
    Io(std::io::Error),
    Csv(csv::Error),
    Repository(RepositoryError),
    Directory(DirectoryError),
}

impl std::fmt::Display for HistoricalImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoricalImportError::Schema { missing } => write!(
                f,
                "historical file is missing required columns: {}",
                missing.join(", ")
            ),
            HistoricalImportError::Io(err) => write!(f, "failed to read historical file: {}", err),
            HistoricalImportError::Csv(err) => write!(f, "invalid historical CSV data: {}", err),
            HistoricalImportError::Repository(err) => {
                write!(f, "could not store historical records: {}", err)
            }
            HistoricalImportError::Directory(err) => {
                write!(f, "could not match historical records: {}", err)
            }
        }
    }
}

impl std::error::Error for HistoricalImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HistoricalImportError::Schema { .. } => None,
            HistoricalImportError::Io(err) => Some(err),
            HistoricalImportError::Csv(err) => Some(err),
            HistoricalImportError::Repository(err) => Some(err),
            HistoricalImportError::Directory(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for HistoricalImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for HistoricalImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for HistoricalImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

impl From<DirectoryError> for HistoricalImportError {
    fn from(err: DirectoryError) -> Self {
        Self::Directory(err)
    }
}

/// Result of previewing and committing a file in one step.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportOutcome {
    pub preview: ImportPreview,
    pub summary: ImportSummary,
}

pub struct HistoricalImporter<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    policy: CreditPolicy,
}

impl<R, D> HistoricalImporter<R, D>
where
    R: HistoricalRecordRepository + 'static,
    D: IdentityDirectory + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, policy: CreditPolicy) -> Self {
        Self {
            repository,
            directory,
            policy,
        }
    }

    /// Parse, validate, and match every row without persisting anything.
    pub fn preview<Rd: Read>(&self, reader: Rd) -> Result<ImportPreview, HistoricalImportError> {
        let (columns, raw_rows) = parser::read_rows(reader)?;
        let index = IdentityIndex::from_identities(self.directory.eligible()?);

        let mut known: HashSet<DuplicateKey> = self
            .repository
            .historical_records()?
            .iter()
            .flat_map(HistoricalCreditRecord::duplicate_keys)
            .collect();

        let rows = raw_rows
            .into_iter()
            .map(|raw| self.preview_row(raw, &index, &mut known))
            .collect();

        Ok(ImportPreview { columns, rows })
    }

    fn preview_row(
        &self,
        raw: RawRow,
        index: &IdentityIndex,
        known: &mut HashSet<DuplicateKey>,
    ) -> PreviewRow {
        let mut row = PreviewRow {
            line: raw.line,
            raw_name: raw.name.clone().unwrap_or_default(),
            raw_surname: raw.surname.clone().unwrap_or_default(),
            period: None,
            credits: None,
            description: raw.description.clone(),
            outcome: RowOutcome::Unbound,
        };

        let (period, credits) = match self.validate(&raw) {
            Ok(parsed) => parsed,
            Err(issue) => {
                row.outcome = RowOutcome::Invalid { issue };
                return row;
            }
        };
        row.period = Some(period);
        row.credits = Some(credits);

        let outcome = match index.resolve(&row.raw_name, &row.raw_surname) {
            MatchOutcome::Bound(practitioner_id) => RowOutcome::Bound { practitioner_id },
            MatchOutcome::Unbound => RowOutcome::Unbound,
            MatchOutcome::Ambiguous(candidates) => RowOutcome::Ambiguous { candidates },
        };

        let keys = DuplicateKey::for_row(
            outcome.practitioner_id(),
            &row.raw_name,
            &row.raw_surname,
            period,
            credits,
        );
        row.outcome = if keys.iter().any(|key| known.contains(key)) {
            RowOutcome::Duplicate
        } else {
            known.extend(keys);
            outcome
        };
        row
    }

    fn validate(&self, raw: &RawRow) -> Result<(i32, CreditAmount), RowIssue> {
        let missing = |column: &'static str| RowIssue::MissingField { column };
        raw.name.as_ref().ok_or_else(|| missing("name"))?;
        raw.surname.as_ref().ok_or_else(|| missing("surname"))?;
        let period_text = raw.period.as_deref().ok_or_else(|| missing("year"))?;
        let credits_text = raw.credits.as_deref().ok_or_else(|| missing("credits"))?;

        let period: i32 = period_text
            .parse()
            .map_err(|_| RowIssue::UnparseablePeriod {
                value: period_text.to_string(),
            })?;
        if !self.policy.period_in_bounds(period) {
            return Err(RowIssue::PeriodOutOfRange {
                period,
                min: self.policy.min_period,
                max: self.policy.max_period,
            });
        }

        let credits =
            CreditAmount::parse(credits_text).ok_or_else(|| RowIssue::UnparseableCredits {
                value: credits_text.to_string(),
            })?;
        if credits.is_negative() {
            return Err(RowIssue::NegativeCredits {
                value: credits_text.to_string(),
            });
        }
        if credits > CreditAmount::from_whole(self.policy.max_historical_credits) {
            return Err(RowIssue::CreditsOutOfRange {
                value: credits_text.to_string(),
                max: self.policy.max_historical_credits,
            });
        }

        Ok((period, credits))
    }

    /// Persist the importable rows of a preview.
    ///
    /// A row that fails to store is reported and the remaining rows are still written.
    /// Rows already present in the store are skipped, so committing twice is harmless.
    pub fn commit(&self, preview: &ImportPreview) -> Result<ImportSummary, HistoricalImportError> {
        let counts = preview.counts();
        let mut summary = ImportSummary {
            skipped_duplicates: counts.duplicate,
            skipped_invalid: counts.invalid,
            ..ImportSummary::default()
        };
        let now = Utc::now();

        for row in preview.importable_rows() {
            let (Some(period), Some(credits)) = (row.period, row.credits) else {
                summary.skipped_invalid += 1;
                continue;
            };

            let practitioner_id = row.outcome.practitioner_id().cloned();
            let record = HistoricalCreditRecord::new(
                next_historical_id(),
                row.raw_name.clone(),
                row.raw_surname.clone(),
                practitioner_id,
                period,
                credits,
                row.description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                now,
            );

            match self.repository.insert_historical(record) {
                Ok(stored) => {
                    summary.inserted += 1;
                    if stored.linked() {
                        summary.bound += 1;
                    } else {
                        summary.unbound += 1;
                    }
                    summary.record_ids.push(stored.id);
                }
                Err(RepositoryError::Conflict) => {
                    debug!(line = row.line, "historical row already imported");
                    summary.skipped_duplicates += 1;
                }
                Err(err) => {
                    warn!(line = row.line, error = %err, "failed to store historical row");
                    summary.failures.push(RowFailure {
                        line: row.line,
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            inserted = summary.inserted,
            bound = summary.bound,
            unbound = summary.unbound,
            duplicates = summary.skipped_duplicates,
            invalid = summary.skipped_invalid,
            failures = summary.failures.len(),
            "historical import committed"
        );
        Ok(summary)
    }

    pub fn import_batch<Rd: Read>(
        &self,
        reader: Rd,
    ) -> Result<ImportOutcome, HistoricalImportError> {
        let preview = self.preview(reader)?;
        let summary = self.commit(&preview)?;
        Ok(ImportOutcome { preview, summary })
    }

    pub fn import_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ImportOutcome, HistoricalImportError> {
        let file = File::open(path)?;
        self.import_batch(file)
    }

    /// Bind every unbound record whose raw name now matches exactly one eligible identity.
    pub fn reconcile_unbound(&self) -> Result<ReconciliationReport, HistoricalImportError> {
        let unbound = self.repository.unbound_records()?;
        let mut report = ReconciliationReport {
            examined: unbound.len(),
            ..ReconciliationReport::default()
        };
        if unbound.is_empty() {
            return Ok(report);
        }

        let index = IdentityIndex::from_identities(self.directory.eligible()?);
        for record in unbound {
            match index.resolve(&record.raw_name, &record.raw_surname) {
                MatchOutcome::Bound(practitioner_id) => {
                    match self.repository.bind_record(&record.id, &practitioner_id) {
                        Ok(bound) => report.bound.push(Binding {
                            record_id: bound.id,
                            practitioner_id,
                        }),
                        // Bound by a concurrent pass in the meantime.
                        Err(RepositoryError::Conflict) => {}
                        Err(err) => {
                            warn!(record = %record.id, error = %err, "failed to bind historical record");
                            report.failures.push(format!("{}: {err}", record.id));
                        }
                    }
                }
                MatchOutcome::Ambiguous(candidates) => {
                    debug!(
                        record = %record.id,
                        candidates = candidates.len(),
                        "historical record matches several identities"
                    );
                    report.ambiguous.push(record.id);
                }
                MatchOutcome::Unbound => report.still_unbound += 1,
            }
        }

        info!(
            examined = report.examined,
            bound = report.bound.len(),
            ambiguous = report.ambiguous.len(),
            "historical records reconciled"
        );
        Ok(report)
    }

    pub fn records(
        &self,
        filter: LinkFilter,
    ) -> Result<Vec<HistoricalCreditRecord>, HistoricalImportError> {
        Ok(self
            .repository
            .historical_records()?
            .into_iter()
            .filter(|record| filter.admits(record))
            .collect())
    }
}

impl<R, D> IdentityObserver for HistoricalImporter<R, D>
where
    R: HistoricalRecordRepository + 'static,
    D: IdentityDirectory + 'static,
{
    fn identity_registered(&self, identity: &PractitionerIdentity) {
        if !identity.role.is_credit_eligible() {
            return;
        }
        match self.reconcile_unbound() {
            Ok(report) => debug!(
                practitioner = %identity.id,
                bound = report.bound.len(),
                "reconciliation after registration"
            ),
            Err(err) => warn!(
                practitioner = %identity.id,
                error = %err,
                "reconciliation after registration failed"
            ),
        }
    }
}
