use serde::Serialize;

use super::parser::ColumnMapping;
use super::record::HistoricalRecordId;
use crate::workflows::credits::domain::CreditAmount;
use crate::workflows::identity::PractitionerId;

/// Why a row cannot be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum RowIssue {
    MissingField { column: &'static str },
    UnparseablePeriod { value: String },
    PeriodOutOfRange { period: i32, min: i32, max: i32 },
    UnparseableCredits { value: String },
    NegativeCredits { value: String },
    CreditsOutOfRange { value: String, max: u32 },
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { column } => write!(f, "missing {column}"),
            Self::UnparseablePeriod { value } => write!(f, "year `{value}` is not a number"),
            Self::PeriodOutOfRange { period, min, max } => {
                write!(f, "year {period} is outside {min}..={max}")
            }
            Self::UnparseableCredits { value } => {
                write!(f, "credits `{value}` is not a number")
            }
            Self::NegativeCredits { value } => write!(f, "credits `{value}` is negative"),
            Self::CreditsOutOfRange { value, max } => {
                write!(f, "credits `{value}` exceed the per-row limit of {max}")
            }
        }
    }
}

/// What committing a row would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Bound { practitioner_id: PractitionerId },
    Unbound,
    /// Several eligible identities share the name. The row is imported unbound.
    Ambiguous { candidates: Vec<PractitionerId> },
    Duplicate,
    Invalid { issue: RowIssue },
}

impl RowOutcome {
    pub fn is_importable(&self) -> bool {
        matches!(
            self,
            Self::Bound { .. } | Self::Unbound | Self::Ambiguous { .. }
        )
    }

    pub fn practitioner_id(&self) -> Option<&PractitionerId> {
        match self {
            Self::Bound { practitioner_id } => Some(practitioner_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub line: u64,
    pub raw_name: String,
    pub raw_surname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<CreditAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreviewCounts {
    pub total: usize,
    pub bound: usize,
    pub unbound: usize,
    pub ambiguous: usize,
    pub duplicate: usize,
    pub invalid: usize,
}

/// Dry-run result of a historical file. Nothing is persisted until it is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub columns: ColumnMapping,
    pub rows: Vec<PreviewRow>,
}

impl ImportPreview {
    pub fn counts(&self) -> PreviewCounts {
        let mut counts = PreviewCounts {
            total: self.rows.len(),
            ..PreviewCounts::default()
        };
        for row in &self.rows {
            match row.outcome {
                RowOutcome::Bound { .. } => counts.bound += 1,
                RowOutcome::Unbound => counts.unbound += 1,
                RowOutcome::Ambiguous { .. } => counts.ambiguous += 1,
                RowOutcome::Duplicate => counts.duplicate += 1,
                RowOutcome::Invalid { .. } => counts.invalid += 1,
            }
        }
        counts
    }

    pub fn importable_rows(&self) -> impl Iterator<Item = &PreviewRow> {
        self.rows.iter().filter(|row| row.outcome.is_importable())
    }
}

/// A row whose write failed without stopping the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub bound: usize,
    pub unbound: usize,
    pub skipped_duplicates: usize,
    pub skipped_invalid: usize,
    pub record_ids: Vec<HistoricalRecordId>,
    pub failures: Vec<RowFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub record_id: HistoricalRecordId,
    pub practitioner_id: PractitionerId,
}

/// Outcome of one pass over the unbound legacy records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub examined: usize,
    pub bound: Vec<Binding>,
    pub ambiguous: Vec<HistoricalRecordId>,
    pub still_unbound: usize,
    pub failures: Vec<String>,
}
