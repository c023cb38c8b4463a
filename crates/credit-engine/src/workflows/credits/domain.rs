use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::workflows::identity::PractitionerId;

/// Identifier wrapper for catalog activities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

/// Identifier wrapper for practitioner submissions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// Identifier of the reviewer or administrator that decided a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewerId(pub String);

/// Identifier of a course on the learning platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed-point credit quantity with two decimal places.
///
/// Legacy records carry fractional points, so sums are kept in hundredths to stay exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreditAmount(i64);

impl CreditAmount {
    pub const ZERO: CreditAmount = CreditAmount(0);

    pub const fn from_whole(credits: u32) -> Self {
        Self(credits as i64 * 100)
    }

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Parse a decimal such as `6`, `2.5`, or `2,75`; values are rounded to hundredths.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().replace(',', ".");
        if normalized.is_empty() {
            return None;
        }
        let value = normalized.parse::<f64>().ok()?;
        Self::from_f64(value)
    }

    fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * 100.0).round();
        if scaled.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0).max(0))
    }
}

impl fmt::Display for CreditAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = self.0.abs() / 100;
        let fraction = self.0.abs() % 100;
        match fraction {
            0 => write!(f, "{sign}{whole}"),
            value if value % 10 == 0 => write!(f, "{sign}{whole}.{}", value / 10),
            value => write!(f, "{sign}{whole}.{value:02}"),
        }
    }
}

impl Add for CreditAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for CreditAmount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for CreditAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for CreditAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl Serialize for CreditAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for CreditAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom("credit amount must be a finite number"))
    }
}

/// Kinds of professional-development activity recognised by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Course,
    Conference,
    Workshop,
    Mentorship,
    Research,
    Publication,
    Other,
}

impl ActivityCategory {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityCategory::Course => "Course",
            ActivityCategory::Conference => "Conference",
            ActivityCategory::Workshop => "Workshop",
            ActivityCategory::Mentorship => "Mentorship",
            ActivityCategory::Research => "Research",
            ActivityCategory::Publication => "Publication",
            ActivityCategory::Other => "Other",
        }
    }
}

/// Administrator-owned definition of a creditable activity. Never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    pub id: ActivityId,
    pub title: String,
    pub description: String,
    pub category: ActivityCategory,
    /// `0` marks a merit-based activity whose award the reviewer decides.
    pub credit_value: u32,
    pub evidence_required: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityDefinition {
    pub const fn is_merit_based(&self) -> bool {
        self.credit_value == 0
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot {
            activity_id: self.id.clone(),
            title: self.title.clone(),
            category: self.category,
            credit_value: self.credit_value,
        }
    }
}

/// Input for a new catalog entry. Credit value is signed so negative input can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub title: String,
    pub description: String,
    pub category: ActivityCategory,
    pub credit_value: i64,
    #[serde(default)]
    pub evidence_required: bool,
}

/// Partial update for an existing catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<ActivityCategory>,
    #[serde(default)]
    pub credit_value: Option<i64>,
    #[serde(default)]
    pub evidence_required: Option<bool>,
}

/// Catalog values copied onto a submission when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub activity_id: ActivityId,
    pub title: String,
    pub category: ActivityCategory,
    pub credit_value: u32,
}

/// Pointer into the external evidence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub storage_key: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl EvidenceRef {
    pub fn is_present(&self) -> bool {
        !self.storage_key.trim().is_empty()
    }
}

/// High level status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Lifecycle of a submission. Awarded credits only exist on the approved variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionState {
    Pending,
    Approved {
        reviewer_id: ReviewerId,
        reviewer_note: String,
        awarded_credits: u32,
        decided_at: DateTime<Utc>,
    },
    Rejected {
        reviewer_id: ReviewerId,
        reviewer_note: String,
        decided_at: DateTime<Utc>,
    },
}

impl SubmissionState {
    pub const fn status(&self) -> SubmissionStatus {
        match self {
            SubmissionState::Pending => SubmissionStatus::Pending,
            SubmissionState::Approved { .. } => SubmissionStatus::Approved,
            SubmissionState::Rejected { .. } => SubmissionStatus::Rejected,
        }
    }
}

/// Practitioner claim of a completed activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub practitioner_id: PractitionerId,
    pub activity: ActivitySnapshot,
    pub period: i32,
    pub evidence: Option<EvidenceRef>,
    pub note: String,
    /// Credits the practitioner proposes for a merit-based activity.
    #[serde(default)]
    pub requested_credits: Option<u32>,
    /// Set when the claim was raised by the system rather than the practitioner.
    #[serde(default)]
    pub automatic: bool,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    pub state: SubmissionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub const fn status(&self) -> SubmissionStatus {
        self.state.status()
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.state, SubmissionState::Pending)
    }

    pub const fn awarded_credits(&self) -> Option<u32> {
        match &self.state {
            SubmissionState::Approved {
                awarded_credits, ..
            } => Some(*awarded_credits),
            _ => None,
        }
    }

    pub fn reviewer_id(&self) -> Option<&ReviewerId> {
        match &self.state {
            SubmissionState::Pending => None,
            SubmissionState::Approved { reviewer_id, .. }
            | SubmissionState::Rejected { reviewer_id, .. } => Some(reviewer_id),
        }
    }

    pub fn view(&self) -> SubmissionView {
        let reviewer_note = match &self.state {
            SubmissionState::Pending => None,
            SubmissionState::Approved { reviewer_note, .. }
            | SubmissionState::Rejected { reviewer_note, .. } => Some(reviewer_note.clone()),
        };

        SubmissionView {
            submission_id: self.id.clone(),
            practitioner_id: self.practitioner_id.clone(),
            activity_id: self.activity.activity_id.clone(),
            activity_title: self.activity.title.clone(),
            category: self.activity.category.label(),
            credit_value: self.activity.credit_value,
            period: self.period,
            status: self.status().label(),
            reviewer_id: self.reviewer_id().cloned(),
            reviewer_note,
            awarded_credits: self.awarded_credits(),
            requested_credits: self.requested_credits,
            automatic: self.automatic,
            course_id: self.course_id.clone(),
            has_evidence: self.evidence.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Flat representation of a submission for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub submission_id: SubmissionId,
    pub practitioner_id: PractitionerId,
    pub activity_id: ActivityId,
    pub activity_title: String,
    pub category: &'static str,
    pub credit_value: u32,
    pub period: i32,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<ReviewerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awarded_credits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_credits: Option<u32>,
    pub automatic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    pub has_evidence: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Practitioner input for a new claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub practitioner_id: PractitionerId,
    pub activity_id: ActivityId,
    pub period: i32,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub evidence: Option<EvidenceRef>,
    /// Only accepted for merit-based activities. Signed so negative input can be reported.
    #[serde(default)]
    pub requested_credits: Option<i64>,
}

/// Learning-platform course whose completion earns credit without review by a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCompletion {
    pub practitioner_id: PractitionerId,
    pub course_id: CourseId,
    pub course_title: String,
    /// Falls back to the default course award when unset or zero.
    #[serde(default)]
    pub credits: Option<u32>,
    pub period: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Reviewer input for a terminal decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub reviewer_id: ReviewerId,
    pub decision: ReviewDecision,
    #[serde(default)]
    pub note: String,
    /// Signed so a negative award is reported instead of failing deserialization.
    #[serde(default)]
    pub awarded_credits: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_amount_parses_decimal_commas_and_points() {
        assert_eq!(CreditAmount::parse("6"), Some(CreditAmount::from_whole(6)));
        assert_eq!(
            CreditAmount::parse(" 2,5 "),
            Some(CreditAmount::from_hundredths(250))
        );
        assert_eq!(
            CreditAmount::parse("1.125"),
            Some(CreditAmount::from_hundredths(113))
        );
        assert_eq!(CreditAmount::parse(""), None);
        assert_eq!(CreditAmount::parse("six"), None);
        assert_eq!(CreditAmount::parse("inf"), None);
    }

    #[test]
    fn credit_amount_display_trims_trailing_zeros() {
        assert_eq!(CreditAmount::from_whole(12).to_string(), "12");
        assert_eq!(CreditAmount::from_hundredths(250).to_string(), "2.5");
        assert_eq!(CreditAmount::from_hundredths(275).to_string(), "2.75");
        assert_eq!(CreditAmount::from_hundredths(-50).to_string(), "-0.5");
    }

    #[test]
    fn credit_amount_serializes_as_number() {
        let json = serde_json::to_string(&CreditAmount::from_hundredths(650)).expect("serialize");
        assert_eq!(json, "6.5");
        let parsed: CreditAmount = serde_json::from_str("4").expect("deserialize");
        assert_eq!(parsed, CreditAmount::from_whole(4));
    }

    #[test]
    fn submission_state_serializes_with_status_tag() {
        let state = SubmissionState::Approved {
            reviewer_id: ReviewerId("rev-1".to_string()),
            reviewer_note: "ok".to_string(),
            awarded_credits: 5,
            decided_at: DateTime::<Utc>::from_timestamp(0, 0).expect("epoch"),
        };
        let value = serde_json::to_value(&state).expect("serialize");
        assert_eq!(value["status"], "approved");
        assert_eq!(value["awarded_credits"], 5);
        assert_eq!(state.status(), SubmissionStatus::Approved);
    }

    #[test]
    fn credit_amount_sums_saturate_instead_of_overflowing() {
        let huge = CreditAmount::from_hundredths(i64::MAX - 1);
        let total: CreditAmount = [huge, huge, CreditAmount::from_whole(3)].into_iter().sum();
        assert_eq!(total, CreditAmount::from_hundredths(i64::MAX));

        let mut running = huge;
        running += huge;
        assert_eq!(running.hundredths(), i64::MAX);
        assert_eq!(
            (CreditAmount::from_hundredths(i64::MIN + 1) - huge).hundredths(),
            i64::MIN
        );
    }
}
