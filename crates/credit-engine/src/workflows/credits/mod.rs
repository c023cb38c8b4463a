//! Continuing-education credit: activity catalog, submissions, reviews, and totals.

pub mod catalog;
pub mod courses;
pub mod domain;
pub mod engine;
pub mod ledger;
pub mod memory;
pub mod report;
pub mod repository;
pub mod review;
pub mod router;

#[cfg(test)]
mod tests;

pub use catalog::ActivityCatalog;
pub use courses::{CourseCredit, SYSTEM_REVIEWER};
pub use domain::{
    ActivityCategory, ActivityDefinition, ActivityDraft, ActivityId, ActivityPatch,
    ActivitySnapshot, CourseCompletion, CourseId, CreditAmount, EvidenceRef, ReviewDecision,
    ReviewRequest, ReviewerId, Submission, SubmissionId, SubmissionRequest, SubmissionState,
    SubmissionStatus, SubmissionView,
};
pub use engine::{CreditEngine, CreditError};
pub use ledger::{SubmissionLedger, COURSE_ACTIVITY_ID};
pub use memory::MemoryCreditStore;
pub use report::{CreditReporter, CreditTotals, CycleProgress, LeaderboardEntry, PeriodCredits};
pub use repository::{
    ActivityRepository, CreditStore, HistoricalRecordRepository, RepositoryError,
    SubmissionRepository,
};
pub use review::ReviewEngine;
pub use router::{credit_router, Actor, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
