use super::domain::{ActivityDefinition, ActivityId, Submission, SubmissionId};
use crate::workflows::historical::record::{HistoricalCreditRecord, HistoricalRecordId};
use crate::workflows::identity::PractitionerId;

/// Catalog storage. Activities are retired, never deleted.
pub trait ActivityRepository: Send + Sync {
    fn insert_activity(
        &self,
        activity: ActivityDefinition,
    ) -> Result<ActivityDefinition, RepositoryError>;
    fn update_activity(&self, activity: ActivityDefinition) -> Result<(), RepositoryError>;
    fn fetch_activity(&self, id: &ActivityId)
        -> Result<Option<ActivityDefinition>, RepositoryError>;
    fn list_activities(&self) -> Result<Vec<ActivityDefinition>, RepositoryError>;
}

/// Submission ledger storage.
pub trait SubmissionRepository: Send + Sync {
    fn insert_submission(&self, submission: Submission) -> Result<Submission, RepositoryError>;
    fn fetch_submission(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError>;
    /// Persist a terminal decision. Fails with `Conflict` unless the stored copy is still
    /// pending at the moment of the write.
    fn commit_review(&self, submission: Submission) -> Result<Submission, RepositoryError>;
    fn submissions_for(
        &self,
        practitioner_id: &PractitionerId,
    ) -> Result<Vec<Submission>, RepositoryError>;
    /// Oldest pending submissions first.
    fn pending_submissions(&self, limit: usize) -> Result<Vec<Submission>, RepositoryError>;
    fn approved_submissions(&self) -> Result<Vec<Submission>, RepositoryError>;
}

/// Legacy credit storage.
pub trait HistoricalRecordRepository: Send + Sync {
    /// Fails with `Conflict` when a record with an overlapping duplicate key exists.
    fn insert_historical(
        &self,
        record: HistoricalCreditRecord,
    ) -> Result<HistoricalCreditRecord, RepositoryError>;
    fn historical_records(&self) -> Result<Vec<HistoricalCreditRecord>, RepositoryError>;
    fn unbound_records(&self) -> Result<Vec<HistoricalCreditRecord>, RepositoryError>;
    fn records_bound_to(
        &self,
        practitioner_id: &PractitionerId,
    ) -> Result<Vec<HistoricalCreditRecord>, RepositoryError>;
    /// Fails with `Conflict` when the record is already bound.
    fn bind_record(
        &self,
        id: &HistoricalRecordId,
        practitioner_id: &PractitionerId,
    ) -> Result<HistoricalCreditRecord, RepositoryError>;
}

/// Everything the credit engine persists.
pub trait CreditStore: ActivityRepository + SubmissionRepository + HistoricalRecordRepository {}

impl<T> CreditStore for T where
    T: ActivityRepository + SubmissionRepository + HistoricalRecordRepository
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or changed concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
