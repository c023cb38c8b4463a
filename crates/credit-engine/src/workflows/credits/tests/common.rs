use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::config::CreditPolicy;
use crate::workflows::credits::domain::{
    ActivityCategory, ActivityDefinition, ActivityDraft, ActivityId, EvidenceRef, ReviewDecision,
    ReviewRequest, ReviewerId, Submission, SubmissionId, SubmissionRequest,
};
use crate::workflows::credits::repository::{
    ActivityRepository, HistoricalRecordRepository, RepositoryError, SubmissionRepository,
};
use crate::workflows::credits::{credit_router, CreditEngine, MemoryCreditStore};
use crate::workflows::historical::record::{HistoricalCreditRecord, HistoricalRecordId};
use crate::workflows::identity::{
    InMemoryIdentityDirectory, PractitionerId, PractitionerIdentity, Role,
};

pub(super) type MemoryEngine = CreditEngine<MemoryCreditStore, InMemoryIdentityDirectory>;

pub(super) const ANNA: &str = "prac-anna";
pub(super) const PIET: &str = "prac-piet";
pub(super) const REVIEWER: &str = "rev-marie";
pub(super) const ADMIN: &str = "adm-kobus";
pub(super) const MEMBER: &str = "mem-sarel";

pub(super) struct Harness {
    pub(super) engine: Arc<MemoryEngine>,
    pub(super) store: Arc<MemoryCreditStore>,
    pub(super) directory: Arc<InMemoryIdentityDirectory>,
}

pub(super) fn identity(id: &str, name: &str, surname: &str, role: Role) -> PractitionerIdentity {
    PractitionerIdentity {
        id: PractitionerId(id.to_string()),
        name: name.to_string(),
        surname: surname.to_string(),
        role,
    }
}

pub(super) fn directory_identities() -> Vec<PractitionerIdentity> {
    vec![
        identity(ANNA, "Anna", "Venter", Role::Practitioner),
        identity(PIET, "Piet", "Pompies", Role::Emeritus),
        identity(REVIEWER, "Marie", "Botha", Role::Reviewer),
        identity(ADMIN, "Kobus", "Nel", Role::Administrator),
        identity(MEMBER, "Sarel", "Smit", Role::Member),
    ]
}

pub(super) fn harness() -> Harness {
    harness_with_policy(CreditPolicy::default())
}

pub(super) fn harness_with_policy(policy: CreditPolicy) -> Harness {
    let store = Arc::new(MemoryCreditStore::new());
    let directory = Arc::new(InMemoryIdentityDirectory::with_identities(
        directory_identities(),
    ));
    let engine = Arc::new(CreditEngine::new(store.clone(), directory.clone(), policy));
    Harness {
        engine,
        store,
        directory,
    }
}

pub(super) fn pid(id: &str) -> PractitionerId {
    PractitionerId(id.to_string())
}

pub(super) fn draft(title: &str, credit_value: i64, evidence_required: bool) -> ActivityDraft {
    ActivityDraft {
        title: title.to_string(),
        description: format!("{title} for continuing education"),
        category: ActivityCategory::Workshop,
        credit_value,
        evidence_required,
    }
}

pub(super) fn define(
    engine: &MemoryEngine,
    title: &str,
    credit_value: i64,
    evidence_required: bool,
) -> ActivityDefinition {
    engine
        .catalog()
        .define_activity(draft(title, credit_value, evidence_required))
        .expect("activity defined")
}

pub(super) fn evidence() -> EvidenceRef {
    EvidenceRef {
        storage_key: "evidence/attendance.pdf".to_string(),
        file_name: Some("attendance.pdf".to_string()),
    }
}

pub(super) fn request(practitioner: &str, activity: &ActivityId, period: i32) -> SubmissionRequest {
    SubmissionRequest {
        practitioner_id: pid(practitioner),
        activity_id: activity.clone(),
        period,
        note: "attended all sessions".to_string(),
        evidence: Some(evidence()),
        requested_credits: None,
    }
}

pub(super) fn submit(
    engine: &MemoryEngine,
    practitioner: &str,
    activity: &ActivityId,
    period: i32,
) -> Submission {
    engine
        .ledger()
        .submit(request(practitioner, activity, period))
        .expect("submission recorded")
}

pub(super) fn approve(awarded_credits: Option<i64>) -> ReviewRequest {
    ReviewRequest {
        reviewer_id: ReviewerId(REVIEWER.to_string()),
        decision: ReviewDecision::Approve,
        note: "verified".to_string(),
        awarded_credits,
    }
}

pub(super) fn reject() -> ReviewRequest {
    ReviewRequest {
        reviewer_id: ReviewerId(REVIEWER.to_string()),
        decision: ReviewDecision::Reject,
        note: "no attendance record".to_string(),
        awarded_credits: None,
    }
}

/// Submit and approve in one step, returning the decided submission.
pub(super) fn approved(
    engine: &MemoryEngine,
    practitioner: &str,
    activity: &ActivityId,
    period: i32,
) -> Submission {
    let submission = submit(engine, practitioner, activity, period);
    engine
        .reviews()
        .review(&submission.id, approve(None))
        .expect("approval succeeds")
}

pub(super) fn memory_router(harness: &Harness) -> axum::Router {
    credit_router(harness.engine.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store whose every call fails as if the database were offline.
pub(super) struct UnavailableStore;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl ActivityRepository for UnavailableStore {
    fn insert_activity(
        &self,
        _activity: ActivityDefinition,
    ) -> Result<ActivityDefinition, RepositoryError> {
        Err(offline())
    }

    fn update_activity(&self, _activity: ActivityDefinition) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn fetch_activity(
        &self,
        _id: &ActivityId,
    ) -> Result<Option<ActivityDefinition>, RepositoryError> {
        Err(offline())
    }

    fn list_activities(&self) -> Result<Vec<ActivityDefinition>, RepositoryError> {
        Err(offline())
    }
}

impl SubmissionRepository for UnavailableStore {
    fn insert_submission(&self, _submission: Submission) -> Result<Submission, RepositoryError> {
        Err(offline())
    }

    fn fetch_submission(&self, _id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Err(offline())
    }

    fn commit_review(&self, _submission: Submission) -> Result<Submission, RepositoryError> {
        Err(offline())
    }

    fn submissions_for(
        &self,
        _practitioner_id: &PractitionerId,
    ) -> Result<Vec<Submission>, RepositoryError> {
        Err(offline())
    }

    fn pending_submissions(&self, _limit: usize) -> Result<Vec<Submission>, RepositoryError> {
        Err(offline())
    }

    fn approved_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        Err(offline())
    }
}

impl HistoricalRecordRepository for UnavailableStore {
    fn insert_historical(
        &self,
        _record: HistoricalCreditRecord,
    ) -> Result<HistoricalCreditRecord, RepositoryError> {
        Err(offline())
    }

    fn historical_records(&self) -> Result<Vec<HistoricalCreditRecord>, RepositoryError> {
        Err(offline())
    }

    fn unbound_records(&self) -> Result<Vec<HistoricalCreditRecord>, RepositoryError> {
        Err(offline())
    }

    fn records_bound_to(
        &self,
        _practitioner_id: &PractitionerId,
    ) -> Result<Vec<HistoricalCreditRecord>, RepositoryError> {
        Err(offline())
    }

    fn bind_record(
        &self,
        _id: &HistoricalRecordId,
        _practitioner_id: &PractitionerId,
    ) -> Result<HistoricalCreditRecord, RepositoryError> {
        Err(offline())
    }
}

pub(super) fn unavailable_router() -> axum::Router {
    let directory = Arc::new(InMemoryIdentityDirectory::with_identities(
        directory_identities(),
    ));
    let engine = CreditEngine::new(
        Arc::new(UnavailableStore),
        directory,
        CreditPolicy::default(),
    );
    credit_router(Arc::new(engine))
}
