use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{ActivityDefinition, ActivityId, Submission, SubmissionId};
use super::repository::{
    ActivityRepository, HistoricalRecordRepository, RepositoryError, SubmissionRepository,
};
use crate::workflows::historical::record::{HistoricalCreditRecord, HistoricalRecordId};
use crate::workflows::identity::PractitionerId;

/// Process-local [`CreditStore`](super::repository::CreditStore).
///
/// Sequence identifiers are zero padded, so map order is creation order.
#[derive(Default)]
pub struct MemoryCreditStore {
    activities: Mutex<BTreeMap<ActivityId, ActivityDefinition>>,
    submissions: Mutex<BTreeMap<SubmissionId, Submission>>,
    historical: Mutex<BTreeMap<HistoricalRecordId, HistoricalCreditRecord>>,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
}

impl ActivityRepository for MemoryCreditStore {
    fn insert_activity(
        &self,
        activity: ActivityDefinition,
    ) -> Result<ActivityDefinition, RepositoryError> {
        let mut guard = lock(&self.activities)?;
        if guard.contains_key(&activity.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(activity.id.clone(), activity.clone());
        Ok(activity)
    }

    fn update_activity(&self, activity: ActivityDefinition) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.activities)?;
        match guard.get_mut(&activity.id) {
            Some(slot) => {
                *slot = activity;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_activity(
        &self,
        id: &ActivityId,
    ) -> Result<Option<ActivityDefinition>, RepositoryError> {
        Ok(lock(&self.activities)?.get(id).cloned())
    }

    fn list_activities(&self) -> Result<Vec<ActivityDefinition>, RepositoryError> {
        Ok(lock(&self.activities)?.values().cloned().collect())
    }
}

impl SubmissionRepository for MemoryCreditStore {
    fn insert_submission(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        let mut guard = lock(&self.submissions)?;
        if guard.contains_key(&submission.id) {
            return Err(RepositoryError::Conflict);
        }
        if let Some(course_id) = &submission.course_id {
            let credited = guard.values().any(|existing| {
                existing.course_id.as_ref() == Some(course_id)
                    && existing.practitioner_id == submission.practitioner_id
                    && existing.period == submission.period
            });
            if credited {
                return Err(RepositoryError::Conflict);
            }
        }
        guard.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    fn fetch_submission(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Ok(lock(&self.submissions)?.get(id).cloned())
    }

    fn commit_review(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        let mut guard = lock(&self.submissions)?;
        let stored = guard
            .get_mut(&submission.id)
            .ok_or(RepositoryError::NotFound)?;
        if !stored.is_pending() {
            return Err(RepositoryError::Conflict);
        }
        *stored = submission.clone();
        Ok(submission)
    }

    fn submissions_for(
        &self,
        practitioner_id: &PractitionerId,
    ) -> Result<Vec<Submission>, RepositoryError> {
        Ok(lock(&self.submissions)?
            .values()
            .filter(|submission| &submission.practitioner_id == practitioner_id)
            .cloned()
            .collect())
    }

    fn pending_submissions(&self, limit: usize) -> Result<Vec<Submission>, RepositoryError> {
        Ok(lock(&self.submissions)?
            .values()
            .filter(|submission| submission.is_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    fn approved_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        Ok(lock(&self.submissions)?
            .values()
            .filter(|submission| submission.awarded_credits().is_some())
            .cloned()
            .collect())
    }
}

impl HistoricalRecordRepository for MemoryCreditStore {
    fn insert_historical(
        &self,
        record: HistoricalCreditRecord,
    ) -> Result<HistoricalCreditRecord, RepositoryError> {
        let mut guard = lock(&self.historical)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }

        let keys = record.duplicate_keys();
        let duplicate = guard.values().any(|existing| {
            existing
                .duplicate_keys()
                .iter()
                .any(|key| keys.contains(key))
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn historical_records(&self) -> Result<Vec<HistoricalCreditRecord>, RepositoryError> {
        Ok(lock(&self.historical)?.values().cloned().collect())
    }

    fn unbound_records(&self) -> Result<Vec<HistoricalCreditRecord>, RepositoryError> {
        Ok(lock(&self.historical)?
            .values()
            .filter(|record| !record.linked())
            .cloned()
            .collect())
    }

    fn records_bound_to(
        &self,
        practitioner_id: &PractitionerId,
    ) -> Result<Vec<HistoricalCreditRecord>, RepositoryError> {
        Ok(lock(&self.historical)?
            .values()
            .filter(|record| record.practitioner_id() == Some(practitioner_id))
            .cloned()
            .collect())
    }

    fn bind_record(
        &self,
        id: &HistoricalRecordId,
        practitioner_id: &PractitionerId,
    ) -> Result<HistoricalCreditRecord, RepositoryError> {
        let mut guard = lock(&self.historical)?;
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        record
            .bind(practitioner_id.clone())
            .map_err(|_| RepositoryError::Conflict)?;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::credits::domain::{
        ActivityCategory, ActivitySnapshot, CourseId, CreditAmount, ReviewerId, SubmissionState,
    };
    use chrono::Utc;

    fn submission(id: &str) -> Submission {
        let now = Utc::now();
        Submission {
            id: SubmissionId(id.to_string()),
            practitioner_id: PractitionerId("p-1".to_string()),
            activity: ActivitySnapshot {
                activity_id: ActivityId("act-1".to_string()),
                title: "Workshop".to_string(),
                category: ActivityCategory::Workshop,
                credit_value: 5,
            },
            period: 2025,
            evidence: None,
            note: String::new(),
            requested_credits: None,
            automatic: false,
            course_id: None,
            state: SubmissionState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    fn rejected(mut submission: Submission) -> Submission {
        submission.state = SubmissionState::Rejected {
            reviewer_id: ReviewerId("rev-1".to_string()),
            reviewer_note: "no evidence".to_string(),
            decided_at: Utc::now(),
        };
        submission
    }

    fn historical(id: &str, name: &str, amount: u32) -> HistoricalCreditRecord {
        HistoricalCreditRecord::new(
            HistoricalRecordId(id.to_string()),
            name.to_string(),
            "Botha".to_string(),
            None,
            2019,
            CreditAmount::from_whole(amount),
            "legacy".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn commit_review_refuses_terminal_submissions() {
        let store = MemoryCreditStore::new();
        store
            .insert_submission(submission("sub-000001"))
            .expect("insert");

        store
            .commit_review(rejected(submission("sub-000001")))
            .expect("first decision commits");

        match store.commit_review(rejected(submission("sub-000001"))) {
            Err(RepositoryError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn course_credit_is_stored_once_per_period() {
        let store = MemoryCreditStore::new();
        let course = |id: &str, period: i32| Submission {
            automatic: true,
            course_id: Some(CourseId("course-7".to_string())),
            period,
            ..submission(id)
        };

        store.insert_submission(course("sub-000001", 2025)).expect("insert");
        match store.insert_submission(course("sub-000002", 2025)) {
            Err(RepositoryError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
        store
            .insert_submission(course("sub-000003", 2026))
            .expect("next year credits again");

        // Ordinary claims for the same activity and year are never refused.
        store.insert_submission(submission("sub-000004")).expect("insert");
        store.insert_submission(submission("sub-000005")).expect("insert");
    }

    #[test]
    fn commit_review_requires_existing_submission() {
        let store = MemoryCreditStore::new();
        match store.commit_review(rejected(submission("sub-404"))) {
            Err(RepositoryError::NotFound) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn pending_submissions_respects_limit_and_order() {
        let store = MemoryCreditStore::new();
        for id in ["sub-000003", "sub-000001", "sub-000002"] {
            store.insert_submission(submission(id)).expect("insert");
        }

        let pending = store.pending_submissions(2).expect("pending");
        let ids: Vec<_> = pending.iter().map(|entry| entry.id.0.as_str()).collect();
        assert_eq!(ids, vec!["sub-000001", "sub-000002"]);
    }

    #[test]
    fn insert_historical_rejects_duplicate_rows() {
        let store = MemoryCreditStore::new();
        store
            .insert_historical(historical("hist-1", "J. Smith", 6))
            .expect("first insert");

        match store.insert_historical(historical("hist-2", " j. smith ", 6)) {
            Err(RepositoryError::Conflict) => {}
            other => panic!("expected duplicate conflict, got {other:?}"),
        }

        store
            .insert_historical(historical("hist-3", "J. Smith", 7))
            .expect("different amount is a distinct record");
        assert_eq!(store.historical_records().expect("list").len(), 2);
    }

    #[test]
    fn bind_record_is_monotonic() {
        let store = MemoryCreditStore::new();
        store
            .insert_historical(historical("hist-1", "J. Smith", 6))
            .expect("insert");
        let owner = PractitionerId("p-1".to_string());

        let bound = store
            .bind_record(&HistoricalRecordId("hist-1".to_string()), &owner)
            .expect("bind");
        assert!(bound.linked());
        assert!(store.unbound_records().expect("unbound").is_empty());
        assert_eq!(store.records_bound_to(&owner).expect("bound").len(), 1);

        match store.bind_record(
            &HistoricalRecordId("hist-1".to_string()),
            &PractitionerId("p-2".to_string()),
        ) {
            Err(RepositoryError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.records_bound_to(&owner).expect("bound").len(), 1);
    }
}
