use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    ActivityCategory, ActivityId, ActivitySnapshot, CourseCompletion, CourseId, Submission,
    SubmissionId, SubmissionRequest, SubmissionState,
};
use super::engine::CreditError;
use super::repository::{ActivityRepository, RepositoryError, SubmissionRepository};
use crate::config::CreditPolicy;
use crate::workflows::identity::{IdentityDirectory, PractitionerId};

/// Catalog id recorded on credit for learning-platform courses.
pub const COURSE_ACTIVITY_ID: &str = "lms-course";

static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_submission_id() -> SubmissionId {
    let id = SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubmissionId(format!("sub-{id:06}"))
}

/// Practitioner-facing, append-only ledger of credit claims.
pub struct SubmissionLedger<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    policy: CreditPolicy,
}

impl<R, D> SubmissionLedger<R, D>
where
    R: ActivityRepository + SubmissionRepository + 'static,
    D: IdentityDirectory + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, policy: CreditPolicy) -> Self {
        Self {
            repository,
            directory,
            policy,
        }
    }

    /// Record a new pending claim with a snapshot of the activity as it is right now.
    pub fn submit(&self, request: SubmissionRequest) -> Result<Submission, CreditError> {
        let SubmissionRequest {
            practitioner_id,
            activity_id,
            period,
            note,
            evidence,
            requested_credits,
        } = request;

        let practitioner_id = self.eligible_practitioner(&practitioner_id)?;

        let activity = self
            .repository
            .fetch_activity(&activity_id)?
            .filter(|activity| activity.active)
            .ok_or_else(|| CreditError::not_found("activity", &activity_id.0))?;

        let evidence = evidence.filter(|evidence| evidence.is_present());
        if activity.evidence_required && evidence.is_none() {
            return Err(CreditError::validation(
                "evidence",
                format!("activity `{}` requires supporting evidence", activity.id),
            ));
        }

        let requested_credits = match requested_credits {
            None => None,
            Some(_) if !activity.is_merit_based() => {
                return Err(CreditError::validation(
                    "requested_credits",
                    format!("activity `{}` has a fixed credit value", activity.id),
                ));
            }
            Some(requested) => Some(self.requested_amount(requested)?),
        };

        self.check_period(period)?;

        let now = Utc::now();
        let submission = Submission {
            id: next_submission_id(),
            practitioner_id,
            activity: activity.snapshot(),
            period,
            evidence,
            note: note.trim().to_string(),
            requested_credits,
            automatic: false,
            course_id: None,
            state: SubmissionState::Pending,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_submission(submission)?;
        info!(
            submission = %stored.id,
            practitioner = %stored.practitioner_id,
            activity = %stored.activity.activity_id,
            period = stored.period,
            "submission recorded"
        );
        Ok(stored)
    }

    /// Open the pending claim for a completed learning-platform course.
    ///
    /// Fails with `Conflict` when the course was already claimed for that period.
    pub(crate) fn open_course_claim(
        &self,
        completion: &CourseCompletion,
        credits: u32,
    ) -> Result<Submission, CreditError> {
        let practitioner_id = self.eligible_practitioner(&completion.practitioner_id)?;
        let title = completion.course_title.trim();
        if title.is_empty() {
            return Err(CreditError::validation("course_title", "must not be empty"));
        }
        self.check_period(completion.period)?;

        let now = Utc::now();
        let submission = Submission {
            id: next_submission_id(),
            practitioner_id,
            activity: ActivitySnapshot {
                activity_id: ActivityId(COURSE_ACTIVITY_ID.to_string()),
                title: format!("LMS course: {title}"),
                category: ActivityCategory::Course,
                credit_value: credits,
            },
            period: completion.period,
            evidence: None,
            note: format!("Awarded automatically for completing {title}"),
            requested_credits: None,
            automatic: true,
            course_id: Some(completion.course_id.clone()),
            state: SubmissionState::Pending,
            created_at: now,
            updated_at: now,
        };

        match self.repository.insert_submission(submission) {
            Ok(stored) => {
                info!(
                    submission = %stored.id,
                    practitioner = %stored.practitioner_id,
                    course = %completion.course_id,
                    period = stored.period,
                    "course claim opened"
                );
                Ok(stored)
            }
            Err(RepositoryError::Conflict) => Err(CreditError::Conflict(format!(
                "course `{}` already credited to `{}` for {}",
                completion.course_id, completion.practitioner_id, completion.period
            ))),
            Err(other) => Err(other.into()),
        }
    }

    /// The claim recorded for a course in a given period, if any.
    pub fn course_claim(
        &self,
        practitioner_id: &PractitionerId,
        course_id: &CourseId,
        period: i32,
    ) -> Result<Option<Submission>, CreditError> {
        Ok(self
            .repository
            .submissions_for(practitioner_id)?
            .into_iter()
            .find(|submission| {
                submission.period == period && submission.course_id.as_ref() == Some(course_id)
            }))
    }

    pub fn get(&self, id: &SubmissionId) -> Result<Submission, CreditError> {
        self.repository
            .fetch_submission(id)?
            .ok_or_else(|| CreditError::not_found("submission", &id.0))
    }

    pub fn submissions_for(
        &self,
        practitioner_id: &PractitionerId,
    ) -> Result<Vec<Submission>, CreditError> {
        Ok(self.repository.submissions_for(practitioner_id)?)
    }

    /// Review queue, oldest first.
    pub fn pending_queue(&self, limit: usize) -> Result<Vec<Submission>, CreditError> {
        Ok(self.repository.pending_submissions(limit)?)
    }

    fn eligible_practitioner(
        &self,
        practitioner_id: &PractitionerId,
    ) -> Result<PractitionerId, CreditError> {
        self.directory
            .find(practitioner_id)?
            .filter(|identity| identity.role.is_credit_eligible())
            .map(|identity| identity.id)
            .ok_or_else(|| CreditError::not_found("practitioner", &practitioner_id.0))
    }

    fn check_period(&self, period: i32) -> Result<(), CreditError> {
        if self.policy.period_in_bounds(period) {
            return Ok(());
        }
        Err(CreditError::validation(
            "period",
            format!(
                "{period} is outside {}..={}",
                self.policy.min_period, self.policy.max_period
            ),
        ))
    }

    fn requested_amount(&self, requested: i64) -> Result<u32, CreditError> {
        if requested < 0 || requested > i64::from(self.policy.max_award) {
            return Err(CreditError::validation(
                "requested_credits",
                format!(
                    "must lie within 0..={} (got {requested})",
                    self.policy.max_award
                ),
            ));
        }
        u32::try_from(requested)
            .map_err(|_| CreditError::validation("requested_credits", "is too large"))
    }
}
