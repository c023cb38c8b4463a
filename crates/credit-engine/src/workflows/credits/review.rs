use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{ReviewDecision, ReviewRequest, Submission, SubmissionId, SubmissionState};
use super::engine::CreditError;
use super::repository::{RepositoryError, SubmissionRepository};
use crate::config::CreditPolicy;

/// Sole writer of submission status, reviewer fields, and awarded credits.
pub struct ReviewEngine<R> {
    repository: Arc<R>,
    policy: CreditPolicy,
}

impl<R> ReviewEngine<R>
where
    R: SubmissionRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: CreditPolicy) -> Self {
        Self { repository, policy }
    }

    /// Apply a terminal decision to a pending submission.
    pub fn review(
        &self,
        submission_id: &SubmissionId,
        request: ReviewRequest,
    ) -> Result<Submission, CreditError> {
        let mut submission = self
            .repository
            .fetch_submission(submission_id)?
            .ok_or_else(|| CreditError::not_found("submission", &submission_id.0))?;

        if !submission.is_pending() {
            return Err(already_decided(&submission));
        }

        let ReviewRequest {
            reviewer_id,
            decision,
            note,
            awarded_credits,
        } = request;

        if reviewer_id.0.trim().is_empty() {
            return Err(CreditError::validation("reviewer_id", "must not be empty"));
        }

        let now = Utc::now();
        submission.state = match decision {
            ReviewDecision::Approve => SubmissionState::Approved {
                awarded_credits: self
                    .resolve_award(submission.activity.credit_value, awarded_credits)?,
                reviewer_id,
                reviewer_note: note.trim().to_string(),
                decided_at: now,
            },
            ReviewDecision::Reject => SubmissionState::Rejected {
                reviewer_id,
                reviewer_note: note.trim().to_string(),
                decided_at: now,
            },
        };
        submission.updated_at = now;

        // The store re-checks the pending status under its own lock, so a concurrent
        // reviewer that got here first wins and this write is refused.
        let committed = match self.repository.commit_review(submission) {
            Ok(committed) => committed,
            Err(RepositoryError::Conflict) => {
                warn!(submission = %submission_id, "concurrent review lost the race");
                return Err(CreditError::Conflict(format!(
                    "submission `{submission_id}` was decided concurrently"
                )));
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            submission = %committed.id,
            status = committed.status().label(),
            awarded = ?committed.awarded_credits(),
            "submission reviewed"
        );
        Ok(committed)
    }

    fn resolve_award(&self, credit_value: u32, requested: Option<i64>) -> Result<u32, CreditError> {
        let Some(requested) = requested else {
            if credit_value == 0 {
                return Err(CreditError::validation(
                    "awarded_credits",
                    "merit-based activities require an explicit award",
                ));
            }
            return Ok(credit_value);
        };

        if requested < 0 {
            return Err(CreditError::validation(
                "awarded_credits",
                format!("must not be negative (got {requested})"),
            ));
        }
        if requested > i64::from(self.policy.max_award) {
            return Err(CreditError::validation(
                "awarded_credits",
                format!(
                    "must not exceed {} (got {requested})",
                    self.policy.max_award
                ),
            ));
        }

        u32::try_from(requested)
            .map_err(|_| CreditError::validation("awarded_credits", "is too large"))
    }
}

fn already_decided(submission: &Submission) -> CreditError {
    CreditError::Conflict(format!(
        "submission `{}` is already {}",
        submission.id,
        submission.status().label()
    ))
}
