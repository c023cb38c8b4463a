use tracing::info;

use super::domain::{CourseCompletion, ReviewDecision, ReviewRequest, ReviewerId, Submission};
use super::engine::{CreditEngine, CreditError};
use super::repository::CreditStore;
use crate::workflows::identity::IdentityDirectory;

/// Reviewer recorded on credit the system awards without a person deciding.
pub const SYSTEM_REVIEWER: &str = "system";

/// Result of reporting a completed learning-platform course.
#[derive(Debug, Clone, PartialEq)]
pub enum CourseCredit {
    /// A new approved claim was recorded.
    Awarded(Submission),
    /// The course already earned credit for that period; nothing changed.
    AlreadyCredited(Submission),
}

impl CourseCredit {
    pub fn submission(&self) -> &Submission {
        match self {
            Self::Awarded(submission) | Self::AlreadyCredited(submission) => submission,
        }
    }

    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Awarded(_))
    }
}

impl<S, D> CreditEngine<S, D>
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    /// Award credit for a completed course, at most once per practitioner, course and period.
    ///
    /// The claim goes through the review engine under the system reviewer, so it carries
    /// the same decision fields as any reviewed claim.
    pub fn record_course_completion(
        &self,
        completion: CourseCompletion,
    ) -> Result<CourseCredit, CreditError> {
        let policy = self.policy();
        let credits = completion
            .credits
            .filter(|credits| *credits > 0)
            .unwrap_or(policy.course_credits);
        if credits > policy.max_award {
            return Err(CreditError::validation(
                "credits",
                format!("must not exceed {} (got {credits})", policy.max_award),
            ));
        }

        let existing = self.ledger().course_claim(
            &completion.practitioner_id,
            &completion.course_id,
            completion.period,
        )?;
        let claim = match existing {
            Some(submission) if !submission.is_pending() => {
                return Ok(CourseCredit::AlreadyCredited(submission));
            }
            // Left pending by an earlier attempt that stopped before the approval.
            Some(submission) => submission,
            None => match self.ledger().open_course_claim(&completion, credits) {
                Ok(submission) => submission,
                Err(CreditError::Conflict(_)) => return self.settled_course_credit(&completion),
                Err(other) => return Err(other),
            },
        };

        let approval = ReviewRequest {
            reviewer_id: ReviewerId(SYSTEM_REVIEWER.to_string()),
            decision: ReviewDecision::Approve,
            note: format!(
                "Awarded automatically for completing {}",
                completion.course_title.trim()
            ),
            awarded_credits: None,
        };
        match self.reviews().review(&claim.id, approval) {
            Ok(approved) => {
                info!(
                    submission = %approved.id,
                    course = %completion.course_id,
                    credits,
                    "course credit awarded"
                );
                Ok(CourseCredit::Awarded(approved))
            }
            Err(CreditError::Conflict(_)) => self.settled_course_credit(&completion),
            Err(other) => Err(other),
        }
    }

    fn settled_course_credit(
        &self,
        completion: &CourseCompletion,
    ) -> Result<CourseCredit, CreditError> {
        self.ledger()
            .course_claim(
                &completion.practitioner_id,
                &completion.course_id,
                completion.period,
            )?
            .map(CourseCredit::AlreadyCredited)
            .ok_or_else(|| {
                CreditError::Conflict(format!(
                    "course `{}` was claimed concurrently",
                    completion.course_id
                ))
            })
    }
}
