use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::domain::{CreditAmount, SubmissionStatus};
use super::engine::CreditError;
use super::repository::{HistoricalRecordRepository, SubmissionRepository};
use crate::config::CreditPolicy;
use crate::workflows::identity::{IdentityDirectory, PractitionerId};

/// Credit totals for one practitioner, derived on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditTotals {
    pub practitioner_id: PractitionerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<i32>,
    pub submission_credits: CreditAmount,
    pub historical_credits: CreditAmount,
    pub total: CreditAmount,
    pub approved_submissions: usize,
    pub pending_submissions: usize,
    pub historical_records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodCredits {
    pub period: i32,
    pub credits: CreditAmount,
}

/// Progress against the multi-year credit target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleProgress {
    pub practitioner_id: PractitionerId,
    pub first_period: i32,
    pub last_period: i32,
    pub earned: CreditAmount,
    pub target: CreditAmount,
    pub remaining: CreditAmount,
    pub complete: bool,
    pub periods: Vec<PeriodCredits>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub practitioner_id: PractitionerId,
    /// Display name from the identity directory, absent once the identity is gone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    pub credits: CreditAmount,
}

/// Read-side aggregation over approved submissions and bound historical records.
pub struct CreditReporter<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    policy: CreditPolicy,
}

impl<R, D> CreditReporter<R, D>
where
    R: SubmissionRepository + HistoricalRecordRepository + 'static,
    D: IdentityDirectory + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, policy: CreditPolicy) -> Self {
        Self {
            repository,
            directory,
            policy,
        }
    }

    pub fn totals_for(
        &self,
        practitioner_id: &PractitionerId,
        period: Option<i32>,
    ) -> Result<CreditTotals, CreditError> {
        let in_period = |candidate: i32| period.map_or(true, |wanted| wanted == candidate);

        let submissions = self.repository.submissions_for(practitioner_id)?;
        let mut submission_credits = CreditAmount::ZERO;
        let mut approved_submissions = 0;
        let mut pending_submissions = 0;
        for submission in submissions.iter().filter(|entry| in_period(entry.period)) {
            match (submission.status(), submission.awarded_credits()) {
                (SubmissionStatus::Approved, Some(awarded)) => {
                    submission_credits += CreditAmount::from_whole(awarded);
                    approved_submissions += 1;
                }
                (SubmissionStatus::Pending, _) => pending_submissions += 1,
                _ => {}
            }
        }

        let historical = self.repository.records_bound_to(practitioner_id)?;
        let mut historical_credits = CreditAmount::ZERO;
        let mut historical_records = 0;
        for record in historical.iter().filter(|entry| in_period(entry.period)) {
            historical_credits += record.credit_amount;
            historical_records += 1;
        }

        Ok(CreditTotals {
            practitioner_id: practitioner_id.clone(),
            period,
            submission_credits,
            historical_credits,
            total: submission_credits + historical_credits,
            approved_submissions,
            pending_submissions,
            historical_records,
        })
    }

    /// Credits over the configured number of years ending at `last_period`.
    pub fn cycle_progress(
        &self,
        practitioner_id: &PractitionerId,
        last_period: i32,
    ) -> Result<CycleProgress, CreditError> {
        if !self.policy.period_in_bounds(last_period) {
            return Err(CreditError::validation(
                "end_period",
                format!(
                    "{last_period} is outside {}..={}",
                    self.policy.min_period, self.policy.max_period
                ),
            ));
        }
        let first_period = i32::try_from(self.policy.cycle_years)
            .ok()
            .and_then(|span| last_period.checked_sub(span - 1))
            .ok_or_else(|| CreditError::validation("cycle_years", "is too large"))?;

        let mut periods = Vec::new();
        let mut earned = CreditAmount::ZERO;
        for period in first_period..=last_period {
            let totals = self.totals_for(practitioner_id, Some(period))?;
            earned += totals.total;
            periods.push(PeriodCredits {
                period,
                credits: totals.total,
            });
        }

        let target = CreditAmount::from_whole(self.policy.cycle_target);
        Ok(CycleProgress {
            practitioner_id: practitioner_id.clone(),
            first_period,
            last_period,
            earned,
            target,
            remaining: target.saturating_sub(earned),
            complete: earned >= target,
            periods,
        })
    }

    /// Ranking by approved submission credits. Historical points do not count here.
    pub fn leaderboard(
        &self,
        period: Option<i32>,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, CreditError> {
        let mut scores: HashMap<PractitionerId, CreditAmount> = HashMap::new();
        for submission in self.repository.approved_submissions()? {
            if period.is_some_and(|wanted| wanted != submission.period) {
                continue;
            }
            if let Some(awarded) = submission.awarded_credits() {
                *scores.entry(submission.practitioner_id).or_default() +=
                    CreditAmount::from_whole(awarded);
            }
        }

        let mut ranked: Vec<_> = scores.into_iter().collect();
        ranked.sort_by(|(left_id, left), (right_id, right)| {
            right.cmp(left).then_with(|| left_id.cmp(right_id))
        });

        ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, (practitioner_id, credits))| -> Result<_, CreditError> {
                let identity = self.directory.find(&practitioner_id)?;
                Ok(LeaderboardEntry {
                    rank: index + 1,
                    name: identity.as_ref().map(|found| found.name.clone()),
                    surname: identity.map(|found| found.surname),
                    practitioner_id,
                    credits,
                })
            })
            .collect()
    }
}
