use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{ActivityCategory, ActivityDefinition, ActivityDraft, ActivityId, ActivityPatch};
use super::engine::CreditError;
use super::repository::ActivityRepository;

static ACTIVITY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_activity_id() -> ActivityId {
    let id = ACTIVITY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ActivityId(format!("act-{id:06}"))
}

/// Recognised activities shipped with a fresh deployment.
const STANDARD_ACTIVITIES: &[(&str, &str, ActivityCategory, u32, bool)] = &[
    (
        "Flagship Conference (in person)",
        "Attendance of the annual continuing theological training conference in person.",
        ActivityCategory::Conference,
        30,
        true,
    ),
    (
        "Flagship Conference (online)",
        "Online participation in the annual continuing theological training sessions.",
        ActivityCategory::Conference,
        15,
        true,
    ),
    (
        "Ministers' Assembly",
        "Attendance of the general ministers' assembly.",
        ActivityCategory::Conference,
        8,
        true,
    ),
    (
        "Regional Ministers' Committee",
        "Attendance of a regional committee meeting for ministers.",
        ActivityCategory::Conference,
        5,
        true,
    ),
    (
        "Spring Conference",
        "Attendance of an ecumenical spring conference.",
        ActivityCategory::Conference,
        30,
        true,
    ),
    (
        "Fresh Expressions Workshop",
        "Completion of a Fresh Expressions training workshop.",
        ActivityCategory::Workshop,
        15,
        true,
    ),
    (
        "Presentation",
        "Presenting at a training event or study series.",
        ActivityCategory::Other,
        10,
        true,
    ),
    (
        "International Professional Conference",
        "Attendance of an international profession-related conference, assessed on merit.",
        ActivityCategory::Conference,
        0,
        true,
    ),
    (
        "Peer-Reviewed Article",
        "Publication of a theological article in an accredited journal.",
        ActivityCategory::Publication,
        30,
        true,
    ),
    (
        "Peer Evaluation",
        "Participation in a structured peer evaluation.",
        ActivityCategory::Mentorship,
        10,
        true,
    ),
    (
        "Daily Devotional Series",
        "Writing a daily devotional series for broadcast.",
        ActivityCategory::Publication,
        20,
        true,
    ),
    (
        "Book or Academic Article Read",
        "Reading and reporting on a book or academic article.",
        ActivityCategory::Research,
        4,
        true,
    ),
    (
        "Church Newspaper Article",
        "Publication of an article in the church newspaper.",
        ActivityCategory::Publication,
        4,
        true,
    ),
    (
        "Online Course Completed",
        "Completion of a credit-bearing course on the learning platform.",
        ActivityCategory::Course,
        5,
        false,
    ),
];

/// Administrator-facing catalog of creditable activities.
pub struct ActivityCatalog<R> {
    repository: Arc<R>,
}

impl<R> ActivityCatalog<R>
where
    R: ActivityRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn define_activity(&self, draft: ActivityDraft) -> Result<ActivityDefinition, CreditError> {
        let title = required_text("title", &draft.title)?;
        let description = required_text("description", &draft.description)?;
        let credit_value = credit_value(draft.credit_value)?;
        let now = Utc::now();

        let activity = ActivityDefinition {
            id: next_activity_id(),
            title,
            description,
            category: draft.category,
            credit_value,
            evidence_required: draft.evidence_required,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_activity(activity)?;
        info!(
            activity = %stored.id,
            credit_value = stored.credit_value,
            "activity defined"
        );
        Ok(stored)
    }

    /// Edit a definition in place. Snapshots already taken by submissions are untouched.
    pub fn update_activity(
        &self,
        id: &ActivityId,
        patch: ActivityPatch,
    ) -> Result<ActivityDefinition, CreditError> {
        let mut activity = self.get(id)?;

        if let Some(title) = patch.title {
            activity.title = required_text("title", &title)?;
        }
        if let Some(description) = patch.description {
            activity.description = required_text("description", &description)?;
        }
        if let Some(category) = patch.category {
            activity.category = category;
        }
        if let Some(value) = patch.credit_value {
            activity.credit_value = credit_value(value)?;
        }
        if let Some(evidence_required) = patch.evidence_required {
            activity.evidence_required = evidence_required;
        }
        activity.updated_at = Utc::now();

        self.repository.update_activity(activity.clone())?;
        info!(activity = %activity.id, "activity updated");
        Ok(activity)
    }

    /// Soft toggle. Inactive activities stay referenced by existing submissions.
    pub fn set_active(
        &self,
        id: &ActivityId,
        active: bool,
    ) -> Result<ActivityDefinition, CreditError> {
        let mut activity = self.get(id)?;
        if activity.active != active {
            activity.active = active;
            activity.updated_at = Utc::now();
            self.repository.update_activity(activity.clone())?;
            info!(activity = %activity.id, active, "activity visibility changed");
        }
        Ok(activity)
    }

    pub fn get(&self, id: &ActivityId) -> Result<ActivityDefinition, CreditError> {
        self.repository
            .fetch_activity(id)?
            .ok_or_else(|| CreditError::not_found("activity", &id.0))
    }

    pub fn list(&self, include_inactive: bool) -> Result<Vec<ActivityDefinition>, CreditError> {
        let mut activities = self.repository.list_activities()?;
        if !include_inactive {
            activities.retain(|activity| activity.active);
        }
        Ok(activities)
    }

    /// Install the standard activity set, skipping titles that already exist.
    pub fn seed_standard(&self) -> Result<Vec<ActivityDefinition>, CreditError> {
        let existing = self.repository.list_activities()?;
        let mut created = Vec::new();

        for (title, description, category, credit_value, evidence_required) in STANDARD_ACTIVITIES
        {
            if existing
                .iter()
                .any(|activity| activity.title.eq_ignore_ascii_case(title))
            {
                continue;
            }

            created.push(self.define_activity(ActivityDraft {
                title: (*title).to_string(),
                description: (*description).to_string(),
                category: *category,
                credit_value: i64::from(*credit_value),
                evidence_required: *evidence_required,
            })?);
        }

        Ok(created)
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String, CreditError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CreditError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn credit_value(value: i64) -> Result<u32, CreditError> {
    if value < 0 {
        return Err(CreditError::validation(
            "credit_value",
            format!("must not be negative (got {value})"),
        ));
    }
    u32::try_from(value).map_err(|_| CreditError::validation("credit_value", "is too large"))
}

#[cfg(test)]
pub(crate) fn standard_activity_count() -> usize {
    STANDARD_ACTIVITIES.len()
}
