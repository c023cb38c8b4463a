use crate::infra::build_engine;
use chrono::{Datelike, Local};
use clap::Args;
use credit_engine::config::{AppConfig, CreditPolicy};
use credit_engine::error::AppError;
use credit_engine::workflows::credits::{
    ActivityDefinition, CourseCompletion, CourseId, CreditError, EvidenceRef, ReviewDecision,
    ReviewRequest, ReviewerId, SubmissionRequest,
};
use credit_engine::workflows::historical::{ImportOutcome, LinkFilter, RowOutcome};
use credit_engine::workflows::identity::{
    InMemoryIdentityDirectory, PractitionerId, PractitionerIdentity, Role,
};
use std::path::PathBuf;

const SAMPLE_HISTORY: &str = "Naam,Van,Jaar,Punte,Beskrywing\n\
Anna,Venter,2022,12,Synod training days\n\
J. Smith,Botha,2019,6,\n\
Piet,Pompies,1850,3,Typo in year\n";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Legacy credit CSV to import instead of the bundled sample
    #[arg(long)]
    pub(crate) historical_csv: Option<PathBuf>,
    /// Credit year for new claims (defaults to the current year)
    #[arg(long)]
    pub(crate) period: Option<i32>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let policy = AppConfig::load()?.policy;
    let period = args.period.unwrap_or_else(|| Local::now().year());
    run_scenario(policy, args.historical_csv, period)
}

fn run_scenario(
    policy: CreditPolicy,
    historical_csv: Option<PathBuf>,
    period: i32,
) -> Result<(), AppError> {
    let (engine, directory) = build_engine(policy)?;

    println!("Continuing-education credit demo ({period})");
    let catalog = engine.catalog().list(false)?;
    println!("Catalog: {} active activities", catalog.len());

    register(&directory, "prac-anna", "Anna", "Venter", Role::Practitioner)?;
    register(&directory, "rev-marie", "Marie", "Botha", Role::Reviewer)?;

    println!("\nLegacy import");
    let outcome = match historical_csv {
        Some(path) => engine.historical().import_path(path)?,
        None => engine.historical().import_batch(SAMPLE_HISTORY.as_bytes())?,
    };
    render_import(&outcome);

    println!("\nClaims and reviews");
    let anna = PractitionerId("prac-anna".to_string());
    let conference = find_activity(&catalog, "Flagship Conference (in person)")?;
    let merit = find_activity(&catalog, "International Professional Conference")?;

    let fixed = engine.ledger().submit(claim(&anna, conference, period))?;
    let fixed = engine
        .reviews()
        .review(&fixed.id, decision(ReviewDecision::Approve, None))?;
    println!(
        "  {} -> {} ({} credits)",
        fixed.activity.title,
        fixed.status().label(),
        fixed.awarded_credits().unwrap_or_default()
    );

    let assessed = engine.ledger().submit(claim(&anna, merit, period))?;
    match engine
        .reviews()
        .review(&assessed.id, decision(ReviewDecision::Approve, None))
    {
        Ok(_) => println!("  merit-based approval unexpectedly accepted without an award"),
        Err(err) => println!("  merit-based approval without award refused: {err}"),
    }
    let assessed = engine
        .reviews()
        .review(&assessed.id, decision(ReviewDecision::Approve, Some(20)))?;
    println!(
        "  {} -> {} ({} credits)",
        assessed.activity.title,
        assessed.status().label(),
        assessed.awarded_credits().unwrap_or_default()
    );
    if let Err(err) = engine
        .reviews()
        .review(&assessed.id, decision(ReviewDecision::Reject, None))
    {
        println!("  second review refused: {err}");
    }

    let completion = CourseCompletion {
        practitioner_id: anna.clone(),
        course_id: CourseId("lms-ethics-101".to_string()),
        course_title: "Professional Ethics".to_string(),
        credits: None,
        period,
    };
    for _ in 0..2 {
        let credit = engine.record_course_completion(completion.clone())?;
        let submission = credit.submission();
        println!(
            "  {} -> {} ({} credits{})",
            submission.activity.title,
            submission.status().label(),
            submission.awarded_credits().unwrap_or_default(),
            if credit.is_new() { "" } else { ", already credited" }
        );
    }

    println!("\nLate registration");
    register(&directory, "prac-smith", "J. Smith", "Botha", Role::Emeritus)?;
    let unbound = engine.historical().records(LinkFilter::Unbound)?;
    println!("  unbound legacy records remaining: {}", unbound.len());

    println!("\nTotals");
    let smith = PractitionerId("prac-smith".to_string());
    for (practitioner, year) in [(&anna, Some(period)), (&anna, None), (&smith, Some(2019))] {
        let totals = engine.reporter().totals_for(practitioner, year)?;
        println!(
            "  {:<11} {:<8} total {:>6} (claims {}, legacy {})",
            practitioner.0,
            year.map_or_else(|| "all".to_string(), |value| value.to_string()),
            totals.total,
            totals.submission_credits,
            totals.historical_credits
        );
    }

    let progress = engine.reporter().cycle_progress(&anna, period)?;
    println!(
        "  cycle {}-{}: {} of {} ({} remaining)",
        progress.first_period,
        progress.last_period,
        progress.earned,
        progress.target,
        progress.remaining
    );

    println!("\nLeaderboard");
    for entry in engine.reporter().leaderboard(Some(period), 5)? {
        println!(
            "  #{} {} ({} credits)",
            entry.rank, entry.practitioner_id, entry.credits
        );
    }

    Ok(())
}

fn register(
    directory: &InMemoryIdentityDirectory,
    id: &str,
    name: &str,
    surname: &str,
    role: Role,
) -> Result<(), AppError> {
    directory
        .register(PractitionerIdentity {
            id: PractitionerId(id.to_string()),
            name: name.to_string(),
            surname: surname.to_string(),
            role,
        })
        .map_err(|err| AppError::Credit(err.into()))
}

fn find_activity<'a>(
    catalog: &'a [ActivityDefinition],
    title: &str,
) -> Result<&'a ActivityDefinition, AppError> {
    catalog
        .iter()
        .find(|activity| activity.title == title)
        .ok_or_else(|| {
            AppError::Credit(CreditError::NotFound {
                entity: "activity",
                id: title.to_string(),
            })
        })
}

fn claim(
    practitioner: &PractitionerId,
    activity: &ActivityDefinition,
    period: i32,
) -> SubmissionRequest {
    SubmissionRequest {
        practitioner_id: practitioner.clone(),
        activity_id: activity.id.clone(),
        period,
        note: "demo claim".to_string(),
        evidence: Some(EvidenceRef {
            storage_key: format!("demo/{}.pdf", activity.id),
            file_name: Some("certificate.pdf".to_string()),
        }),
        requested_credits: None,
    }
}

fn decision(decision: ReviewDecision, awarded_credits: Option<i64>) -> ReviewRequest {
    ReviewRequest {
        reviewer_id: ReviewerId("rev-marie".to_string()),
        decision,
        note: "demo review".to_string(),
        awarded_credits,
    }
}

fn render_import(outcome: &ImportOutcome) {
    let counts = outcome.preview.counts();
    println!(
        "  preview: {} rows ({} bound, {} unbound, {} ambiguous, {} duplicate, {} invalid)",
        counts.total,
        counts.bound,
        counts.unbound,
        counts.ambiguous,
        counts.duplicate,
        counts.invalid
    );
    for row in &outcome.preview.rows {
        if let RowOutcome::Invalid { issue } = &row.outcome {
            println!("  line {}: {}", row.line, issue);
        }
    }
    println!(
        "  committed: {} inserted, {} skipped as duplicates",
        outcome.summary.inserted, outcome.summary.skipped_duplicates
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_runs_with_bundled_sample() {
        run_scenario(CreditPolicy::default(), None, 2025).expect("demo completes");
    }

    #[test]
    fn scenario_reports_missing_csv() {
        let missing = std::env::temp_dir().join("credit-engine-demo-missing.csv");
        let result = run_scenario(CreditPolicy::default(), Some(missing), 2025);
        assert!(matches!(result, Err(AppError::Import(_))));
    }
}
