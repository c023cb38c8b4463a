use std::io::Cursor;

use super::common::*;

use crate::workflows::credits::domain::CreditAmount;
use crate::workflows::credits::CreditError;

/// Two approvals (3 and 5), one rejection (10), and one bound legacy row (4) in 2025.
fn seed_totals_fixture(harness: &Harness) {
    let engine = &harness.engine;
    let three = define(engine, "Short Course", 3, false);
    let five = define(engine, "Long Course", 5, false);
    let ten = define(engine, "Big Conference", 10, false);

    approved(engine, ANNA, &three.id, 2025);
    approved(engine, ANNA, &five.id, 2025);
    let rejected = submit(engine, ANNA, &ten.id, 2025);
    engine
        .reviews()
        .review(&rejected.id, reject())
        .expect("reject");

    let outcome = engine
        .historical()
        .import_batch(Cursor::new("Naam,Van,Jaar,Punte\nAnna,Venter,2025,4\n"))
        .expect("import");
    assert_eq!(outcome.summary.bound, 1);
}

#[test]
fn totals_sum_approved_and_bound_historical_credit() {
    let harness = harness();
    seed_totals_fixture(&harness);

    let totals = harness
        .engine
        .reporter()
        .totals_for(&pid(ANNA), Some(2025))
        .expect("totals");

    assert_eq!(totals.submission_credits, CreditAmount::from_whole(8));
    assert_eq!(totals.historical_credits, CreditAmount::from_whole(4));
    assert_eq!(totals.total, CreditAmount::from_whole(12));
    assert_eq!(totals.approved_submissions, 2);
    assert_eq!(totals.pending_submissions, 0);
    assert_eq!(totals.historical_records, 1);
}

#[test]
fn totals_filter_by_period_and_count_pending() {
    let harness = harness();
    seed_totals_fixture(&harness);
    let extra = define(&harness.engine, "Evening Lecture", 2, false);
    approved(&harness.engine, ANNA, &extra.id, 2024);
    let waiting = define(&harness.engine, "Waiting Course", 7, false);
    submit(&harness.engine, ANNA, &waiting.id, 2025);

    let reporter = harness.engine.reporter();
    let current = reporter.totals_for(&pid(ANNA), Some(2025)).expect("totals");
    assert_eq!(current.total, CreditAmount::from_whole(12));
    assert_eq!(current.pending_submissions, 1);

    let previous = reporter.totals_for(&pid(ANNA), Some(2024)).expect("totals");
    assert_eq!(previous.total, CreditAmount::from_whole(2));

    let lifetime = reporter.totals_for(&pid(ANNA), None).expect("totals");
    assert_eq!(lifetime.total, CreditAmount::from_whole(14));
    assert_eq!(lifetime.period, None);

    let other = reporter.totals_for(&pid(PIET), None).expect("totals");
    assert_eq!(other.total, CreditAmount::ZERO);
}

#[test]
fn unbound_historical_credit_is_not_counted() {
    let harness = harness();
    harness
        .engine
        .historical()
        .import_batch(Cursor::new("Name,Surname,Year,Credits\nAnn,Venter,2025,9\n"))
        .expect("import");

    let totals = harness
        .engine
        .reporter()
        .totals_for(&pid(ANNA), Some(2025))
        .expect("totals");
    assert_eq!(totals.total, CreditAmount::ZERO);
}

#[test]
fn cycle_progress_spans_configured_years() {
    let harness = harness();
    let big = define(&harness.engine, "Flagship Conference", 30, false);
    let small = define(&harness.engine, "Reading Report", 4, false);
    approved(&harness.engine, ANNA, &big.id, 2023);
    approved(&harness.engine, ANNA, &big.id, 2024);
    approved(&harness.engine, ANNA, &small.id, 2025);
    // Outside the 2023..=2025 window.
    approved(&harness.engine, ANNA, &big.id, 2022);

    let progress = harness
        .engine
        .reporter()
        .cycle_progress(&pid(ANNA), 2025)
        .expect("progress");

    assert_eq!(progress.first_period, 2023);
    assert_eq!(progress.last_period, 2025);
    assert_eq!(progress.earned, CreditAmount::from_whole(64));
    assert_eq!(progress.target, CreditAmount::from_whole(150));
    assert_eq!(progress.remaining, CreditAmount::from_whole(86));
    assert!(!progress.complete);
    let per_period: Vec<_> = progress
        .periods
        .iter()
        .map(|entry| (entry.period, entry.credits))
        .collect();
    assert_eq!(
        per_period,
        vec![
            (2023, CreditAmount::from_whole(30)),
            (2024, CreditAmount::from_whole(30)),
            (2025, CreditAmount::from_whole(4)),
        ]
    );
}

#[test]
fn cycle_progress_refuses_periods_outside_policy_bounds() {
    let harness = harness();
    for end_period in [i32::MIN, 1899, 2101, i32::MAX] {
        let result = harness
            .engine
            .reporter()
            .cycle_progress(&pid(ANNA), end_period);
        assert!(matches!(
            result,
            Err(CreditError::Validation {
                field: "end_period",
                ..
            })
        ));
    }
}

#[test]
fn totals_saturate_on_extreme_legacy_amounts() {
    use crate::workflows::credits::repository::HistoricalRecordRepository;
    use crate::workflows::historical::record::{HistoricalCreditRecord, HistoricalRecordId};

    let harness = harness();
    for (index, period) in [2019, 2020].into_iter().enumerate() {
        harness
            .store
            .insert_historical(HistoricalCreditRecord::new(
                HistoricalRecordId(format!("hist-extreme-{index}")),
                "Anna".to_string(),
                "Venter".to_string(),
                Some(pid(ANNA)),
                period,
                CreditAmount::from_hundredths(i64::MAX / 2 + 1),
                "stored before limits existed".to_string(),
                chrono::Utc::now(),
            ))
            .expect("insert");
    }

    let totals = harness
        .engine
        .reporter()
        .totals_for(&pid(ANNA), None)
        .expect("totals");
    assert_eq!(totals.total, CreditAmount::from_hundredths(i64::MAX));
}

#[test]
fn leaderboard_ranks_submission_credit_only() {
    let harness = harness();
    let course = define(&harness.engine, "Course", 6, false);
    let seminar = define(&harness.engine, "Seminar", 5, false);
    approved(&harness.engine, ANNA, &course.id, 2025);
    approved(&harness.engine, PIET, &course.id, 2025);
    approved(&harness.engine, PIET, &seminar.id, 2025);
    approved(&harness.engine, ANNA, &seminar.id, 2024);

    // Legacy points never move the ranking.
    harness
        .engine
        .historical()
        .import_batch(Cursor::new("Naam,Van,Jaar,Punte\nAnna,Venter,2025,100\n"))
        .expect("import");

    let board = harness
        .engine
        .reporter()
        .leaderboard(Some(2025), 10)
        .expect("leaderboard");
    let ranking: Vec<_> = board
        .iter()
        .map(|entry| (entry.rank, entry.practitioner_id.0.as_str(), entry.credits))
        .collect();
    assert_eq!(
        ranking,
        vec![
            (1, PIET, CreditAmount::from_whole(11)),
            (2, ANNA, CreditAmount::from_whole(6)),
        ]
    );

    let top = harness
        .engine
        .reporter()
        .leaderboard(None, 1)
        .expect("leaderboard");
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].practitioner_id, pid(ANNA));
    assert_eq!(top[0].name.as_deref(), Some("Anna"));
    assert_eq!(top[0].surname.as_deref(), Some("Venter"));
    assert_eq!(top[0].credits, CreditAmount::from_whole(11));
}
