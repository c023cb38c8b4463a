use std::io::Write;
use std::sync::Arc;

use credit_engine::config::CreditPolicy;
use credit_engine::workflows::credits::{CreditAmount, CreditEngine, MemoryCreditStore};
use credit_engine::workflows::historical::{HistoricalImportError, LinkFilter, RowIssue, RowOutcome};
use credit_engine::workflows::identity::{
    InMemoryIdentityDirectory, PractitionerId, PractitionerIdentity, Role,
};

type Engine = CreditEngine<MemoryCreditStore, InMemoryIdentityDirectory>;

fn subscribed_engine() -> (Arc<Engine>, Arc<InMemoryIdentityDirectory>) {
    let directory = Arc::new(InMemoryIdentityDirectory::new());
    let engine = Arc::new(CreditEngine::new(
        Arc::new(MemoryCreditStore::new()),
        directory.clone(),
        CreditPolicy::default(),
    ));
    // The engine keeps the importer alive, so the weak subscription stays live.
    directory
        .subscribe(Arc::downgrade(&engine.reconciliation_observer()))
        .expect("subscribe");
    (engine, directory)
}

#[test]
fn late_registration_binds_orphaned_history() {
    let (engine, directory) = subscribed_engine();

    let outcome = engine
        .historical()
        .import_batch("Name,Surname,Year,Credits\nJ. Smith,Botha,2019,6\n".as_bytes())
        .expect("import");
    assert_eq!(outcome.preview.rows[0].outcome, RowOutcome::Unbound);
    assert_eq!(outcome.summary.unbound, 1);

    let smith = PractitionerId("prac-smith".to_string());
    let before = engine
        .reporter()
        .totals_for(&smith, Some(2019))
        .expect("totals");
    assert_eq!(before.total, CreditAmount::ZERO);

    directory
        .register(PractitionerIdentity {
            id: smith.clone(),
            name: "J. Smith".to_string(),
            surname: "Botha".to_string(),
            role: Role::Emeritus,
        })
        .expect("register");

    let bound = engine
        .historical()
        .records(LinkFilter::Bound)
        .expect("records");
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].practitioner_id(), Some(&smith));
    assert_eq!(bound[0].raw_name, "J. Smith");

    let after = engine
        .reporter()
        .totals_for(&smith, Some(2019))
        .expect("totals");
    assert_eq!(after.total, CreditAmount::from_whole(6));
}

#[test]
fn ineligible_registrations_leave_history_unbound() {
    let (engine, directory) = subscribed_engine();
    engine
        .historical()
        .import_batch("Naam,Van,Jaar,Punte\nKarel,Meyer,2018,5\n".as_bytes())
        .expect("import");

    directory
        .register(PractitionerIdentity {
            id: PractitionerId("mem-karel".to_string()),
            name: "Karel".to_string(),
            surname: "Meyer".to_string(),
            role: Role::Member,
        })
        .expect("register");

    assert_eq!(
        engine
            .historical()
            .records(LinkFilter::Unbound)
            .expect("records")
            .len(),
        1
    );
}

#[test]
fn out_of_range_years_are_previewed_but_not_committed() {
    let (engine, _) = subscribed_engine();
    let csv = "Naam;Van;Jaar;Punte\nAnna;Venter;1850;3\nAnna;Venter;2019;2,5\n";

    let outcome = engine
        .historical()
        .import_batch(csv.as_bytes())
        .expect("import");
    assert!(matches!(
        &outcome.preview.rows[0].outcome,
        RowOutcome::Invalid {
            issue: RowIssue::PeriodOutOfRange { period: 1850, .. }
        }
    ));
    assert_eq!(outcome.summary.inserted, 1);
    assert_eq!(outcome.summary.skipped_invalid, 1);

    let records = engine.historical().records(LinkFilter::All).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].period, 2019);
    assert_eq!(records[0].credit_amount, CreditAmount::from_hundredths(250));
}

#[test]
fn missing_name_column_commits_nothing() {
    let (engine, _) = subscribed_engine();
    let result = engine
        .historical()
        .import_batch("Van,Jaar,Punte\nVenter,2019,4\nBotha,2020,6\n".as_bytes());
    assert!(matches!(
        result,
        Err(HistoricalImportError::Schema { ref missing }) if missing == &vec!["name"]
    ));
    assert!(engine
        .historical()
        .records(LinkFilter::All)
        .expect("records")
        .is_empty());
}

#[test]
fn importing_the_same_file_twice_adds_nothing() {
    let (engine, _) = subscribed_engine();
    let csv = "Name,Surname,Year,Credits,Description\n\
               Anna,Venter,2017,4,Synod\n\
               Piet,Pompies,2017,3,\n\
               Piet,Pompies,2018,3,\n";

    let first = engine
        .historical()
        .import_batch(csv.as_bytes())
        .expect("first import");
    assert_eq!(first.summary.inserted, 3);

    let second = engine
        .historical()
        .import_batch(csv.as_bytes())
        .expect("second import");
    assert_eq!(second.summary.inserted, 0);
    assert_eq!(second.summary.skipped_duplicates, 3);
    assert!(second
        .preview
        .rows
        .iter()
        .all(|row| row.outcome == RowOutcome::Duplicate));

    let records = engine.historical().records(LinkFilter::All).expect("records");
    assert_eq!(records.len(), 3);
    assert!(records.iter().any(|record| record.description == "Synod"));
}

#[test]
fn import_path_reads_files_from_disk() {
    let (engine, _) = subscribed_engine();
    let path = std::env::temp_dir().join(format!(
        "credit-engine-history-{}.csv",
        std::process::id()
    ));
    {
        let mut file = std::fs::File::create(&path).expect("create temp file");
        file.write_all("\u{feff}Naam,Van,Jaar,Punte\nLiesl,Nel,2016,7\n".as_bytes())
            .expect("write temp file");
    }

    let outcome = engine.historical().import_path(&path).expect("import");
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.summary.inserted, 1);
    assert_eq!(outcome.preview.columns.name.index, 0);
}
