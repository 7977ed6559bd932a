use anyhow::Result;
use facegate::ledger::{EventFilter, EventLedger, Outcome, DEFAULT_EVENT_LIMIT};
use facegate::{Signature, SIGNATURE_DIM};

fn probe() -> Signature {
    Signature::from_vec(vec![0.25; SIGNATURE_DIM]).unwrap()
}

fn filter() -> EventFilter {
    EventFilter::default()
}

#[test]
fn test_events_come_back_newest_first() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    let ledger = EventLedger::open(dir.path());

    for camera in ["gate-a", "gate-b", "gate-c"] {
        ledger.record(Outcome::Authorized, 0.9, None, Some(camera), &probe())?;
    }

    let events = ledger.events(&filter())?;
    let ids: Vec<u64> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert_eq!(events[0].camera.as_deref(), Some("gate-c"));
    Ok(())
}

#[test]
fn test_outcome_and_camera_filters_compose() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    let ledger = EventLedger::open(dir.path());

    ledger.record(Outcome::Authorized, 0.9, None, Some("gate-a"), &probe())?;
    ledger.record(Outcome::Unauthorized, 0.1, None, Some("gate-a"), &probe())?;
    ledger.record(Outcome::Unauthorized, 0.2, None, Some("gate-b"), &probe())?;
    ledger.record(Outcome::Authorized, 0.8, None, Some("gate-b"), &probe())?;

    let unauthorized = ledger.events(&EventFilter {
        outcome: Some(Outcome::Unauthorized),
        ..filter()
    })?;
    assert_eq!(unauthorized.len(), 2);
    assert!(unauthorized.iter().all(|e| e.outcome == Outcome::Unauthorized));

    let gate_a = ledger.events(&EventFilter {
        camera: Some("gate-a".into()),
        ..filter()
    })?;
    assert_eq!(gate_a.len(), 2);

    let both = ledger.events(&EventFilter {
        outcome: Some(Outcome::Unauthorized),
        camera: Some("gate-a".into()),
        ..filter()
    })?;
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].id, 2);
    Ok(())
}

#[test]
fn test_limit_applies_after_filtering() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    let ledger = EventLedger::open(dir.path());

    for i in 0..6 {
        let outcome = if i % 2 == 0 {
            Outcome::Authorized
        } else {
            Outcome::Unauthorized
        };
        ledger.record(outcome, 0.5, None, None, &probe())?;
    }

    let events = ledger.events(&EventFilter {
        outcome: Some(Outcome::Authorized),
        limit: Some(2),
        ..filter()
    })?;
    assert_eq!(events.len(), 2);
    // Newest two authorized: ids 5 and 3.
    assert_eq!(events[0].id, 5);
    assert_eq!(events[1].id, 3);
    Ok(())
}

#[test]
fn test_listing_defaults_to_one_hundred_events() -> Result<()> {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir()?;
    let ledger = EventLedger::open(dir.path());

    for _ in 0..110 {
        ledger.record(Outcome::Authorized, 0.7, None, None, &probe())?;
    }

    let events = ledger.events(&filter())?;
    assert_eq!(events.len(), DEFAULT_EVENT_LIMIT);
    assert_eq!(events[0].id, 110);
    assert_eq!(events.last().unwrap().id, 11);
    Ok(())
}
