use chrono::{NaiveDate, NaiveDateTime};

use mri_envlog::contract::MockRecordStore;
use mri_envlog::snapshot::{aggregate, SnapshotError, WINDOW_DAYS};
use mri_envlog::store::{Reading, StatusFlag};

fn at(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .expect("valid date")
        .and_hms_opt(time.0, time.1, time.2)
        .expect("valid time")
}

fn reading(ts: NaiveDateTime) -> Reading {
    Reading {
        timestamp: ts,
        o2: 20.9,
        rh1: 45.0,
        temp1: 21.5,
        rh2: 44.0,
        temp2: 21.3,
        elio_ok: StatusFlag::Si,
        aspirazione_ok: StatusFlag::No,
        operatore: "MRossi".to_string(),
    }
}

#[test]
fn empty_store_yields_no_data() {
    let mut store = MockRecordStore::new();
    store.expect_latest().return_once(|| Ok(None));
    store.expect_query_range().never();

    match aggregate(&store) {
        Err(SnapshotError::NoData) => {}
        other => panic!("expected NoData, got {other:?}"),
    }
}

#[test]
fn window_is_latest_minus_thirty_days_inclusive() {
    // Single reading at 2024-01-10 08:00:00: the window must span back to
    // 2023-12-11 08:00:00 exactly (fixed 30x24h offset, not calendar months).
    let latest_ts = at((2024, 1, 10), (8, 0, 0));
    let expected_start = at((2023, 12, 11), (8, 0, 0));
    assert_eq!(latest_ts - chrono::Duration::days(WINDOW_DAYS), expected_start);

    let mut store = MockRecordStore::new();
    let latest = reading(latest_ts);
    let latest_for_query = latest.clone();
    store
        .expect_latest()
        .return_once(move || Ok(Some(latest)));
    store
        .expect_query_range()
        .withf(move |start, end| *start == Some(expected_start) && *end == Some(latest_ts))
        .return_once(move |_, _| Ok(vec![latest_for_query]));

    let snapshot = aggregate(&store).expect("aggregate succeeds");
    assert_eq!(snapshot.window_start, expected_start);
    assert_eq!(snapshot.window.len(), 1);
    assert_eq!(snapshot.latest.timestamp, latest_ts);
    assert_eq!(snapshot.latest.operatore, "MRossi");
}

#[test]
fn window_readings_come_back_in_store_order() {
    let latest_ts = at((2024, 3, 20), (12, 0, 0));
    let earlier = reading(at((2024, 3, 1), (9, 0, 0)));
    let later = reading(latest_ts);

    let mut store = MockRecordStore::new();
    let latest = later.clone();
    store.expect_latest().return_once(move || Ok(Some(latest)));
    let window = vec![earlier.clone(), later.clone()];
    store
        .expect_query_range()
        .return_once(move |_, _| Ok(window));

    let snapshot = aggregate(&store).expect("aggregate succeeds");
    assert_eq!(snapshot.window.len(), 2);
    assert!(snapshot.window[0].timestamp < snapshot.window[1].timestamp);
    assert_eq!(snapshot.latest, *snapshot.window.last().expect("non-empty"));
}
