use chrono::{NaiveDate, NaiveDateTime};
use tempfile::tempdir;

use mri_envlog::cli::{parse_filter_date, parse_sensor_value, truncate_for_display, validate_operator};
use mri_envlog::export::export_records;
use mri_envlog::store::{Reading, StatusFlag};

fn at(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .expect("valid date")
        .and_hms_opt(time.0, time.1, time.2)
        .expect("valid time")
}

#[test]
fn sensor_values_accept_a_decimal_comma() {
    assert_eq!(parse_sensor_value("20,90", "Percentuale O2").expect("comma"), 20.90);
    assert_eq!(parse_sensor_value(" 21.5 ", "Temperatura 1").expect("dot"), 21.5);
}

#[test]
fn sensor_value_errors_name_the_field() {
    let err = parse_sensor_value("", "Percentuale O2").expect_err("empty");
    assert!(err.to_string().contains("Percentuale O2"));

    let err = parse_sensor_value("abc", "RH Umidità 1").expect_err("non-numeric");
    assert!(err.to_string().contains("RH Umidità 1"));
    assert!(err.to_string().contains("abc"));
}

#[test]
fn operator_is_required_and_capped_at_ten_chars() {
    assert!(validate_operator("   ").is_err());
    assert_eq!(validate_operator(" MRossi ").expect("trimmed"), "MRossi");
    assert_eq!(
        validate_operator("ARealLongOperatorName").expect("capped"),
        "ARealLongO"
    );
}

#[test]
fn filter_dates_accept_iso_and_day_first_formats() {
    assert_eq!(
        parse_filter_date("2024-01-10 08:00:00", true).expect("iso datetime"),
        at((2024, 1, 10), (8, 0, 0))
    );
    assert_eq!(
        parse_filter_date("10/01/2024 08:00", true).expect("day-first datetime"),
        at((2024, 1, 10), (8, 0, 0))
    );
    assert_eq!(
        parse_filter_date("10/01/24", true).expect("short year date"),
        at((2024, 1, 10), (0, 0, 0))
    );
}

#[test]
fn bare_dates_normalise_to_interval_edges() {
    assert_eq!(
        parse_filter_date("10/01/2024", true).expect("lower bound"),
        at((2024, 1, 10), (0, 0, 0))
    );
    assert_eq!(
        parse_filter_date("10/01/2024", false).expect("upper bound"),
        at((2024, 1, 10), (23, 59, 59))
    );
}

#[test]
fn unparsable_dates_are_rejected_with_guidance() {
    let err = parse_filter_date("31/02/2024", true).expect_err("impossible date");
    assert!(err.to_string().contains("gg/mm/aa"));
}

#[test]
fn transcript_truncation_marks_the_cut() {
    let short = "all fine";
    assert_eq!(truncate_for_display(short, 1500), short);

    let long = "x".repeat(2000);
    let shown = truncate_for_display(&long, 1500);
    assert_eq!(shown.chars().count(), 1503);
    assert!(shown.ends_with("..."));
}

#[test]
fn export_names_the_interval_and_lists_every_reading() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("registro.html");
    let readings = vec![
        Reading {
            timestamp: at((2024, 1, 10), (8, 0, 0)),
            o2: 20.9,
            rh1: 45.0,
            temp1: 21.5,
            rh2: 44.0,
            temp2: 21.3,
            elio_ok: StatusFlag::Si,
            aspirazione_ok: StatusFlag::No,
            operatore: "MRossi".to_string(),
        },
        Reading {
            timestamp: at((2024, 1, 11), (8, 30, 0)),
            o2: 20.8,
            rh1: 46.0,
            temp1: 21.6,
            rh2: 44.5,
            temp2: 21.2,
            elio_ok: StatusFlag::No,
            aspirazione_ok: StatusFlag::Si,
            operatore: "LBianchi".to_string(),
        },
    ];

    export_records(
        &readings,
        Some(at((2024, 1, 1), (0, 0, 0))),
        Some(at((2024, 1, 31), (23, 59, 59))),
        &out,
    )
    .expect("export succeeds");

    let html = std::fs::read_to_string(&out).expect("exported file");
    assert!(html.contains("Intervallo: 01/01/24 00:00 → 31/01/24 23:59"));
    assert!(html.contains("10/01/24 08:00"));
    assert!(html.contains("11/01/24 08:30"));
    assert!(html.contains("MRossi"));
    assert!(html.contains("LBianchi"));
    assert_eq!(html.matches("<tr>").count(), 3, "header row plus one per reading");
}
