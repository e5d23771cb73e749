// tests/end_to_end.rs
//
// CSV text → snapshot → render pass, through the public API only.

use chrono::NaiveDate;
use earnings_dashboard::{
    compute, read_snapshot, ColumnMap, DashboardService, DashboardSettings, DashboardStatus,
    StaticSource, YearMonth, TIMESTAMP,
};
use rust_decimal::Decimal;

const SHEET: &str = "\
Timestamp,name,Type of encounter,Date seen,finalized report ?
04/01/2024 08:12:00,A,New Consult Initial,03/01/2024,yes
21/01/2024 19:40:00,B,Follow Up visit,20/01/2024,no
01/01/2024 10:00:00,,x,01/01/2024,
01/03/2024 10:00:00,C,EMG non CTS,31/02/2024,yes
02/12/2024 09:00:00,D,follow up,30/11/2024,yes
05/01/2025 09:00:00,E,new consult,05/01/2025,
";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
}

fn dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[test]
fn january_2024_pay_periods() {
    let snapshot = read_snapshot(SHEET.as_bytes()).expect("parse csv");
    let view = compute(&snapshot, &DashboardSettings::default(), YearMonth::new(2024, 1), today());
    let earnings = view.earnings.expect("january selected");

    assert_eq!(earnings.first_half.visit_count, 1);
    assert_eq!(earnings.first_half.fee_total, dollars(8500));
    assert_eq!(earnings.second_half.visit_count, 1);
    assert_eq!(earnings.second_half.fee_total, dollars(6500));
    assert_eq!(earnings.month_total.visit_count, 2);
    assert_eq!(earnings.month_total.fee_total, dollars(15000));
}

#[test]
fn invalid_calendar_date_is_rejected_and_counted() {
    let snapshot = read_snapshot(SHEET.as_bytes()).expect("parse csv");
    let view = compute(&snapshot, &DashboardSettings::default(), None, today());

    // 6 rows, 1 blank name, 1 impossible date
    assert_eq!(view.total_rows, 6);
    assert_eq!(view.skipped_blank, 1);
    assert_eq!(view.rejected_count, 1);
    assert_eq!(view.rejected.rows[0][1], "C");
}

#[test]
fn months_sort_chronologically() {
    let snapshot = read_snapshot(SHEET.as_bytes()).expect("parse csv");
    let view = compute(&snapshot, &DashboardSettings::default(), None, today());

    let labels: Vec<&str> = view.available_months.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["January 2025", "November 2024", "January 2024"]);
    // today falls in January 2024, which has data
    assert_eq!(view.selected_month.unwrap().label, "January 2024");
}

#[test]
fn timestamp_column_drives_periods() {
    let snapshot = read_snapshot(SHEET.as_bytes()).expect("parse csv");
    let settings = DashboardSettings {
        columns: ColumnMap::with_date_field(TIMESTAMP),
        ..DashboardSettings::default()
    };

    let view = compute(&snapshot, &settings, YearMonth::new(2024, 1), today());
    let earnings = view.earnings.expect("january selected");

    // A's timestamp is the 4th, B's the 21st
    assert_eq!(earnings.first_half.fee_total, dollars(8500));
    assert_eq!(earnings.second_half.fee_total, dollars(6500));
    // C's timestamp (01/03/2024) is valid, so nothing is rejected
    assert_eq!(view.rejected_count, 0);
    assert_eq!(view.table.columns[0], "Timestamp");
}

#[test]
fn service_runs_full_pass() {
    let snapshot = read_snapshot(SHEET.as_bytes()).expect("parse csv");
    let service = DashboardService::new(
        Box::new(StaticSource::new(snapshot)),
        DashboardSettings::default(),
    );

    let view = service
        .render_on("2024-11".parse().ok(), today())
        .expect("static source never fails");

    assert_eq!(view.status, DashboardStatus::Ready);
    assert_eq!(view.metrics[1].value, "$65.00");
    assert_eq!(view.metrics[1].detail, "1 patients");
    assert_eq!(
        view.table.rows[0],
        vec!["30/11/2024", "D", "follow up", "$65.00", "yes"]
    );
}

#[test]
fn header_only_sheet_is_no_data() {
    let snapshot = read_snapshot("name,Date seen\n".as_bytes()).expect("parse csv");
    let view = compute(&snapshot, &DashboardSettings::default(), None, today());

    assert_eq!(view.status, DashboardStatus::NoData);
    assert!(view.metrics.is_empty());
}
