// 📊 Dashboard View Model
// One pure function from a fetched snapshot to everything a screen shows.
// The TUI, the text report and the HTTP API all render this.

use crate::classify::FeeSchedule;
use crate::normalize::{normalize, Normalization};
use crate::period::{
    aggregate, available_months, select_month, FeeRecord, MonthlyEarnings, PayPeriod,
    PayPeriodSummary, YearMonth,
};
use crate::record::{ColumnMap, RecordSnapshot, FEE_COLUMN};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// SETTINGS
// ============================================================================

/// Per-deployment knobs for `compute`.
#[derive(Debug, Clone, Default)]
pub struct DashboardSettings {
    pub columns: ColumnMap,
    pub fees: FeeSchedule,
}

// ============================================================================
// VIEW MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardStatus {
    /// A month is selected and summarised
    Ready,
    /// The source returned no rows at all
    NoData,
    /// Rows exist but none has both a name and a valid date
    NoValidDates,
}

impl DashboardStatus {
    pub fn message(&self) -> &str {
        match self {
            DashboardStatus::Ready => "",
            DashboardStatus::NoData => "No data found.",
            DashboardStatus::NoValidDates => "No valid dates found.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthOption {
    /// "2024-01"
    pub key: String,
    /// "January 2024"
    pub label: String,
}

impl From<YearMonth> for MonthOption {
    fn from(month: YearMonth) -> Self {
        MonthOption {
            key: month.key(),
            label: month.label(),
        }
    }
}

/// A headline figure: "1st - 15th  $1,020.00  12 patients"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
    pub detail: String,
}

/// Rows of display strings under a header line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DisplayTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub status: DashboardStatus,

    /// Rows fetched from the source
    pub total_rows: usize,

    /// Rows dropped for a blank name
    pub skipped_blank: usize,

    pub rejected_count: usize,

    /// Rejected rows with every source column, for inspection
    pub rejected: DisplayTable,

    /// Most recent first
    pub available_months: Vec<MonthOption>,

    pub selected_month: Option<MonthOption>,

    /// Exact figures for the selected month
    pub earnings: Option<MonthlyEarnings>,

    /// First half, second half, month total
    pub metrics: Vec<Metric>,

    /// Visits of the selected month, newest first
    pub table: DisplayTable,
}

impl DashboardView {
    pub fn is_ready(&self) -> bool {
        self.status == DashboardStatus::Ready
    }

    /// Warning line for rejected rows, if any.
    pub fn rejection_warning(&self, date_column: &str) -> Option<String> {
        (self.rejected_count > 0).then(|| {
            format!(
                "Warning: {} patients have a missing or broken '{}'. They are hidden.",
                self.rejected_count, date_column
            )
        })
    }

    pub fn selected(&self) -> Option<YearMonth> {
        self.earnings.as_ref().map(|e| e.month)
    }

    /// Month before/after the selected one in the selector, wrapping.
    pub fn neighbour_month(&self, step: isize) -> Option<YearMonth> {
        let selected = self.selected_month.as_ref()?;
        let len = self.available_months.len() as isize;
        let idx = self
            .available_months
            .iter()
            .position(|m| m.key == selected.key)? as isize;
        let next = (idx + step).rem_euclid(len) as usize;
        self.available_months[next].key.parse().ok()
    }
}

// ============================================================================
// COMPUTE
// ============================================================================

/// Build the view for one render pass.
///
/// `requested` is honoured when that month has data; otherwise the month
/// containing `today` is shown if present, else the most recent month.
pub fn compute(
    snapshot: &RecordSnapshot,
    settings: &DashboardSettings,
    requested: Option<YearMonth>,
    today: NaiveDate,
) -> DashboardView {
    let normalization = normalize(&snapshot.records, &settings.columns);
    let months = available_months(&normalization.normalized);
    let rejected = rejected_table(snapshot, &normalization);

    let mut view = DashboardView {
        status: DashboardStatus::NoData,
        total_rows: snapshot.len(),
        skipped_blank: normalization.skipped_blank,
        rejected_count: normalization.rejected_count(),
        rejected,
        available_months: months.iter().copied().map(MonthOption::from).collect(),
        selected_month: None,
        earnings: None,
        metrics: Vec::new(),
        table: DisplayTable::default(),
    };

    if snapshot.is_empty() {
        return view;
    }

    let Some(month) = select_month(&months, requested, today) else {
        view.status = DashboardStatus::NoValidDates;
        return view;
    };

    let earnings = aggregate(&normalization.normalized, &settings.fees, month);

    view.status = DashboardStatus::Ready;
    view.selected_month = Some(month.into());
    view.metrics = metrics(&earnings);
    view.table = visit_table(snapshot, &settings.columns, &earnings.table_rows);
    view.earnings = Some(earnings);
    view
}

fn metrics(earnings: &MonthlyEarnings) -> Vec<Metric> {
    let period = |period: PayPeriod| {
        let summary = earnings.summary(period);
        Metric {
            label: period.label().to_string(),
            value: money(summary.fee_total),
            detail: patients(summary),
        }
    };

    vec![
        period(PayPeriod::FirstHalf),
        period(PayPeriod::SecondHalf),
        Metric {
            label: "Month Total".to_string(),
            value: money(earnings.month_total.fee_total),
            detail: "Gross Income".to_string(),
        },
    ]
}

fn patients(summary: &PayPeriodSummary) -> String {
    format!("{} patients", summary.visit_count)
}

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayColumn {
    Date,
    Name,
    EncounterType,
    Fee,
    Finalized,
}

const DISPLAY_ORDER: [DisplayColumn; 5] = [
    DisplayColumn::Date,
    DisplayColumn::Name,
    DisplayColumn::EncounterType,
    DisplayColumn::Fee,
    DisplayColumn::Finalized,
];

impl DisplayColumn {
    fn header<'a>(&self, columns: &'a ColumnMap) -> &'a str {
        match self {
            DisplayColumn::Date => &columns.date,
            DisplayColumn::Name => &columns.name,
            DisplayColumn::EncounterType => &columns.encounter_type,
            DisplayColumn::Fee => FEE_COLUMN,
            DisplayColumn::Finalized => &columns.finalized,
        }
    }

    fn cell(&self, record: &FeeRecord) -> String {
        match self {
            DisplayColumn::Date => record.visit.date_text.clone(),
            DisplayColumn::Name => record.visit.name.clone(),
            DisplayColumn::EncounterType => record.visit.encounter_type.clone(),
            DisplayColumn::Fee => money(record.fee),
            DisplayColumn::Finalized => record.visit.finalized_flag.clone(),
        }
    }
}

/// Fixed display columns, skipping source columns the sheet doesn't have.
fn visit_table(snapshot: &RecordSnapshot, columns: &ColumnMap, rows: &[FeeRecord]) -> DisplayTable {
    let shown: Vec<DisplayColumn> = DISPLAY_ORDER
        .iter()
        .copied()
        .filter(|c| *c == DisplayColumn::Fee || snapshot.has_column(c.header(columns)))
        .collect();

    DisplayTable {
        columns: shown.iter().map(|c| c.header(columns).to_string()).collect(),
        rows: rows
            .iter()
            .map(|r| shown.iter().map(|c| c.cell(r)).collect())
            .collect(),
    }
}

fn rejected_table(snapshot: &RecordSnapshot, normalization: &Normalization) -> DisplayTable {
    DisplayTable {
        columns: snapshot.headers.clone(),
        rows: normalization
            .rejected
            .iter()
            .map(|r| {
                r.values_in(&snapshot.headers)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect(),
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// "$1,234.50" - rounds to cents, for display only.
pub fn money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, frac_part)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRecord;

    fn snapshot(rows: &[(&str, &str, &str)]) -> RecordSnapshot {
        let headers = vec![
            "Date seen".to_string(),
            "name".to_string(),
            "Type of encounter".to_string(),
            "finalized report ?".to_string(),
        ];
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, (name, kind, date))| {
                RawRecord::new(i + 1)
                    .with("name", name)
                    .with("Type of encounter", kind)
                    .with("Date seen", date)
                    .with("finalized report ?", "yes")
            })
            .collect();
        RecordSnapshot::new(headers, records)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(Decimal::ZERO), "$0.00");
        assert_eq!(money(Decimal::new(8500, 2)), "$85.00");
        assert_eq!(money(Decimal::new(123456789, 2)), "$1,234,567.89");
        assert_eq!(money(Decimal::new(100000, 0)), "$100,000.00");
        assert_eq!(money(Decimal::new(10005, 3)), "$10.00");
        assert_eq!(money(Decimal::new(-150000, 2)), "-$1,500.00");
    }

    #[test]
    fn test_three_row_scenario() {
        let snap = snapshot(&[
            ("A", "New Consult Initial", "03/01/2024"),
            ("B", "Follow Up visit", "20/01/2024"),
            ("", "x", "01/01/2024"),
        ]);

        let view = compute(
            &snap,
            &DashboardSettings::default(),
            YearMonth::new(2024, 1),
            day(2026, 1, 1),
        );
        let earnings = view.earnings.as_ref().unwrap();

        assert!(view.is_ready());
        assert_eq!(earnings.first_half.visit_count, 1);
        assert_eq!(earnings.first_half.fee_total, Decimal::new(8500, 2));
        assert_eq!(earnings.second_half.visit_count, 1);
        assert_eq!(earnings.second_half.fee_total, Decimal::new(6500, 2));
        assert_eq!(earnings.month_total.visit_count, 2);
        assert_eq!(earnings.month_total.fee_total, Decimal::new(15000, 2));
        assert_eq!(view.skipped_blank, 1);
        assert_eq!(view.rejected_count, 0);

        assert_eq!(view.metrics[0].value, "$85.00");
        assert_eq!(view.metrics[0].detail, "1 patients");
        assert_eq!(view.metrics[2].value, "$150.00");
        assert_eq!(view.metrics[2].detail, "Gross Income");
    }

    #[test]
    fn test_table_columns_and_order() {
        let snap = snapshot(&[
            ("A", "New Consult Initial", "03/01/2024"),
            ("B", "Follow Up visit", "20/01/2024"),
        ]);

        let view = compute(&snap, &DashboardSettings::default(), None, day(2024, 1, 25));

        assert_eq!(
            view.table.columns,
            vec!["Date seen", "name", "Type of encounter", "Fee", "finalized report ?"]
        );
        assert_eq!(view.table.rows[0], vec!["20/01/2024", "B", "Follow Up visit", "$65.00", "yes"]);
        assert_eq!(view.table.rows[1][1], "A");
    }

    #[test]
    fn test_absent_columns_are_omitted() {
        let records = vec![RawRecord::new(1)
            .with("name", "A")
            .with("Date seen", "03/01/2024")];
        let snap = RecordSnapshot::new(vec!["name".to_string(), "Date seen".to_string()], records);

        let view = compute(&snap, &DashboardSettings::default(), None, day(2024, 1, 5));

        assert_eq!(view.table.columns, vec!["Date seen", "name", "Fee"]);
        assert_eq!(view.table.rows[0], vec!["03/01/2024", "A", "$0.00"]);
    }

    #[test]
    fn test_rejected_rows_surface() {
        let snap = snapshot(&[
            ("A", "Follow up", "03/01/2024"),
            ("B", "Follow up", "31/02/2024"),
        ]);

        let view = compute(&snap, &DashboardSettings::default(), None, day(2024, 1, 5));

        assert_eq!(view.rejected_count, 1);
        assert_eq!(view.rejected.columns, snap.headers);
        assert_eq!(view.rejected.rows[0][0], "31/02/2024");
        assert_eq!(view.rejected.rows[0][1], "B");
        assert!(view
            .rejection_warning("Date seen")
            .unwrap()
            .starts_with("Warning: 1 patients"));
        assert_eq!(view.earnings.unwrap().month_total.visit_count, 1);
    }

    #[test]
    fn test_empty_states() {
        let settings = DashboardSettings::default();

        let empty = compute(&RecordSnapshot::default(), &settings, None, day(2024, 1, 1));
        assert_eq!(empty.status, DashboardStatus::NoData);
        assert_eq!(empty.status.message(), "No data found.");

        let undated = compute(&snapshot(&[("A", "x", "soon")]), &settings, None, day(2024, 1, 1));
        assert_eq!(undated.status, DashboardStatus::NoValidDates);
        assert_eq!(undated.rejected_count, 1);
        assert!(undated.earnings.is_none());
        assert!(undated.table.is_empty());
    }

    #[test]
    fn test_month_selector() {
        let snap = snapshot(&[
            ("A", "Follow up", "10/12/2024"),
            ("B", "Follow up", "10/01/2025"),
        ]);

        let view = compute(&snap, &DashboardSettings::default(), None, day(2026, 10, 16));

        let labels: Vec<&str> = view.available_months.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["January 2025", "December 2024"]);
        assert_eq!(view.selected_month.as_ref().unwrap().key, "2025-01");
        assert_eq!(view.neighbour_month(1), YearMonth::new(2024, 12));
        assert_eq!(view.neighbour_month(-1), YearMonth::new(2024, 12));

        let current = compute(&snap, &DashboardSettings::default(), None, day(2024, 12, 24));
        assert_eq!(current.selected(), YearMonth::new(2024, 12));
    }
}
