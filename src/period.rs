// 📅 Pay Period Aggregation
// Month buckets split into two pay periods: days 1-15 and 16-end.

use crate::classify::FeeSchedule;
use crate::normalize::NormalizedRecord;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Last day of the first pay period.
pub const FIRST_HALF_LAST_DAY: u32 = 15;

// ============================================================================
// YEAR-MONTH KEY
// ============================================================================

/// YearMonth - key of a month bucket
///
/// Field order gives chronological `Ord`: January 2025 > December 2024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(YearMonth { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// "January 2024"
    pub fn label(&self) -> String {
        self.first_day()
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{:04}-{:02}", self.year, self.month))
    }

    /// "2024-01", the form accepted back by `FromStr` and the HTTP API.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Accepts "2024-01", "2024/01" or "January 2024".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some((y, m)) = s.split_once(['-', '/']) {
            if let (Ok(year), Ok(month)) = (y.parse::<i32>(), m.parse::<u32>()) {
                return YearMonth::new(year, month)
                    .ok_or_else(|| format!("Month out of range: {}", s));
            }
        }

        NaiveDate::parse_from_str(&format!("1 {}", s), "%d %B %Y")
            .map(YearMonth::of)
            .map_err(|_| format!("Unrecognised month: {} (use YYYY-MM or 'January 2024')", s))
    }
}

// ============================================================================
// PAY PERIODS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayPeriod {
    /// Days 1-15
    FirstHalf,
    /// Day 16 to end of month, whatever the month length
    SecondHalf,
}

impl PayPeriod {
    pub fn of(date: NaiveDate) -> Self {
        if date.day() <= FIRST_HALF_LAST_DAY {
            PayPeriod::FirstHalf
        } else {
            PayPeriod::SecondHalf
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PayPeriod::FirstHalf => "1st - 15th",
            PayPeriod::SecondHalf => "16th - End",
        }
    }
}

// ============================================================================
// FEE RECORDS & SUMMARIES
// ============================================================================

/// FeeRecord - a visit with its fee attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRecord {
    #[serde(flatten)]
    pub visit: NormalizedRecord,
    pub fee: Decimal,
}

/// Count and fee sum of one pay period (or a whole month).
///
/// `fee_total` is exact; rounding happens only when displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriodSummary {
    pub visit_count: usize,
    pub fee_total: Decimal,
}

impl PayPeriodSummary {
    pub fn add(&mut self, record: &FeeRecord) {
        self.visit_count += 1;
        self.fee_total += record.fee;
    }

    fn from_records<'a>(records: impl IntoIterator<Item = &'a FeeRecord>) -> Self {
        let mut summary = PayPeriodSummary::default();
        for record in records {
            summary.add(record);
        }
        summary
    }
}

/// MonthlyEarnings - everything the dashboard shows for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyEarnings {
    pub month: YearMonth,
    pub first_half: PayPeriodSummary,
    pub second_half: PayPeriodSummary,
    pub month_total: PayPeriodSummary,
    /// Most recent visit first; same-day visits keep source order
    pub table_rows: Vec<FeeRecord>,
}

impl MonthlyEarnings {
    pub fn summary(&self, period: PayPeriod) -> &PayPeriodSummary {
        match period {
            PayPeriod::FirstHalf => &self.first_half,
            PayPeriod::SecondHalf => &self.second_half,
        }
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Attach a fee to every visit, preserving order.
pub fn attach_fees(visits: &[NormalizedRecord], schedule: &FeeSchedule) -> Vec<FeeRecord> {
    visits
        .iter()
        .map(|visit| FeeRecord {
            fee: schedule.classify(&visit.encounter_type),
            visit: visit.clone(),
        })
        .collect()
}

/// Totals for `month`, split into the two pay periods.
pub fn aggregate(
    visits: &[NormalizedRecord],
    schedule: &FeeSchedule,
    month: YearMonth,
) -> MonthlyEarnings {
    let in_month: Vec<NormalizedRecord> = visits
        .iter()
        .filter(|v| month.contains(v.visit_date))
        .cloned()
        .collect();
    let mut table_rows = attach_fees(&in_month, schedule);

    let first_half = PayPeriodSummary::from_records(
        table_rows
            .iter()
            .filter(|r| PayPeriod::of(r.visit.visit_date) == PayPeriod::FirstHalf),
    );
    let second_half = PayPeriodSummary::from_records(
        table_rows
            .iter()
            .filter(|r| PayPeriod::of(r.visit.visit_date) == PayPeriod::SecondHalf),
    );
    let month_total = PayPeriodSummary::from_records(&table_rows);

    // sort_by is stable: ties stay in source order
    table_rows.sort_by(|a, b| b.visit.visit_date.cmp(&a.visit.visit_date));

    MonthlyEarnings {
        month,
        first_half,
        second_half,
        month_total,
        table_rows,
    }
}

/// Distinct months present, most recent first.
pub fn available_months(visits: &[NormalizedRecord]) -> Vec<YearMonth> {
    let months: BTreeSet<YearMonth> = visits.iter().map(|v| YearMonth::of(v.visit_date)).collect();
    months.into_iter().rev().collect()
}

/// Month to show: the requested one if it has data, else the month
/// containing `today` if it has data, else the most recent month.
pub fn select_month(
    available: &[YearMonth],
    requested: Option<YearMonth>,
    today: NaiveDate,
) -> Option<YearMonth> {
    let current = YearMonth::of(today);
    requested
        .filter(|m| available.contains(m))
        .or_else(|| available.iter().copied().find(|m| *m == current))
        .or_else(|| available.first().copied())
}

// ============================================================================
// TESTS
// ============================================================================
