// 🧹 Record Normalizer
// Drops blank-name rows, parses the visit date day-first, and routes rows
// with unusable dates to `rejected` so the caller can warn about them.

use crate::record::{ColumnMap, RawRecord};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ============================================================================
// TYPES
// ============================================================================

/// NormalizedRecord - a patient visit with a valid date and non-blank name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Source row, for provenance and stable ordering
    pub row: usize,
    pub name: String,
    pub encounter_type: String,
    pub visit_date: NaiveDate,
    /// Date cell exactly as it appeared in the source
    pub date_text: String,
    /// Display only
    pub finalized_flag: String,
}

/// Output of `normalize`: an exact partition of the name-bearing rows.
#[derive(Debug, Clone, Default)]
pub struct Normalization {
    pub normalized: Vec<NormalizedRecord>,

    /// Rows with a name but no parseable date, in source order
    pub rejected: Vec<RawRecord>,

    /// Rows dropped for a blank name (policy, not counted as rejected)
    pub skipped_blank: usize,
}

impl Normalization {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

// ============================================================================
// NORMALIZE
// ============================================================================

/// Split raw rows into visits and rejected rows.
///
/// A row whose name is blank after trimming is not a visit at all (header
/// artifacts, spacer rows) and is skipped without being counted as rejected.
/// A missing date column on a row reads as an empty date and rejects it.
pub fn normalize(records: &[RawRecord], columns: &ColumnMap) -> Normalization {
    let mut out = Normalization::default();

    for record in records {
        let name = record.get_or_empty(&columns.name).trim();
        if name.is_empty() {
            out.skipped_blank += 1;
            continue;
        }

        let date_text = record.get_or_empty(&columns.date);
        match parse_day_first(date_text) {
            Some(visit_date) => out.normalized.push(NormalizedRecord {
                row: record.row,
                name: name.to_string(),
                encounter_type: record.get_or_empty(&columns.encounter_type).to_string(),
                visit_date,
                date_text: date_text.to_string(),
                finalized_flag: record.get_or_empty(&columns.finalized).to_string(),
            }),
            None => out.rejected.push(record.clone()),
        }
    }

    out
}

// ============================================================================
// DATE PARSING
// ============================================================================

/// Month-name forms, day first. `%B` also accepts the short name.
const NAMED_MONTH_FORMATS: &[&str] = &["%d-%B-%Y", "%d %B %Y", "%d/%B/%Y"];

/// Parse a calendar date written day-before-month.
///
/// Accepts `DD/MM/YYYY`, `DD-MM-YYYY` and `DD.MM.YYYY` (two-digit years map
/// 00-68 to 20xx and 69-99 to 19xx), unambiguous ISO `YYYY-MM-DD`, and
/// month names such as `20-Jan-2024` or `5 March 2024`.
/// Anything after the date (a time of day, an ISO `T...` suffix, a comma) is
/// ignored. Impossible dates such as 31/02 yield `None` rather than a nearby day.
pub fn parse_day_first(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    parse_numeric(value).or_else(|| parse_named_month(value))
}

fn parse_named_month(value: &str) -> Option<NaiveDate> {
    NAMED_MONTH_FORMATS.iter().find_map(|fmt| {
        let (date, rest) = NaiveDate::parse_and_remainder(value, fmt).ok()?;
        let clean_end = rest.is_empty() || rest.starts_with([',', ' ', 'T']);
        (clean_end && date.year() >= 1000).then_some(date)
    })
}

fn parse_numeric(value: &str) -> Option<NaiveDate> {
    let token = value.split_whitespace().next()?;
    let token = token.split('T').next()?.trim_end_matches(',');

    let sep = token.chars().find(|c| !c.is_ascii_digit())?;
    if !matches!(sep, '/' | '-' | '.') {
        return None;
    }

    let parts: Vec<&str> = token.split(sep).collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };

    if day.len() > 2 || month.len() > 2 {
        return None;
    }

    let year: i32 = match year.len() {
        4 => year.parse().ok()?,
        2 => {
            let yy: i32 = year.parse().ok()?;
            if yy < 69 {
                2000 + yy
            } else {
                1900 + yy
            }
        }
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}
