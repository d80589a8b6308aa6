//! Calendar attributes derived from the order date: month, year,
//! weekday, and season. Derived once per load and reused by every
//! time-based summary.

use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use thiserror::Error;

use crate::table::{column::Column, sales_table::SalesTable, RowDiagnostic, TableError};

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("date '{0}' matches no candidate format")]
    UnparseableDate(String),

    #[error("month {0} outside 1..=12")]
    UnknownMonth(u32),
}

/// Candidate date formats, tried in order; the first success wins.
///
/// The order is load-bearing: an ambiguous value like `02/05/2023`
/// always resolves through the first entry (month-day-year), so
/// repeated runs produce the same calendar attributes.
pub const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Label given to derived fields of a row whose date parses under no
/// candidate format. Such rows form an explicit group instead of being
/// dropped, so time-based partitions stay complete.
pub const UNKNOWN_LABEL: &str = "Unknown";

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub const SEASON_LABELS: [&str; 4] = ["Winter", "Spring", "Summer", "Fall"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn label(self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses a date by trying each candidate format until one succeeds.
pub fn parse_date(raw: &str) -> Result<NaiveDate, CalendarError> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    Err(CalendarError::UnparseableDate(raw.to_string()))
}

/// Fixed month-to-season lookup: Dec/Jan/Feb -> Winter, Mar/Apr/May ->
/// Spring, Jun/Jul/Aug -> Summer, Sep/Oct/Nov -> Fall. A month outside
/// 1..=12 is an error, never a silent missing category.
pub fn season_for_month(month: u32) -> Result<Season, CalendarError> {
    match month {
        12 | 1 | 2 => Ok(Season::Winter),
        3..=5 => Ok(Season::Spring),
        6..=8 => Ok(Season::Summer),
        9..=11 => Ok(Season::Fall),
        other => Err(CalendarError::UnknownMonth(other)),
    }
}

pub fn month_label(month: u32) -> Result<&'static str, CalendarError> {
    MONTH_LABELS
        .get((month as usize).wrapping_sub(1))
        .copied()
        .ok_or(CalendarError::UnknownMonth(month))
}

pub fn weekday_label(weekday: Weekday) -> &'static str {
    WEEKDAY_LABELS[weekday.num_days_from_sunday() as usize]
}

/// Parses `date_column` once and appends four derived columns:
/// `order_month`, `order_year`, `order_weekday`, `season`.
///
/// Rows whose date matches no candidate format get [`UNKNOWN_LABEL`] in
/// all four columns and are returned as diagnostics; they are never
/// dropped.
pub fn derive_calendar_fields(
    table: &mut SalesTable,
    date_column: &str,
) -> Result<Vec<RowDiagnostic>, TableError> {
    if table.has_column("order_month") {
        return Err(TableError::Parse(
            "calendar fields already derived".into(),
        ));
    }

    let raw_dates = table.key_strings(date_column)?;

    let mut months = Vec::with_capacity(raw_dates.len());
    let mut years = Vec::with_capacity(raw_dates.len());
    let mut weekdays = Vec::with_capacity(raw_dates.len());
    let mut seasons = Vec::with_capacity(raw_dates.len());
    let mut diagnostics = Vec::new();

    for (row, raw) in raw_dates.iter().enumerate() {
        match parse_date(raw) {
            Ok(date) => {
                let season = season_for_month(date.month())?;
                months.push(month_label(date.month())?.to_string());
                years.push(date.year().to_string());
                weekdays.push(weekday_label(date.weekday()).to_string());
                seasons.push(season.label().to_string());
            }
            Err(err) => {
                diagnostics.push(RowDiagnostic {
                    row: row + 1,
                    column: date_column.to_string(),
                    value: raw.clone(),
                    reason: err.to_string(),
                });
                months.push(UNKNOWN_LABEL.to_string());
                years.push(UNKNOWN_LABEL.to_string());
                weekdays.push(UNKNOWN_LABEL.to_string());
                seasons.push(UNKNOWN_LABEL.to_string());
            }
        }
    }

    table.add_column("order_month", Column::from_strings(months))?;
    table.add_column("order_year", Column::from_strings(years))?;
    table.add_column("order_weekday", Column::from_strings(weekdays))?;
    table.add_column("season", Column::from_strings(seasons))?;

    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn ambiguous_dates_resolve_by_format_priority() {
        // day <= 12, so both %m/%d/%Y and %d/%m/%Y would accept it;
        // the first candidate must win on every run
        for _ in 0..3 {
            let date = parse_date("02/05/2023").unwrap();
            assert_eq!(date, NaiveDate::from_ymd_opt(2023, 2, 5).unwrap());
        }
    }

    #[test]
    fn day_first_is_the_fallback() {
        let date = parse_date("25/12/2016").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2016, 12, 25).unwrap());
    }

    #[test]
    fn iso_dates_parse() {
        let date = parse_date("2016-12-25").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2016, 12, 25).unwrap());
    }

    #[test]
    fn unparseable_date_is_an_error() {
        assert!(matches!(
            parse_date("not a date"),
            Err(CalendarError::UnparseableDate(_))
        ));
    }

    #[test]
    fn season_is_total_over_valid_months() {
        let expected = [
            Season::Winter,
            Season::Winter,
            Season::Spring,
            Season::Spring,
            Season::Spring,
            Season::Summer,
            Season::Summer,
            Season::Summer,
            Season::Fall,
            Season::Fall,
            Season::Fall,
            Season::Winter,
        ];
        for (month, season) in (1..=12).zip(expected) {
            assert_eq!(season_for_month(month).unwrap(), season);
        }
    }

    #[test]
    fn out_of_range_month_is_surfaced() {
        assert!(matches!(
            season_for_month(13),
            Err(CalendarError::UnknownMonth(13))
        ));
        assert!(matches!(month_label(0), Err(CalendarError::UnknownMonth(0))));
    }

    #[test]
    fn weekday_labels_run_sunday_to_saturday() {
        assert_eq!(weekday_label(chrono::Weekday::Sun), "Sun");
        assert_eq!(weekday_label(chrono::Weekday::Sat), "Sat");
        // 2016-12-25 was a Sunday
        let date = parse_date("12/25/2016").unwrap();
        assert_eq!(weekday_label(date.weekday()), "Sun");
    }

    #[test]
    fn derivation_appends_columns_and_diagnoses_bad_rows() {
        let csv = "order_date,sales\n11/08/2016,10.0\nbogus,20.0\n06/12/2017,30.0\n";
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", csv).unwrap();

        let mut table = SalesTable::new();
        table.load_csv(tmp.path()).unwrap();
        let diagnostics = derive_calendar_fields(&mut table, "order_date").unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].row, 2);
        assert_eq!(diagnostics[0].value, "bogus");

        for column in ["order_month", "order_year", "order_weekday", "season"] {
            assert!(table.has_column(column), "missing {}", column);
        }

        let seasons = table.group_and_count(&["season"]).unwrap();
        // every row has a non-empty season; the bad date forms its own group
        assert_eq!(seasons.measure_total("count").unwrap(), 3.0);
        assert_eq!(seasons.measure_for(&[UNKNOWN_LABEL], "count"), Some(1.0));
        // 11/08/2016 -> November -> Fall; 06/12/2017 -> June -> Summer
        assert_eq!(seasons.measure_for(&["Fall"], "count"), Some(1.0));
        assert_eq!(seasons.measure_for(&["Summer"], "count"), Some(1.0));
    }

    #[test]
    fn deriving_twice_is_rejected() {
        let csv = "order_date,sales\n11/08/2016,10.0\n";
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", csv).unwrap();

        let mut table = SalesTable::new();
        table.load_csv(tmp.path()).unwrap();
        derive_calendar_fields(&mut table, "order_date").unwrap();
        assert!(derive_calendar_fields(&mut table, "order_date").is_err());
    }
}
