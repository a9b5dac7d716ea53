//! Calendar helpers shared by the scheduling, statistics and streak code.
//!
//! Dates travel through the crate as [`NaiveDate`] values: a calendar day
//! with no time component, so whole-day arithmetic can never be shifted by
//! a daylight-saving transition. Instants (creation, deletion and completion
//! timestamps) are `DateTime<Local>` and are reduced to their local calendar
//! day before any comparison.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{HabitError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    /// All seven tokens in week order, Monday first.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
        DayOfWeek::Sun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Tue => "tue",
            Self::Wed => "wed",
            Self::Thu => "thu",
            Self::Fri => "fri",
            Self::Sat => "sat",
            Self::Sun => "sun",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
            Self::Sun => "Sun",
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, Self::Sat | Self::Sun)
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }
}

impl FromStr for DayOfWeek {
    type Err = HabitError;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_ascii_lowercase();
        DayOfWeek::ALL
            .into_iter()
            .find(|day| day.as_str() == token)
            .ok_or_else(|| HabitError::Validation(format!("unknown weekday `{}`", s.trim())))
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn day_of_week(date: NaiveDate) -> DayOfWeek {
    date.weekday().into()
}

/// Render a calendar day as zero-padded `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a strict, zero-padded `YYYY-MM-DD` string.
///
/// Chrono alone would accept `2024-3-5`; the stored date column relies on
/// lexical ordering, so unpadded forms are rejected here.
pub fn parse_local_date(input: &str) -> Result<NaiveDate> {
    let bytes = input.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(idx, b)| idx == 4 || idx == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(HabitError::Parse(input.to_string()));
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| HabitError::Parse(input.to_string()))
}

/// The instant at 12:00 local time on `date`.
pub fn local_noon(date: NaiveDate) -> DateTime<Local> {
    let noon = date
        .and_hms_opt(12, 0, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN));
    Local
        .from_local_datetime(&noon)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&noon))
}

/// Local calendar day of an instant.
pub fn local_date(at: &DateTime<Local>) -> NaiveDate {
    at.date_naive()
}

/// Every day from `start` through `end`, inclusive. Empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), |day| day.succ_opt()).take_while(move |day| *day <= end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn maps_weekdays_to_tokens() {
        assert_eq!(day_of_week(ymd(2024, 3, 11)), DayOfWeek::Mon);
        assert_eq!(day_of_week(ymd(2024, 3, 16)), DayOfWeek::Sat);
        assert_eq!(day_of_week(ymd(2024, 3, 17)), DayOfWeek::Sun);
        assert_eq!(day_of_week(ymd(2024, 3, 17)).as_str(), "sun");
    }

    #[test]
    fn formats_zero_padded() {
        assert_eq!(format_date(ymd(2024, 3, 5)), "2024-03-05");
        assert_eq!(format_date(ymd(987, 12, 31)), "0987-12-31");
    }

    #[test]
    fn parses_strict_dates() {
        assert_eq!(parse_local_date("2024-02-29").unwrap(), ymd(2024, 2, 29));
        for bad in ["2024-3-5", "2023-02-29", "2024/03/05", "", "2024-03-05T00:00", "abcd-ef-gh"] {
            assert!(
                matches!(parse_local_date(bad), Err(HabitError::Parse(_))),
                "`{bad}` should be rejected"
            );
        }
    }

    #[test]
    fn noon_stays_on_the_same_day() {
        let date = ymd(2024, 3, 10);
        let noon = local_noon(date);
        assert_eq!(local_date(&noon), date);
    }

    #[test]
    fn weekday_tokens_parse_case_insensitively() {
        assert_eq!(" Wed ".parse::<DayOfWeek>().unwrap(), DayOfWeek::Wed);
        assert!(matches!(
            "funday".parse::<DayOfWeek>(),
            Err(HabitError::Validation(_))
        ));
    }

    #[test]
    fn date_range_is_inclusive_and_empty_when_inverted() {
        let days: Vec<_> = date_range(ymd(2024, 2, 28), ymd(2024, 3, 1)).collect();
        assert_eq!(days, vec![ymd(2024, 2, 28), ymd(2024, 2, 29), ymd(2024, 3, 1)]);
        assert_eq!(date_range(ymd(2024, 3, 2), ymd(2024, 3, 1)).count(), 0);
    }
}
