//! Date parsing for Ukrainian listing and article pages.
//!
//! All functions take `now` explicitly so relative expressions ("вчора, 14:20")
//! resolve deterministically.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CLOCK_RE: Regex = Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap();
    static ref URL_DATE_RE: Regex = Regex::new(r"date_(\d{2})(\d{2})(\d{4})").unwrap();
    static ref CLOCK_DAY_MONTH_RE: Regex =
        Regex::new(r"^\s*(\d{1,2}):(\d{2})\s+(\d{1,2})\.(\d{1,2})\s*$").unwrap();
    static ref NUMERIC_RE: Regex =
        Regex::new(r"(\d{1,2})[./](\d{1,2})[./](\d{4})(?:\D+(\d{1,2}):(\d{2}))?").unwrap();
    static ref MONTH_NAME_RE: Regex =
        Regex::new(r"(?i)(\d{1,2})\s+([\p{L}]+)\s+(\d{4})(?:\D+(\d{1,2}):(\d{2}))?").unwrap();
}

/// Ukrainian month names in genitive and nominative forms.
const UK_MONTHS: &[(&str, u32)] = &[
    ("січня", 1),
    ("січень", 1),
    ("лютого", 2),
    ("лютий", 2),
    ("березня", 3),
    ("березень", 3),
    ("квітня", 4),
    ("квітень", 4),
    ("травня", 5),
    ("травень", 5),
    ("червня", 6),
    ("червень", 6),
    ("липня", 7),
    ("липень", 7),
    ("серпня", 8),
    ("серпень", 8),
    ("вересня", 9),
    ("вересень", 9),
    ("жовтня", 10),
    ("жовтень", 10),
    ("листопада", 11),
    ("листопад", 11),
    ("грудня", 12),
    ("грудень", 12),
];

const RELATIVE_DAYS: &[(&str, i64)] = &[
    ("позавчора", 2),
    ("позавчера", 2),
    ("сьогодні", 0),
    ("сегодня", 0),
    ("вчора", 1),
    ("вчера", 1),
];

pub fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    UK_MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// First `HH:MM` found in the text.
pub fn parse_clock(text: &str) -> Option<(u32, u32)> {
    let caps = CLOCK_RE.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// Date carried in a `date_DDMMYYYY` listing URL.
pub fn page_date_from_url(url: &str) -> Option<NaiveDate> {
    let caps = URL_DATE_RE.captures(url)?;
    NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)
}

/// Timestamp for a date-sweep listing entry that only shows a clock time.
///
/// Page date plus `HH:MM` when both are known, page date at midnight when the
/// time is missing or unparseable, and `now` when the page date is unknown.
pub fn combine_page_date_and_time(
    page_date: Option<NaiveDate>,
    time_text: Option<&str>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match page_date {
        Some(date) => time_text
            .and_then(parse_clock)
            .and_then(|(h, m)| at(date, h, m))
            .unwrap_or_else(|| midnight(date)),
        None => now,
    }
}

/// "сьогодні, 14:20", "вчора 09:05", "позавчора".
pub fn parse_relative_day(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.to_lowercase();
    let (_, days_back) = RELATIVE_DAYS.iter().find(|(word, _)| lower.contains(word))?;
    let date = now.date_naive() - Duration::days(*days_back);
    match parse_clock(&lower) {
        Some((h, m)) => at(date, h, m),
        None => Some(midnight(date)),
    }
}

/// "13:37 28.08" in the current year, or the previous year when that would
/// land in the future.
pub fn parse_clock_day_month(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = CLOCK_DAY_MONTH_RE.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let month: u32 = caps[4].parse().ok()?;

    let candidate = NaiveDate::from_ymd_opt(now.year(), month, day).and_then(|d| at(d, hour, minute))?;
    if candidate > now + Duration::days(1) {
        NaiveDate::from_ymd_opt(now.year() - 1, month, day).and_then(|d| at(d, hour, minute))
    } else {
        Some(candidate)
    }
}

/// "28.08.2025 13:37", "28/08/2025", "28.08.2025, 13:37".
pub fn parse_numeric_date(text: &str) -> Option<DateTime<Utc>> {
    let caps = NUMERIC_RE.captures(text)?;
    let date = NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)?;
    match (caps.get(4), caps.get(5)) {
        (Some(h), Some(m)) => at(date, h.as_str().parse().ok()?, m.as_str().parse().ok()?),
        _ => Some(midnight(date)),
    }
}

/// "28 серпня 2025, 13:37" or "28 серпня 2025".
pub fn parse_month_name_date(text: &str) -> Option<DateTime<Utc>> {
    let caps = MONTH_NAME_RE.captures(text)?;
    let month = month_number(&caps[2])?;
    let date = NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[1].parse().ok()?)?;
    match (caps.get(4), caps.get(5)) {
        (Some(h), Some(m)) => at(date, h.as_str().parse().ok()?, m.as_str().parse().ok()?),
        _ => Some(midnight(date)),
    }
}

/// RFC 3339 first, then every textual grammar above.
pub fn parse_any_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    parse_relative_day(text, now)
        .or_else(|| parse_month_name_date(text))
        .or_else(|| parse_numeric_date(text))
        .or_else(|| parse_clock_day_month(text, now))
}

/// Boundary supplied by a caller: RFC 3339, or a plain `YYYY-MM-DD` taken as
/// midnight UTC.
pub fn parse_until(text: &str) -> np_core::Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(midnight)
        .map_err(|_| np_core::Error::Validation(format!("invalid date '{}', expected YYYY-MM-DD or RFC 3339", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 29, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_page_date_from_url() {
        assert_eq!(
            page_date_from_url("https://epravda.com.ua/news/date_28082025/"),
            NaiveDate::from_ymd_opt(2025, 8, 28)
        );
        assert_eq!(page_date_from_url("https://epravda.com.ua/news/"), None);
        assert_eq!(page_date_from_url("https://a/date_32132025/"), None);
    }

    #[test]
    fn test_combine_page_date_and_time() {
        let page = NaiveDate::from_ymd_opt(2025, 8, 28);
        assert_eq!(
            combine_page_date_and_time(page, Some("13:29"), now()),
            Utc.with_ymd_and_hms(2025, 8, 28, 13, 29, 0).unwrap()
        );
        assert_eq!(
            combine_page_date_and_time(page, Some("—"), now()),
            Utc.with_ymd_and_hms(2025, 8, 28, 0, 0, 0).unwrap()
        );
        assert_eq!(combine_page_date_and_time(None, Some("13:29"), now()), now());
    }

    #[test]
    fn test_parse_clock_day_month() {
        assert_eq!(
            parse_clock_day_month("13:37 28.08", now()),
            Some(Utc.with_ymd_and_hms(2025, 8, 28, 13, 37, 0).unwrap())
        );
        let new_year = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            parse_clock_day_month("23:10 31.12", new_year),
            Some(Utc.with_ymd_and_hms(2025, 12, 31, 23, 10, 0).unwrap())
        );
        assert_eq!(parse_clock_day_month("28.08", now()), None);
    }

    #[test]
    fn test_parse_relative_day() {
        assert_eq!(
            parse_relative_day("Вчора, 14:20", now()),
            Some(Utc.with_ymd_and_hms(2025, 8, 28, 14, 20, 0).unwrap())
        );
        assert_eq!(
            parse_relative_day("позавчора", now()),
            Some(Utc.with_ymd_and_hms(2025, 8, 27, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_relative_day("28.08.2025", now()), None);
    }

    #[test]
    fn test_yesterday_at_midnight_wall_clock() {
        let midnight = Utc.with_ymd_and_hms(2025, 8, 29, 0, 0, 0).unwrap();
        assert_eq!(
            parse_any_date("вчора, 13:37", midnight),
            Some(Utc.with_ymd_and_hms(2025, 8, 28, 13, 37, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_month_name_date() {
        assert_eq!(
            parse_month_name_date("28 серпня 2025, 13:37"),
            Some(Utc.with_ymd_and_hms(2025, 8, 28, 13, 37, 0).unwrap())
        );
        assert_eq!(
            parse_month_name_date("1 Січня 2024"),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_month_name_date("28 august 2025"), None);
    }

    #[test]
    fn test_parse_numeric_date() {
        assert_eq!(
            parse_numeric_date("28.08.2025 13:37"),
            Some(Utc.with_ymd_and_hms(2025, 8, 28, 13, 37, 0).unwrap())
        );
        assert_eq!(
            parse_numeric_date("28/08/2025"),
            Some(Utc.with_ymd_and_hms(2025, 8, 28, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_until() {
        assert_eq!(
            parse_until("2025-08-28").unwrap(),
            Utc.with_ymd_and_hms(2025, 8, 28, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_until("2025-08-28T12:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 8, 28, 10, 0, 0).unwrap()
        );
        assert!(parse_until("28.08.2025").is_err());
    }

    #[test]
    fn test_parse_any_date() {
        assert_eq!(
            parse_any_date("2025-08-28T13:37:00+03:00", now()),
            Some(Utc.with_ymd_and_hms(2025, 8, 28, 10, 37, 0).unwrap())
        );
        assert_eq!(
            parse_any_date("сьогодні, 09:15", now()),
            Some(Utc.with_ymd_and_hms(2025, 8, 29, 9, 15, 0).unwrap())
        );
        assert_eq!(parse_any_date("якийсь текст", now()), None);
        assert_eq!(parse_any_date("", now()), None);
    }
}
