//! Date-of-birth parsing for spoken and typed Spanish/English dates.
//!
//! Ambiguous numeric dates are read day-first (`01/02/2000` is 1 February).
//! A month-first reading is used only when the day-first reading is
//! impossible (`12/25/1990`).

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::{Captures, Regex};

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\b").expect("valid ISO date regex")
});

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})\b").expect("valid numeric date regex")
});

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}|primero)(?:º|°)?\s*(?:de\s+)?([a-záéíóú]{3,10})\.?,?\s*(?:de(?:l)?\s+|,\s*)?(\d{4}|\d{2})\b",
    )
    .expect("valid textual date regex")
});

static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
        .expect("valid english date regex")
});

const MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("january", 1),
    ("febrero", 2),
    ("february", 2),
    ("marzo", 3),
    ("march", 3),
    ("abril", 4),
    ("april", 4),
    ("mayo", 5),
    ("may", 5),
    ("junio", 6),
    ("june", 6),
    ("julio", 7),
    ("july", 7),
    ("agosto", 8),
    ("august", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("september", 9),
    ("octubre", 10),
    ("october", 10),
    ("noviembre", 11),
    ("november", 11),
    ("diciembre", 12),
    ("december", 12),
];

/// Resolve a month word: a full name or an abbreviation of at least three
/// letters ("ago", "sept", "dic").
fn month_from_word(word: &str) -> Option<u32> {
    let word = word.to_lowercase();
    if word.chars().count() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .find(|(name, _)| *name == word || (word.len() <= 4 && name.starts_with(&word)))
        .map(|(_, month)| *month)
}

/// Expand a two-digit year, preferring the past.
fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() == 4 {
        return Some(year);
    }
    let current = Utc::now().year();
    let candidate = 2000 + year;
    Some(if candidate > current { 1900 + year } else { candidate })
}

/// Dates of birth are never in the future.
fn not_future(date: NaiveDate) -> Option<NaiveDate> {
    (date <= Utc::now().date_naive()).then_some(date)
}

fn day_first(day: u32, month: u32, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(not_future)
        .or_else(|| NaiveDate::from_ymd_opt(year, day, month).and_then(not_future))
}

type DateReader = fn(&Captures<'_>) -> Option<NaiveDate>;

fn iso(caps: &Captures<'_>) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    not_future(date)
}

fn numeric(caps: &Captures<'_>) -> Option<NaiveDate> {
    day_first(caps[1].parse().ok()?, caps[2].parse().ok()?, expand_year(&caps[3])?)
}

fn day_month_year(caps: &Captures<'_>) -> Option<NaiveDate> {
    let day = if caps[1].eq_ignore_ascii_case("primero") {
        1
    } else {
        caps[1].parse().ok()?
    };
    let month = month_from_word(&caps[2])?;
    let date = NaiveDate::from_ymd_opt(expand_year(&caps[3])?, month, day)?;
    not_future(date)
}

fn month_day_year(caps: &Captures<'_>) -> Option<NaiveDate> {
    let month = month_from_word(&caps[1])?;
    let date = NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[2].parse().ok()?)?;
    not_future(date)
}

/// Find the first plausible date of birth in `text`, returning the date and
/// the byte range it occupies. Forms are tried in order, and every match of
/// a form is tried before moving to the next.
pub fn find_date(text: &str) -> Option<(NaiveDate, Range<usize>)> {
    let forms: [(&Regex, DateReader); 4] = [
        (&*ISO_DATE, iso),
        (&*NUMERIC_DATE, numeric),
        (&*DAY_MONTH_YEAR, day_month_year),
        (&*MONTH_DAY_YEAR, month_day_year),
    ];
    forms.into_iter().find_map(|(re, read)| {
        re.captures_iter(text)
            .find_map(|caps| Some((read(&caps)?, caps.get(0)?.range())))
    })
}

/// Parse a date of birth into a calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    find_date(text).map(|(date, _)| date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn spanish_long_form() {
        assert_eq!(parse_date("23 de agosto de 1995"), Some(ymd(1995, 8, 23)));
        assert_eq!(
            parse_date("Nací el 5 de Enero del 1980"),
            Some(ymd(1980, 1, 5))
        );
        assert_eq!(parse_date("primero de mayo de 1970"), Some(ymd(1970, 5, 1)));
        assert_eq!(parse_date("12 sept 1999"), Some(ymd(1999, 9, 12)));
    }

    #[test]
    fn iso_form() {
        assert_eq!(parse_date("1995-08-23"), Some(ymd(1995, 8, 23)));
    }

    #[test]
    fn numeric_is_day_first() {
        assert_eq!(parse_date("01/02/2000"), Some(ymd(2000, 2, 1)));
        assert_eq!(parse_date("23/08/1995"), Some(ymd(1995, 8, 23)));
        assert_eq!(parse_date("23.08.1995"), Some(ymd(1995, 8, 23)));
    }

    #[test]
    fn numeric_falls_back_to_month_first_when_day_first_impossible() {
        assert_eq!(parse_date("12/25/1990"), Some(ymd(1990, 12, 25)));
    }

    #[test]
    fn two_digit_year_prefers_past() {
        assert_eq!(parse_date("23/08/95"), Some(ymd(1995, 8, 23)));
        assert_eq!(parse_date("03/04/01"), Some(ymd(2001, 4, 3)));
    }

    #[test]
    fn english_month_first() {
        assert_eq!(parse_date("August 23, 1995"), Some(ymd(1995, 8, 23)));
    }

    #[test]
    fn rejects_non_dates() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("31/02/2000"), None);
        assert_eq!(parse_date("23 de nada de 1995"), None);
    }

    #[test]
    fn future_dates_are_not_birth_dates() {
        assert_eq!(parse_date("10-20-3040"), None);
        assert_eq!(parse_date("3040-10-20"), None);
        assert_eq!(parse_date("5 de enero de 2999"), None);
    }

    #[test]
    fn later_matches_are_tried() {
        assert_eq!(
            parse_date("99/99/1990, perdón, 23/08/1995"),
            Some(ymd(1995, 8, 23))
        );
        assert_eq!(
            parse_date("2020-13-45 no, 1995-08-23"),
            Some(ymd(1995, 8, 23))
        );
    }

    #[test]
    fn reports_span_of_match() {
        let text = "nací el 23/08/1995 y mi teléfono es 555-123-4567";
        let (_, span) = find_date(text).unwrap();
        assert_eq!(&text[span], "23/08/1995");
    }
}
