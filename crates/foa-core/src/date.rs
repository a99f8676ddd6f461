//! Free-form date normalization to `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());
static SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})").unwrap());
static MONTH_DAY_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)\s+([0-9]{1,2}),?\s+([0-9]{4})").unwrap());
static DAY_MONTH_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})\s+([A-Za-z]+)\s+([0-9]{4})").unwrap());
static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})(?:st|nd|rd|th)$").unwrap());

const SINGLE_TOKEN_FORMATS: [&str; 7] = [
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d-%b-%Y", "%Y.%m.%d", "%Y%m%d",
];

const PHRASE_FORMATS: [&str; 4] = ["%B %d %Y", "%d %B %Y", "%Y %B %d", "%A %B %d %Y"];

/// Month name (full or three-letter abbreviation) to month number.
pub fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Whether the last-resort fuzzy stage is compiled in.
pub fn fuzzy_parse_available() -> bool {
    true
}

/// Normalize a free-form date to ISO `YYYY-MM-DD`.
///
/// Returns `None` for blank or unparseable input; never fails.
pub fn normalize(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if ISO_RE.is_match(raw) {
        return Some(raw.to_string());
    }

    if let Some(caps) = SLASH_RE.captures(raw) {
        if let Some(iso) = iso_from_parts(&caps[3], &caps[1], &caps[2]) {
            return Some(iso);
        }
    }

    if let Some(caps) = MONTH_DAY_YEAR_RE.captures(raw) {
        if let Some(month) = month_number(&caps[1]) {
            if let Some(iso) = iso_from_parts(&caps[3], &month.to_string(), &caps[2]) {
                return Some(iso);
            }
        }
    }

    if let Some(caps) = DAY_MONTH_YEAR_RE.captures(raw) {
        if let Some(month) = month_number(&caps[2]) {
            if let Some(iso) = iso_from_parts(&caps[3], &month.to_string(), &caps[1]) {
                return Some(iso);
            }
        }
    }

    fuzzy_parse(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

fn iso_from_parts(year: &str, month: &str, day: &str) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Best-effort parse: whole-string formats first, then date-shaped runs of
/// tokens embedded in surrounding prose.
fn fuzzy_parse(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }

    let tokens: Vec<String> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|t| t.trim_matches(|c: char| c == '.' || c == '(' || c == ')'))
        .filter(|t| !t.is_empty())
        .map(|t| match ORDINAL_RE.captures(t) {
            Some(caps) => caps[1].to_string(),
            None => t.to_string(),
        })
        .collect();

    for width in [4usize, 3] {
        for window in tokens.windows(width) {
            let phrase = window.join(" ");
            for fmt in PHRASE_FORMATS {
                if let Ok(date) = NaiveDate::parse_from_str(&phrase, fmt) {
                    return Some(date);
                }
            }
        }
    }

    for token in &tokens {
        for fmt in SINGLE_TOKEN_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(token, fmt) {
                return Some(date);
            }
        }
    }

    None
}
