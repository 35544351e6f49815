//! Observation normalization.
//!
//! Turns raw `MatchFragment`s read off the comparison page into
//! `MatchObservation`s. The page is French-localized: percentages and odds
//! use a comma decimal separator, and kickoff is shown as `dd/mm` plus
//! `hh:mm` with no year.
//!
//! Every required field is pulled out of the fragment before anything is
//! parsed, so a fragment missing a team name or a kickoff is rejected as a
//! whole rather than half-evaluated.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::types::{MatchFragment, MatchObservation, MonitorError};

fn parse_error(field: &str, value: &str) -> MonitorError {
    MonitorError::Parse {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Parse a comma-decimal number, ignoring whitespace and `%`.
fn parse_localized(field: &str, text: &str) -> Result<Decimal, MonitorError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return Err(parse_error(field, text));
    }
    Decimal::from_str(&cleaned).map_err(|_| parse_error(field, text))
}

/// Parse a localized return percentage such as `"98,5 %"`.
pub fn parse_return(text: &str) -> Result<Decimal, MonitorError> {
    parse_localized("return", text)
}

/// Days behind today after which a `dd/mm` date is read as next year's.
const YEAR_ROLLOVER_DAYS: i64 = 182;

/// Parse a `dd/mm` date and `hh:mm` (or `20h45`) time shown in the page's
/// local clock. The year is the current year at that offset, or the next
/// one when the date would lie more than about six months in the past.
pub fn parse_kickoff(
    date_text: &str,
    time_text: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, MonitorError> {
    // The date cell may carry a weekday prefix ("sam. 15/10").
    let date_token = date_text
        .split_whitespace()
        .last()
        .ok_or_else(|| parse_error("date", date_text))?;
    let (day, month) = date_token
        .split_once('/')
        .ok_or_else(|| parse_error("date", date_text))?;
    let day: u32 = day.parse().map_err(|_| parse_error("date", date_text))?;
    let month: u32 = month
        .split('/')
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| parse_error("date", date_text))?;

    let (hour, minute) = time_text
        .trim()
        .split_once(|c: char| c == ':' || c == 'h')
        .ok_or_else(|| parse_error("time", time_text))?;
    let hour: u32 = hour.trim().parse().map_err(|_| parse_error("time", time_text))?;
    let minute: u32 = minute.trim().parse().map_err(|_| parse_error("time", time_text))?;

    let today = now.with_timezone(&offset).date_naive();
    let mut date = NaiveDate::from_ymd_opt(today.year(), month, day)
        .ok_or_else(|| parse_error("date", date_text))?;
    // A date far behind today belongs to next year (31/12 showing 02/01).
    if today.signed_duration_since(date) > chrono::Duration::days(YEAR_ROLLOVER_DAYS) {
        date = NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            .ok_or_else(|| parse_error("date", date_text))?;
    }
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| parse_error("time", time_text))?;

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| parse_error("kickoff", &format!("{date_text} {time_text}")))
}

/// Collect bookmaker ids from class tokens shaped `{prefix}{id}`.
pub fn parse_bookmaker_ids(class_attr: &str, prefix: &str) -> BTreeSet<String> {
    class_attr
        .split_whitespace()
        .filter_map(|token| token.strip_prefix(prefix))
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Format displayed odds as `1: … | N: … | 2: …` (three-way) or
/// `1: … | 2: …` (two-way). Values that do not parse keep their raw text.
pub fn format_odds(odds: &[String]) -> String {
    let values: Vec<String> = odds
        .iter()
        .map(|raw| match parse_localized("odds", raw) {
            Ok(value) => format!("{value:.2}"),
            Err(_) => raw.trim().to_string(),
        })
        .collect();

    let labels: &[&str] = match values.len() {
        2 => &["1", "2"],
        3 => &["1", "N", "2"],
        _ => return values.join(" | "),
    };

    labels
        .iter()
        .zip(&values)
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn match_name(teams: &[String]) -> Result<String, MonitorError> {
    match teams {
        [home, away] if !home.trim().is_empty() && !away.trim().is_empty() => {
            Ok(format!("{} vs {}", home.trim(), away.trim()))
        }
        _ => Err(parse_error("teams", &teams.join(" / "))),
    }
}

/// Normalize one fragment into an observation.
///
/// Fails with `MonitorError::Parse` when a field is missing or malformed
/// and with `MonitorError::KickoffPassed` when the match has already
/// started. Either way only this fragment is dropped.
pub fn normalize(
    fragment: &MatchFragment,
    now: DateTime<Utc>,
    offset: FixedOffset,
    bookmaker_prefix: &str,
) -> Result<MatchObservation, MonitorError> {
    let match_name = match_name(&fragment.teams)?;
    let return_text = fragment
        .return_text
        .as_deref()
        .ok_or_else(|| parse_error("return", ""))?;
    let date_text = fragment
        .date_text
        .as_deref()
        .ok_or_else(|| parse_error("date", ""))?;
    let time_text = fragment
        .time_text
        .as_deref()
        .ok_or_else(|| parse_error("time", ""))?;

    let return_value = parse_return(return_text)?;
    let kickoff = parse_kickoff(date_text, time_text, now, offset)?;
    if kickoff <= now {
        return Err(MonitorError::KickoffPassed { match_name });
    }

    let bookmaker_ids = fragment
        .bookmaker_class
        .as_deref()
        .map(|class| parse_bookmaker_ids(class, bookmaker_prefix))
        .unwrap_or_default();

    Ok(MatchObservation {
        match_name,
        kickoff,
        return_value,
        odds_display: format_odds(&fragment.odds),
        bookmaker_ids,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
