// Reading domain model and positional row parsing
use super::error::ParseError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a physical tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TankId(pub u32);

impl fmt::Display for TankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One temperature observation, immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub date: String,
    pub time: String,
    pub year: String,
    pub month: String,
    pub day: String,
    pub tank: TankId,
    /// Degrees Celsius; NaN when the source cell is not numeric
    pub temp: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

const DATE: usize = 0;
const TIME: usize = 1;
const YEAR: usize = 2;
const MONTH: usize = 3;
const DAY: usize = 4;
const TANK: usize = 5;
const TEMP: usize = 6;

impl Reading {
    /// Parse one raw spreadsheet row.
    ///
    /// Columns are positional: date, time, year, month, day, tank, temperature.
    /// Trailing cells are ignored. The temperature cell follows `parseFloat`
    /// semantics, so garbage (or a trimmed empty cell) yields NaN instead of
    /// an error.
    pub fn parse<S: AsRef<str>>(row: &[S]) -> Result<Self, ParseError> {
        let cell = |idx: usize, name: &'static str| {
            row.get(idx)
                .map(|c| c.as_ref().to_string())
                .ok_or(ParseError::MissingColumn(name))
        };

        let date = cell(DATE, "date")?;
        let time = cell(TIME, "time")?;
        let year = cell(YEAR, "year")?;
        let month = cell(MONTH, "month")?;
        let day = cell(DAY, "day")?;
        let tank_cell = cell(TANK, "tank")?;

        let tank = tank_cell
            .trim()
            .parse::<u32>()
            .map(TankId)
            .map_err(|_| ParseError::InvalidTank(tank_cell.clone()))?;

        let temp = row
            .get(TEMP)
            .map(|c| parse_float(c.as_ref()))
            .unwrap_or(f64::NAN);

        let timestamp = compose_timestamp(&year, &month, &day, &time)?;

        Ok(Self {
            date,
            time,
            year,
            month,
            day,
            tank,
            temp,
            timestamp,
        })
    }
}

/// Build a UTC timestamp (ms) from `year-month-day time`.
fn compose_timestamp(year: &str, month: &str, day: &str, time: &str) -> Result<i64, ParseError> {
    let composed = format!("{}-{}-{} {}", year, month, day, time);
    let invalid = || ParseError::InvalidTimestamp(composed.clone());

    let y = year.trim().parse::<i32>().map_err(|_| invalid())?;
    let m = month.trim().parse::<u32>().map_err(|_| invalid())?;
    let d = day.trim().parse::<u32>().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid)?;

    let time = time.trim();
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| invalid())?;

    Ok(NaiveDateTime::new(date, time).and_utc().timestamp_millis())
}

/// Locale-insensitive float parsing with `parseFloat` prefix semantics:
/// leading whitespace is skipped and the longest numeric prefix is used.
pub fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return f64::NAN;
    }

    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}
