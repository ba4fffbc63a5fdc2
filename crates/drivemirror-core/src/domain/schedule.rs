//! Cron schedules
//!
//! A [`CronSchedule`] is a classic 5-field cron expression
//! (`minute hour day-of-month month day-of-week`) evaluated in UTC.
//!
//! Each field accepts `*`, single values, `a-b` ranges, `/step` suffixes
//! and comma-separated lists. Day-of-week runs 0-7 where both 0 and 7 mean
//! Sunday. When both day fields are restricted a day matches if either
//! does, as in Vixie cron. A day field starting with `*` (including a
//! stepped `*/n`) only relaxes that rule: both masks must then match.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use super::errors::DomainError;

/// Search horizon for [`CronSchedule::next_after`]. Covers a leap-day-only
/// schedule across a skipped century leap year.
const MAX_SEARCH_DAYS: u32 = 366 * 8 + 1;

/// A parsed 5-field cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    /// Parses an expression such as `"0 6,18 * * *"`.
    ///
    /// Anything other than exactly five whitespace-separated fields is an
    /// error, as is any value outside its field's range.
    pub fn parse(expression: &str) -> Result<Self, DomainError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(DomainError::cron(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let minutes = parse_field(expression, fields[0], 0, 59, "minute")?;
        let hours = parse_field(expression, fields[1], 0, 23, "hour")?;
        let days_of_month = parse_field(expression, fields[2], 1, 31, "day-of-month")?;
        let months = parse_field(expression, fields[3], 1, 12, "month")?;
        let mut days_of_week = parse_field(expression, fields[4], 0, 7, "day-of-week")?;

        // 7 is an alias for Sunday
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// The normalized expression text
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns true if the schedule fires at the minute containing `at`
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        has_bit(self.minutes, at.minute())
            && has_bit(self.hours, at.hour())
            && self.matches_day(at.date_naive())
    }

    /// Next fire time strictly after `after`, truncated to the minute
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let mut date = start.date_naive();
        let (first_hour, first_minute) = (start.hour(), start.minute());

        for day in 0..MAX_SEARCH_DAYS {
            if self.matches_day(date) {
                let hour_from = if day == 0 { first_hour } else { 0 };
                for hour in hour_from..24 {
                    if !has_bit(self.hours, hour) {
                        continue;
                    }
                    let minute_from = if day == 0 && hour == first_hour {
                        first_minute
                    } else {
                        0
                    };
                    if let Some(minute) = (minute_from..60).find(|m| has_bit(self.minutes, *m)) {
                        let naive = date.and_hms_opt(hour, minute, 0)?;
                        return Some(Utc.from_utc_datetime(&naive));
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }

    /// The next `count` fire times after `after`
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after;
        while times.len() < count {
            match self.next_after(cursor) {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        times
    }

    fn matches_day(&self, date: NaiveDate) -> bool {
        if !has_bit(self.months, date.month()) {
            return false;
        }
        let dom = has_bit(self.days_of_month, date.day());
        let dow = has_bit(self.days_of_week, date.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronSchedule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

fn has_bit(mask: u64, value: u32) -> bool {
    value < 64 && mask & (1u64 << value) != 0
}

/// Parses one field into a bitmask of allowed values
fn parse_field(
    expression: &str,
    field: &str,
    min: u32,
    max: u32,
    name: &str,
) -> Result<u64, DomainError> {
    let mut mask = 0u64;

    for part in field.split(',') {
        if part.is_empty() {
            return Err(DomainError::cron(expression, format!("empty {name} entry")));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| {
                    DomainError::cron(expression, format!("invalid {name} step '{step}'"))
                })?;
                if step == 0 {
                    return Err(DomainError::cron(
                        expression,
                        format!("{name} step must be greater than 0"),
                    ));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (low, high) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (
                parse_value(expression, a, min, max, name)?,
                parse_value(expression, b, min, max, name)?,
            )
        } else {
            let value = parse_value(expression, range, min, max, name)?;
            // "5/15" runs from 5 to the end of the range
            if step.is_some() {
                (value, max)
            } else {
                (value, value)
            }
        };

        if low > high {
            return Err(DomainError::cron(
                expression,
                format!("{name} range {low}-{high} is reversed"),
            ));
        }

        let step = step.unwrap_or(1) as usize;
        for value in (low..=high).step_by(step) {
            mask |= 1u64 << value;
        }
    }

    Ok(mask)
}

fn parse_value(
    expression: &str,
    raw: &str,
    min: u32,
    max: u32,
    name: &str,
) -> Result<u32, DomainError> {
    let value: u32 = raw
        .parse()
        .map_err(|_| DomainError::cron(expression, format!("invalid {name} value '{raw}'")))?;
    if value < min || value > max {
        return Err(DomainError::cron(
            expression,
            format!("{name} value {value} outside {min}-{max}"),
        ));
    }
    Ok(value)
}
