//! Schedule triggers: 5-field cron expressions and fixed intervals.
//!
//! Cron format: "MIN HOUR DOM MON DOW" (no seconds).
//! Field syntax: `*`, `*/N`, `N`, `A-B`, `A-B/N` and comma lists of those.
//! Example: "*/5 * * * *" = every five minutes.
//!
//! Interval format: "@every 30s", "@every 10m", "@every 2h".

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use feesweep_core::{Result, SweepError};

/// Give up searching for a matching minute after this many years.
const SEARCH_HORIZON_YEARS: i32 = 5;

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Cron(CronExpr),
    Interval { every_secs: u64 },
}

impl Schedule {
    /// Parse a cron expression or an `@every` interval.
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        if let Some(rest) = expression.strip_prefix("@every") {
            return parse_interval(rest.trim()).map(|every_secs| Schedule::Interval { every_secs });
        }
        expression.parse().map(Schedule::Cron)
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Cron(expr) => expr.next_after(after),
            Schedule::Interval { every_secs } => {
                Some(after + Duration::seconds(i64::try_from(*every_secs).ok()?))
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Cron(expr) => write!(f, "{}", expr.source),
            Schedule::Interval { every_secs } => write!(f, "@every {every_secs}s"),
        }
    }
}

fn parse_interval(spec: &str) -> Result<u64> {
    let invalid = || SweepError::InvalidSchedule(format!("bad interval '@every {spec}'"));
    let (split, _) = spec.char_indices().last().ok_or_else(invalid)?;
    let (num, unit) = spec.split_at(split);
    let n: u64 = num.trim().parse().map_err(|_| invalid())?;
    let secs = match unit {
        "s" => Some(n),
        "m" => n.checked_mul(60),
        "h" => n.checked_mul(3600),
        _ => None,
    }
    .ok_or_else(invalid)?;
    if secs == 0 {
        return Err(invalid());
    }
    Ok(secs)
}

/// A parsed 5-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl FromStr for CronExpr {
    type Err = SweepError;

    fn from_str(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(SweepError::InvalidSchedule(format!(
                "'{expression}' needs 5 fields: MIN HOUR DOM MON DOW"
            )));
        }

        let mut days_of_week = parse_field(parts[4], 0, 7)?;
        // 7 is an alias for Sunday.
        if days_of_week.remove(&7) {
            days_of_week.insert(0);
        }

        Ok(Self {
            source: expression.to_string(),
            minutes: parse_field(parts[0], 0, 59)?,
            hours: parse_field(parts[1], 0, 23)?,
            days_of_month: parse_field(parts[2], 1, 31)?,
            months: parse_field(parts[3], 1, 12)?,
            days_of_week,
            dom_restricted: parts[2] != "*",
            dow_restricted: parts[4] != "*",
        })
    }
}

impl CronExpr {
    fn day_matches(&self, t: &DateTime<Utc>) -> bool {
        let dom = self.days_of_month.contains(&t.day());
        let dow = self.days_of_week.contains(&t.weekday().num_days_from_sunday());
        // Classic cron: when both day fields are restricted either may match.
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Next matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = (after + Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;
        let horizon = after.year() + SEARCH_HORIZON_YEARS;

        while t.year() <= horizon {
            if !self.months.contains(&t.month()) {
                let (y, m) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).single()?;
                continue;
            }
            if !self.day_matches(&t) {
                t = (t + Duration::days(1)).with_hour(0)?.with_minute(0)?;
                continue;
            }
            if !self.hours.contains(&t.hour()) {
                t = (t + Duration::hours(1)).with_minute(0)?;
                continue;
            }
            if !self.minutes.contains(&t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }
}

/// Parse one cron field into the set of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Result<BTreeSet<u32>> {
    let invalid = |why: &str| SweepError::InvalidSchedule(format!("field '{field}': {why}"));
    let mut values = BTreeSet::new();

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid("bad step"))?;
                if step == 0 {
                    return Err(invalid("step must be positive"));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let a: u32 = a.parse().map_err(|_| invalid("bad range start"))?;
            let b: u32 = b.parse().map_err(|_| invalid("bad range end"))?;
            (a, b)
        } else {
            let n: u32 = range.parse().map_err(|_| invalid("not a number"))?;
            // `N/step` runs from N to the end of the field.
            if step.is_some() { (n, max) } else { (n, n) }
        };

        if lo < min || hi > max || lo > hi {
            return Err(invalid(&format!("out of range {min}-{max}")));
        }
        values.extend((lo..=hi).step_by(step.unwrap_or(1) as usize));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_every_hour() {
        let schedule = Schedule::parse("0 * * * *").unwrap();
        let next = schedule.next_after(at(2026, 2, 22, 10, 30)).unwrap();
        assert_eq!(next, at(2026, 2, 22, 11, 0));
    }

    #[test]
    fn test_every_five_minutes_is_strictly_after() {
        let schedule = Schedule::parse("*/5 * * * *").unwrap();
        assert_eq!(
            schedule.next_after(at(2026, 2, 22, 10, 5)).unwrap(),
            at(2026, 2, 22, 10, 10)
        );
        assert_eq!(
            schedule.next_after(at(2026, 2, 22, 10, 2)).unwrap(),
            at(2026, 2, 22, 10, 5)
        );
    }

    #[test]
    fn test_day_of_week_and_month() {
        // Mondays at 08:30 in March. 2026-03-02 is a Monday.
        let schedule = Schedule::parse("30 8 * 3 1").unwrap();
        let next = schedule.next_after(at(2026, 2, 22, 7, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 2, 8, 30));
    }

    #[test]
    fn test_ranges_and_lists() {
        let schedule = Schedule::parse("0,30 9-17/4 * * *").unwrap();
        let next = schedule.next_after(at(2026, 2, 22, 9, 30)).unwrap();
        assert_eq!(next, at(2026, 2, 22, 13, 0));
    }

    #[test]
    fn test_start_with_step_runs_to_field_end() {
        let schedule = Schedule::parse("5/10 * * * *").unwrap();
        assert_eq!(
            schedule.next_after(at(2026, 2, 22, 10, 5)).unwrap(),
            at(2026, 2, 22, 10, 15)
        );
        assert_eq!(
            schedule.next_after(at(2026, 2, 22, 10, 55)).unwrap(),
            at(2026, 2, 22, 11, 5)
        );
        assert_eq!(parse_field("5/10", 0, 59).unwrap().len(), 6);
        assert_eq!(parse_field("5", 0, 59).unwrap().len(), 1);
    }

    #[test]
    fn test_interval() {
        let schedule = Schedule::parse("@every 30s").unwrap();
        assert_eq!(schedule, Schedule::Interval { every_secs: 30 });
        let now = at(2026, 1, 1, 0, 0);
        assert_eq!(schedule.next_after(now).unwrap(), now + Duration::seconds(30));
        assert_eq!(
            Schedule::parse("@every 2h").unwrap(),
            Schedule::Interval { every_secs: 7200 }
        );
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(Schedule::parse("bad").is_err());
        assert!(Schedule::parse("61 * * * *").is_err());
        assert!(Schedule::parse("*/0 * * * *").is_err());
        assert!(Schedule::parse("@every 0s").is_err());
        assert!(Schedule::parse("@every").is_err());
        assert!(Schedule::parse("@every 5d").is_err());
    }

    #[test]
    fn test_impossible_date_gives_up() {
        // February 31st never happens.
        let schedule = Schedule::parse("0 0 31 2 *").unwrap();
        assert!(schedule.next_after(at(2026, 1, 1, 0, 0)).is_none());
    }
}
