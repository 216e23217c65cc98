//! Schedule evaluation: decides whether a recurring report job is due on a
//! given calendar date.
//!
//! `is_due_today` is pure and total: no I/O, no mutation, and malformed specs
//! evaluate to not-due instead of raising. Spec integrity is enforced at
//! creation time via `validate_spec`. Cron expressions are never parsed here;
//! CUSTOM_CRON dispatches to the `CronDelegate` port.

use crate::core::error::SignoffError;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel for "last day of the month" in `day_of_month`.
pub const LAST_DAY_OF_MONTH: i32 = -1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    CustomCron,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::CustomCron => "CUSTOM_CRON",
        }
    }

    pub fn from_frequency_str(s: &str) -> Option<Self> {
        match s {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "CUSTOM_CRON" => Some(Frequency::CustomCron),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Active,
    Paused,
    Disabled,
    Completed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "ACTIVE",
            ScheduleStatus::Paused => "PAUSED",
            ScheduleStatus::Disabled => "DISABLED",
            ScheduleStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_status_str(s: &str) -> Self {
        match s {
            "PAUSED" => ScheduleStatus::Paused,
            "DISABLED" => ScheduleStatus::Disabled,
            "COMPLETED" => ScheduleStatus::Completed,
            _ => ScheduleStatus::Active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
        }
    }

    pub fn from_day_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MONDAY" => Some(DayOfWeek::Monday),
            "TUESDAY" => Some(DayOfWeek::Tuesday),
            "WEDNESDAY" => Some(DayOfWeek::Wednesday),
            "THURSDAY" => Some(DayOfWeek::Thursday),
            "FRIDAY" => Some(DayOfWeek::Friday),
            "SATURDAY" => Some(DayOfWeek::Saturday),
            "SUNDAY" => Some(DayOfWeek::Sunday),
            _ => None,
        }
    }

    pub fn matches(&self, weekday: Weekday) -> bool {
        matches!(
            (self, weekday),
            (DayOfWeek::Monday, Weekday::Mon)
                | (DayOfWeek::Tuesday, Weekday::Tue)
                | (DayOfWeek::Wednesday, Weekday::Wed)
                | (DayOfWeek::Thursday, Weekday::Thu)
                | (DayOfWeek::Friday, Weekday::Fri)
                | (DayOfWeek::Saturday, Weekday::Sat)
                | (DayOfWeek::Sunday, Weekday::Sun)
        )
    }
}

/// Immutable schedule specification. Edits replace the spec wholesale; no
/// field is mutated in place after creation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduleSpec {
    pub frequency: Frequency,
    /// DAILY cadence; `None` or <= 1 means every day.
    pub interval_days: Option<u32>,
    /// WEEKLY due days.
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    /// MONTHLY due day; `LAST_DAY_OF_MONTH` selects the month's final day.
    pub day_of_month: Option<i32>,
    /// CUSTOM_CRON expression, evaluated by the delegate.
    pub cron_expression: Option<String>,
    /// Inclusive window start.
    pub start_date: Option<NaiveDate>,
    /// Inclusive window end.
    pub end_date: Option<NaiveDate>,
    pub status: ScheduleStatus,
}

/// External cron evaluator port. The core never parses cron text.
pub trait CronDelegate {
    fn is_due(&self, expression: &str, on: NaiveDate) -> bool;
}

/// Delegate that treats every cron expression as not-due. Used when no
/// evaluator is configured, keeping the due-check total.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDue;

impl CronDelegate for NeverDue {
    fn is_due(&self, _expression: &str, _on: NaiveDate) -> bool {
        false
    }
}

/// Decide whether `spec` is due on `today`.
///
/// Pure and deterministic: identical inputs always yield identical results,
/// so arbitrarily many scheduler workers may call this concurrently.
pub fn is_due_today(spec: &ScheduleSpec, today: NaiveDate, cron: &dyn CronDelegate) -> bool {
    if spec.status != ScheduleStatus::Active {
        return false;
    }
    if let Some(start) = spec.start_date {
        if today < start {
            return false;
        }
    }
    if let Some(end) = spec.end_date {
        if today > end {
            return false;
        }
    }

    match spec.frequency {
        Frequency::Daily => match (spec.interval_days, spec.start_date) {
            (Some(interval), Some(start)) if interval > 1 => {
                (today - start).num_days() % i64::from(interval) == 0
            }
            // No interval, a degenerate interval, or no anchor to compute a
            // modulus from: due every day.
            _ => true,
        },
        Frequency::Weekly => spec
            .days_of_week
            .iter()
            .any(|d| d.matches(today.weekday())),
        Frequency::Monthly => match spec.day_of_month {
            Some(LAST_DAY_OF_MONTH) => today.day() == last_day_of_month(today),
            Some(day) => day > 0 && today.day() == day as u32,
            None => false,
        },
        Frequency::CustomCron => match spec.cron_expression.as_deref() {
            Some(expression) => cron.is_due(expression, today),
            None => false,
        },
    }
}

/// Number of days in `date`'s month, correct across month lengths and leap
/// years.
pub fn last_day_of_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap();
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1).unwrap()
    };
    next_month.checked_sub_days(Days::new(1)).unwrap().day()
}

/// Creation-time integrity check. Evaluation never raises; specs that would
/// dead-end the evaluator are rejected here instead.
pub fn validate_spec(spec: &ScheduleSpec) -> Result<(), SignoffError> {
    if let (Some(start), Some(end)) = (spec.start_date, spec.end_date) {
        if end < start {
            return Err(SignoffError::MalformedSchedule(format!(
                "end date {} precedes start date {}",
                end, start
            )));
        }
    }
    match spec.frequency {
        Frequency::Daily => {
            if spec.interval_days == Some(0) {
                return Err(SignoffError::MalformedSchedule(
                    "DAILY interval must be at least 1".to_string(),
                ));
            }
        }
        Frequency::Weekly => {
            if spec.days_of_week.is_empty() {
                return Err(SignoffError::MalformedSchedule(
                    "WEEKLY schedule requires at least one weekday".to_string(),
                ));
            }
        }
        Frequency::Monthly => match spec.day_of_month {
            None => {
                return Err(SignoffError::MalformedSchedule(
                    "MONTHLY schedule requires a day of month".to_string(),
                ));
            }
            Some(LAST_DAY_OF_MONTH) => {}
            Some(day) if (1..=31).contains(&day) => {}
            Some(day) => {
                return Err(SignoffError::MalformedSchedule(format!(
                    "day of month {} is out of range",
                    day
                )));
            }
        },
        Frequency::CustomCron => {
            let expression = spec.cron_expression.as_deref().unwrap_or("").trim();
            if expression.is_empty() {
                return Err(SignoffError::MalformedSchedule(
                    "CUSTOM_CRON schedule requires an expression".to_string(),
                ));
            }
            // Shape guard only: five or six whitespace-separated fields.
            // Semantics remain the delegate's.
            let shape = Regex::new(r"^\S+(\s+\S+){4,5}$").unwrap();
            if !shape.is_match(expression) {
                return Err(SignoffError::MalformedSchedule(format!(
                    "cron expression '{}' does not have 5-6 fields",
                    expression
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(interval: Option<u32>, start: Option<NaiveDate>) -> ScheduleSpec {
        ScheduleSpec {
            frequency: Frequency::Daily,
            interval_days: interval,
            days_of_week: vec![],
            day_of_month: None,
            cron_expression: None,
            start_date: start,
            end_date: None,
            status: ScheduleStatus::Active,
        }
    }

    struct AlwaysDue;
    impl CronDelegate for AlwaysDue {
        fn is_due(&self, _expression: &str, _on: NaiveDate) -> bool {
            true
        }
    }

    #[test]
    fn evaluation_is_pure() {
        let spec = daily(Some(3), Some(date(2025, 1, 1)));
        let today = date(2025, 1, 7);
        let first = is_due_today(&spec, today, &NeverDue);
        let second = is_due_today(&spec, today, &NeverDue);
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn daily_interval_three_hits_anchor_multiples() {
        let spec = daily(Some(3), Some(date(2025, 1, 1)));
        assert!(is_due_today(&spec, date(2025, 1, 1), &NeverDue));
        assert!(!is_due_today(&spec, date(2025, 1, 2), &NeverDue));
        assert!(!is_due_today(&spec, date(2025, 1, 3), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 1, 4), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 1, 7), &NeverDue));
    }

    #[test]
    fn daily_without_anchor_is_due_every_day() {
        let spec = daily(Some(5), None);
        assert!(is_due_today(&spec, date(2025, 6, 1), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 6, 2), &NeverDue));
    }

    #[test]
    fn daily_unit_interval_is_due_every_day() {
        let spec = daily(Some(1), Some(date(2025, 1, 1)));
        assert!(is_due_today(&spec, date(2025, 1, 1), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 1, 2), &NeverDue));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut spec = daily(None, Some(date(2025, 1, 10)));
        spec.end_date = Some(date(2025, 1, 20));
        assert!(!is_due_today(&spec, date(2025, 1, 9), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 1, 10), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 1, 20), &NeverDue));
        assert!(!is_due_today(&spec, date(2025, 1, 21), &NeverDue));
    }

    #[test]
    fn inactive_statuses_are_never_due() {
        for status in [
            ScheduleStatus::Paused,
            ScheduleStatus::Disabled,
            ScheduleStatus::Completed,
        ] {
            let mut spec = daily(None, Some(date(2025, 1, 1)));
            spec.status = status;
            assert!(!is_due_today(&spec, date(2025, 1, 1), &NeverDue));
        }
    }

    #[test]
    fn weekly_matches_only_selected_weekdays() {
        let spec = ScheduleSpec {
            frequency: Frequency::Weekly,
            interval_days: None,
            days_of_week: vec![DayOfWeek::Monday, DayOfWeek::Wednesday],
            day_of_month: None,
            cron_expression: None,
            start_date: Some(date(2025, 1, 1)),
            end_date: None,
            status: ScheduleStatus::Active,
        };
        // Four-week sample starting Mon 2025-01-06.
        let mut due_days = Vec::new();
        for offset in 0..28 {
            let day = date(2025, 1, 6) + chrono::Duration::days(offset);
            if is_due_today(&spec, day, &NeverDue) {
                due_days.push(day.weekday());
            }
        }
        assert_eq!(due_days.len(), 8);
        assert!(due_days
            .iter()
            .all(|w| *w == Weekday::Mon || *w == Weekday::Wed));
    }

    #[test]
    fn weekly_with_no_days_is_not_due() {
        let spec = ScheduleSpec {
            frequency: Frequency::Weekly,
            interval_days: None,
            days_of_week: vec![],
            day_of_month: None,
            cron_expression: None,
            start_date: None,
            end_date: None,
            status: ScheduleStatus::Active,
        };
        assert!(!is_due_today(&spec, date(2025, 1, 6), &NeverDue));
    }

    #[test]
    fn monthly_fixed_day() {
        let spec = ScheduleSpec {
            frequency: Frequency::Monthly,
            interval_days: None,
            days_of_week: vec![],
            day_of_month: Some(15),
            cron_expression: None,
            start_date: None,
            end_date: None,
            status: ScheduleStatus::Active,
        };
        assert!(is_due_today(&spec, date(2025, 2, 15), &NeverDue));
        assert!(!is_due_today(&spec, date(2025, 2, 14), &NeverDue));
    }

    #[test]
    fn monthly_last_day_sentinel_handles_leap_years() {
        let spec = ScheduleSpec {
            frequency: Frequency::Monthly,
            interval_days: None,
            days_of_week: vec![],
            day_of_month: Some(LAST_DAY_OF_MONTH),
            cron_expression: None,
            start_date: None,
            end_date: None,
            status: ScheduleStatus::Active,
        };
        assert!(is_due_today(&spec, date(2025, 2, 28), &NeverDue));
        assert!(is_due_today(&spec, date(2024, 2, 29), &NeverDue));
        assert!(!is_due_today(&spec, date(2024, 2, 28), &NeverDue));
        assert!(!is_due_today(&spec, date(2025, 2, 27), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 4, 30), &NeverDue));
        assert!(is_due_today(&spec, date(2025, 12, 31), &NeverDue));
    }

    #[test]
    fn monthly_without_day_is_not_due() {
        let spec = ScheduleSpec {
            frequency: Frequency::Monthly,
            interval_days: None,
            days_of_week: vec![],
            day_of_month: None,
            cron_expression: None,
            start_date: None,
            end_date: None,
            status: ScheduleStatus::Active,
        };
        assert!(!is_due_today(&spec, date(2025, 2, 15), &NeverDue));
    }

    #[test]
    fn custom_cron_dispatches_to_delegate() {
        let spec = ScheduleSpec {
            frequency: Frequency::CustomCron,
            interval_days: None,
            days_of_week: vec![],
            day_of_month: None,
            cron_expression: Some("0 6 * * 1".to_string()),
            start_date: None,
            end_date: None,
            status: ScheduleStatus::Active,
        };
        assert!(is_due_today(&spec, date(2025, 1, 6), &AlwaysDue));
        assert!(!is_due_today(&spec, date(2025, 1, 6), &NeverDue));
    }

    #[test]
    fn custom_cron_without_expression_is_not_due() {
        let spec = ScheduleSpec {
            frequency: Frequency::CustomCron,
            interval_days: None,
            days_of_week: vec![],
            day_of_month: None,
            cron_expression: None,
            start_date: None,
            end_date: None,
            status: ScheduleStatus::Active,
        };
        assert!(!is_due_today(&spec, date(2025, 1, 6), &AlwaysDue));
    }

    #[test]
    fn last_day_of_month_table() {
        assert_eq!(last_day_of_month(date(2025, 2, 10)), 28);
        assert_eq!(last_day_of_month(date(2024, 2, 10)), 29);
        assert_eq!(last_day_of_month(date(2025, 4, 1)), 30);
        assert_eq!(last_day_of_month(date(2025, 12, 25)), 31);
    }

    #[test]
    fn validate_rejects_malformed_specs() {
        let weekly_empty = ScheduleSpec {
            frequency: Frequency::Weekly,
            interval_days: None,
            days_of_week: vec![],
            day_of_month: None,
            cron_expression: None,
            start_date: None,
            end_date: None,
            status: ScheduleStatus::Active,
        };
        assert!(matches!(
            validate_spec(&weekly_empty),
            Err(SignoffError::MalformedSchedule(_))
        ));

        let monthly_missing = ScheduleSpec {
            frequency: Frequency::Monthly,
            day_of_month: None,
            ..weekly_empty.clone()
        };
        assert!(matches!(
            validate_spec(&monthly_missing),
            Err(SignoffError::MalformedSchedule(_))
        ));

        let monthly_out_of_range = ScheduleSpec {
            frequency: Frequency::Monthly,
            day_of_month: Some(42),
            ..weekly_empty.clone()
        };
        assert!(matches!(
            validate_spec(&monthly_out_of_range),
            Err(SignoffError::MalformedSchedule(_))
        ));

        let zero_interval = daily(Some(0), Some(date(2025, 1, 1)));
        assert!(matches!(
            validate_spec(&zero_interval),
            Err(SignoffError::MalformedSchedule(_))
        ));

        let bad_cron = ScheduleSpec {
            frequency: Frequency::CustomCron,
            cron_expression: Some("hourly".to_string()),
            ..weekly_empty.clone()
        };
        assert!(matches!(
            validate_spec(&bad_cron),
            Err(SignoffError::MalformedSchedule(_))
        ));

        let inverted_window = ScheduleSpec {
            start_date: Some(date(2025, 2, 1)),
            end_date: Some(date(2025, 1, 1)),
            ..daily(None, None)
        };
        assert!(matches!(
            validate_spec(&inverted_window),
            Err(SignoffError::MalformedSchedule(_))
        ));
    }

    #[test]
    fn validate_accepts_well_formed_specs() {
        assert!(validate_spec(&daily(Some(3), Some(date(2025, 1, 1)))).is_ok());
        let cron = ScheduleSpec {
            frequency: Frequency::CustomCron,
            cron_expression: Some("0 6 * * 1".to_string()),
            ..daily(None, None)
        };
        assert!(validate_spec(&cron).is_ok());
        let last_day = ScheduleSpec {
            frequency: Frequency::Monthly,
            day_of_month: Some(LAST_DAY_OF_MONTH),
            ..daily(None, None)
        };
        assert!(validate_spec(&last_day).is_ok());
    }
}
