//! Meeting progression for products that meet on fixed weekdays.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{DayOfWeek, Product};

/// Total reported when a product has no meetings count configured.
pub const DEFAULT_MEETINGS_COUNT: u32 = 10;

/// "current / total" meetings held as of a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingProgress {
    pub current: u32,
    pub total: u32,
}

/// The scheduling fields of a product.
#[derive(Debug, Clone, Copy)]
pub struct Schedule<'a> {
    pub start_date: Option<NaiveDate>,
    pub meetings_count: Option<u32>,
    pub days_of_week: &'a [DayOfWeek],
}

impl<'a> Schedule<'a> {
    pub fn of(product: &'a Product) -> Self {
        Self {
            start_date: product.start_date,
            meetings_count: product.meetings_count,
            days_of_week: &product.days_of_week,
        }
    }

    /// Start date, meeting count and weekdays, when all are configured.
    fn complete(&self) -> Option<(NaiveDate, u32)> {
        let start = self.start_date?;
        let total = self.meetings_count.filter(|n| *n > 0)?;
        if self.days_of_week.is_empty() {
            return None;
        }
        Some((start, total))
    }

    fn meets_on(&self, day: NaiveDate) -> bool {
        let weekday = day.weekday();
        self.days_of_week.iter().any(|d| d.matches(weekday))
    }
}

/// Count meetings held from the start date up to and including `as_of`.
pub fn calculate_meeting_progress(schedule: &Schedule<'_>, as_of: NaiveDate) -> MeetingProgress {
    let Some((start, total)) = schedule.complete() else {
        return MeetingProgress {
            current: 0,
            total: schedule.meetings_count.unwrap_or(DEFAULT_MEETINGS_COUNT),
        };
    };

    if as_of < start {
        return MeetingProgress { current: 0, total };
    }

    let mut current = 0;
    let mut day = start;
    while day <= as_of && current < total {
        if schedule.meets_on(day) {
            current += 1;
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    MeetingProgress {
        current: current.min(total),
        total,
    }
}

/// Date of the last meeting, or `None` when the schedule is incomplete.
pub fn calculate_end_date(schedule: &Schedule<'_>) -> Option<NaiveDate> {
    let (start, total) = schedule.complete()?;

    let mut held = 0;
    let mut day = start;
    loop {
        if schedule.meets_on(day) {
            held += 1;
            if held == total {
                return Some(day);
            }
        }
        day = day.succ_opt()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const SUN_WED: &[DayOfWeek] = &[DayOfWeek::Sunday, DayOfWeek::Wednesday];

    fn sun_wed(meetings: u32) -> Schedule<'static> {
        Schedule {
            start_date: Some(date(2025, 1, 5)),
            meetings_count: Some(meetings),
            days_of_week: SUN_WED,
        }
    }

    #[test]
    fn test_progress_counts_scheduled_weekdays() {
        // Meetings on Jan 5, 8, 12 and 15.
        let progress = calculate_meeting_progress(&sun_wed(4), date(2025, 1, 15));
        assert_eq!(progress, MeetingProgress { current: 4, total: 4 });

        let progress = calculate_meeting_progress(&sun_wed(4), date(2025, 1, 14));
        assert_eq!(progress, MeetingProgress { current: 3, total: 4 });
    }

    #[test]
    fn test_progress_on_start_date_counts_first_meeting() {
        let progress = calculate_meeting_progress(&sun_wed(4), date(2025, 1, 5));
        assert_eq!(progress.current, 1);
    }

    #[test]
    fn test_progress_before_start() {
        let progress = calculate_meeting_progress(&sun_wed(8), date(2024, 12, 31));
        assert_eq!(progress, MeetingProgress { current: 0, total: 8 });
    }

    #[test]
    fn test_progress_saturates_at_meetings_count() {
        let schedule = sun_wed(4);
        let mut previous = 0;
        for offset in 0..120 {
            let as_of = date(2025, 1, 5) + chrono::Duration::days(offset);
            let progress = calculate_meeting_progress(&schedule, as_of);
            assert!(progress.current >= previous);
            assert!(progress.current <= 4);
            previous = progress.current;
        }
        assert_eq!(previous, 4);
    }

    #[test]
    fn test_incomplete_schedule_falls_back() {
        let no_days = Schedule {
            start_date: Some(date(2025, 1, 5)),
            meetings_count: Some(6),
            days_of_week: &[],
        };
        assert_eq!(
            calculate_meeting_progress(&no_days, date(2025, 3, 1)),
            MeetingProgress { current: 0, total: 6 }
        );

        let no_count = Schedule {
            start_date: Some(date(2025, 1, 5)),
            meetings_count: None,
            days_of_week: SUN_WED,
        };
        assert_eq!(
            calculate_meeting_progress(&no_count, date(2025, 3, 1)),
            MeetingProgress {
                current: 0,
                total: DEFAULT_MEETINGS_COUNT
            }
        );

        let no_start = Schedule {
            start_date: None,
            meetings_count: Some(12),
            days_of_week: SUN_WED,
        };
        assert_eq!(
            calculate_meeting_progress(&no_start, date(2025, 3, 1)),
            MeetingProgress { current: 0, total: 12 }
        );
    }

    #[test]
    fn test_end_date_is_last_meeting() {
        assert_eq!(calculate_end_date(&sun_wed(4)), Some(date(2025, 1, 15)));
        assert_eq!(calculate_end_date(&sun_wed(1)), Some(date(2025, 1, 5)));

        // Start date not on a meeting day: first meeting is the following Sunday.
        let schedule = Schedule {
            start_date: Some(date(2025, 1, 6)),
            meetings_count: Some(2),
            days_of_week: &[DayOfWeek::Sunday],
        };
        assert_eq!(calculate_end_date(&schedule), Some(date(2025, 1, 19)));
    }

    #[test]
    fn test_end_date_requires_complete_schedule() {
        let schedule = Schedule {
            start_date: Some(date(2025, 1, 5)),
            meetings_count: Some(0),
            days_of_week: SUN_WED,
        };
        assert_eq!(calculate_end_date(&schedule), None);
    }
}
