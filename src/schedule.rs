//! Declarative weekday → categories table.
//!
//! The editorial calendar runs on a fixed UTC offset (UTC+9 by default), so
//! a run at 23:30 UTC on a Sunday is a Monday run.

use crate::config::ScheduleSettings;
use crate::models::Category;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Schedule {
    offset: FixedOffset,
    days: HashMap<Weekday, Vec<Category>>,
    default: Vec<Category>,
}

impl Schedule {
    pub fn new(offset: FixedOffset, days: HashMap<Weekday, Vec<Category>>, default: Vec<Category>) -> Self {
        Self { offset, days, default }
    }

    /// Build from settings. Unknown day names are logged and ignored.
    pub fn from_settings(settings: &ScheduleSettings, utc_offset_hours: i32) -> Self {
        let days = settings
            .days
            .iter()
            .filter_map(|(name, categories)| match name.parse::<Weekday>() {
                Ok(day) => Some((day, categories.clone())),
                Err(_) => {
                    warn!(day = %name, "Ignoring unknown weekday in schedule");
                    None
                }
            })
            .collect();
        Self::new(offset_from_hours(utc_offset_hours), days, settings.default.clone())
    }

    /// Categories to run, in order, for the editorial day containing `now`.
    pub fn categories_for(&self, now: DateTime<Utc>) -> &[Category] {
        let weekday = now.with_timezone(&self.offset).weekday();
        self.days.get(&weekday).unwrap_or(&self.default)
    }

    /// The editorial calendar date containing `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from_settings(&ScheduleSettings::default(), 9)
    }
}

fn offset_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| {
        warn!(hours, "UTC offset out of range; using UTC");
        Utc.fix()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_monday_runs_tech_only() {
        let schedule = Schedule::default();
        // 2025-05-05 is a Monday.
        assert_eq!(schedule.categories_for(utc(2025, 5, 5, 3, 0)), &[Category::Tech]);
    }

    #[test]
    fn test_other_days_run_bio_then_patent() {
        let schedule = Schedule::default();
        for day in 6..=11 {
            assert_eq!(
                schedule.categories_for(utc(2025, 5, day, 3, 0)),
                &[Category::Bio, Category::Patent],
                "day {day}"
            );
        }
    }

    #[test]
    fn test_weekday_is_taken_in_utc_plus_nine() {
        let schedule = Schedule::default();
        // Sunday 16:00 UTC is Monday 01:00 in UTC+9.
        assert_eq!(schedule.categories_for(utc(2025, 5, 4, 16, 0)), &[Category::Tech]);
        // Monday 15:00 UTC is already Tuesday in UTC+9.
        assert_eq!(
            schedule.categories_for(utc(2025, 5, 5, 15, 0)),
            &[Category::Bio, Category::Patent]
        );
        assert_eq!(
            schedule.local_date(utc(2025, 5, 4, 16, 0)),
            NaiveDate::from_ymd_opt(2025, 5, 5).unwrap()
        );
    }

    #[test]
    fn test_custom_table_and_bad_day_names() {
        let settings = ScheduleSettings {
            default: vec![Category::Tech],
            days: [
                ("Friday".to_string(), vec![Category::Patent]),
                ("someday".to_string(), vec![Category::Bio]),
            ]
            .into_iter()
            .collect(),
        };
        let schedule = Schedule::from_settings(&settings, 0);
        // 2025-05-09 is a Friday.
        assert_eq!(schedule.categories_for(utc(2025, 5, 9, 12, 0)), &[Category::Patent]);
        assert_eq!(schedule.categories_for(utc(2025, 5, 8, 12, 0)), &[Category::Tech]);
    }
}
