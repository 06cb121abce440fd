use crate::{
    date,
    event::{CalendarEvent, EventCategory},
    travel::{TrafficConditions, TravelTimeEstimator},
};
use chrono::prelude::*;
use chrono_tz::Tz;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// All reminder offsets are minutes before the event start.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReminders {
    pub enabled: bool,
    pub offsets: Vec<i64>,
}

impl CategoryReminders {
    fn with_offsets(offsets: Vec<i64>) -> Self {
        Self {
            enabled: true,
            offsets,
        }
    }
}

/// Window during which no reminders fire. The window may span
/// midnight, e.g. 22:00 to 08:00.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TravelTimeReminders {
    pub enabled: bool,
    /// Used when no travel estimate is available for the event
    pub default_minutes: i64,
}

impl Default for TravelTimeReminders {
    fn default() -> Self {
        Self {
            enabled: true,
            default_minutes: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowUps {
    pub missed: bool,
    pub completed: bool,
}

impl Default for FollowUps {
    fn default() -> Self {
        Self {
            missed: true,
            completed: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPreferences {
    pub enabled: bool,
    /// When set, offsets come from category heuristics instead of the
    /// per-category lists
    pub smart_reminders: bool,
    pub categories: HashMap<EventCategory, CategoryReminders>,
    pub quiet_hours: QuietHours,
    pub travel_time: TravelTimeReminders,
    pub follow_ups: FollowUps,
}

impl Default for ReminderPreferences {
    fn default() -> Self {
        let mut categories = HashMap::new();
        categories.insert(
            EventCategory::Medical,
            CategoryReminders::with_offsets(vec![24 * 60, 60]),
        );
        categories.insert(
            EventCategory::School,
            CategoryReminders::with_offsets(vec![12 * 60, 60]),
        );
        categories.insert(
            EventCategory::Activity,
            CategoryReminders::with_offsets(vec![60, 15]),
        );
        categories.insert(
            EventCategory::Sports,
            CategoryReminders::with_offsets(vec![60, 15]),
        );
        categories.insert(
            EventCategory::Work,
            CategoryReminders::with_offsets(vec![30, 5]),
        );
        categories.insert(
            EventCategory::Birthday,
            CategoryReminders::with_offsets(vec![24 * 60]),
        );
        categories.insert(
            EventCategory::Personal,
            CategoryReminders::with_offsets(vec![15]),
        );
        categories.insert(
            EventCategory::General,
            CategoryReminders::with_offsets(vec![15]),
        );
        Self {
            enabled: true,
            smart_reminders: false,
            categories,
            quiet_hours: QuietHours::default(),
            travel_time: TravelTimeReminders::default(),
            follow_ups: FollowUps::default(),
        }
    }
}

const BASE_SMART_OFFSET: i64 = 15;
const NIGHT_BEFORE_OFFSET: i64 = 12 * 60;
const TRAVEL_BUFFER_MINUTES: i64 = 15;

/// Computes the reminder offsets that should fire for `event`, in
/// minutes before its start, sorted largest first. Offsets whose fire
/// time is already past or lands inside quiet hours are dropped.
///
/// `origin` is where travel to the event would start from, when known.
pub fn compute_reminder_offsets(
    event: &CalendarEvent,
    prefs: &ReminderPreferences,
    estimator: &mut TravelTimeEstimator,
    origin: Option<&str>,
    now_ts: i64,
    tz: &Tz,
) -> Vec<i64> {
    if !prefs.enabled {
        return Vec::new();
    }

    let mut offsets: Vec<i64> = Vec::new();

    if prefs.smart_reminders {
        offsets.push(BASE_SMART_OFFSET);
        match event.category {
            EventCategory::Medical => {
                offsets.push(60);
                offsets.push(24 * 60);
            }
            EventCategory::School => offsets.push(12 * 60),
            EventCategory::Activity => offsets.push(30),
            EventCategory::Work => {
                offsets.push(5);
                offsets.push(30);
            }
            _ => {}
        }

        if prefs.travel_time.enabled && event.location.is_some() {
            let estimate = estimator.estimate(origin, event.location.as_deref(), event.start_ts);
            let minutes = if estimate.traffic == TrafficConditions::NoData {
                prefs.travel_time.default_minutes
            } else {
                estimate.minutes
            };
            offsets.push(minutes + TRAVEL_BUFFER_MINUTES);
        }

        // Morning events get a heads-up the evening before
        let starts_early = date::local_hour(event.start_ts, tz) < 9;
        let far_enough_out = event.start_ts - now_ts > NIGHT_BEFORE_OFFSET * 60 * 1000;
        if starts_early && far_enough_out {
            offsets.push(NIGHT_BEFORE_OFFSET);
        }
    } else {
        match prefs.categories.get(&event.category) {
            Some(category) if category.enabled => offsets.extend(&category.offsets),
            _ => {}
        }
    }

    offsets
        .into_iter()
        .unique()
        .sorted_by(|a, b| b.cmp(a))
        .filter(|offset| {
            let fire_ts = event.start_ts - offset * 60 * 1000;
            fire_ts > now_ts && !in_quiet_hours(fire_ts, &prefs.quiet_hours, tz)
        })
        .collect()
}

fn in_quiet_hours(ts: i64, quiet_hours: &QuietHours, tz: &Tz) -> bool {
    if !quiet_hours.enabled {
        return false;
    }
    let (start, end) = match (
        date::parse_clock_time(&quiet_hours.start),
        date::parse_clock_time(&quiet_hours.end),
    ) {
        (Ok(start), Ok(end)) => (start, end),
        _ => return false,
    };
    let local = date::local_datetime(ts, tz);
    let minute_of_day = local.hour() * 60 + local.minute();
    if start <= end {
        minute_of_day >= start && minute_of_day < end
    } else {
        minute_of_day >= start || minute_of_day < end
    }
}
