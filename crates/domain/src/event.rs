use crate::{
    date,
    event_instance::EventInstance,
    recurrence::{Frequency, RecurrenceRule, WeekdayCode},
    shared::entity::{Entity, ID},
};
use chrono::{prelude::*, Duration};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Medical,
    School,
    Activity,
    Sports,
    Work,
    Personal,
    Birthday,
    General,
}

impl Default for EventCategory {
    fn default() -> Self {
        Self::General
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub member_id: ID,
    pub name: String,
}

/// A family member known to the scheduling core, used to resolve
/// attendee display names in conflict messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: ID,
    pub name: String,
}

/// A normalized calendar event. The surrounding application resolves
/// its storage shape into this form once at the boundary; the core
/// only ever reads events and emits new candidate occurrence records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: ID,
    pub title: String,
    pub start_ts: i64,
    /// Must be >= `start_ts`
    pub end_ts: i64,
    pub location: Option<String>,
    pub category: EventCategory,
    pub attendees: Vec<Attendee>,
    pub recurrence: Option<RecurrenceRule>,
    /// Exception dates for a recurring series, compared date-only
    pub exdates: Vec<i64>,
    /// Set on generated members of a recurring series
    pub parent_event_id: Option<ID>,
    pub occurrence_ts: Option<i64>,
}

impl Entity for CalendarEvent {
    fn id(&self) -> &ID {
        &self.id
    }
}

/// Bounds for occurrence expansion of rules with neither count nor
/// until; prevents unbounded generation.
#[derive(Debug, Clone)]
pub struct ExpansionLimits {
    pub safety_cap: u32,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self { safety_cap: 100 }
    }
}

impl CalendarEvent {
    pub fn new(title: &str, start_ts: i64, end_ts: i64) -> Self {
        Self {
            id: Default::default(),
            title: title.to_string(),
            start_ts,
            end_ts,
            location: None,
            category: Default::default(),
            attendees: Vec::new(),
            recurrence: None,
            exdates: Vec::new(),
            parent_event_id: None,
            occurrence_ts: None,
        }
    }

    pub fn duration(&self) -> i64 {
        self.end_ts - self.start_ts
    }

    /// Generates the concrete occurrences of this event's recurrence
    /// rule, base event excluded. Every occurrence keeps the base
    /// duration. Exception dates are skipped on a date-only match and
    /// do not count toward the rule's count or the safety cap.
    pub fn expand_occurrences(&self, limits: &ExpansionLimits, tz: &Tz) -> Vec<EventInstance> {
        let rule = match &self.recurrence {
            Some(rule) => rule,
            None => return Vec::new(),
        };
        let freq = match rule.frequency() {
            Some(freq) => freq,
            None => return Vec::new(),
        };

        let duration = self.duration();
        let cap = limits.safety_cap as usize;
        let interval = rule.interval().max(1);
        let base_local = date::local_datetime(self.start_ts, tz);
        let until_local = rule.until().map(|ts| date::local_datetime(ts, tz));
        let exception_days: HashSet<NaiveDate> = self
            .exdates
            .iter()
            .map(|ts| date::local_datetime(*ts, tz).date())
            .collect();

        let mut occurrences: Vec<EventInstance> = Vec::new();
        // Generated instants so far, with the base event counting as
        // the first one toward the rule's count.
        let mut tally: u32 = 1;

        let done = |occurrences: &Vec<EventInstance>, tally: u32| {
            occurrences.len() >= cap || rule.count().map_or(false, |count| tally >= count)
        };

        if freq == Frequency::Weekly && !rule.by_day().is_empty() {
            // Day-by-day scan accepting the requested weekdays, with
            // the interval applying to week boundaries.
            let base_week = week_index(base_local.date());
            let mut current = base_local;
            let max_steps = 7 * interval * (cap as i64 + self.exdates.len() as i64 + 2);
            for _ in 0..max_steps {
                if done(&occurrences, tally) {
                    break;
                }
                current = current + Duration::days(1);
                if let Some(until) = until_local {
                    if current > until {
                        break;
                    }
                }
                let weekday = WeekdayCode::from_chrono(current.date().weekday());
                if !rule.by_day().contains(&weekday) {
                    continue;
                }
                if interval > 1
                    && (week_index(current.date()) - base_week).rem_euclid(interval) != 0
                {
                    continue;
                }
                if exception_days.contains(&current.date()) {
                    continue;
                }
                if let Some(start_ts) = date::local_to_millis(tz, &current) {
                    occurrences.push(EventInstance {
                        start_ts,
                        end_ts: start_ts + duration,
                    });
                    tally += 1;
                }
            }
        } else {
            // Plain frequency stepping from the base start. Steps are
            // computed from the base each time so that clamped months
            // (Jan 31 -> Feb 28) do not drift.
            let max_steps = cap as i64 + self.exdates.len() as i64 + 2;
            for step in 1..=max_steps {
                if done(&occurrences, tally) {
                    break;
                }
                let current = match freq {
                    Frequency::Daily => base_local + Duration::days(interval * step),
                    Frequency::Weekly => base_local + Duration::days(7 * interval * step),
                    Frequency::Monthly => date::add_months(&base_local, interval * step),
                    Frequency::Yearly => date::add_years(&base_local, interval * step),
                };
                if let Some(until) = until_local {
                    if current > until {
                        break;
                    }
                }
                if exception_days.contains(&current.date()) {
                    continue;
                }
                if let Some(start_ts) = date::local_to_millis(tz, &current) {
                    occurrences.push(EventInstance {
                        start_ts,
                        end_ts: start_ts + duration,
                    });
                    tally += 1;
                }
            }
        }

        occurrences
    }
}

/// Index of the Sunday-started week containing `date`, relative to a
/// fixed Sunday epoch.
fn week_index(date: NaiveDate) -> i64 {
    let sunday_epoch = NaiveDate::from_ymd(1970, 1, 4);
    date.signed_duration_since(sunday_epoch)
        .num_days()
        .div_euclid(7)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono_tz::UTC;

    fn daily_event(count: Option<i64>) -> CalendarEvent {
        let start_ts = Utc.ymd(2025, 3, 3).and_hms(14, 0, 0).timestamp_millis();
        let mut event = CalendarEvent::new("Swim practice", start_ts, start_ts + 1000 * 60 * 60);
        let mut rule = RecurrenceRule::new();
        rule.set_frequency("DAILY");
        if let Some(count) = count {
            rule.set_count(count);
        }
        event.recurrence = Some(rule);
        event
    }

    #[test]
    fn base_event_is_excluded_from_occurrences() {
        let event = daily_event(Some(4));
        let occurrences = event.expand_occurrences(&Default::default(), &UTC);
        assert_eq!(occurrences.len(), 3);
        assert_eq!(
            occurrences[0].start_ts,
            Utc.ymd(2025, 3, 4).and_hms(14, 0, 0).timestamp_millis()
        );
    }

    #[test]
    fn occurrences_preserve_duration() {
        let event = daily_event(Some(10));
        for occurrence in event.expand_occurrences(&Default::default(), &UTC) {
            assert_eq!(occurrence.duration(), event.duration());
        }
    }

    #[test]
    fn exception_dates_are_skipped_without_consuming_count() {
        let mut event = daily_event(Some(4));
        // March 4th is excluded, date-only comparison: the timestamp
        // carries a different clock time than the event start.
        event.exdates = vec![Utc.ymd(2025, 3, 4).and_hms(9, 30, 0).timestamp_millis()];
        let occurrences = event.expand_occurrences(&Default::default(), &UTC);
        assert_eq!(occurrences.len(), 3);
        let days: Vec<u32> = occurrences
            .iter()
            .map(|o| Utc.timestamp_millis(o.start_ts).day())
            .collect();
        assert_eq!(days, vec![5, 6, 7]);
    }

    #[test]
    fn unbounded_rule_stops_at_safety_cap() {
        let event = daily_event(None);
        let occurrences = event.expand_occurrences(&Default::default(), &UTC);
        assert_eq!(occurrences.len(), 100);

        let occurrences = event.expand_occurrences(&ExpansionLimits { safety_cap: 7 }, &UTC);
        assert_eq!(occurrences.len(), 7);
    }

    #[test]
    fn until_bounds_the_series() {
        let mut event = daily_event(None);
        if let Some(rule) = event.recurrence.as_mut() {
            rule.set_until_ts(Utc.ymd(2025, 3, 6).and_hms(23, 59, 59).timestamp_millis());
        }
        let occurrences = event.expand_occurrences(&Default::default(), &UTC);
        assert_eq!(occurrences.len(), 3);
    }

    #[test]
    fn weekly_by_day_lands_on_requested_weekdays() {
        // 2025-03-03 is a Monday
        let start_ts = Utc.ymd(2025, 3, 3).and_hms(10, 0, 0).timestamp_millis();
        let mut event = CalendarEvent::new("Soccer", start_ts, start_ts + 1000 * 60 * 90);
        let mut rule = RecurrenceRule::new();
        rule.set_frequency("WEEKLY")
            .add_by_day(&["MO", "WE", "FR"])
            .set_count(4);
        event.recurrence = Some(rule);

        let occurrences = event.expand_occurrences(&Default::default(), &UTC);
        assert_eq!(occurrences.len(), 3);
        let dates: Vec<(u32, Weekday)> = occurrences
            .iter()
            .map(|o| {
                let dt = Utc.timestamp_millis(o.start_ts);
                (dt.day(), dt.weekday())
            })
            .collect();
        assert_eq!(
            dates,
            vec![
                (5, Weekday::Wed),
                (7, Weekday::Fri),
                (10, Weekday::Mon),
            ]
        );
    }

    #[test]
    fn biweekly_by_day_skips_off_weeks() {
        // 2025-03-03 is a Monday
        let start_ts = Utc.ymd(2025, 3, 3).and_hms(10, 0, 0).timestamp_millis();
        let mut event = CalendarEvent::new("Cleaning", start_ts, start_ts + 1000 * 60 * 30);
        let mut rule = RecurrenceRule::new();
        rule.set_frequency("WEEKLY")
            .set_interval(2)
            .add_by_day(&["MO"])
            .set_count(3);
        event.recurrence = Some(rule);

        let occurrences = event.expand_occurrences(&Default::default(), &UTC);
        let days: Vec<u32> = occurrences
            .iter()
            .map(|o| Utc.timestamp_millis(o.start_ts).day())
            .collect();
        assert_eq!(days, vec![17, 31]);
    }

    #[test]
    fn monthly_stepping_clamps_short_months() {
        let start_ts = Utc.ymd(2025, 1, 31).and_hms(12, 0, 0).timestamp_millis();
        let mut event = CalendarEvent::new("Rent", start_ts, start_ts + 1000 * 60 * 15);
        let mut rule = RecurrenceRule::new();
        rule.set_frequency("MONTHLY").set_count(4);
        event.recurrence = Some(rule);

        let occurrences = event.expand_occurrences(&Default::default(), &UTC);
        let dates: Vec<(u32, u32)> = occurrences
            .iter()
            .map(|o| {
                let dt = Utc.timestamp_millis(o.start_ts);
                (dt.month(), dt.day())
            })
            .collect();
        assert_eq!(dates, vec![(2, 28), (3, 31), (4, 30)]);
    }

    #[test]
    fn event_without_recurrence_has_no_occurrences() {
        let start_ts = Utc.ymd(2025, 3, 3).and_hms(14, 0, 0).timestamp_millis();
        let event = CalendarEvent::new("Dentist", start_ts, start_ts + 1000 * 60 * 45);
        assert!(event.expand_occurrences(&Default::default(), &UTC).is_empty());
    }
}
