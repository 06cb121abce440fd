use crate::{
    date,
    event::{CalendarEvent, EventCategory, FamilyMember},
    event_instance::EventInstance,
    shared::entity::ID,
    travel::{TrafficConditions, TravelTimeEstimator},
};
use chrono::{prelude::*, Duration};
use chrono_tz::Tz;
use serde::Serialize;

/// Half-open interval overlap between two events; touching endpoints
/// do not conflict.
pub fn events_overlap(event1: &CalendarEvent, event2: &CalendarEvent) -> bool {
    event1.start_ts < event2.end_ts && event1.end_ts > event2.start_ts
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeConflict {
    pub event_id: ID,
    pub title: String,
    pub severity: ConflictSeverity,
    pub shared_attendees: Vec<String>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TravelConflict {
    /// The event travelled from
    pub from_event_id: ID,
    /// The event travelled to
    pub to_event_id: ID,
    pub origin: String,
    pub destination: String,
    pub required_minutes: i64,
    pub available_minutes: i64,
    pub shortfall_minutes: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConflict {
    pub event_id: ID,
    pub title: String,
    /// The shared location, as written on the existing event
    pub resource: String,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    DinnerTime,
    LateForChildren,
    BackToBack,
    BusySlot,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Suggestion {
    #[serde(rename_all = "camelCase")]
    AlternativeSlot {
        start_ts: i64,
        end_ts: i64,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    AlternativeDay {
        date: String,
        start_ts: i64,
        event_count: usize,
        reason: String,
    },
}

/// Result of evaluating one candidate event against the existing set.
/// Recomputed on demand, never stored.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub time_conflicts: Vec<TimeConflict>,
    pub travel_conflicts: Vec<TravelConflict>,
    pub resource_conflicts: Vec<ResourceConflict>,
    pub warnings: Vec<Warning>,
    pub suggestions: Vec<Suggestion>,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.time_conflicts.is_empty()
            || !self.travel_conflicts.is_empty()
            || !self.resource_conflicts.is_empty()
    }
}

/// Tunable thresholds for the heuristic warnings and suggestions.
#[derive(Debug, Clone)]
pub struct ConflictPolicy {
    /// More than this many time overlaps flags a busy slot
    pub busy_overlap_threshold: usize,
    /// Local (hour, minute) slots tried for same-day alternatives
    pub candidate_slots: Vec<(u32, u32)>,
    pub max_slot_suggestions: usize,
    /// Days scanned ahead for alternative-day suggestions
    pub day_lookahead: i64,
    /// Days with this many events or more are not suggested
    pub busy_day_threshold: usize,
    pub max_day_suggestions: usize,
    /// Two located events further apart than this are not treated as
    /// adjacent for travel checks
    pub adjacency_window_minutes: i64,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            busy_overlap_threshold: 2,
            candidate_slots: vec![(9, 0), (10, 30), (13, 0), (15, 0), (16, 30)],
            max_slot_suggestions: 3,
            day_lookahead: 7,
            busy_day_threshold: 3,
            max_day_suggestions: 2,
            adjacency_window_minutes: 180,
        }
    }
}

pub struct ConflictDetector {
    policy: ConflictPolicy,
    tz: Tz,
    travel: TravelTimeEstimator,
}

impl ConflictDetector {
    pub fn new(policy: ConflictPolicy, tz: Tz) -> Self {
        Self {
            policy,
            travel: TravelTimeEstimator::new(tz),
            tz,
        }
    }

    /// Evaluates `candidate` against `existing`. A candidate being
    /// updated excludes its own persisted copy by identifier. `now_ts`
    /// anchors the "in the future" filter on suggestions.
    pub fn detect(
        &mut self,
        candidate: &CalendarEvent,
        existing: &[CalendarEvent],
        members: &[FamilyMember],
        now_ts: i64,
    ) -> ConflictReport {
        let mut report = ConflictReport::default();

        let same_day: Vec<&CalendarEvent> = existing
            .iter()
            .filter(|event| {
                event.id != candidate.id
                    && date::same_calendar_day(event.start_ts, candidate.start_ts, &self.tz)
            })
            .collect();

        for other in &same_day {
            if !events_overlap(candidate, other) {
                continue;
            }

            let shared = shared_attendee_names(candidate, other, members);
            let (severity, message) = if shared.is_empty() {
                (
                    ConflictSeverity::Medium,
                    format!("Time conflict with '{}'", other.title),
                )
            } else {
                (
                    ConflictSeverity::High,
                    format!(
                        "{} is double-booked between '{}' and '{}'",
                        shared.join(", "),
                        candidate.title,
                        other.title
                    ),
                )
            };
            report.time_conflicts.push(TimeConflict {
                event_id: other.id.clone(),
                title: other.title.clone(),
                severity,
                shared_attendees: shared,
                message,
            });

            if let (Some(candidate_loc), Some(other_loc)) = (&candidate.location, &other.location) {
                if !candidate_loc.trim().is_empty()
                    && normalize_location(candidate_loc) == normalize_location(other_loc)
                {
                    report.resource_conflicts.push(ResourceConflict {
                        event_id: other.id.clone(),
                        title: other.title.clone(),
                        resource: other_loc.trim().to_string(),
                    });
                }
            }
        }

        self.detect_travel_conflicts(candidate, &same_day, &mut report);
        self.add_warnings(candidate, &mut report);
        self.add_suggestions(candidate, existing, &same_day, now_ts, &mut report);

        report
    }

    fn detect_travel_conflicts(
        &mut self,
        candidate: &CalendarEvent,
        same_day: &[&CalendarEvent],
        report: &mut ConflictReport,
    ) {
        let candidate_loc = match &candidate.location {
            Some(loc) if !loc.trim().is_empty() => loc,
            _ => return,
        };

        for other in same_day {
            let other_loc = match &other.location {
                Some(loc) if !loc.trim().is_empty() => loc,
                _ => continue,
            };

            // Events must be sequential: one ends before the other starts.
            let (first, second, origin, destination) = if other.end_ts <= candidate.start_ts {
                (*other, candidate, other_loc, candidate_loc)
            } else if candidate.end_ts <= other.start_ts {
                (candidate, *other, candidate_loc, other_loc)
            } else {
                continue;
            };

            let gap_minutes = (second.start_ts - first.end_ts) / (1000 * 60);
            if gap_minutes > self.policy.adjacency_window_minutes {
                continue;
            }

            let estimate =
                self.travel
                    .estimate(Some(origin.as_str()), Some(destination.as_str()), first.end_ts);
            if estimate.traffic == TrafficConditions::NoData {
                continue;
            }

            if estimate.minutes > gap_minutes {
                report.travel_conflicts.push(TravelConflict {
                    from_event_id: first.id.clone(),
                    to_event_id: second.id.clone(),
                    origin: origin.clone(),
                    destination: destination.clone(),
                    required_minutes: estimate.minutes,
                    available_minutes: gap_minutes,
                    shortfall_minutes: estimate.minutes - gap_minutes,
                });
            }
        }
    }

    fn add_warnings(&self, candidate: &CalendarEvent, report: &mut ConflictReport) {
        let start_hour = date::local_hour(candidate.start_ts, &self.tz);

        if (17..19).contains(&start_hour) {
            report.warnings.push(Warning {
                kind: WarningKind::DinnerTime,
                message: "This event falls during typical dinner time (17:00-19:00)".to_string(),
            });
        }

        let childrens_category = matches!(
            candidate.category,
            EventCategory::School | EventCategory::Sports | EventCategory::Birthday
        );
        if start_hour >= 20 && childrens_category {
            report.warnings.push(Warning {
                kind: WarningKind::LateForChildren,
                message: "Late evening start for a children's event".to_string(),
            });
        }

        if !report.travel_conflicts.is_empty() {
            report.warnings.push(Warning {
                kind: WarningKind::BackToBack,
                message: "Back-to-back events without enough travel time in between".to_string(),
            });
        }

        if report.time_conflicts.len() > self.policy.busy_overlap_threshold {
            report.warnings.push(Warning {
                kind: WarningKind::BusySlot,
                message: "This time slot is already very busy".to_string(),
            });
        }
    }

    fn add_suggestions(
        &self,
        candidate: &CalendarEvent,
        existing: &[CalendarEvent],
        same_day: &[&CalendarEvent],
        now_ts: i64,
        report: &mut ConflictReport,
    ) {
        if !report.time_conflicts.is_empty() {
            let duration = candidate.duration();
            let local_date = date::local_datetime(candidate.start_ts, &self.tz).date();
            let mut slots_added = 0;

            for (hour, minute) in &self.policy.candidate_slots {
                if slots_added >= self.policy.max_slot_suggestions {
                    break;
                }
                let local = local_date.and_hms(*hour, *minute, 0);
                let start_ts = match date::local_to_millis(&self.tz, &local) {
                    Some(ts) => ts,
                    None => continue,
                };
                if start_ts <= now_ts {
                    continue;
                }
                let slot = EventInstance {
                    start_ts,
                    end_ts: start_ts + duration,
                };
                let free = same_day.iter().all(|event| {
                    !EventInstance::has_overlap(
                        &slot,
                        &EventInstance {
                            start_ts: event.start_ts,
                            end_ts: event.end_ts,
                        },
                    )
                });
                if free {
                    report.suggestions.push(Suggestion::AlternativeSlot {
                        start_ts: slot.start_ts,
                        end_ts: slot.end_ts,
                        reason: "No conflicting events at this time".to_string(),
                    });
                    slots_added += 1;
                }
            }
        }

        let busy_slot = report
            .warnings
            .iter()
            .any(|warning| warning.kind == WarningKind::BusySlot);
        if busy_slot {
            let base_local = date::local_datetime(candidate.start_ts, &self.tz);
            let mut day_counts: Vec<(chrono::NaiveDateTime, usize)> = Vec::new();

            for offset in 1..=self.policy.day_lookahead {
                let day_local = base_local + Duration::days(offset);
                let count = existing
                    .iter()
                    .filter(|event| {
                        event.id != candidate.id
                            && date::local_datetime(event.start_ts, &self.tz).date()
                                == day_local.date()
                    })
                    .count();
                if count < self.policy.busy_day_threshold {
                    day_counts.push((day_local, count));
                }
            }

            day_counts.sort_by_key(|(_, count)| *count);
            for (day_local, count) in day_counts.into_iter().take(self.policy.max_day_suggestions)
            {
                let start_ts = match date::local_to_millis(&self.tz, &day_local) {
                    Some(ts) => ts,
                    None => continue,
                };
                report.suggestions.push(Suggestion::AlternativeDay {
                    date: format!(
                        "{}-{}-{}",
                        day_local.year(),
                        day_local.month(),
                        day_local.day()
                    ),
                    start_ts,
                    event_count: count,
                    reason: format!("Only {} events scheduled that day", count),
                });
            }
        }
    }
}

fn normalize_location(location: &str) -> String {
    location.trim().to_lowercase()
}

fn shared_attendee_names(
    candidate: &CalendarEvent,
    other: &CalendarEvent,
    members: &[FamilyMember],
) -> Vec<String> {
    candidate
        .attendees
        .iter()
        .filter(|attendee| {
            other
                .attendees
                .iter()
                .any(|a| a.member_id == attendee.member_id)
        })
        .map(|attendee| {
            if !attendee.name.is_empty() {
                return attendee.name.clone();
            }
            members
                .iter()
                .find(|member| member.id == attendee.member_id)
                .map(|member| member.name.clone())
                .unwrap_or_else(|| attendee.member_id.to_string())
        })
        .collect()
}
