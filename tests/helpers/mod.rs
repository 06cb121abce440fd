use chrono::prelude::*;
use hearth_scheduler::{Attendee, CalendarEvent, FamilyMember, ID};

pub fn ts(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
    Utc.ymd(year, month, day)
        .and_hms(hour, minute, 0)
        .timestamp_millis()
}

pub fn event(title: &str, start_ts: i64, duration_minutes: i64) -> CalendarEvent {
    CalendarEvent::new(title, start_ts, start_ts + duration_minutes * 60 * 1000)
}

pub fn member(name: &str) -> FamilyMember {
    FamilyMember {
        id: ID::new(),
        name: name.to_string(),
    }
}

pub fn attendee_for(member: &FamilyMember) -> Attendee {
    Attendee {
        member_id: member.id.clone(),
        name: member.name.clone(),
    }
}
