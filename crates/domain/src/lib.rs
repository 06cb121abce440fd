mod conflict;
pub mod date;
mod event;
mod event_instance;
mod recurrence;
mod reminder;
mod shared;
mod travel;

pub use conflict::{
    events_overlap, ConflictDetector, ConflictPolicy, ConflictReport, ConflictSeverity,
    ResourceConflict, Suggestion, TimeConflict, TravelConflict, Warning, WarningKind,
};
pub use event::{Attendee, CalendarEvent, EventCategory, ExpansionLimits, FamilyMember};
pub use event_instance::EventInstance;
pub use recurrence::{
    CommonPattern, CommonPatternOptions, Frequency, RecurrenceError, RecurrenceRule, WeekdayCode,
};
pub use reminder::{
    compute_reminder_offsets, CategoryReminders, FollowUps, QuietHours, ReminderPreferences,
    TravelTimeReminders,
};
pub use shared::entity::{Entity, InvalidIDError, ID};
pub use travel::{TrafficConditions, TravelEstimate, TravelTimeEstimator};
