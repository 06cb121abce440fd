mod config;
mod telemetry;

pub use config::Config;
pub use telemetry::{get_subscriber, init_subscriber};

pub use hearth_scheduler_domain::*;
pub use hearth_scheduler_reminders::{
    DeliveryError, NotificationPort, ReminderPayload, ReminderScheduler,
};
