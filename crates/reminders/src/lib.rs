mod notification;
mod scheduler;

pub use notification::{DeliveryError, NotificationPort, ReminderPayload};
pub use scheduler::ReminderScheduler;
