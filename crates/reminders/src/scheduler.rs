use crate::notification::{NotificationPort, ReminderPayload};
use chrono_tz::Tz;
use hearth_scheduler_domain::{
    compute_reminder_offsets, CalendarEvent, ReminderPreferences, TravelTimeEstimator, ID,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Arms one timer per reminder offset of an event and delivers the
/// payload when it elapses. Timers are keyed `{event id}-{offset}`, so
/// re-scheduling an event replaces its pending timers instead of
/// stacking new ones on top.
pub struct ReminderScheduler {
    tz: Tz,
    prefs: ReminderPreferences,
    /// Where travel to events starts from, typically the home address
    origin: Option<String>,
    estimator: TravelTimeEstimator,
    port: Option<Arc<dyn NotificationPort>>,
    fallback: mpsc::UnboundedSender<ReminderPayload>,
    timers: HashMap<String, JoinHandle<()>>,
}

impl ReminderScheduler {
    /// The returned receiver carries every payload that could not be
    /// delivered through the notification port, including all payloads
    /// when no port is configured.
    pub fn new(
        tz: Tz,
        prefs: ReminderPreferences,
        origin: Option<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ReminderPayload>) {
        let (fallback, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            tz,
            prefs,
            origin,
            estimator: TravelTimeEstimator::new(tz),
            port: None,
            fallback,
            timers: HashMap::new(),
        };
        (scheduler, receiver)
    }

    pub fn set_port(&mut self, port: Arc<dyn NotificationPort>) {
        self.port = Some(port);
    }

    /// Arms timers for every reminder offset of `event` that is still
    /// in the future. Any timers previously armed for this event are
    /// cancelled first. Returns how many timers were armed.
    pub fn schedule_for_event(&mut self, event: &CalendarEvent, now_ts: i64) -> usize {
        self.cancel_for_event(&event.id);
        // Already-fired timers have nothing left to cancel
        self.timers.retain(|_, handle| !handle.is_finished());

        let offsets = compute_reminder_offsets(
            event,
            &self.prefs,
            &mut self.estimator,
            self.origin.as_deref(),
            now_ts,
            &self.tz,
        );

        for offset in &offsets {
            let fire_ts = event.start_ts - offset * 60 * 1000;
            // Offsets in the past were already filtered out
            let delay = Duration::from_millis((fire_ts - now_ts) as u64);
            let payload = build_payload(event, *offset, fire_ts);
            let key = format!("{}-{}", event.id, offset);

            let port = self.port.clone();
            let fallback = self.fallback.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                deliver(port, fallback, payload).await;
            });
            if let Some(previous) = self.timers.insert(key, handle) {
                previous.abort();
            }
        }

        info!(
            "Armed {} reminder timer(s) for event {}",
            offsets.len(),
            event.id
        );
        offsets.len()
    }

    /// Cancels all pending timers for an event.
    pub fn cancel_for_event(&mut self, event_id: &ID) {
        let prefix = format!("{}-", event_id);
        self.timers.retain(|key, handle| {
            if key.starts_with(&prefix) {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Re-arms timers after an event changed, but only when a field
    /// that affects reminders changed. Returns whether a re-arm
    /// happened.
    pub fn update_for_event(
        &mut self,
        previous: &CalendarEvent,
        updated: &CalendarEvent,
        now_ts: i64,
    ) -> bool {
        let relevant_change = previous.start_ts != updated.start_ts
            || previous.location != updated.location
            || previous.category != updated.category;
        if !relevant_change {
            return false;
        }
        self.schedule_for_event(updated, now_ts);
        true
    }

    /// Cancels every pending timer.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn deliver(
    port: Option<Arc<dyn NotificationPort>>,
    fallback: mpsc::UnboundedSender<ReminderPayload>,
    payload: ReminderPayload,
) {
    if let Some(port) = port {
        match port.deliver(payload.clone()).await {
            Ok(()) => return,
            Err(e) => error!("Reminder delivery failed: {}", e),
        }
    }
    if fallback.send(payload).is_err() {
        warn!("Reminder fallback channel is closed, dropping reminder");
    }
}

fn build_payload(event: &CalendarEvent, offset: i64, fire_ts: i64) -> ReminderPayload {
    let lead = describe_lead(offset);
    let body = match &event.location {
        Some(location) if !location.trim().is_empty() => {
            format!("{} starts in {} at {}", event.title, lead, location.trim())
        }
        _ => format!("{} starts in {}", event.title, lead),
    };
    ReminderPayload {
        event_id: event.id.to_string(),
        title: event.title.clone(),
        body,
        category: event.category,
        fire_ts,
    }
}

fn describe_lead(offset: i64) -> String {
    if offset < 60 {
        format!("{} minutes", offset)
    } else if offset % 60 == 0 {
        let hours = offset / 60;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{} hours", hours)
        }
    } else {
        format!("{} minutes", offset)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::notification::DeliveryError;
    use async_trait::async_trait;
    use chrono::prelude::*;
    use chrono_tz::UTC;
    use std::sync::Mutex;

    fn event_at(hour: u32, minute: u32) -> CalendarEvent {
        let start = Utc
            .ymd(2025, 3, 10)
            .and_hms(hour, minute, 0)
            .timestamp_millis();
        CalendarEvent::new("Checkup", start, start + 60 * 60 * 1000)
    }

    fn scheduler() -> (ReminderScheduler, mpsc::UnboundedReceiver<ReminderPayload>) {
        // Default preferences: "general" events remind 15 minutes ahead
        ReminderScheduler::new(UTC, ReminderPreferences::default(), None)
    }

    struct RecordingPort {
        delivered: Mutex<Vec<ReminderPayload>>,
        fail: bool,
    }

    impl RecordingPort {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl NotificationPort for RecordingPort {
        async fn deliver(&self, payload: ReminderPayload) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Unavailable);
            }
            self.delivered.lock().unwrap().push(payload);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_on_the_fallback_channel_when_no_port_is_set() {
        let (mut scheduler, mut receiver) = scheduler();
        let event = event_at(14, 0);
        let now_ts = event.start_ts - 60 * 60 * 1000;

        let armed = scheduler.schedule_for_event(&event, now_ts);
        assert_eq!(armed, 1);

        let payload = receiver.recv().await.unwrap();
        assert_eq!(payload.title, "Checkup");
        assert_eq!(payload.body, "Checkup starts in 15 minutes");
        assert_eq!(payload.fire_ts, event.start_ts - 15 * 60 * 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn located_events_mention_the_location() {
        let prefs = ReminderPreferences {
            smart_reminders: true,
            ..Default::default()
        };
        let (mut scheduler, mut receiver) = ReminderScheduler::new(UTC, prefs, None);
        let mut event = event_at(14, 0);
        event.location = Some("  Library ".to_string());
        // Smart mode arms a travel timer alongside the base reminder
        let armed = scheduler.schedule_for_event(&event, event.start_ts - 60 * 60 * 1000);
        assert_eq!(armed, 2);

        let payload = receiver.recv().await.unwrap();
        assert!(payload.body.ends_with("at Library"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_reminders_do_not_fire() {
        let (mut scheduler, mut receiver) = scheduler();
        let event = event_at(14, 0);
        let now_ts = event.start_ts - 60 * 60 * 1000;

        scheduler.schedule_for_event(&event, now_ts);
        scheduler.cancel_for_event(&event.id);
        assert_eq!(scheduler.active_timers(), 0);

        drop(scheduler);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_timers_instead_of_stacking() {
        let (mut scheduler, mut receiver) = scheduler();
        let event = event_at(14, 0);
        let now_ts = event.start_ts - 60 * 60 * 1000;

        scheduler.schedule_for_event(&event, now_ts);
        scheduler.schedule_for_event(&event, now_ts);
        assert_eq!(scheduler.active_timers(), 1);

        let first = receiver.recv().await;
        assert!(first.is_some());
        drop(scheduler);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn fired_timers_are_pruned_on_the_next_schedule() {
        let (mut scheduler, mut receiver) = scheduler();
        let first = event_at(14, 0);
        let now_ts = first.start_ts - 60 * 60 * 1000;
        scheduler.schedule_for_event(&first, now_ts);

        assert!(receiver.recv().await.is_some());
        tokio::task::yield_now().await;

        let second = event_at(16, 0);
        scheduler.schedule_for_event(&second, now_ts);
        assert_eq!(scheduler.active_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_through_the_port_when_it_succeeds() {
        let (mut scheduler, mut receiver) = scheduler();
        let port = RecordingPort::new(false);
        scheduler.set_port(port.clone());

        let event = event_at(14, 0);
        scheduler.schedule_for_event(&event, event.start_ts - 60 * 60 * 1000);

        // Paused clock: sleeping past the fire time runs the timer task
        tokio::time::sleep(Duration::from_millis(46 * 60 * 1000)).await;
        assert_eq!(port.delivered.lock().unwrap().len(), 1);

        drop(scheduler);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_when_the_port_fails() {
        let (mut scheduler, mut receiver) = scheduler();
        scheduler.set_port(RecordingPort::new(true));

        let event = event_at(14, 0);
        scheduler.schedule_for_event(&event, event.start_ts - 60 * 60 * 1000);

        let payload = receiver.recv().await.unwrap();
        assert_eq!(payload.title, "Checkup");
    }

    #[tokio::test(start_paused = true)]
    async fn updates_only_re_arm_on_relevant_changes() {
        let (mut scheduler, _receiver) = scheduler();
        let event = event_at(14, 0);
        let now_ts = event.start_ts - 60 * 60 * 1000;
        scheduler.schedule_for_event(&event, now_ts);

        let mut renamed = event.clone();
        renamed.title = "Renamed".to_string();
        assert!(!scheduler.update_for_event(&event, &renamed, now_ts));

        let mut moved = event.clone();
        moved.start_ts += 30 * 60 * 1000;
        moved.end_ts += 30 * 60 * 1000;
        assert!(scheduler.update_for_event(&event, &moved, now_ts));
        assert_eq!(scheduler.active_timers(), 1);
    }

    #[test]
    fn lead_descriptions() {
        assert_eq!(describe_lead(15), "15 minutes");
        assert_eq!(describe_lead(60), "1 hour");
        assert_eq!(describe_lead(24 * 60), "24 hours");
        assert_eq!(describe_lead(90), "90 minutes");
    }
}
