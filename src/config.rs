use chrono_tz::Tz;
use hearth_scheduler_domain::{ConflictPolicy, ExpansionLimits};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    /// Timezone used for all local-time rules: weekday matching,
    /// dinner-time warnings, quiet hours
    pub timezone: Tz,
    /// Maximum number of occurrences emitted when expanding one
    /// recurring event. This is used to avoid runaway expansion of
    /// open-ended rules, which would otherwise never terminate and is
    /// also far more than any calendar view actually renders.
    pub occurrence_safety_cap: u32,
    /// Thresholds for conflict warnings and suggestions
    pub conflict_policy: ConflictPolicy,
    /// Where travel to events starts from, used by travel estimates
    pub home_location: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        let default_timezone = Tz::UTC;
        let timezone = match std::env::var("HEARTH_TIMEZONE") {
            Ok(tz) => match tz.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    warn!(
                        "The given HEARTH_TIMEZONE: {} is not a valid timezone, falling back to UTC.",
                        tz
                    );
                    default_timezone
                }
            },
            Err(_) => default_timezone,
        };

        let default_cap: u32 = 100;
        let occurrence_safety_cap = match std::env::var("HEARTH_OCCURRENCE_CAP") {
            Ok(cap) => match cap.parse::<u32>() {
                Ok(cap) if cap > 0 => cap,
                _ => {
                    warn!(
                        "The given HEARTH_OCCURRENCE_CAP: {} is not valid, falling back to the default cap: {}.",
                        cap, default_cap
                    );
                    default_cap
                }
            },
            Err(_) => default_cap,
        };

        let home_location = match std::env::var("HEARTH_HOME_LOCATION") {
            Ok(location) if !location.trim().is_empty() => Some(location),
            _ => {
                info!("Did not find HEARTH_HOME_LOCATION environment variable. Travel reminders will use the default lead time.");
                None
            }
        };

        Self {
            timezone,
            occurrence_safety_cap,
            conflict_policy: ConflictPolicy::default(),
            home_location,
        }
    }

    pub fn expansion_limits(&self) -> ExpansionLimits {
        ExpansionLimits {
            safety_cap: self.occurrence_safety_cap,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn falls_back_to_utc_on_invalid_timezone() {
        std::env::set_var("HEARTH_TIMEZONE", "Not/AZone");
        let config = Config::new();
        assert_eq!(config.timezone, Tz::UTC);
        std::env::remove_var("HEARTH_TIMEZONE");
    }

    #[test]
    fn falls_back_to_default_cap_on_invalid_value() {
        std::env::set_var("HEARTH_OCCURRENCE_CAP", "0");
        let config = Config::new();
        assert_eq!(config.occurrence_safety_cap, 100);
        std::env::remove_var("HEARTH_OCCURRENCE_CAP");
        assert_eq!(config.expansion_limits().safety_cap, 100);
    }
}
