use crate::date;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrafficConditions {
    Light,
    Normal,
    Heavy,
    /// Returned when either location is missing
    NoData,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TravelEstimate {
    pub minutes: i64,
    pub distance_km: f64,
    pub traffic: TrafficConditions,
}

impl TravelEstimate {
    fn no_data() -> Self {
        Self {
            minutes: 0,
            distance_km: 0.0,
            traffic: TrafficConditions::NoData,
        }
    }
}

/// Deterministic placeholder for a real mapping service: a function of
/// the two location strings and the local hour of day, with a rush hour
/// multiplier. Estimates are memoized per (origin, destination, hour)
/// for the lifetime of the estimator instance, so repeated lookups
/// within one conflict detection pass are free.
#[derive(Debug)]
pub struct TravelTimeEstimator {
    tz: Tz,
    cache: HashMap<(String, String, u32), TravelEstimate>,
}

impl TravelTimeEstimator {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            cache: HashMap::new(),
        }
    }

    pub fn estimate(
        &mut self,
        origin: Option<&str>,
        destination: Option<&str>,
        at_ts: i64,
    ) -> TravelEstimate {
        let (origin, destination) = match (origin, destination) {
            (Some(origin), Some(destination)) if !origin.is_empty() && !destination.is_empty() => {
                (origin, destination)
            }
            _ => return TravelEstimate::no_data(),
        };

        let hour = date::local_hour(at_ts, &self.tz);
        let key = (origin.to_string(), destination.to_string(), hour);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let distance_km = (origin.len() + destination.len()) as f64 * 2.0;
        let base_minutes = distance_km * 2.0;

        let (factor, traffic) = if (7..=9).contains(&hour) || (16..=18).contains(&hour) {
            (1.5, TrafficConditions::Heavy)
        } else if hour >= 22 || hour <= 5 {
            (0.8, TrafficConditions::Light)
        } else {
            (1.0, TrafficConditions::Normal)
        };

        let estimate = TravelEstimate {
            minutes: (base_minutes * factor).round() as i64,
            distance_km,
            traffic,
        };
        self.cache.insert(key, estimate.clone());
        estimate
    }

    #[cfg(test)]
    pub fn cached_estimates(&self) -> usize {
        self.cache.len()
    }
}
