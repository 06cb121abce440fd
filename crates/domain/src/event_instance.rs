use serde::{Deserialize, Serialize};

/// Occurrence of a `CalendarEvent`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInstance {
    pub start_ts: i64,
    pub end_ts: i64,
}

impl EventInstance {
    pub fn duration(&self) -> i64 {
        self.end_ts - self.start_ts
    }

    /// Half-open interval overlap: instances that merely touch at an
    /// endpoint do not overlap.
    pub fn has_overlap(instance1: &Self, instance2: &Self) -> bool {
        instance1.start_ts < instance2.end_ts && instance1.end_ts > instance2.start_ts
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlap_is_strict_and_symmetric() {
        let first = EventInstance {
            start_ts: 0,
            end_ts: 100,
        };
        let overlapping = EventInstance {
            start_ts: 50,
            end_ts: 150,
        };
        let touching = EventInstance {
            start_ts: 100,
            end_ts: 200,
        };
        let disjoint = EventInstance {
            start_ts: 300,
            end_ts: 400,
        };

        assert!(EventInstance::has_overlap(&first, &overlapping));
        assert!(EventInstance::has_overlap(&overlapping, &first));
        assert!(!EventInstance::has_overlap(&first, &touching));
        assert!(!EventInstance::has_overlap(&touching, &first));
        assert!(!EventInstance::has_overlap(&first, &disjoint));
    }

    #[test]
    fn contained_interval_overlaps() {
        let outer = EventInstance {
            start_ts: 0,
            end_ts: 1000,
        };
        let inner = EventInstance {
            start_ts: 200,
            end_ts: 300,
        };
        assert!(EventInstance::has_overlap(&outer, &inner));
        assert!(EventInstance::has_overlap(&inner, &outer));
    }
}
