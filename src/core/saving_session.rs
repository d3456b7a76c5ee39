use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use itertools::Itertools;

use crate::{core::interval::SavingSessionWindow, prelude::*};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionPhase {
    Active,
    Upcoming,
    Past,
}

/// Keep the sessions that have not ended yet, ordered by start time.
#[instrument(skip_all, fields(n_events = events.len()))]
pub fn upcoming_sessions<Tz: TimeZone>(
    events: Vec<SavingSessionWindow>,
    now: &DateTime<Tz>,
) -> Vec<SavingSessionWindow> {
    let wall_now = now.naive_local();
    let sessions = events
        .into_iter()
        .filter(|event| wall_clock(event.interval.end, &now.timezone()) > wall_now)
        .sorted_by_key(|event| event.interval.start)
        .collect_vec();
    debug!(n_sessions = sessions.len(), "filtered");
    sessions
}

impl SavingSessionWindow {
    #[must_use]
    pub fn is_active<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.phase(now) == SessionPhase::Active
    }

    #[must_use]
    pub fn is_upcoming<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.phase(now) == SessionPhase::Upcoming
    }

    /// Classify the session against the wall clock, both ends inclusive.
    #[must_use]
    pub fn phase<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> SessionPhase {
        let zone = now.timezone();
        let wall_now = now.naive_local();
        if wall_now < wall_clock(self.interval.start, &zone) {
            SessionPhase::Upcoming
        } else if wall_now <= wall_clock(self.interval.end, &zone) {
            SessionPhase::Active
        } else {
            SessionPhase::Past
        }
    }
}

/// Strip the offset after converting to the reference zone, so that both sides of a comparison
/// are naive wall-clock times in the same zone.
///
/// TODO: instants inside a DST fold compare by wall clock and may be misclassified for an hour.
fn wall_clock<Tz: TimeZone>(instant: DateTime<FixedOffset>, zone: &Tz) -> NaiveDateTime {
    instant.with_timezone(zone).naive_local()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::core::interval::Interval;

    fn session(code: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> SavingSessionWindow {
        SavingSessionWindow {
            code: code.to_string(),
            interval: Interval::try_new(start.fixed_offset(), end.fixed_offset()).unwrap(),
            reward_per_kwh: 1800,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T17:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_past_session_dropped() {
        let now = now();
        let sessions = upcoming_sessions(
            vec![
                session("PAST", now - TimeDelta::hours(2), now - TimeDelta::hours(1)),
                session("NEXT", now + TimeDelta::hours(1), now + TimeDelta::hours(2)),
            ],
            &now,
        );
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].code, "NEXT");
        assert!(sessions[0].is_upcoming(&now));
        assert!(!sessions[0].is_active(&now));
    }

    #[test]
    fn test_ending_now_is_dropped() {
        let now = now();
        let sessions =
            upcoming_sessions(vec![session("DONE", now - TimeDelta::hours(1), now)], &now);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_sorted_by_start() {
        let now = now();
        let sessions = upcoming_sessions(
            vec![
                session("LATER", now + TimeDelta::days(2), now + TimeDelta::hours(49)),
                session("ACTIVE", now - TimeDelta::minutes(30), now + TimeDelta::minutes(30)),
                session("SOON", now + TimeDelta::hours(3), now + TimeDelta::hours(4)),
            ],
            &now,
        );
        let codes = sessions.iter().map(|session| session.code.as_str()).collect_vec();
        assert_eq!(codes, ["ACTIVE", "SOON", "LATER"]);
        assert_eq!(sessions[0].phase(&now), SessionPhase::Active);
    }

    #[test]
    fn test_phase_boundaries() {
        let now = now();
        let starting = session("A", now, now + TimeDelta::hours(1));
        assert_eq!(starting.phase(&now), SessionPhase::Active);
        let ending = session("B", now - TimeDelta::hours(1), now);
        assert_eq!(ending.phase(&now), SessionPhase::Active);
        let ended = session("C", now - TimeDelta::hours(2), now - TimeDelta::hours(1));
        assert_eq!(ended.phase(&now), SessionPhase::Past);
    }

    #[test]
    fn test_offset_aware_now() {
        // 17:30 in UTC+01:00 is 16:30 UTC, so the session has not started yet:
        let now = DateTime::parse_from_rfc3339("2025-01-15T17:30:00+01:00").unwrap();
        let start = DateTime::parse_from_rfc3339("2025-01-15T17:00:00Z").unwrap();
        let end = DateTime::parse_from_rfc3339("2025-01-15T18:00:00Z").unwrap();
        let session = session("UPCOMING", start.to_utc(), end.to_utc());
        assert!(session.is_upcoming(&now));
        assert_eq!(upcoming_sessions(vec![session], &now).len(), 1);
    }
}
