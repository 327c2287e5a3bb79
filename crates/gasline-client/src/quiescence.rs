//! Network-idle detection for rendered pages.
//!
//! A page is settled once no more than `max_inflight` requests have been
//! outstanding for at least `idle_window`. With the defaults (2 requests,
//! 500 ms) this matches the usual "network idle 2" heuristic: long-polling
//! or analytics beacons do not keep the page from settling forever.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks in-flight requests by id and when the page last became quiet.
#[derive(Debug)]
pub struct NetworkIdle {
    max_inflight: usize,
    idle_window: Duration,
    inflight: HashSet<String>,
    /// Ids whose completion was seen before their start. Events arrive on
    /// separate CDP streams, so the order between them is not guaranteed.
    finished_early: HashSet<String>,
    quiet_since: Option<Instant>,
}

impl NetworkIdle {
    /// Starts quiet at `now` with nothing in flight.
    pub fn new(max_inflight: usize, idle_window: Duration, now: Instant) -> Self {
        Self {
            max_inflight,
            idle_window,
            inflight: HashSet::new(),
            finished_early: HashSet::new(),
            quiet_since: Some(now),
        }
    }

    /// A request was issued. Redirect hops reuse the id and count once.
    /// A start for an id that already finished is ignored.
    pub fn request_started(&mut self, id: &str, now: Instant) {
        if !self.finished_early.contains(id) {
            self.inflight.insert(id.to_string());
        }
        self.update(now);
    }

    /// A request finished or failed, possibly before its start was seen.
    pub fn request_finished(&mut self, id: &str, now: Instant) {
        if !self.inflight.remove(id) {
            self.finished_early.insert(id.to_string());
        }
        self.update(now);
    }

    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    /// Whether the quiet period has lasted the full idle window.
    pub fn is_idle(&self, now: Instant) -> bool {
        self.quiet_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.idle_window)
    }

    /// Instant at which the page becomes idle if nothing else happens.
    /// `None` while too many requests are in flight.
    pub fn idle_at(&self) -> Option<Instant> {
        self.quiet_since.map(|since| since + self.idle_window)
    }

    fn update(&mut self, now: Instant) {
        if self.inflight.len() <= self.max_inflight {
            self.quiet_since.get_or_insert(now);
        } else {
            self.quiet_since = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    fn ms(base: Instant, offset: u64) -> Instant {
        base + Duration::from_millis(offset)
    }

    #[test]
    fn test_quiet_page_settles_after_window() {
        let t0 = Instant::now();
        let idle = NetworkIdle::new(2, WINDOW, t0);

        assert!(!idle.is_idle(ms(t0, 499)));
        assert!(idle.is_idle(ms(t0, 500)));
        assert_eq!(idle.idle_at(), Some(ms(t0, 500)));
    }

    #[test]
    fn test_two_inflight_requests_still_count_as_quiet() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(2, WINDOW, t0);
        idle.request_started("a", ms(t0, 10));
        idle.request_started("b", ms(t0, 20));

        assert_eq!(idle.inflight(), 2);
        assert!(idle.is_idle(ms(t0, 500)));
    }

    #[test]
    fn test_burst_resets_the_window() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(2, WINDOW, t0);
        idle.request_started("a", ms(t0, 100));
        idle.request_started("b", ms(t0, 100));
        idle.request_started("c", ms(t0, 100));

        assert_eq!(idle.idle_at(), None);
        assert!(!idle.is_idle(ms(t0, 5_000)));

        idle.request_finished("c", ms(t0, 300));
        assert_eq!(idle.idle_at(), Some(ms(t0, 800)));
        assert!(!idle.is_idle(ms(t0, 799)));
        assert!(idle.is_idle(ms(t0, 800)));
    }

    #[test]
    fn test_activity_below_threshold_does_not_restart_window() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(2, WINDOW, t0);
        idle.request_started("a", ms(t0, 200));
        idle.request_finished("a", ms(t0, 400));

        assert!(idle.is_idle(ms(t0, 500)));
    }

    #[test]
    fn test_redirect_hops_share_an_id() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(0, WINDOW, t0);
        idle.request_started("doc", ms(t0, 0));
        idle.request_started("doc", ms(t0, 50));
        assert_eq!(idle.inflight(), 1);

        idle.request_finished("doc", ms(t0, 100));
        assert_eq!(idle.inflight(), 0);
        assert!(idle.is_idle(ms(t0, 600)));
    }

    #[test]
    fn test_finish_seen_before_start_does_not_stay_inflight() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(2, WINDOW, t0);
        for id in ["css", "js", "img"] {
            idle.request_finished(id, ms(t0, 10));
        }
        for id in ["css", "js", "img"] {
            idle.request_started(id, ms(t0, 20));
        }

        assert_eq!(idle.inflight(), 0);
        assert!(idle.is_idle(ms(t0, 520)));
    }

    #[test]
    fn test_start_after_own_finish_is_ignored() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(0, WINDOW, t0);
        idle.request_started("doc", ms(t0, 0));
        idle.request_finished("doc", ms(t0, 10));
        idle.request_finished("beacon", ms(t0, 20));
        idle.request_started("beacon", ms(t0, 30));

        assert_eq!(idle.inflight(), 0);
        assert!(!idle.is_idle(ms(t0, 509)));
        assert!(idle.is_idle(ms(t0, 510)));
    }

    #[test]
    fn test_unknown_finish_is_ignored() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(2, WINDOW, t0);
        idle.request_finished("never-started", ms(t0, 10));
        assert_eq!(idle.inflight(), 0);
        assert!(idle.is_idle(ms(t0, 500)));
    }
}
