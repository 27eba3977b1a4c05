use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};

pub type Timestamp = DateTime<Utc>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetStatus {
    Online,
    Offline,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresenceEvent {
    Offline { ssid: String },
    Online { ssid: String, downtime: TimeDelta },
}

impl PresenceEvent {
    pub fn ssid(&self) -> &str {
        match self {
            PresenceEvent::Offline { ssid } | PresenceEvent::Online { ssid, .. } => ssid,
        }
    }
}

/// Everything the tracker knows about the networks it has seen. Lives for the
/// lifetime of the process; nothing is persisted.
#[derive(Debug, Default, Clone)]
pub struct PresenceState {
    first_seen: HashMap<String, Timestamp>,
    last_seen: HashMap<String, Timestamp>,
    target_status: HashMap<String, TargetStatus>,
    offline_since: HashMap<String, Timestamp>,
}

impl PresenceState {
    pub fn first_seen(&self, ssid: &str) -> Option<Timestamp> {
        self.first_seen.get(ssid).copied()
    }

    pub fn last_seen(&self, ssid: &str) -> Option<Timestamp> {
        self.last_seen.get(ssid).copied()
    }

    pub fn status(&self, ssid: &str) -> Option<TargetStatus> {
        self.target_status.get(ssid).copied()
    }

    pub fn offline_since(&self, ssid: &str) -> Option<Timestamp> {
        self.offline_since.get(ssid).copied()
    }

    /// Number of distinct SSIDs ever observed.
    pub fn known_count(&self) -> usize {
        self.first_seen.len()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// SSIDs observed for the first time this cycle, in scan order.
    pub newly_seen: Vec<String>,
    pub events: Vec<PresenceEvent>,
}

/// Folds one scan into `state` and returns the transitions it caused.
///
/// A target that is missing from the scan goes offline only once it has been
/// unseen for strictly longer than `offline_threshold`. Targets that are
/// present without a prior offline announcement, including everything on the
/// first cycle, are recorded as online silently.
pub fn process_cycle(
    state: &mut PresenceState,
    scan_result: &[String],
    now: Timestamp,
    targets: &BTreeSet<String>,
    offline_threshold: TimeDelta,
    is_first_cycle: bool,
) -> CycleReport {
    let mut report = CycleReport::default();

    let mut visible = HashSet::with_capacity(scan_result.len());
    for ssid in scan_result.iter().filter(|s| !s.is_empty()) {
        if !visible.insert(ssid.as_str()) {
            continue;
        }
        if !state.first_seen.contains_key(ssid) {
            state.first_seen.insert(ssid.clone(), now);
            report.newly_seen.push(ssid.clone());
        }
        state.last_seen.insert(ssid.clone(), now);
    }

    for target in targets {
        let status = state.target_status.get(target).copied();

        if !visible.contains(target.as_str()) {
            let Some(last_seen) = state.last_seen.get(target) else {
                continue;
            };
            if now - *last_seen > offline_threshold && status != Some(TargetStatus::Offline) {
                state
                    .target_status
                    .insert(target.clone(), TargetStatus::Offline);
                state.offline_since.insert(target.clone(), now);
                report.events.push(PresenceEvent::Offline {
                    ssid: target.clone(),
                });
            }
            continue;
        }

        // Nothing announced yet counts as online: a target that is simply
        // present, on the first cycle or later, is not a recovery.
        if is_first_cycle || status.is_none() {
            state
                .target_status
                .entry(target.clone())
                .or_insert(TargetStatus::Online);
            continue;
        }

        if status == Some(TargetStatus::Offline) {
            let downtime = state
                .offline_since
                .get(target)
                .map(|since| now - *since)
                .unwrap_or_else(TimeDelta::zero);
            state
                .target_status
                .insert(target.clone(), TargetStatus::Online);
            report.events.push(PresenceEvent::Online {
                ssid: target.clone(),
                downtime,
            });
        }
    }

    report
}

/// Owns the presence state together with the fixed parameters it is evaluated
/// against, so the driver never has to thread them through by hand.
#[derive(Debug)]
pub struct PresenceTracker {
    targets: BTreeSet<String>,
    offline_threshold: TimeDelta,
    state: PresenceState,
    first_cycle_done: bool,
}

impl PresenceTracker {
    pub fn new(targets: BTreeSet<String>, offline_threshold: TimeDelta) -> Self {
        PresenceTracker {
            targets,
            offline_threshold,
            state: PresenceState::default(),
            first_cycle_done: false,
        }
    }

    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn observe(&mut self, scan_result: &[String], now: Timestamp) -> CycleReport {
        let report = process_cycle(
            &mut self.state,
            scan_result,
            now,
            &self.targets,
            self.offline_threshold,
            !self.first_cycle_done,
        );
        self.first_cycle_done = true;
        report
    }
}

/// Renders a duration as `"{h}h {m}m {s}s"`. Sub-second precision is dropped.
pub fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, 20, 12, 30, 15).unwrap()
    }

    fn ssids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn targets(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::zero()), "0h 0m 0s");
        assert_eq!(format_duration(TimeDelta::seconds(3725)), "1h 2m 5s");
        assert_eq!(format_duration(TimeDelta::milliseconds(59_999)), "0h 0m 59s");
        assert_eq!(format_duration(TimeDelta::hours(27)), "27h 0m 0s");
        assert_eq!(format_duration(TimeDelta::seconds(-5)), "0h 0m 0s");
    }

    #[test]
    fn test_first_seen_is_set_once() {
        let mut state = PresenceState::default();
        let none = BTreeSet::new();
        let t1 = t0() + TimeDelta::seconds(15);

        let report = process_cycle(&mut state, &ssids(&["FOO"]), t0(), &none, TimeDelta::zero(), true);
        assert_eq!(report.newly_seen, ssids(&["FOO"]));

        let report = process_cycle(
            &mut state,
            &ssids(&["FOO", "BAR"]),
            t1,
            &none,
            TimeDelta::zero(),
            false,
        );
        assert_eq!(report.newly_seen, ssids(&["BAR"]));
        assert_eq!(state.first_seen("FOO"), Some(t0()));
        assert_eq!(state.last_seen("FOO"), Some(t1));
        assert_eq!(state.first_seen("BAR"), Some(t1));
        assert_eq!(state.known_count(), 2);
    }

    #[test]
    fn test_scan_result_is_normalised() {
        let mut state = PresenceState::default();
        let report = process_cycle(
            &mut state,
            &ssids(&["FOO", "", "FOO", "BAR"]),
            t0(),
            &BTreeSet::new(),
            TimeDelta::zero(),
            true,
        );
        assert_eq!(report.newly_seen, ssids(&["FOO", "BAR"]));
        assert_eq!(state.first_seen(""), None);
        assert_eq!(state.known_count(), 2);
    }

    #[test]
    fn test_first_cycle_is_silent() {
        let mut tracker = PresenceTracker::new(targets(&["HOME"]), TimeDelta::zero());
        let report = tracker.observe(&ssids(&["HOME"]), t0());
        assert!(report.events.is_empty());
        assert_eq!(tracker.state().status("HOME"), Some(TargetStatus::Online));

        // Still online on the next cycle, so still nothing to say.
        let report = tracker.observe(&ssids(&["HOME"]), t0() + TimeDelta::seconds(1));
        assert!(report.events.is_empty());
    }

    #[test]
    fn test_never_seen_target_is_ignored() {
        let mut tracker = PresenceTracker::new(targets(&["HOME"]), TimeDelta::zero());
        tracker.observe(&[], t0());
        let report = tracker.observe(&ssids(&["FOO"]), t0() + TimeDelta::hours(1));
        assert!(report.events.is_empty());
        assert_eq!(tracker.state().status("HOME"), None);
    }

    #[test]
    fn test_target_appearing_after_first_cycle_is_silent() {
        let mut tracker = PresenceTracker::new(targets(&["HOME"]), TimeDelta::seconds(300));
        tracker.observe(&[], t0());
        let report = tracker.observe(&ssids(&["HOME"]), t0() + TimeDelta::seconds(15));
        assert!(report.events.is_empty());
        assert_eq!(report.newly_seen, ssids(&["HOME"]));
        assert_eq!(tracker.state().status("HOME"), Some(TargetStatus::Online));

        // It only becomes announceable once it has actually gone offline.
        let gone = t0() + TimeDelta::seconds(400);
        assert_eq!(tracker.observe(&[], gone).events.len(), 1);
        let report = tracker.observe(&ssids(&["HOME"]), gone + TimeDelta::seconds(30));
        assert_eq!(
            report.events,
            vec![PresenceEvent::Online {
                ssid: "HOME".to_string(),
                downtime: TimeDelta::seconds(30),
            }]
        );
    }

    #[test]
    fn test_process_cycle_without_status_is_silent_after_first_cycle() {
        let mut state = PresenceState::default();
        let watched = targets(&["NJSZB", "NETGEAR32"]);
        let threshold = TimeDelta::microseconds(2_000);

        process_cycle(&mut state, &ssids(&["NJSZB"]), t0(), &watched, threshold, true);
        let report = process_cycle(
            &mut state,
            &ssids(&["NJSZB", "NETGEAR32"]),
            t0() + TimeDelta::microseconds(500),
            &watched,
            threshold,
            false,
        );
        assert!(report.events.is_empty());
        assert_eq!(state.status("NETGEAR32"), Some(TargetStatus::Online));
    }

    #[test]
    fn test_threshold_is_strict() {
        let threshold = TimeDelta::seconds(300);
        let mut tracker = PresenceTracker::new(targets(&["HOME"]), threshold);
        tracker.observe(&ssids(&["HOME"]), t0());

        let report = tracker.observe(&[], t0() + threshold);
        assert!(report.events.is_empty());
        assert_eq!(tracker.state().status("HOME"), Some(TargetStatus::Online));

        let later = t0() + threshold + TimeDelta::seconds(1);
        let report = tracker.observe(&[], later);
        assert_eq!(
            report.events,
            vec![PresenceEvent::Offline {
                ssid: "HOME".to_string()
            }]
        );
        assert_eq!(tracker.state().offline_since("HOME"), Some(later));
    }

    #[test]
    fn test_no_repeated_offline_alerts() {
        let mut tracker = PresenceTracker::new(targets(&["HOME"]), TimeDelta::seconds(10));
        tracker.observe(&ssids(&["HOME"]), t0());

        let offline_events: usize = (1..=10)
            .map(|i| tracker.observe(&[], t0() + TimeDelta::seconds(i * 15)))
            .map(|report| report.events.len())
            .sum();
        assert_eq!(offline_events, 1);
        assert_eq!(
            tracker.state().offline_since("HOME"),
            Some(t0() + TimeDelta::seconds(15))
        );
    }

    #[test]
    fn test_recovery_carries_downtime_and_can_repeat() {
        let mut tracker = PresenceTracker::new(targets(&["HOME"]), TimeDelta::seconds(10));
        tracker.observe(&ssids(&["HOME"]), t0());
        tracker.observe(&[], t0() + TimeDelta::seconds(20));

        let back = t0() + TimeDelta::seconds(20 + 3725);
        let report = tracker.observe(&ssids(&["HOME"]), back);
        assert_eq!(
            report.events,
            vec![PresenceEvent::Online {
                ssid: "HOME".to_string(),
                downtime: TimeDelta::seconds(3725),
            }]
        );

        // A second outage is announced again, with its own offline_since.
        let gone = back + TimeDelta::seconds(11);
        let report = tracker.observe(&[], gone);
        assert_eq!(report.events.len(), 1);
        assert_eq!(tracker.state().offline_since("HOME"), Some(gone));
        let report = tracker.observe(&ssids(&["HOME"]), gone + TimeDelta::seconds(60));
        assert_eq!(
            report.events,
            vec![PresenceEvent::Online {
                ssid: "HOME".to_string(),
                downtime: TimeDelta::seconds(60),
            }]
        );
    }

    #[test]
    fn test_non_targets_never_alert() {
        let mut tracker = PresenceTracker::new(targets(&["HOME"]), TimeDelta::zero());
        tracker.observe(&ssids(&["HOME", "FOO"]), t0());
        let report = tracker.observe(&ssids(&["HOME"]), t0() + TimeDelta::seconds(60));
        assert!(report.events.is_empty());
        assert_eq!(tracker.state().status("FOO"), None);
        assert_eq!(tracker.state().last_seen("FOO"), Some(t0()));
    }

    #[test]
    fn test_nmcli_scenario() {
        let threshold = TimeDelta::microseconds(2_000);
        let mut tracker = PresenceTracker::new(targets(&["NJSZB", "NETGEAR32"]), threshold);
        let t1 = t0();
        let t2 = t1 + TimeDelta::microseconds(500);
        let t3 = t2 + TimeDelta::microseconds(500);
        let t4 = t3 + TimeDelta::microseconds(3_000);
        let t5 = t4 + TimeDelta::microseconds(500);

        let report = tracker.observe(&ssids(&["NJSZB"]), t1);
        assert!(report.events.is_empty());
        assert_eq!(tracker.state().first_seen("NJSZB"), Some(t1));
        assert_eq!(tracker.state().last_seen("NJSZB"), Some(t1));
        assert_eq!(tracker.state().known_count(), 1);

        let report = tracker.observe(&ssids(&["NJSZB", "NETGEAR32"]), t2);
        assert!(report.events.is_empty());
        assert_eq!(tracker.state().first_seen("NETGEAR32"), Some(t2));
        assert_eq!(tracker.state().last_seen("NJSZB"), Some(t2));

        let report = tracker.observe(&ssids(&["NETGEAR32"]), t3);
        assert!(report.events.is_empty());
        assert_eq!(tracker.state().last_seen("NETGEAR32"), Some(t3));
        assert_eq!(tracker.state().last_seen("NJSZB"), Some(t2));

        let report = tracker.observe(&ssids(&["NETGEAR32"]), t4);
        assert_eq!(
            report.events,
            vec![PresenceEvent::Offline {
                ssid: "NJSZB".to_string()
            }]
        );

        let report = tracker.observe(&ssids(&["NJSZB", "NETGEAR32"]), t5);
        assert_eq!(
            report.events,
            vec![PresenceEvent::Online {
                ssid: "NJSZB".to_string(),
                downtime: t5 - t4,
            }]
        );
        assert_eq!(tracker.state().first_seen("NJSZB"), Some(t1));
        assert_eq!(tracker.state().last_seen("NJSZB"), Some(t5));
        assert_eq!(tracker.state().status("NETGEAR32"), Some(TargetStatus::Online));
    }
}
