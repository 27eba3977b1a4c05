use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info};
use tokio::time::timeout;

use crate::messages::Announcement;
use crate::notify::Notifier;
use crate::presence::{PresenceEvent, PresenceTracker};
use crate::scanner::{Scan, Scanner};

#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    pub scan_interval: Duration,
    pub scan_timeout: Duration,
    pub notify_timeout: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(Vec<PresenceEvent>),
    /// The scan failed; presence state was left untouched.
    Skipped,
    Finished,
}

pub struct Manager<S> {
    scanner: S,
    notifiers: Vec<Box<dyn Notifier>>,
    tracker: PresenceTracker,
    settings: ManagerSettings,
}

impl<S: Scanner> Manager<S> {
    pub fn new(
        scanner: S,
        notifiers: Vec<Box<dyn Notifier>>,
        tracker: PresenceTracker,
        settings: ManagerSettings,
    ) -> Self {
        Manager {
            scanner,
            notifiers,
            tracker,
            settings,
        }
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    /// Scans once, updates presence and sends the resulting announcements in
    /// order. Errors never escape a cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let ssids = match timeout(self.settings.scan_timeout, self.scanner.scan()).await {
            Ok(Ok(Scan::Networks(ssids))) => ssids,
            Ok(Ok(Scan::Finished)) => return CycleOutcome::Finished,
            Ok(Err(err)) => {
                error!("Error scanning wifi networks: {}", err);
                return CycleOutcome::Skipped;
            }
            Err(_) => {
                error!(
                    "Wifi scan timed out after {:?}",
                    self.settings.scan_timeout
                );
                return CycleOutcome::Skipped;
            }
        };

        let now = Utc::now();
        debug!("SSIDs detected: {:?} at {}", ssids, now);

        let report = self.tracker.observe(&ssids, now);
        for ssid in &report.newly_seen {
            info!("First seen: {} at {} 👀", ssid, now);
        }
        let state = self.tracker.state();
        debug!(
            "Target states ({} SSIDs known): {:?}",
            state.known_count(),
            self.tracker
                .targets()
                .iter()
                .map(|t| {
                    (
                        t.as_str(),
                        state.status(t),
                        state.first_seen(t),
                        state.last_seen(t),
                        state.offline_since(t),
                    )
                })
                .collect::<Vec<_>>()
        );

        for event in &report.events {
            self.announce(&Announcement::Presence(event.clone())).await;
        }
        CycleOutcome::Completed(report.events)
    }

    async fn announce(&self, announcement: &Announcement) {
        for notifier in &self.notifiers {
            match timeout(self.settings.notify_timeout, notifier.announce(announcement)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!("Error sending {} notification: {}", notifier.name(), err);
                }
                Err(_) => {
                    error!(
                        "{} notification timed out after {:?}",
                        notifier.name(),
                        self.settings.notify_timeout
                    );
                }
            }
        }
    }

    pub async fn run_loop(mut self) -> anyhow::Result<()> {
        self.announce(&Announcement::Started).await;

        loop {
            if self.run_cycle().await == CycleOutcome::Finished {
                break;
            }
            tokio::time::sleep(self.settings.scan_interval).await;
        }
        info!("Exiting monitor loop");

        for notifier in &self.notifiers {
            notifier.shutdown().await;
        }

        Ok(())
    }
}
