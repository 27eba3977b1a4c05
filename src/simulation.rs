use std::collections::BTreeSet;
use std::time::Duration;

use futures::future::BoxFuture;
use log::info;
use tokio::time::Instant;

use crate::scanner::{Scan, ScanError, Scanner, parse_ssids};

const DECOY_SSIDS: [&str; 3] = ["FOO", "BAR", "BLAH"];
const PHASE: Duration = Duration::from_secs(5);

/// Replays a fixed twenty second outage-and-recovery script in nmcli's output
/// format, for trying the monitor out without a wireless card.
pub struct SimulatedScanner {
    targets: Vec<String>,
    started: Option<Instant>,
}

impl SimulatedScanner {
    pub fn new(targets: &BTreeSet<String>) -> Self {
        SimulatedScanner {
            targets: targets.iter().cloned().collect(),
            started: None,
        }
    }

    /// What nmcli would have printed `elapsed` into the simulation, or `None`
    /// once the script is over.
    pub fn output_at(&self, elapsed: Duration) -> Option<String> {
        let mut visible: Vec<&str> = DECOY_SSIDS.to_vec();
        match (elapsed.as_secs_f64() / PHASE.as_secs_f64()) as u32 {
            0 => {
                info!("Simulation: All SSIDs online.");
                visible.extend(self.targets.iter().map(String::as_str));
            }
            1 => info!("Simulation: Target SSIDs offline."),
            2 => {
                info!("Simulation: One target SSID back online.");
                visible.extend(self.targets.first().map(String::as_str));
            }
            3 => {
                info!("Simulation: All target SSIDs back online.");
                visible.extend(self.targets.iter().map(String::as_str));
            }
            _ => return None,
        }
        Some(format!("SSID\n{}", visible.join("\n")))
    }
}

impl Scanner for SimulatedScanner {
    fn scan(&mut self) -> BoxFuture<'_, Result<Scan, ScanError>> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let scan = match self.output_at(started.elapsed()) {
            Some(output) => Scan::Networks(parse_ssids(&output)),
            None => {
                info!("Simulation finished. 🏁");
                Scan::Finished
            }
        };
        Box::pin(async move { Ok(scan) })
    }
}
