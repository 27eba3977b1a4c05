use std::process::Stdio;

use futures::future::BoxFuture;
use log::debug;
use thiserror::Error;
use tokio::process::Command;

/// SSID column placeholder nmcli prints for hidden networks.
const HIDDEN_SSID: &str = "--";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scan {
    Networks(Vec<String>),
    /// The scanner has nothing more to report and the monitor should stop.
    Finished,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

pub trait Scanner: Send {
    fn scan(&mut self) -> BoxFuture<'_, Result<Scan, ScanError>>;
}

/// Lists visible networks with `nmcli --fields SSID device wifi`.
pub struct NmcliScanner {
    program: String,
}

impl NmcliScanner {
    pub fn new(program: impl Into<String>) -> Self {
        NmcliScanner {
            program: program.into(),
        }
    }

    async fn run(&self) -> Result<Scan, ScanError> {
        let output = Command::new(&self.program)
            .args(["--fields", "SSID", "device", "wifi"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ScanError::Io {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ScanError::ExitStatus {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("{} output: {:?}", self.program, stdout);

        // Undecodable bytes only garble that one SSID; the rest of the scan
        // is still usable.
        Ok(Scan::Networks(parse_ssids(&stdout)))
    }
}

impl Scanner for NmcliScanner {
    fn scan(&mut self) -> BoxFuture<'_, Result<Scan, ScanError>> {
        Box::pin(self.run())
    }
}

/// Extracts SSIDs from nmcli's single-column table, skipping the header,
/// blank lines and hidden networks. Duplicates are kept.
pub fn parse_ssids(output: &str) -> Vec<String> {
    output
        .trim()
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|ssid| !ssid.is_empty() && *ssid != HIDDEN_SSID)
        .map(str::to_string)
        .collect()
}
