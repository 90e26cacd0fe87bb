use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{Error, Result};

/// Default location of the kernel per-interface statistics report.
pub const PROC_NET_DEV: &str = "/proc/net/dev";

/// Lines at the top of the report that carry column titles rather than interfaces.
const HEADER_LINES: usize = 2;

// Token positions once a record is split on whitespace with the interface name as
// token 0. The report lists eight receive columns (bytes packets errs drop fifo frame
// compressed multicast) before the transmit block, so transmit bytes sit at 9. This is
// a property of the Linux report layout; the column titles are not consulted.
const RX_BYTES_POS: usize = 1;
const TX_BYTES_POS: usize = 9;

/// Cumulative byte counters for one interface at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub bytes_received: u64,
    pub bytes_transmitted: u64,
    pub taken_at: Instant,
}

/// Something that can produce a counter snapshot for a named interface.
#[async_trait]
pub trait CounterSource: Send + Sync {
    async fn read(&self, interface: &str) -> Result<CounterSnapshot>;
}

/// Reads counters from a `/proc/net/dev` formatted file.
#[derive(Debug, Clone)]
pub struct ProcNetDev {
    path: PathBuf,
}

impl ProcNetDev {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ProcNetDev {
    fn default() -> Self {
        Self::new(PROC_NET_DEV)
    }
}

#[async_trait]
impl CounterSource for ProcNetDev {
    async fn read(&self, interface: &str) -> Result<CounterSnapshot> {
        let report = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| Error::io("failed to read counter report", &self.path, err))?;
        let taken_at = Instant::now();
        let (bytes_received, bytes_transmitted) = parse_report(&report, interface)?;
        tracing::trace!(
            interface,
            bytes_received,
            bytes_transmitted,
            "counter snapshot"
        );
        Ok(CounterSnapshot {
            bytes_received,
            bytes_transmitted,
            taken_at,
        })
    }
}

/// Extracts `(bytes_received, bytes_transmitted)` for `interface` from a report.
///
/// The interface name is everything before the first `:` on a line, trimmed, and must
/// equal `interface` exactly. Counters may follow the colon with or without spacing.
pub fn parse_report(report: &str, interface: &str) -> Result<(u64, u64)> {
    let record = report
        .lines()
        .skip(HEADER_LINES)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim() == interface)
        .ok_or_else(|| Error::NotFound(interface.to_string()))?;

    let (name, counters) = record;
    let tokens: Vec<&str> = std::iter::once(name.trim())
        .chain(counters.split_whitespace())
        .collect();
    if tokens.len() <= TX_BYTES_POS {
        return Err(Error::Parse(format!(
            "record for '{interface}' has {} fields, expected at least {}",
            tokens.len(),
            TX_BYTES_POS + 1
        )));
    }

    let received = parse_counter(tokens[RX_BYTES_POS], interface, "receive bytes")?;
    let transmitted = parse_counter(tokens[TX_BYTES_POS], interface, "transmit bytes")?;
    Ok((received, transmitted))
}

fn parse_counter(raw: &str, interface: &str, label: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|err| {
        Error::Parse(format!("invalid {label} '{raw}' for '{interface}': {err}"))
    })
}
