#![allow(dead_code)]

use async_trait::async_trait;
use netrate::counters::{parse_report, CounterSnapshot, CounterSource};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

pub const HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

/// Builds a report holding one line per `(name, rx, tx)`.
pub fn report(interfaces: &[(&str, u64, u64)]) -> String {
    let mut out = HEADER.to_string();
    for (name, rx, tx) in interfaces {
        out.push_str(&format!(
            "{name:>6}: {rx:>10}    12    0    0    0     0          0         0 {tx:>10}    9    0    0    0     0       0          0\n"
        ));
    }
    out
}

/// Serves each queued report once, in order, through the real report parser.
pub struct QueuedReports {
    reports: Mutex<VecDeque<String>>,
}

impl QueuedReports {
    pub fn new(reports: Vec<String>) -> Self {
        Self {
            reports: Mutex::new(reports.into()),
        }
    }
}

#[async_trait]
impl CounterSource for QueuedReports {
    async fn read(&self, interface: &str) -> netrate::Result<CounterSnapshot> {
        let report = self
            .reports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| HEADER.to_string());
        let (bytes_received, bytes_transmitted) = parse_report(&report, interface)?;
        Ok(CounterSnapshot {
            bytes_received,
            bytes_transmitted,
            taken_at: Instant::now(),
        })
    }
}
