use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use serde::Deserialize;
use std::time::Duration;

use crate::counters::CounterSnapshot;
use crate::error::{Direction, Error, Result};

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Bandwidth derived from two consecutive counter snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthSample {
    /// Wall-clock time of the later snapshot, whole seconds.
    pub timestamp: DateTime<FixedOffset>,
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

/// What to do when a counter is lower than in the previous snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverPolicy {
    /// Stop with [`Error::RateAnomaly`].
    #[default]
    Fail,
    /// Report zero for the affected direction and log a warning.
    Clamp,
}

/// Turns snapshot pairs into megabit-per-second rates (decimal prefix).
#[derive(Debug, Default)]
pub struct RateCalculator {
    policy: RolloverPolicy,
    clamped: u64,
}

impl RateCalculator {
    pub fn new(policy: RolloverPolicy) -> Self {
        Self { policy, clamped: 0 }
    }

    pub fn policy(&self) -> RolloverPolicy {
        self.policy
    }

    /// Number of directions zeroed so far under [`RolloverPolicy::Clamp`].
    pub fn clamped(&self) -> u64 {
        self.clamped
    }

    pub fn compute(
        &mut self,
        previous: &CounterSnapshot,
        current: &CounterSnapshot,
        elapsed: Duration,
    ) -> Result<BandwidthSample> {
        let now = Local::now().trunc_subsecs(0).fixed_offset();
        self.compute_at(previous, current, elapsed, now)
    }

    /// Same as [`compute`](Self::compute) with an explicit sample timestamp.
    pub fn compute_at(
        &mut self,
        previous: &CounterSnapshot,
        current: &CounterSnapshot,
        elapsed: Duration,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<BandwidthSample> {
        if elapsed.is_zero() {
            return Err(Error::InvalidInterval);
        }
        let seconds = elapsed.as_secs_f64();
        let download_mbps = self.rate(
            Direction::Download,
            previous.bytes_received,
            current.bytes_received,
            seconds,
        )?;
        let upload_mbps = self.rate(
            Direction::Upload,
            previous.bytes_transmitted,
            current.bytes_transmitted,
            seconds,
        )?;
        Ok(BandwidthSample {
            timestamp: timestamp.trunc_subsecs(0),
            download_mbps,
            upload_mbps,
        })
    }

    fn rate(&mut self, direction: Direction, previous: u64, current: u64, seconds: f64) -> Result<f64> {
        match current.checked_sub(previous) {
            Some(delta) => Ok(delta as f64 * BITS_PER_BYTE / (seconds * BITS_PER_MEGABIT)),
            None => match self.policy {
                RolloverPolicy::Fail => Err(Error::RateAnomaly {
                    direction,
                    previous,
                    current,
                }),
                RolloverPolicy::Clamp => {
                    self.clamped += 1;
                    tracing::warn!(
                        %direction,
                        previous,
                        current,
                        "counter went backwards, reporting zero for this sample"
                    );
                    Ok(0.0)
                }
            },
        }
    }
}
