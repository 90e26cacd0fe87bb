use anyhow::Result;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::interval;

use crate::rate::BandwidthSample;

/// Session counters shared between the sampling loop and the heartbeat task.
pub struct Metrics {
    samples: AtomicU64,
    rollovers_clamped: AtomicU64,
    bytes_received: AtomicU64,
    bytes_transmitted: AtomicU64,
    peaks: Mutex<Peaks>,
    last_sample: Mutex<Option<Instant>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Peaks {
    download_mbps: f64,
    upload_mbps: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            samples: AtomicU64::new(0),
            rollovers_clamped: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_transmitted: AtomicU64::new(0),
            peaks: Mutex::new(Peaks::default()),
            last_sample: Mutex::new(None),
        }
    }

    pub fn record_sample(&self, sample: &BandwidthSample) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut peaks) = self.peaks.lock() {
            peaks.download_mbps = peaks.download_mbps.max(sample.download_mbps);
            peaks.upload_mbps = peaks.upload_mbps.max(sample.upload_mbps);
        }
        if let Ok(mut guard) = self.last_sample.lock() {
            *guard = Some(Instant::now());
        }
    }

    pub fn record_rollovers(&self, count: u64) {
        self.rollovers_clamped.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds the counter deltas behind one sample.
    pub fn record_bytes(&self, received: u64, transmitted: u64) {
        self.bytes_received.fetch_add(received, Ordering::Relaxed);
        self.bytes_transmitted.fetch_add(transmitted, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let last_sample_age = self.last_sample.lock().ok().and_then(|guard| {
            guard.map(|instant| Instant::now().saturating_duration_since(instant))
        });
        let peaks = self.peaks.lock().map(|p| *p).unwrap_or_default();
        SessionSnapshot {
            samples: self.samples.load(Ordering::Relaxed),
            rollovers_clamped: self.rollovers_clamped.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_transmitted: self.bytes_transmitted.load(Ordering::Relaxed),
            peak_download_mbps: peaks.download_mbps,
            peak_upload_mbps: peaks.upload_mbps,
            last_sample_age,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub samples: u64,
    pub rollovers_clamped: u64,
    pub bytes_received: u64,
    pub bytes_transmitted: u64,
    pub peak_download_mbps: f64,
    pub peak_upload_mbps: f64,
    pub last_sample_age: Option<Duration>,
}

/// Logs session counters every `period` and warns when sampling stalls past
/// `idle_threshold`. Runs until the shutdown channel fires.
pub async fn heartbeat(
    interface: Arc<String>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<()>,
    period: Duration,
    idle_threshold: Duration,
) -> Result<()> {
    let mut ticker = interval(period);
    // first tick completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let snapshot = metrics.snapshot();
                tracing::info!(
                    interface = %interface,
                    samples = snapshot.samples,
                    rollovers_clamped = snapshot.rollovers_clamped,
                    bytes_received = snapshot.bytes_received,
                    bytes_transmitted = snapshot.bytes_transmitted,
                    peak_download_mbps = snapshot.peak_download_mbps,
                    peak_upload_mbps = snapshot.peak_upload_mbps,
                    "sampling heartbeat"
                );
                if let Some(age) = snapshot.last_sample_age {
                    if age > idle_threshold {
                        tracing::warn!(
                            interface = %interface,
                            idle_seconds = ?age.as_secs_f64(),
                            "no sample written in the last {} seconds",
                            idle_threshold.as_secs()
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
