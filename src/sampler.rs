use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, time::sleep};

use crate::counters::{CounterSnapshot, CounterSource};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::rate::{BandwidthSample, RateCalculator};
use crate::series::SeriesStore;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Sampling,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown channel fired (or its sender went away).
    Shutdown,
    /// The configured number of samples was written.
    LimitReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub samples: u64,
    pub reason: StopReason,
}

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub interface: String,
    pub interval: Duration,
    pub max_samples: Option<u64>,
}

impl SamplerSettings {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            interval: DEFAULT_INTERVAL,
            max_samples: None,
        }
    }
}

/// Periodically diffs counter snapshots and appends the resulting samples.
pub struct SamplingLoop<S> {
    source: S,
    store: SeriesStore,
    calculator: RateCalculator,
    settings: SamplerSettings,
    metrics: Arc<Metrics>,
    state: LoopState,
}

impl<S: CounterSource> SamplingLoop<S> {
    pub fn new(
        source: S,
        store: SeriesStore,
        calculator: RateCalculator,
        settings: SamplerSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            store,
            calculator,
            settings,
            metrics,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    /// Samples until `shutdown` fires, the sample limit is hit, or an error occurs.
    /// Errors are terminal: the loop stops and hands the error back unchanged.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<()>) -> Result<SessionSummary> {
        let interface = self.settings.interface.clone();
        let result = self.drive(&mut shutdown).await;
        self.state = LoopState::Stopped;
        match &result {
            Ok(summary) => tracing::info!(
                interface = %interface,
                samples = summary.samples,
                reason = ?summary.reason,
                "sampling stopped"
            ),
            Err(err) => tracing::error!(
                interface = %interface,
                error = %err,
                "sampling aborted"
            ),
        }
        result
    }

    async fn drive(&mut self, shutdown: &mut watch::Receiver<()>) -> Result<SessionSummary> {
        let mut previous = self.source.read(&self.settings.interface).await?;
        self.state = LoopState::Sampling;
        tracing::info!(
            interface = %self.settings.interface,
            series = %self.store.path().display(),
            interval_ms = self.settings.interval.as_millis() as u64,
            "sampling started"
        );

        let mut samples = 0u64;
        loop {
            if self.settings.max_samples.is_some_and(|limit| samples >= limit) {
                return Ok(SessionSummary {
                    samples,
                    reason: StopReason::LimitReached,
                });
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(interface = %self.settings.interface, "shutdown requested");
                    return Ok(SessionSummary {
                        samples,
                        reason: StopReason::Shutdown,
                    });
                }
                _ = sleep(self.settings.interval) => {}
            }
            let (current, sample) = self.step(&previous).await?;
            samples += 1;
            tracing::info!(
                interface = %self.settings.interface,
                download_mbps = sample.download_mbps,
                upload_mbps = sample.upload_mbps,
                "sample recorded"
            );
            previous = current;
        }
    }

    async fn step(&mut self, previous: &CounterSnapshot) -> Result<(CounterSnapshot, BandwidthSample)> {
        let current = self.source.read(&self.settings.interface).await?;
        let elapsed = current.taken_at.saturating_duration_since(previous.taken_at);
        let clamped_before = self.calculator.clamped();
        let sample = self.calculator.compute(previous, &current, elapsed)?;
        self.store.append(&sample).await?;
        self.metrics.record_sample(&sample);
        self.metrics
            .record_rollovers(self.calculator.clamped() - clamped_before);
        // a clamped direction moved backwards and contributes nothing
        self.metrics.record_bytes(
            current
                .bytes_received
                .checked_sub(previous.bytes_received)
                .unwrap_or(0),
            current
                .bytes_transmitted
                .checked_sub(previous.bytes_transmitted)
                .unwrap_or(0),
        );
        Ok((current, sample))
    }
}
