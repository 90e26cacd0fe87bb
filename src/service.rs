use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::{signal, sync::watch};

use crate::chart::{self, ChartData};
use crate::config::AppConfig;
use crate::counters::ProcNetDev;
use crate::metrics::{self, Metrics};
use crate::png;
use crate::rate::RateCalculator;
use crate::sampler::{SamplerSettings, SamplingLoop, SessionSummary};
use crate::series::SeriesStore;

/// Heartbeat warns once this many intervals pass without a sample.
const IDLE_INTERVALS: u32 = 5;

pub struct Service {
    config: AppConfig,
}

impl Service {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Starts a new session: truncates the series, then samples until ctrl-c,
    /// the sample limit, or the first error.
    pub async fn record(self) -> Result<SessionSummary> {
        let interval = self.config.interval();
        let heartbeat_period = self.config.heartbeat();
        let AppConfig {
            interface,
            series_path,
            counters_path,
            rollover,
            max_samples,
            ..
        } = self.config;

        let mut store = SeriesStore::new(&series_path);
        let pending = store.existing_rows().await?;
        if pending > 0 {
            tracing::warn!(
                series = %series_path,
                rows = pending,
                "overwriting previous series"
            );
        }
        store.start_fresh().await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let interface = Arc::new(interface);
        let metrics = Arc::new(Metrics::new());

        let heartbeat_handle = tokio::spawn(metrics::heartbeat(
            interface.clone(),
            metrics.clone(),
            shutdown_rx.clone(),
            heartbeat_period,
            interval * IDLE_INTERVALS,
        ));

        let settings = SamplerSettings {
            interface: interface.to_string(),
            interval,
            max_samples,
        };
        let mut sampler = SamplingLoop::new(
            ProcNetDev::new(&counters_path),
            store,
            RateCalculator::new(rollover),
            settings,
            metrics.clone(),
        );

        let signal_task = {
            let interface = interface.clone();
            let shutdown_tx = shutdown_tx.clone();
            tokio::spawn(async move {
                signal::ctrl_c().await.ok();
                tracing::info!(interface = %interface, "ctrl-c received, requesting shutdown");
                shutdown_tx.send(()).ok();
            })
        };

        let result = sampler.run(shutdown_rx).await;
        signal_task.abort();

        shutdown_tx.send(()).ok();
        heartbeat_handle.await??;

        let snapshot = metrics.snapshot();
        tracing::info!(
            interface = %interface,
            samples = snapshot.samples,
            rollovers_clamped = snapshot.rollovers_clamped,
            bytes_received = snapshot.bytes_received,
            bytes_transmitted = snapshot.bytes_transmitted,
            peak_download_mbps = snapshot.peak_download_mbps,
            peak_upload_mbps = snapshot.peak_upload_mbps,
            series = %series_path,
            "session summary"
        );

        Ok(result?)
    }

    /// Loads the whole series and renders it to the chart image, optionally
    /// followed by the terminal viewer.
    pub async fn plot(self) -> Result<()> {
        let AppConfig {
            series_path,
            chart_path,
            view_chart,
            ..
        } = self.config;
        let samples = SeriesStore::new(&series_path).read_all().await?;
        tracing::info!(
            series = %series_path,
            samples = samples.len(),
            "series loaded"
        );
        let data = ChartData::from_samples(&samples)?;

        let image = PathBuf::from(&chart_path);
        tokio::task::spawn_blocking(move || -> Result<()> {
            png::render(&data, &image)?;
            tracing::info!(chart = %image.display(), "chart written");
            if view_chart {
                chart::show(&data)?;
            }
            Ok(())
        })
        .await
        .context("chart renderer panicked")?
    }
}
