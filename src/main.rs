use anyhow::{bail, Context, Result};
use netrate::{logging, prompt, AppConfig, Service};
use std::io;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plot,
    Record,
}

#[derive(Debug, Default)]
struct Cli {
    config_path: Option<String>,
    interface: Option<String>,
    output: Option<String>,
    chart: Option<String>,
    view: bool,
    source: Option<String>,
    interval_ms: Option<u64>,
    count: Option<u64>,
    clamp_rollover: bool,
    mode: Option<Mode>,
}

const USAGE: &str = "\
Usage: netrate [options]
  --config <path>       TOML configuration (default: config/netrate.toml if present)
  --interface <name>    Interface to sample (default: wlan0)
  --output <path>       Series file (default: report.txt)
  --chart <path>        Chart image written by --plot (default: report.png)
  --view                Also show the chart in the terminal after writing the image
  --source <path>       Counter report to read (default: /proc/net/dev)
  --interval-ms <n>     Milliseconds between samples (default: 1000)
  --count <n>           Stop after n samples
  --clamp-rollover      Record zero instead of failing when a counter goes backwards
  --plot                Render the existing series without asking
  --record              Start a new session without asking (overwrites the series)
  -h, --help            Show this help";

impl Cli {
    fn parse() -> Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut cli = Cli::default();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
            };
            match arg.as_str() {
                "--config" => cli.config_path = Some(value("--config")?),
                "--interface" => cli.interface = Some(value("--interface")?),
                "--output" => cli.output = Some(value("--output")?),
                "--chart" => cli.chart = Some(value("--chart")?),
                "--view" => cli.view = true,
                "--source" => cli.source = Some(value("--source")?),
                "--interval-ms" => {
                    let raw = value("--interval-ms")?;
                    cli.interval_ms = Some(
                        raw.parse()
                            .with_context(|| format!("invalid --interval-ms '{raw}'"))?,
                    );
                }
                "--count" => {
                    let raw = value("--count")?;
                    cli.count = Some(
                        raw.parse()
                            .with_context(|| format!("invalid --count '{raw}'"))?,
                    );
                }
                "--clamp-rollover" => cli.clamp_rollover = true,
                "--plot" => cli.set_mode(Mode::Plot)?,
                "--record" => cli.set_mode(Mode::Record)?,
                "--help" | "-h" => {
                    println!("{USAGE}");
                    std::process::exit(0);
                }
                other => bail!("unknown argument '{other}'\n{USAGE}"),
            }
        }
        Ok(cli)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if self.mode.is_some_and(|m| m != mode) {
            bail!("--plot and --record are mutually exclusive");
        }
        self.mode = Some(mode);
        Ok(())
    }

    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config_path {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("unable to load configuration from {path}"))?,
            None => AppConfig::load_or_default()?,
        };
        if let Some(interface) = &self.interface {
            config.interface = interface.trim().to_string();
        }
        if let Some(output) = &self.output {
            config.series_path = output.clone();
        }
        if let Some(chart) = &self.chart {
            config.chart_path = chart.clone();
        }
        if self.view {
            config.view_chart = true;
        }
        if let Some(source) = &self.source {
            config.counters_path = source.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
        if self.count.is_some() {
            config.max_samples = self.count;
        }
        if self.clamp_rollover {
            config.rollover = netrate::rate::RolloverPolicy::Clamp;
        }
        config.validate()?;
        Ok(config)
    }
}

fn choose_mode(config: &AppConfig) -> Result<Mode> {
    let question = format!(
        "Plot saved report? Answering no starts a new session and overwrites {}",
        config.series_path
    );
    let stdin = io::stdin();
    let plot = prompt::ask_yes_no(&mut stdin.lock(), &mut io::stdout(), &question)
        .context("failed to read answer")?;
    Ok(if plot { Mode::Plot } else { Mode::Record })
}

fn run() -> Result<()> {
    let cli = Cli::parse()?;
    let config = cli.resolve_config()?;
    logging::init(&config)?;

    // the prompt blocks on stdin, so it is answered before any runtime exists
    let mode = match cli.mode {
        Some(mode) => mode,
        None => choose_mode(&config)?,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async move {
        match mode {
            Mode::Plot => Service::new(config).plot().await,
            Mode::Record => Service::new(config).record().await.map(|_| ()),
        }
    })
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<netrate::Error>())
        .map(netrate::Error::exit_code)
        .unwrap_or(1);
    ExitCode::from(code)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code(&err)
        }
    }
}
