//! Chart data for a recorded bandwidth series and its terminal viewer.

use anyhow::{bail, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};
use std::io;

use crate::rate::BandwidthSample;

const DOWNLOAD_COLOR: Color = Color::Cyan;
const UPLOAD_COLOR: Color = Color::Magenta;

/// Plot-ready view of a series: x is seconds since the first sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub download: Vec<(f64, f64)>,
    pub upload: Vec<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub first: String,
    pub last: String,
}

impl ChartData {
    pub fn from_samples(samples: &[BandwidthSample]) -> Result<Self> {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            bail!("series is empty, nothing to plot");
        };
        let origin = first.timestamp.timestamp();
        let x = |s: &BandwidthSample| (s.timestamp.timestamp() - origin) as f64;

        let download: Vec<(f64, f64)> = samples.iter().map(|s| (x(s), s.download_mbps)).collect();
        let upload: Vec<(f64, f64)> = samples.iter().map(|s| (x(s), s.upload_mbps)).collect();

        let span = x(last).max(1.0);
        let peak = samples
            .iter()
            .map(|s| s.download_mbps.max(s.upload_mbps))
            .fold(0.0_f64, f64::max);
        // headroom so the peak is not drawn on the border
        let top = if peak > 0.0 { peak * 1.1 } else { 1.0 };

        Ok(Self {
            download,
            upload,
            x_bounds: [0.0, span],
            y_bounds: [0.0, top],
            first: first.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            last: last.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.download.len()
    }

    pub fn is_empty(&self) -> bool {
        self.download.is_empty()
    }
}

pub fn draw(f: &mut Frame, data: &ChartData) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(f.size());

    let datasets = vec![
        Dataset::default()
            .name("Download")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(DOWNLOAD_COLOR))
            .data(&data.download),
        Dataset::default()
            .name("Upload")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(UPLOAD_COLOR))
            .data(&data.upload),
    ];

    let [x_min, x_max] = data.x_bounds;
    let [y_min, y_max] = data.y_bounds;
    let label_style = Style::default().add_modifier(Modifier::BOLD);
    let chart = Chart::new(datasets)
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
        .block(
            Block::default()
                .title(format!(
                    " Bandwidth measurement: {} samples, {} .. {} ",
                    data.len(),
                    data.first,
                    data.last
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("Time (s)")
                .bounds(data.x_bounds)
                .labels(vec![
                    Span::styled(format!("{x_min:.0}"), label_style),
                    Span::raw(format!("{:.0}", (x_min + x_max) / 2.0)),
                    Span::styled(format!("{x_max:.0}"), label_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("Speed (Mbps)")
                .bounds(data.y_bounds)
                .labels(vec![
                    Span::styled(format!("{y_min:.1}"), label_style),
                    Span::raw(format!("{:.1}", (y_min + y_max) / 2.0)),
                    Span::styled(format!("{y_max:.1}"), label_style),
                ]),
        );
    f.render_widget(chart, chunks[0]);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("/"),
        Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]));
    f.render_widget(footer, chunks[1]);
}

/// Shows the chart full screen until the user quits.
pub fn show(data: &ChartData) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = view(&mut terminal, data);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn view<B: Backend>(terminal: &mut Terminal<B>, data: &ChartData) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, data))?;
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                return Ok(());
            }
        }
    }
}
