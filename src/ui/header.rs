use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph};

use crate::config::MetricsConfig;
use crate::format::{format_kb, format_percent, format_speed};
use crate::system::snapshot::MetricsSnapshot;
use crate::ui::theme::Theme;

/// Gauges for the percentage metrics plus one block for network throughput.
/// Hidden metrics render a dimmed "off" block so the layout stays put.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    snapshot: Option<&MetricsSnapshot>,
    metrics: &MetricsConfig,
    theme: &Theme,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(40),
        ])
        .split(area);

    render_gauge(
        frame,
        chunks[0],
        "CPU",
        metrics.show_cpu,
        snapshot.map(|s| s.cpu_percent),
        theme,
    );
    render_gauge(
        frame,
        chunks[1],
        "MEM",
        metrics.show_memory,
        snapshot.map(|s| s.memory_percent),
        theme,
    );
    render_gauge(
        frame,
        chunks[2],
        "DISK",
        metrics.show_disk,
        snapshot.map(|s| s.disk_percent),
        theme,
    );
    render_network(frame, chunks[3], snapshot, metrics.show_network, theme);
}

fn titled_block<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.overlay_border))
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(theme.text_secondary)
                .add_modifier(Modifier::BOLD),
        ))
}

fn render_gauge(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    enabled: bool,
    percent: Option<f64>,
    theme: &Theme,
) {
    let block = titled_block(title, theme);
    if !enabled {
        let off = Paragraph::new(Span::styled("off", Style::default().fg(theme.text_disabled)))
            .block(block);
        frame.render_widget(off, area);
        return;
    }

    let (ratio, label) = match percent {
        Some(p) => ((p / 100.0).clamp(0.0, 1.0), format_percent(p)),
        None => (0.0, "Loading...".to_string()),
    };
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(
            Style::default()
                .fg(theme.gauge_filled)
                .bg(theme.gauge_unfilled),
        )
        .ratio(ratio)
        .label(label);

    frame.render_widget(gauge, area);
}

fn render_network(
    frame: &mut Frame,
    area: Rect,
    snapshot: Option<&MetricsSnapshot>,
    enabled: bool,
    theme: &Theme,
) {
    let block = titled_block("NET", theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !enabled {
        let off = Span::styled("off", Style::default().fg(theme.text_disabled));
        frame.render_widget(Paragraph::new(off), inner);
        return;
    }

    let line = match snapshot {
        Some(s) => {
            let net = &s.network;
            Line::from(vec![
                Span::styled(
                    format!("\u{2193}{} KB/s", format_speed(net.download_kbps)),
                    Style::default().fg(theme.download).add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled(
                    format!("\u{2191}{} KB/s", format_speed(net.upload_kbps)),
                    Style::default().fg(theme.upload).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(
                        "  total {}/{}",
                        format_kb(net.total_download_kb),
                        format_kb(net.total_upload_kb)
                    ),
                    Style::default().fg(theme.text_secondary),
                ),
            ])
        }
        None => Line::from(Span::styled(
            "Loading...",
            Style::default().fg(theme.text_secondary),
        )),
    };
    frame.render_widget(Paragraph::new(line), inner);
}
