use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use crate::config::{Config, MetricKind};
use crate::display::TrayText;
use crate::format::truncate_unicode;
use crate::ui::theme::Theme;

/// What the tray currently shows: icon title, tooltip and the menu.
pub fn render_tray(frame: &mut Frame, area: Rect, text: &TrayText, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.overlay_border))
        .title(Span::styled(
            " Tray ",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ));

    // Label column plus borders
    let room = usize::from(area.width.saturating_sub(12));
    let mut lines = vec![
        Line::from(vec![
            Span::styled(" Title   ", Style::default().fg(theme.text_secondary)),
            Span::styled(
                format!(" {} ", truncate_unicode(&text.title, room.saturating_sub(2))),
                Style::default()
                    .fg(theme.header_accent_fg)
                    .bg(theme.header_accent_bg)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled(" Tooltip ", Style::default().fg(theme.text_secondary)),
            Span::styled(
                format!(" {}", truncate_unicode(&text.tooltip, room)),
                Style::default().fg(theme.text_primary),
            ),
        ]),
        Line::from(""),
    ];
    for item in text.visible_items() {
        lines.push(Line::from(Span::styled(
            format!("   {}", item.label),
            Style::default().fg(theme.text_primary),
        )));
    }
    lines.push(Line::from(Span::styled(
        "   Settings",
        Style::default().fg(theme.text_secondary),
    )));
    lines.push(Line::from(Span::styled(
        "   Quit",
        Style::default().fg(theme.text_secondary),
    )));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// The editable draft. `dirty` marks the block title when the draft differs
/// from the active settings.
pub fn render_settings(
    frame: &mut Frame,
    area: Rect,
    draft: &Config,
    dirty: bool,
    theme: &Theme,
) {
    let title = if dirty { " Settings * " } else { " Settings " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.overlay_border))
        .title(Span::styled(
            title,
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ));

    let mut lines = vec![
        Line::from(vec![
            Span::styled(" Refresh every ", Style::default().fg(theme.text_secondary)),
            Span::styled(
                format!("{}s", draft.general.refresh_interval_secs),
                Style::default().fg(theme.text_primary).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "            show  title",
            Style::default().fg(theme.text_secondary),
        )),
    ];
    for kind in [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Disk,
        MetricKind::Network,
    ] {
        let (shown, in_title) = flags(draft, kind);
        let row_style = if shown {
            Style::default().fg(theme.text_primary)
        } else {
            Style::default().fg(theme.text_disabled)
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {:<10}", label(kind)), row_style),
            Span::styled(format!("  {}  ", checkbox(shown)), row_style),
            Span::styled(format!("  {}", checkbox(in_title)), row_style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" Both speeds in title ", Style::default().fg(theme.text_secondary)),
        Span::styled(
            checkbox(draft.title.show_both_network_speeds),
            Style::default().fg(theme.text_primary),
        ),
    ]));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn flags(config: &Config, kind: MetricKind) -> (bool, bool) {
    let m = &config.metrics;
    let t = &config.title;
    match kind {
        MetricKind::Cpu => (m.show_cpu, t.show_cpu),
        MetricKind::Memory => (m.show_memory, t.show_memory),
        MetricKind::Disk => (m.show_disk, t.show_disk),
        MetricKind::Network => (m.show_network, t.show_network),
    }
}

fn label(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Cpu => "CPU",
        MetricKind::Memory => "Memory",
        MetricKind::Disk => "Disk",
        MetricKind::Network => "Network",
    }
}

fn checkbox(on: bool) -> &'static str {
    if on { "[x]" } else { "[ ]" }
}
