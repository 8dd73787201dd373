mod theme;

use crate::app::{AppModel, ClockStatus};
use crate::domain::{Bar, TimelineLayout, format_duration};
use ratatui::prelude::*;
use ratatui::widgets::*;
use unicode_width::UnicodeWidthStr;

pub fn render(frame: &mut Frame, model: &AppModel) {
    let full_area = frame.area();
    if full_area.width == 0 || full_area.height == 0 {
        return;
    }

    render_status_bar(frame, full_area, model);

    let content_area = if full_area.height > 1 {
        Rect {
            x: full_area.x,
            y: full_area.y.saturating_add(1),
            width: full_area.width,
            height: full_area.height.saturating_sub(1),
        }
    } else {
        full_area
    };

    let area = inner_area(content_area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let timeline = model.timeline();
    render_clock(frame, chunks[0], model);
    render_timeline(frame, chunks[1], model, &timeline);

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[2]);
    render_sessions(frame, lower[0], model, &timeline);
    render_week(frame, lower[1], model);
    render_footer(frame, chunks[3], model);

    if model.help_open {
        render_help_overlay(frame, content_area);
    }
}

fn render_status_bar(frame: &mut Frame, area: Rect, model: &AppModel) {
    let bar_area = Rect {
        x: area.x,
        y: area.y,
        width: area.width,
        height: 1,
    };

    let base_style = Style::default().fg(theme::FG).bg(theme::BAR_BG);
    let title_style = base_style.add_modifier(Modifier::BOLD);
    let hint_style = Style::default().fg(theme::MUTED).bg(theme::BAR_BG);

    let title = " ⏱ stopwatch ";
    let day = if model.page.is_live() {
        format!("  {} (today)", model.day.date().format("%a %Y-%m-%d"))
    } else {
        format!("  {} (history)", model.day.date().format("%a %Y-%m-%d"))
    };
    let (push_text, push_color) = if model.push_connected {
        ("● live updates ", theme::RUNNING)
    } else {
        ("○ offline ", theme::OFFLINE)
    };

    let used_width = UnicodeWidthStr::width(title)
        + UnicodeWidthStr::width(day.as_str())
        + UnicodeWidthStr::width(push_text);
    let remaining = (bar_area.width as usize).saturating_sub(used_width);

    let spans = vec![
        Span::styled(title.to_string(), title_style),
        Span::styled(day, hint_style),
        Span::styled(" ".repeat(remaining), base_style),
        Span::styled(push_text.to_string(), base_style.fg(push_color)),
    ];

    frame.render_widget(Paragraph::new(Line::from(spans)).style(base_style), bar_area);
}

fn render_clock(frame: &mut Frame, area: Rect, model: &AppModel) {
    let line = if model.page.is_live() {
        let (label_color, value_color) = match model.clock.status() {
            ClockStatus::Running => (theme::RUNNING, theme::ACCENT),
            ClockStatus::Stopped => (theme::MUTED, theme::FG),
        };
        Line::from(vec![
            Span::styled(
                format!("{:<8}", model.clock.status().label()),
                Style::default().fg(label_color),
            ),
            Span::styled(
                model.clock.display_text(),
                Style::default().fg(value_color).add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled("Total   ", Style::default().fg(theme::MUTED)),
            Span::styled(
                format_duration(model.day_total()),
                Style::default().fg(theme::FG).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (read-only)", Style::default().fg(theme::DIM)),
        ])
    };

    let title = if model.page.is_live() { "Today" } else { "Day" };
    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::BORDER))
            .padding(Padding::horizontal(1))
            .title(title),
    );
    frame.render_widget(paragraph, area);
}

fn render_timeline(frame: &mut Frame, area: Rect, model: &AppModel, timeline: &TimelineLayout) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .title(format!(
            "Timeline from {}",
            model.day.start.format("%H:%M")
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let lines = timeline_lines(timeline, inner.width);
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Label row, tick row and bar row for `width` terminal columns.
fn timeline_lines(timeline: &TimelineLayout, width: u16) -> Vec<Line<'static>> {
    let cols = width as usize;
    let mut labels = vec![' '; cols];
    let mut ticks = vec![' '; cols];
    let mut next_free = 0usize;

    for tick in &timeline.ticks {
        let Some(col) = tick_column(tick.left_percent, width) else {
            continue;
        };
        ticks[col] = '╷';
        let Some(label) = &tick.label else {
            continue;
        };
        let end = col + label.chars().count();
        if col < next_free || end > cols {
            continue;
        }
        for (offset, ch) in label.chars().enumerate() {
            labels[col + offset] = ch;
        }
        next_free = end + 1;
    }

    let baseline = Style::default().fg(theme::DIM);
    let mut cells: Vec<(char, Style)> = vec![('─', baseline); cols];
    for bar in &timeline.bars {
        let Some((start, end)) = bar_columns(bar, width) else {
            continue;
        };
        let color = if bar.open { theme::ACCENT } else { theme::FG };
        for cell in &mut cells[start..end] {
            *cell = ('█', Style::default().fg(color));
        }
    }

    vec![
        Line::from(Span::styled(
            labels.into_iter().collect::<String>(),
            Style::default().fg(theme::MUTED),
        )),
        Line::from(Span::styled(
            ticks.into_iter().collect::<String>(),
            baseline,
        )),
        styled_runs(&cells),
    ]
}

fn styled_runs(cells: &[(char, Style)]) -> Line<'static> {
    let mut spans = Vec::new();
    let mut run = String::new();
    let mut run_style: Option<Style> = None;
    for (ch, style) in cells {
        if run_style.is_some_and(|current| current != *style) {
            spans.push(Span::styled(std::mem::take(&mut run), run_style.unwrap_or_default()));
        }
        run_style = Some(*style);
        run.push(*ch);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, run_style.unwrap_or_default()));
    }
    Line::from(spans)
}

fn column_of(percent: f64, width: u16) -> f64 {
    percent / 100.0 * f64::from(width)
}

fn tick_column(percent: f64, width: u16) -> Option<usize> {
    let col = column_of(percent, width).floor();
    if col < 0.0 || col >= f64::from(width) {
        return None;
    }
    Some(col as usize)
}

/// Half-open column range a bar covers, cut at the widget edges. Every visible
/// bar gets at least one column.
fn bar_columns(bar: &Bar, width: u16) -> Option<(usize, usize)> {
    let max = f64::from(width);
    let start = column_of(bar.left_percent, width).floor();
    let end = column_of(bar.left_percent + bar.width_percent, width).ceil();
    if width == 0 || start >= max || end <= 0.0 {
        return None;
    }
    let start = start.max(0.0) as usize;
    let end = (end.min(max) as usize).max(start + 1);
    Some((start, end.min(width as usize)))
}

fn render_sessions(frame: &mut Frame, area: Rect, model: &AppModel, timeline: &TimelineLayout) {
    let title = format!("Sessions · {}", format_duration(model.day_total()));
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .padding(Padding::horizontal(1))
        .title(title);

    if timeline.bars.is_empty() {
        let message = if model.sessions_loaded {
            "No sessions recorded."
        } else {
            "Loading…"
        };
        let empty = Paragraph::new(Span::styled(message, Style::default().fg(theme::DIM)))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = timeline
        .bars
        .iter()
        .map(|bar| {
            let (marker, color) = if bar.open {
                ("● ", theme::ACCENT)
            } else {
                ("  ", theme::FG)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(color)),
                Span::styled(bar.label.clone(), Style::default().fg(color)),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_week(frame: &mut Frame, area: Rect, model: &AppModel) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .padding(Padding::horizontal(1))
        .title("Last 7 days");

    if model.day_stats.is_empty() {
        let empty =
            Paragraph::new(Span::styled("No stats yet.", Style::default().fg(theme::DIM)))
                .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let shown = model.day.date();
    let items: Vec<ListItem> = model
        .day_stats
        .iter()
        .map(|stat| {
            let style = if stat.date == shown {
                Style::default().fg(theme::ACCENT)
            } else {
                Style::default().fg(theme::FG)
            };
            ListItem::new(Line::from(Span::styled(
                format!(
                    "{}  {:>12}",
                    stat.date.format("%a %m-%d"),
                    format_duration(stat.elapsed)
                ),
                style,
            )))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_footer(frame: &mut Frame, area: Rect, model: &AppModel) {
    let line = match &model.notice {
        Some(notice) => Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(theme::ACCENT),
        )),
        None => {
            let hints = if model.page.is_live() {
                "space start/stop  ←/→ day  r resync  ? help  q quit"
            } else {
                "←/→ day  t today  r resync  ? help  q quit"
            };
            Line::from(Span::styled(hints, Style::default().fg(theme::DIM)))
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn inner_area(area: Rect) -> Rect {
    if area.width < 40 || area.height < 16 {
        return area;
    }
    area.inner(Margin {
        vertical: 1,
        horizontal: 2,
    })
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup);

    let text = vec![
        Line::from("Clock"),
        Line::from("  - Space or s: start / stop (today only)"),
        Line::from("  - r: resync with the server"),
        Line::from(""),
        Line::from("Days"),
        Line::from("  - ← or h: previous day"),
        Line::from("  - → or l: next day"),
        Line::from("  - t: back to today"),
        Line::from(""),
        Line::from("Global"),
        Line::from("  - q, Esc or Ctrl+C: quit"),
        Line::from("  - ?: show this help (any key closes)"),
    ];

    let paragraph = Paragraph::new(text).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme::BORDER))
            .padding(Padding::horizontal(1))
            .title("Help"),
    );
    frame.render_widget(paragraph, popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
