use std::str::FromStr;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::app::App;
use crate::config::ConfigStore;
use crate::document::Viewport;
use crate::layout::{self as flow, SpanStyle};
use crate::session::{SessionState, Source};

/// Status, help and message rows under the page.
const FOOTER_LINES: u16 = 3;

const HELP: &str = "s start  p paste  space pause  esc stop  t toggle  +/- speed  [/] group  1-3 preset  m mode  q quit";

/// Size of the page area inside its frame for a terminal of the given size.
pub fn content_viewport(width: u16, height: u16) -> Viewport {
    Viewport {
        width: width.saturating_sub(2).max(1),
        height: height.saturating_sub(FOOTER_LINES + 2).max(1),
    }
}

/// Terminal color for a CSS-ish color string; unknown values fall back to
/// light blue.
pub fn highlight_color(css: &str) -> Color {
    Color::from_str(css.trim()).unwrap_or(Color::LightBlue)
}

impl<C: ConfigStore> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        render_page(self, chunks[0], buf);
        status_line(self).render(chunks[1], buf);
        Paragraph::new(Span::styled(
            HELP,
            Style::default().add_modifier(Modifier::DIM),
        ))
        .render(chunks[2], buf);
        if let Some(message) = self.message() {
            Paragraph::new(Span::styled(
                message,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::ITALIC),
            ))
            .render(chunks[3], buf);
        }
    }
}

fn render_page<C: ConfigStore>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let doc = app.document();
    let reader = app.session_state().source() == Some(Source::Pasted);
    let block = if reader {
        Block::default()
            .borders(Borders::ALL)
            .title(" Reader ")
            .title_bottom(" esc: Close Reader ")
            .border_style(Style::default().fg(Color::Cyan))
    } else {
        Block::default()
            .borders(Borders::ALL)
            .title(" Page ")
            .border_style(Style::default().add_modifier(Modifier::DIM))
    };
    let inner = block.inner(area);
    block.render(area, buf);

    let laid = doc.layout();
    let lines = laid
        .lines
        .iter()
        .skip(doc.scroll())
        .take(usize::from(inner.height))
        .map(to_line)
        .collect::<Vec<_>>();
    Paragraph::new(lines).render(inner, buf);
}

fn to_line(line: &flow::Line) -> Line<'_> {
    Line::from(
        line.spans
            .iter()
            .map(|span| Span::styled(span.text.as_str(), span_style(&span.style)))
            .collect::<Vec<_>>(),
    )
}

fn span_style(style: &SpanStyle) -> Style {
    match style {
        SpanStyle::Plain | SpanStyle::Group => Style::default(),
        SpanStyle::Heading => Style::default().add_modifier(Modifier::BOLD),
        SpanStyle::Control => Style::default().add_modifier(Modifier::REVERSED),
        SpanStyle::Highlight(color) => Style::default()
            .bg(highlight_color(color))
            .fg(Color::Black),
    }
}

fn status_line<C: ConfigStore>(app: &App<C>) -> Paragraph<'static> {
    let config = app.controller.config();
    let (label, color) = match app.session_state() {
        SessionState::Inactive => ("IDLE", Color::DarkGray),
        SessionState::Running(_) => ("READING", Color::Green),
        SessionState::Paused(_) => ("PAUSED", Color::Yellow),
    };

    let mut fields = vec![
        format!("mode {}", app.controller.mode()),
        format!("{} wpm", config.wpm),
        format!("group {}", config.group_size),
    ];
    if let Some(preset) = config.active_preset {
        fields.push(format!("preset {preset}"));
    }
    if let (Some(cursor), Some(total)) = (app.engine.cursor(), app.engine.group_count()) {
        fields.push(format!("{cursor}/{total}"));
    }

    Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {label} "),
            Style::default()
                .fg(Color::Black)
                .bg(color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {}", fields.iter().join(" · "))),
    ]))
}
