use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::core::message::MessageRole;
use crate::ui::app::ChatApp;

const INPUT_HINT: &str = "Enter send · Esc stop · F2 new chat · Ctrl+C quit";

/// Geometry of the transcript pane from the last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub height: u16,
    pub max_offset: u16,
}

fn role_style(role: MessageRole) -> Style {
    match role {
        MessageRole::System => Style::default().fg(Color::DarkGray),
        MessageRole::User => Style::default().fg(Color::Cyan),
        MessageRole::Assistant => Style::default(),
    }
}

/// Transcript lines: avatar on the first line of each message, continuation
/// lines indented to match, a blank line between messages.
pub fn build_lines(app: &ChatApp) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for (role, content) in app.transcript() {
        let style = role_style(role);
        let avatar = role.avatar();
        let indent = " ".repeat(UnicodeWidthStr::width(avatar) + 1);
        let mut first = true;
        for text in content.lines().chain(content.is_empty().then_some("")) {
            let prefix = if first {
                Span::styled(
                    format!("{avatar} "),
                    style.add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw(indent.clone())
            };
            first = false;
            lines.push(Line::from(vec![prefix, Span::styled(text, style)]));
        }
        lines.push(Line::from(""));
    }
    if let Some(status) = &app.status {
        lines.push(Line::from(Span::styled(
            status.as_str(),
            Style::default().fg(Color::Red),
        )));
    }
    lines
}

/// Rows the lines occupy once wrapped to `width` columns.
pub fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

pub fn draw(f: &mut Frame, app: &mut ChatApp) -> Viewport {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let mut header = format!("🤹 {} · {}", app.chat.title, app.model);
    if app.logging().is_active() {
        header.push_str(" · log ");
        header.push_str(&app.logging().get_status_string());
    }
    f.render_widget(
        Paragraph::new(header).style(Style::default().add_modifier(Modifier::BOLD)),
        chunks[0],
    );

    let transcript = chunks[1];
    let lines = build_lines(app);
    let total = wrapped_height(&lines, transcript.width);
    let viewport = Viewport {
        height: transcript.height,
        max_offset: total.saturating_sub(transcript.height),
    };
    let mut scroll = app.scroll;
    scroll.settle(viewport.max_offset);
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll.offset, 0));
    f.render_widget(paragraph, transcript);
    app.scroll = scroll;

    let input_title = if app.is_streaming() {
        "Receiving… (Esc to stop)"
    } else {
        INPUT_HINT
    };
    let input_style = if app.is_streaming() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let input_area = chunks[2];
    let inner_width = usize::from(input_area.width.saturating_sub(2));
    let input_width = UnicodeWidthStr::width(app.input.as_str());
    let skip = input_width.saturating_sub(inner_width.saturating_sub(1));
    let input = Paragraph::new(app.input.as_str())
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title(input_title))
        .scroll((0, u16::try_from(skip).unwrap_or(u16::MAX)));
    f.render_widget(input, input_area);

    let cursor_col = u16::try_from(input_width - skip).unwrap_or(0);
    f.set_cursor_position((input_area.x + 1 + cursor_col, input_area.y + 1));

    viewport
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::utils::logging::LoggingState;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn multi_line_messages_are_indented_under_the_avatar() {
        let mut app = ChatApp::new("m", LoggingState::disabled());
        app.chat.add_message(Message::user("one\ntwo"));
        let lines = build_lines(&app);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].spans[0].content, "👤 ");
        assert_eq!(lines[1].spans[0].content, "   ");
        assert_eq!(lines[1].spans[1].content, "two");
    }

    #[test]
    fn wrapped_height_counts_overflowing_lines() {
        let lines = vec![Line::from("a".repeat(25)), Line::from(""), Line::from("b")];
        assert_eq!(wrapped_height(&lines, 10), 5);
    }

    #[test]
    fn draw_shows_title_model_and_transcript() {
        let mut app = ChatApp::new("gpt-test", LoggingState::disabled());
        app.chat.set_title("Weather talk");
        app.chat.add_message(Message::user("Is it raining?"));
        app.chat.add_message(Message::assistant("Yes."));

        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        let mut viewport = Viewport::default();
        terminal
            .draw(|f| viewport = draw(f, &mut app))
            .unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Weather talk"));
        assert!(text.contains("gpt-test"));
        assert!(text.contains("Is it raining?"));
        assert!(text.contains("Yes."));
        assert_eq!(viewport.height, 8);
        assert_eq!(viewport.max_offset, 0);
    }

    #[test]
    fn long_transcripts_follow_the_bottom() {
        let mut app = ChatApp::new("m", LoggingState::disabled());
        for i in 0..20 {
            app.chat.add_message(Message::user(format!("line {i}")));
        }
        let mut terminal = Terminal::new(TestBackend::new(40, 10)).unwrap();
        let mut viewport = Viewport::default();
        terminal
            .draw(|f| viewport = draw(f, &mut app))
            .unwrap();

        assert!(viewport.max_offset > 0);
        assert_eq!(app.scroll.offset, viewport.max_offset);
        assert!(screen_text(&terminal).contains("line 19"));
    }
}
