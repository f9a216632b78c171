use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::App;
use crate::state::{ChatMessage, ChatRole};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let rag = if app.controller.use_rag() { "[x] RAG" } else { "[ ] RAG" };
    let in_flight = app.controller.in_flight();
    let activity = if in_flight > 0 {
        format!(
            " {} {} streaming",
            SPINNER[app.animation_frame as usize % SPINNER.len()],
            in_flight
        )
    } else {
        String::new()
    };

    // Server label last: it is the first thing clipped on a narrow terminal
    let title = Line::from(vec![
        Span::styled(" CIO Brain", Style::default().fg(Color::Cyan).bold()),
        Span::styled(activity, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            rag,
            Style::default().fg(if app.controller.use_rag() {
                Color::Green
            } else {
                Color::Gray
            }),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::styled(app.server_label.clone(), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn role_label(role: ChatRole) -> Span<'static> {
    let (label, color) = match role {
        ChatRole::User => ("You:", Color::Cyan),
        ChatRole::Assistant => ("Assistant:", Color::Yellow),
        ChatRole::Error => ("Error:", Color::Red),
    };
    Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

/// Display width of a single char; control characters take no cells.
fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

/// Wrap one line of text to `width` terminal cells.
/// Breaks at spaces where possible and inside words wider than a whole row.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;
    let mut row_started = false;

    for word in text.split(' ') {
        let word_width = word.width();

        if row_started && current_width + 1 + word_width <= width {
            // Word fits on current line
            current_line.push(' ');
            current_line.push_str(word);
            current_width += 1 + word_width;
            continue;
        }

        if row_started {
            // Word doesn't fit, start new line
            lines.push(std::mem::take(&mut current_line));
            current_width = 0;
        }

        for c in word.chars() {
            let w = char_width(c);
            if current_width > 0 && current_width + w > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            current_line.push(c);
            current_width += w;
        }
        row_started = true;
    }

    lines.push(current_line);
    lines
}

/// Rows for one message, already wrapped to `width`.
fn message_lines(app: &App, msg: &ChatMessage, width: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(role_label(msg.role))];

    let body_style = if app.controller.is_placeholder(msg.id) {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
    } else if msg.role == ChatRole::Error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };

    for line in msg.content.split('\n') {
        for row in wrap_text_to_width(line, width) {
            lines.push(Line::from(Span::styled(row, body_style)));
        }
    }
    lines.push(Line::default());
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    // Inner size minus borders
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let text = if app.controller.conversation().is_empty() {
        app.max_scroll = 0;
        app.chat_scroll = 0;
        Text::from(Span::styled(
            "Type a question and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        // Rows are pre-wrapped, so the row count is exactly what the paragraph draws
        let width = app.chat_width as usize;
        let lines: Vec<Line> = app
            .controller
            .conversation()
            .messages()
            .iter()
            .flat_map(|msg| message_lines(app, msg, width))
            .collect();

        let total = lines.len().min(u16::MAX as usize) as u16;
        app.max_scroll = total.saturating_sub(app.chat_height);
        app.chat_scroll = if app.follow {
            app.max_scroll
        } else {
            app.chat_scroll.min(app.max_scroll)
        };
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Visible slice of the input and the cursor column inside it, both in cells.
/// Characters scroll off the left until the cursor cell fits in `width`.
fn input_view(input: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());

    let mut offset = 0;
    let mut before: usize = chars[..cursor].iter().copied().map(char_width).sum();
    while width > 0 && before >= width && offset < cursor {
        before -= char_width(chars[offset]);
        offset += 1;
    }

    let mut used = 0;
    let visible: String = chars[offset..]
        .iter()
        .copied()
        .take_while(|&c| {
            used += char_width(c);
            used <= width
        })
        .collect();

    (visible, before.min(u16::MAX as usize) as u16)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Prompt ");

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) =
        input_view(app.controller.input(), app.controller.cursor(), inner_width);

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan).bold());
    let hint = |h: &'static str| Span::styled(h, Style::default().fg(Color::Gray));

    let footer = Line::from(vec![
        key(" Enter"),
        hint(" send  "),
        key("Ctrl+R"),
        hint(" toggle RAG  "),
        key("PgUp/PgDn"),
        hint(" scroll  "),
        key("Esc"),
        hint(" quit"),
    ]);
    frame.render_widget(Paragraph::new(footer), area);
}
