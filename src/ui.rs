use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use crate::transcript::{Body, Role};

const SIDEBAR_WIDTH: u16 = 28;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);

    let chat_column = if app.sidebar_open {
        let [sidebar_area, chat_area] = Layout::horizontal([
            Constraint::Length(SIDEBAR_WIDTH),
            Constraint::Min(0),
        ])
        .areas(body_area);
        render_sidebar(app, frame, sidebar_area);
        chat_area
    } else {
        body_area
    };

    let [transcript_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_column);

    render_transcript(app, frame, transcript_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" ragchat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Menu ");

    let key_style = Style::default().fg(Color::Cyan);
    let lines = vec![
        Line::from(Span::styled("Endpoint", Style::default().bold())),
        Line::from(Span::styled(
            app.endpoint.clone(),
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled("Keys", Style::default().bold())),
        Line::from(vec![
            Span::styled("Ctrl+N ", key_style),
            Span::raw("new chat"),
        ]),
        Line::from(vec![
            Span::styled("Ctrl+B ", key_style),
            Span::raw("close sidebar"),
        ]),
        Line::from(vec![Span::styled("i      ", key_style), Span::raw("edit input")]),
        Line::from(vec![Span::styled("j/k    ", key_style), Span::raw("scroll chat")]),
        Line::from(vec![Span::styled("q      ", key_style), Span::raw("quit")]),
    ];

    let sidebar = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(sidebar, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let text = if app.transcript.is_empty() {
        welcome_banner(app)
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for entry in app.transcript.entries() {
            match entry.role {
                Role::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                }
                Role::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                }
            }

            match &entry.body {
                Body::Pending => {
                    // Typing affordance: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        dots,
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::ITALIC),
                    )));
                }
                Body::Text(content) => {
                    for line in content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
            }

            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn welcome_banner(app: &App) -> Text<'static> {
    Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            app.welcome.current(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        Line::default(),
        Line::from(Span::styled(
            "Type a question and press Enter",
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Center),
    ])
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Ask ");

    // Horizontal scroll keeps the cursor inside the inner width
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else if app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if app.input_mode == InputMode::Editing {
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" browse ", label_style),
            Span::styled(" Ctrl+N ", key_style),
            Span::styled(" new chat ", label_style),
            Span::styled(" Ctrl+B ", key_style),
            Span::styled(" sidebar ", label_style),
            Span::styled(" Ctrl+C ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" i ", key_style),
            Span::styled(" edit ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" n ", key_style),
            Span::styled(" new chat ", label_style),
            Span::styled(" b ", key_style),
            Span::styled(" sidebar ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let footer = Paragraph::new(Line::from(hints));
    frame.render_widget(footer, area);
}
