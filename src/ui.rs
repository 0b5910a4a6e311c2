use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, BackendStatus, InputMode, Screen};
use crate::conversation::ChatRole;
use crate::credential::{mask_key, masked_cursor};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Home => render_home_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let key_indicator = if app.session.api_key().is_some() { " [key set]" } else { "" };

    let title = Line::from(vec![
        Span::styled(" RAG Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.base_url()), Style::default().fg(Color::Gray)),
        Span::styled(key_indicator, Style::default().fg(Color::Green)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Home => " HOME ",
        Screen::Chat if app.session.is_busy() => " Sending... ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {key} "), key_style),
            Span::styled(format!(" {label} "), label_style),
        ]
    };

    let hints: Vec<Span> = if app.show_api_key_input {
        [hint("Enter", "save"), hint("Esc", "cancel")].concat()
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Home, _) => [
                hint("Enter", "chat"),
                hint("K", "API key"),
                hint("r", "recheck"),
                hint("q", "quit"),
            ]
            .concat(),
            (Screen::Chat, InputMode::Editing) => [
                hint("Enter", "send"),
                hint("^L", "clear"),
                hint("PgUp/PgDn", "scroll"),
                hint("Esc", "stop typing"),
            ]
            .concat(),
            (Screen::Chat, InputMode::Normal) => [
                hint("i", "type"),
                hint("j/k", "scroll"),
                hint("C", "clear"),
                hint("K", "API key"),
                hint("Esc", "home"),
                hint("q", "quit"),
            ]
            .concat(),
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_home_screen(app: &App, frame: &mut Frame, area: Rect) {
    let status_line = match &app.backend_status {
        BackendStatus::Checking => Line::from(Span::styled(
            "○ checking backend...",
            Style::default().fg(Color::DarkGray),
        )),
        BackendStatus::Online(health) => {
            let model = health.model.as_deref().unwrap_or("unknown model");
            Line::from(vec![
                Span::styled("● online", Style::default().fg(Color::Green).bold()),
                Span::styled(format!("  {} ({})", health.status, model), Style::default().fg(Color::Gray)),
            ])
        }
        BackendStatus::Offline(reason) => Line::from(vec![
            Span::styled("● offline", Style::default().fg(Color::Red).bold()),
            Span::styled(format!("  {reason}"), Style::default().fg(Color::Gray)),
        ]),
    };

    let key_line = match app.session.api_key() {
        Some(key) => Line::from(vec![
            Span::styled("API key: ", Style::default().fg(Color::Gray)),
            Span::styled(mask_key(key), Style::default().fg(Color::Cyan)),
        ]),
        None => Line::from(Span::styled(
            "No API key set (press K if the backend requires one)",
            Style::default().fg(Color::DarkGray),
        )),
    };

    let mut lines = vec![
        Line::from(Span::styled(
            "RAG Assistant",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("Ask questions and get answers grounded in your documents."),
        Line::default(),
        Line::from(vec![
            Span::styled("Backend: ", Style::default().fg(Color::Gray)),
            Span::styled(app.base_url().to_string(), Style::default().fg(Color::Yellow)),
        ]),
        status_line,
        key_line,
        Line::default(),
        Line::from(Span::styled(
            "Press Enter to start chatting",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    if let Some(path) = &app.log_path {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Log: {}", path.display()),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let home = Paragraph::new(Text::from(lines))
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(home, area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store area and inner size for mouse hit-testing and scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
    app.sync_scroll();

    let chat_focused = app.input_mode == InputMode::Normal;
    let chat_border_color = if chat_focused { Color::Cyan } else { Color::DarkGray };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(chat_border_color))
        .title(format!(" Conversation ({}) ", app.session.conversation().len()));

    let conversation = app.session.conversation();
    let chat_text = if conversation.is_empty() && !app.session.is_busy() {
        Text::from(Span::styled(
            "Say hi and ask a question...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in conversation.messages() {
            let (label, color) = match msg.role() {
                ChatRole::User => ("You:", Color::Cyan),
                ChatRole::Assistant => ("AI:", Color::Yellow),
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            for line in msg.content().lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }

        if app.session.is_busy() {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.session.is_busy() { " Sending... " } else { " Type a message " };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = app.session.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing && !app.show_api_key_input {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    // Centered popup, shrunk to whatever the terminal can hold
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 7.min(area.height);

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height).intersection(area);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    // Rows that don't fit inside the border are skipped
    let row = |offset: u16| (offset < inner.height).then(|| Rect::new(inner.x, inner.y + offset, inner.width, 1));

    if let Some(instructions_area) = row(0) {
        let instructions = Paragraph::new("Enter to save, Esc to cancel. Leave empty to remove.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, instructions_area);
    }

    if let Some(input_area) = row(2) {
        let input = Paragraph::new(mask_key(&app.api_key_input))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(input, input_area);

        let column = masked_cursor(&app.api_key_input, app.api_key_input_cursor);
        let cursor_x = column.min(input_area.width.saturating_sub(1) as usize) as u16;
        frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
    }

    if let Some(status_area) = row(4) {
        let char_count = format!("{} characters", app.api_key_input.chars().count());
        let status = Paragraph::new(char_count)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(status, status_area);
    }
}
