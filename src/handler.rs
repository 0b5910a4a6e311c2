use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line editing shared by the message input and the API key popup.
/// Returns false for keys it does not handle.
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    let char_count = text.chars().count();
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(char_count),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = char_count,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            text.clear();
            *cursor = 0;
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

fn insert_text(text: &mut String, cursor: &mut usize, pasted: &str) {
    // The input is a single line
    let pasted: String = pasted.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect();
    let byte_pos = char_to_byte_index(text, *cursor);
    text.insert_str(byte_pos, &pasted);
    *cursor += pasted.chars().count();
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    app.poll_tasks().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return;
    }

    match app.screen {
        Screen::Home => handle_home(app, key),
        Screen::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_chat_editing(app, key),
        },
    }
}

fn handle_home(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter | KeyCode::Char('i') => app.open_chat(),
        KeyCode::Char('K') => app.open_api_key_input(),
        KeyCode::Char('r') => app.check_health(),
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc => app.screen = Screen::Home,

        KeyCode::Char('i') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.session.input.chars().count();
        }

        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => app.request_clear(),
        KeyCode::Char('C') => app.request_clear(),
        KeyCode::Char('K') => app.open_api_key_input(),

        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit(),
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => app.request_clear(),
        KeyCode::PageUp => app.scroll_up(app.chat_height / 2),
        KeyCode::PageDown => app.scroll_down(app.chat_height / 2),
        _ => {
            edit_line(&mut app.session.input, &mut app.input_cursor, key);
        }
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_api_key_input(),
        KeyCode::Enter => app.save_api_key(),
        _ => {
            edit_line(&mut app.api_key_input, &mut app.api_key_input_cursor, key);
        }
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.show_api_key_input {
        insert_text(&mut app.api_key_input, &mut app.api_key_input_cursor, text.trim());
    } else if app.screen == Screen::Chat && app.input_mode == InputMode::Editing {
        insert_text(&mut app.session.input, &mut app.input_cursor, text);
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{settle, test_app};
    use tempfile::TempDir;

    fn press(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, press(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[test]
    fn test_edit_line_utf8() {
        let mut text = String::new();
        let mut cursor = 0;
        for c in "héllo".chars() {
            edit_line(&mut text, &mut cursor, KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        edit_line(&mut text, &mut cursor, KeyEvent::new(KeyCode::Home, KeyModifiers::NONE));
        edit_line(&mut text, &mut cursor, KeyEvent::new(KeyCode::Right, KeyModifiers::NONE));
        edit_line(&mut text, &mut cursor, KeyEvent::new(KeyCode::Delete, KeyModifiers::NONE));
        assert_eq!(text, "hllo");
        assert_eq!(cursor, 1);

        edit_line(&mut text, &mut cursor, KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
        assert_eq!(text, "llo");
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut text = "ab".to_string();
        let mut cursor = 1;
        insert_text(&mut text, &mut cursor, "x\ny");
        assert_eq!(text, "ax yb");
        assert_eq!(cursor, 4);
    }

    #[tokio::test]
    async fn test_type_and_send_from_chat_screen() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(r#"{"answer": "hi there"}"#)
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&server.url(), &dir);

        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.input_mode, InputMode::Editing);

        type_text(&mut app, "hello").await;
        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();
        assert!(app.session.input.is_empty());
        assert_eq!(app.input_cursor, 0);

        settle(&mut app).await;
        assert_eq!(app.session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn test_enter_on_blank_input_does_nothing() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app("http://127.0.0.1:9", &dir);
        app.open_chat();

        type_text(&mut app, "   ").await;
        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();

        assert!(!app.session.is_busy());
        assert!(app.send_task.is_none());
        assert!(app.session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_api_key_popup_saves_on_enter() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app("http://127.0.0.1:9", &dir);

        handle_event(&mut app, press(KeyCode::Char('K'))).await.unwrap();
        assert!(app.show_api_key_input);
        type_text(&mut app, "abc123").await;
        handle_event(&mut app, press(KeyCode::Enter)).await.unwrap();

        assert!(!app.show_api_key_input);
        assert_eq!(app.session.api_key(), Some("abc123"));

        // Esc discards an edit
        handle_event(&mut app, press(KeyCode::Char('K'))).await.unwrap();
        handle_event(&mut app, ctrl('u')).await.unwrap();
        handle_event(&mut app, press(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.session.api_key(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_popup() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app("http://127.0.0.1:9", &dir);
        app.open_api_key_input();

        handle_event(&mut app, ctrl('c')).await.unwrap();
        assert!(app.should_quit);
    }
}
