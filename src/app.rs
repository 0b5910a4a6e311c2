use std::path::PathBuf;
use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::{Health, RagClient};
use crate::credential::CredentialStore;
use crate::error::{ChatError, ChatResult};
use crate::session::ChatSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Checking,
    Online(Health),
    Offline(String),
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Conversation, input buffer and busy flag
    pub session: ChatSession,
    pub input_cursor: usize, // cursor position in session.input, in chars

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the message area, set during render
    pub chat_width: u16,  // Inner width of the message area, set during render
    pub chat_area: Option<Rect>,
    seen_revision: u64,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Background requests, reconciled by poll_tasks()
    pub send_task: Option<JoinHandle<ChatResult<String>>>,
    pub clear_task: Option<JoinHandle<ChatResult<()>>>,
    pub health_task: Option<JoinHandle<ChatResult<Health>>>,
    pub backend_status: BackendStatus,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,

    pub log_path: Option<PathBuf>,

    client: RagClient,
    credentials: CredentialStore,
}

impl App {
    pub fn new(client: RagClient, credentials: CredentialStore) -> Self {
        // The key is read exactly once; edits go through save_api_key()
        let api_key = credentials.load();
        info!(base_url = client.base_url(), has_key = api_key.is_some(), "starting chat UI");

        Self {
            should_quit: false,
            screen: Screen::Home,
            input_mode: InputMode::Normal,

            session: ChatSession::new(api_key),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            seen_revision: 0,

            animation_frame: 0,

            send_task: None,
            clear_task: None,
            health_task: None,
            backend_status: BackendStatus::Checking,

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,

            log_path: None,

            client,
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn open_chat(&mut self) {
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Editing;
        self.input_cursor = self.session.input.chars().count();
    }

    /// Send the input buffer in the background. Ignored while a send is
    /// pending or when the input is blank.
    pub fn submit(&mut self) {
        let Some(query) = self.session.begin_send() else {
            return;
        };
        self.input_cursor = 0;
        self.animation_frame = 0;

        let client = self.client.clone();
        let api_key = self.session.api_key().map(str::to_string);
        self.send_task = Some(tokio::spawn(async move {
            client.chat(&query, api_key.as_deref()).await
        }));

        self.sync_scroll();
    }

    pub fn request_clear(&mut self) {
        if self.clear_task.is_some() {
            return;
        }
        let client = self.client.clone();
        let api_key = self.session.api_key().map(str::to_string);
        self.clear_task = Some(tokio::spawn(async move {
            client.clear(api_key.as_deref()).await
        }));
    }

    pub fn check_health(&mut self) {
        if self.health_task.is_some() {
            return;
        }
        self.backend_status = BackendStatus::Checking;
        let client = self.client.clone();
        self.health_task = Some(tokio::spawn(async move { client.health().await }));
    }

    /// Fold finished background requests back into the state. Unfinished
    /// ones are left alone.
    pub async fn poll_tasks(&mut self) {
        if let Some(result) = take_finished(&mut self.send_task).await {
            self.session.finish_send(&result);
        }

        if let Some(result) = take_finished(&mut self.clear_task).await {
            if self.session.apply_clear(result) {
                self.chat_scroll = 0;
            }
        }

        if let Some(result) = take_finished(&mut self.health_task).await {
            self.backend_status = match result {
                Ok(health) => BackendStatus::Online(health),
                Err(e) => {
                    debug!("health check failed: {e}");
                    BackendStatus::Offline(e.to_string())
                }
            };
        }

        self.sync_scroll();
    }

    pub fn open_api_key_input(&mut self) {
        self.api_key_input = self.session.api_key().unwrap_or_default().to_string();
        self.api_key_input_cursor = self.api_key_input.chars().count();
        self.show_api_key_input = true;
    }

    pub fn close_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }

    /// Persist the edited key exactly as typed and use it for every later
    /// request. An empty key removes it.
    pub fn save_api_key(&mut self) {
        let key = std::mem::take(&mut self.api_key_input);
        self.credentials.save(&key);
        self.session.set_api_key(&key);
        self.close_api_key_input();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Jump to the newest message whenever the conversation changed.
    pub fn sync_scroll(&mut self) {
        let revision = self.session.conversation().revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.scroll_to_bottom();
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        let max_scroll = self.total_chat_lines().saturating_sub(visible_height);
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Rendered height of the message list, counting wrapped lines.
    fn total_chat_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };

        let mut total_lines: u16 = 0;
        for msg in self.session.conversation().messages() {
            total_lines = total_lines.saturating_add(1); // Role line
            for line in msg.content().lines() {
                let wrapped = wrapped_line_count(line, wrap_width);
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.session.is_busy() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }
        total_lines
    }
}

/// Rows a line occupies once word-wrapped to `width` columns: words move to
/// the next row when they don't fit, and words wider than a row are split.
fn wrapped_line_count(line: &str, width: usize) -> usize {
    if width == 0 {
        return 1;
    }

    let mut rows = 1;
    let mut column = 0;
    for word in line.split(' ') {
        let len = word.chars().count();
        let needed = if column == 0 { len } else { column + 1 + len };
        if needed <= width {
            column = needed;
            continue;
        }

        if column > 0 {
            rows += 1;
        }
        let extra_rows = len.saturating_sub(1) / width;
        rows += extra_rows;
        column = len - extra_rows * width;
    }
    rows
}

async fn take_finished<T>(slot: &mut Option<JoinHandle<ChatResult<T>>>) -> Option<ChatResult<T>> {
    if !slot.as_ref().is_some_and(|handle| handle.is_finished()) {
        return None;
    }
    let handle = slot.take()?;
    Some(handle.await.unwrap_or_else(|e| Err(ChatError::Task(e))))
}
