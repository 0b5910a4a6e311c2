pub mod app;
pub mod client;
pub mod config;
pub mod conversation;
pub mod credential;
pub mod error;
pub mod handler;
pub mod logging;
pub mod session;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use client::{Health, RagClient};
pub use config::Config;
pub use conversation::{ChatMessage, ChatRole, Conversation};
pub use credential::CredentialStore;
pub use error::{ChatError, ChatResult};
pub use session::ChatSession;
