//! Chat session: turns user input into backend requests and folds the
//! results back into the conversation.
//!
//! A send goes `Idle -> Sending -> Idle`. The pre-request and post-request
//! halves are separate methods so the terminal UI can run the request as a
//! background task and reconcile its result on the event loop.

use tracing::{info, warn};

use crate::client::RagClient;
use crate::conversation::{ChatMessage, Conversation};
use crate::error::ChatResult;

pub const ERROR_PREFIX: &str = "Error contacting API";

#[derive(Debug, Default)]
pub struct ChatSession {
    conversation: Conversation,
    api_key: Option<String>,
    pub input: String,
    busy: bool,
}

impl ChatSession {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Replace the key used for subsequent requests. Empty means none.
    pub fn set_api_key(&mut self, key: &str) {
        self.api_key = if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        };
    }

    /// Start a send from the current input buffer.
    ///
    /// Returns the trimmed query to send, or `None` (with no state change)
    /// when the input is blank or a send is already in flight.
    pub fn begin_send(&mut self) -> Option<String> {
        let query = self.input.trim().to_string();
        if query.is_empty() || self.busy {
            return None;
        }

        self.busy = true;
        self.conversation.append(ChatMessage::user(query.clone()));
        self.input.clear();
        Some(query)
    }

    /// Record the outcome of the in-flight send and go back to idle.
    pub fn finish_send(&mut self, result: &ChatResult<String>) {
        let reply = match result {
            Ok(answer) => ChatMessage::assistant(answer.as_str()),
            Err(e) => {
                warn!("chat request failed: {e}");
                ChatMessage::assistant(format!("{ERROR_PREFIX}: {e}"))
            }
        };
        self.conversation.append(reply);
        self.busy = false;
    }

    /// Send the current input and wait for the answer.
    ///
    /// Returns `None` when the send was rejected, otherwise the answer or
    /// the typed error (either way already recorded in the conversation).
    /// Failures are never retried.
    pub async fn send_query(&mut self, client: &RagClient) -> Option<ChatResult<String>> {
        let query = self.begin_send()?;
        let result = client.chat(&query, self.api_key.as_deref()).await;
        self.finish_send(&result);
        Some(result)
    }

    /// Apply the outcome of a clear request. Any response from the backend
    /// empties the conversation; only a request that never completed leaves
    /// it as it was.
    pub fn apply_clear(&mut self, result: ChatResult<()>) -> bool {
        match result {
            Ok(()) => {
                info!("conversation cleared");
                self.conversation.clear();
                true
            }
            Err(e) => {
                warn!("clear request failed, keeping conversation: {e}");
                false
            }
        }
    }

    pub async fn clear_history(&mut self, client: &RagClient) -> bool {
        let result = client.clear(self.api_key.as_deref()).await;
        self.apply_clear(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ChatRole;
    use crate::error::ChatError;
    use mockito::Matcher;

    fn session_with_input(input: &str) -> ChatSession {
        let mut session = ChatSession::new(None);
        session.input = input.to_string();
        session
    }

    #[tokio::test]
    async fn test_successful_send_appends_both_messages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(r#"{"answer": "hi there"}"#)
            .create_async()
            .await;
        let client = RagClient::new(&server.url());

        let mut session = session_with_input("  hello  ");
        let outcome = session.send_query(&client).await;

        mock.assert_async().await;
        assert!(matches!(outcome, Some(Ok(ref answer)) if answer == "hi there"));
        assert_eq!(
            session.conversation().messages(),
            &[ChatMessage::user("hello"), ChatMessage::assistant("hi there")]
        );
        assert!(session.input.is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_server_error_becomes_assistant_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(500)
            .create_async()
            .await;
        let client = RagClient::new(&server.url());

        let mut session = session_with_input("hello");
        let outcome = session.send_query(&client).await;

        assert!(matches!(
            outcome,
            Some(Err(ChatError::Status(status))) if status.as_u16() == 500
        ));
        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::user("hello"));
        assert_eq!(messages[1].role(), ChatRole::Assistant);
        assert!(messages[1].content().contains("Error contacting API"));
        assert!(messages[1].content().contains("HTTP 500"));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_blank_input_is_noop() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .expect(0)
            .create_async()
            .await;
        let client = RagClient::new(&server.url());

        let mut session = session_with_input("   \n\t ");
        assert!(session.send_query(&client).await.is_none());

        mock.assert_async().await;
        assert!(session.conversation().is_empty());
        assert_eq!(session.conversation().revision(), 0);
        assert_eq!(session.input, "   \n\t ");
    }

    #[test]
    fn test_send_rejected_while_busy() {
        let mut session = session_with_input("first");
        assert_eq!(session.begin_send().as_deref(), Some("first"));
        assert!(session.is_busy());

        session.input = "second".to_string();
        let revision = session.conversation().revision();
        assert_eq!(session.begin_send(), None);
        assert_eq!(session.conversation().revision(), revision);
        assert_eq!(session.input, "second");

        session.finish_send(&Ok("answer".to_string()));
        assert!(!session.is_busy());
        assert_eq!(session.begin_send().as_deref(), Some("second"));
    }

    #[test]
    fn test_finish_send_with_task_error() {
        let mut session = session_with_input("hello");
        session.begin_send();
        session.finish_send(&Err(ChatError::Status(reqwest::StatusCode::BAD_GATEWAY)));

        let last = session.conversation().last().unwrap();
        assert_eq!(last.content(), "Error contacting API: HTTP 502");
    }

    #[tokio::test]
    async fn test_credential_header_follows_session_key() {
        let mut server = mockito::Server::new_async().await;
        let with_key = server
            .mock("POST", "/chat")
            .match_header("x-api-key", "abc123")
            .with_status(200)
            .with_body(r#"{"answer": "keyed"}"#)
            .create_async()
            .await;
        let client = RagClient::new(&server.url());

        let mut session = ChatSession::new(Some("abc123".to_string()));
        session.input = "hello".to_string();
        session.send_query(&client).await;
        with_key.assert_async().await;

        let without_key = server
            .mock("POST", "/chat")
            .match_header("x-api-key", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"answer": "anonymous"}"#)
            .create_async()
            .await;

        session.set_api_key("");
        session.input = "again".to_string();
        session.send_query(&client).await;
        without_key.assert_async().await;

        assert_eq!(session.conversation().last().unwrap().content(), "anonymous");
    }

    #[tokio::test]
    async fn test_clear_success_empties_conversation() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/clear")
            .with_status(200)
            .with_body(r#"{"status": "cleared"}"#)
            .create_async()
            .await;
        let client = RagClient::new(&server.url());

        let mut session = ChatSession::new(None);
        session.conversation.append(ChatMessage::user("hello"));
        session.conversation.append(ChatMessage::assistant("hi"));

        assert!(session.clear_history(&client).await);
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_clear_server_error_still_clears() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/clear")
            .with_status(500)
            .create_async()
            .await;
        let client = RagClient::new(&server.url());

        let mut session = ChatSession::new(None);
        session.conversation.append(ChatMessage::user("hello"));
        session.conversation.append(ChatMessage::assistant("hi"));

        assert!(session.clear_history(&client).await);
        mock.assert_async().await;
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_clear_unreachable_keeps_conversation() {
        let client = RagClient::new("http://127.0.0.1:9");

        let mut session = ChatSession::new(None);
        session.conversation.append(ChatMessage::user("hello"));

        for _ in 0..3 {
            assert!(!session.clear_history(&client).await);
            assert_eq!(session.conversation().messages(), &[ChatMessage::user("hello")]);
        }
    }
}
