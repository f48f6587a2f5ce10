use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message for the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// The model capability boundary: one chat completion per call.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant's response text.
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Scripted provider for exercising conversations without a model endpoint.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Reply {
        Text(String),
        Fail { status: u16, body: String },
    }

    /// Replies are returned in the order they were queued. Once the queue
    /// is empty every call answers with the fallback text.
    pub struct MockLlmProvider {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<(Vec<Message>, f32)>>,
        fallback: String,
        delay: Option<Duration>,
    }

    impl MockLlmProvider {
        pub fn new() -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                fallback: "mock reply".to_string(),
                delay: None,
            }
        }

        /// Sleep before answering each call.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn queue_text(&self, text: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Reply::Text(text.to_string()));
        }

        pub fn queue_error(&self, status: u16, body: &str) {
            self.replies.lock().unwrap().push_back(Reply::Fail {
                status,
                body: body.to_string(),
            });
        }

        /// Number of completed or attempted calls.
        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Messages and temperature of every call, in call order.
        pub fn requests(&self) -> Vec<(Vec<Message>, f32)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for MockLlmProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn complete(
            &self,
            messages: Vec<Message>,
            temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push((messages, temperature));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Text(text)) => Ok(text),
                Some(Reply::Fail { status, body }) => Err(LlmError::ApiError { status, body }),
                None => Ok(self.fallback.clone()),
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}
