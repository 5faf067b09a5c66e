//! HTTP client for the chat service
//!
//! The chat service wraps the planning assistant: it takes the user's
//! message plus prior conversation and returns assistant text, which may
//! or may not embed trip JSON (the normalizer decides).
//!
//! Thread continuity is explicit here. The service identifies an ongoing
//! conversation by an opaque thread id; this client owns a session-keyed
//! mapping from caller-chosen session keys to those thread ids, behind the
//! [`ThreadStore`] trait so tests and embedders can swap the storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::store::write_blob;

use super::{base_url, build_http_client, error_from_response};

// ============================================
// Thread storage
// ============================================

/// Storage for the session key -> thread id mapping.
pub trait ThreadStore: Send + Sync {
    fn get(&self, session_key: &str) -> Option<String>;
    fn set(&mut self, session_key: &str, thread_id: String);
    /// Returns whether a mapping existed.
    fn remove(&mut self, session_key: &str) -> bool;
    fn clear(&mut self);
}

/// In-memory mapping; the default, and what tests use.
#[derive(Debug, Default)]
pub struct MemoryThreadStore {
    threads: HashMap<String, String>,
}

impl ThreadStore for MemoryThreadStore {
    fn get(&self, session_key: &str) -> Option<String> {
        self.threads.get(session_key).cloned()
    }

    fn set(&mut self, session_key: &str, thread_id: String) {
        self.threads.insert(session_key.to_string(), thread_id);
    }

    fn remove(&mut self, session_key: &str) -> bool {
        self.threads.remove(session_key).is_some()
    }

    fn clear(&mut self) {
        self.threads.clear();
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThreadsBlob {
    #[serde(default)]
    threads: HashMap<String, String>,
}

/// File-backed mapping, so conversations survive across CLI invocations.
/// Same forgiving load behavior as the trip store: unreadable blobs start
/// empty with a warning.
pub struct FileThreadStore {
    path: PathBuf,
    threads: HashMap<String, String>,
}

impl FileThreadStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let threads = if path.exists() {
            load_threads(&path)
        } else {
            HashMap::new()
        };

        Ok(Self { path, threads })
    }

    fn persist(&self) {
        let blob = ThreadsBlob {
            threads: self.threads.clone(),
        };
        if let Err(e) = write_blob(&self.path, &blob) {
            // Losing thread continuity is annoying, not fatal
            tracing::warn!(path = %self.path.display(), error = %e, "could not persist chat threads");
        }
    }
}

fn load_threads(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<ThreadsBlob>(&content).map_err(|e| e.to_string()))
    {
        Ok(blob) => blob.threads,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "chat threads unreadable, starting fresh");
            HashMap::new()
        }
    }
}

impl ThreadStore for FileThreadStore {
    fn get(&self, session_key: &str) -> Option<String> {
        self.threads.get(session_key).cloned()
    }

    fn set(&mut self, session_key: &str, thread_id: String) {
        self.threads.insert(session_key.to_string(), thread_id);
        self.persist();
    }

    fn remove(&mut self, session_key: &str) -> bool {
        let removed = self.threads.remove(session_key).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    fn clear(&mut self) {
        self.threads.clear();
        self.persist();
    }
}

// ============================================
// Chat wire types
// ============================================

/// Who said a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of prior conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The assistant's reply. `text` goes to the normalizer; `thread_id` has
/// already been recorded against the session key.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub thread_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    history: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    reply: String,
    #[serde(default)]
    thread_id: Option<String>,
}

// ============================================
// Client
// ============================================

/// HTTP client for POST /chat with session-keyed thread continuity
pub struct ChatClient {
    http_client: reqwest::Client,
    base_url: String,
    threads: Mutex<Box<dyn ThreadStore>>,
}

impl ChatClient {
    /// Create a client with in-memory thread storage
    pub fn new(config: ApiConfig) -> Result<Self> {
        Self::with_thread_store(config, Box::new(MemoryThreadStore::default()))
    }

    /// Create a client with caller-provided thread storage
    pub fn with_thread_store(config: ApiConfig, threads: Box<dyn ThreadStore>) -> Result<Self> {
        config.validate()?;
        let base_url = base_url(&config)?;
        let http_client = build_http_client(&config)?;

        Ok(Self {
            http_client,
            base_url,
            threads: Mutex::new(threads),
        })
    }

    /// A fresh session key for callers that don't bring their own
    pub fn new_session_key() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Send a message within a session.
    ///
    /// The thread id mapped to `session_key` (if any) rides along so the
    /// service continues the conversation; whatever thread id comes back
    /// is recorded for the next call.
    pub async fn send(
        &self,
        session_key: &str,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<ChatReply> {
        let thread_id = self
            .threads
            .lock()
            .map_err(|_| Error::Chat("thread store lock poisoned".to_string()))?
            .get(session_key);

        let url = format!("{}/chat", self.base_url);
        let request = ChatRequest {
            message,
            history,
            thread_id,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Chat(format!("failed to parse response: {}", e)))?;

        if let Some(thread_id) = &body.thread_id {
            self.threads
                .lock()
                .map_err(|_| Error::Chat("thread store lock poisoned".to_string()))?
                .set(session_key, thread_id.clone());
        }

        Ok(ChatReply {
            text: body.reply,
            thread_id: body.thread_id,
        })
    }

    /// Forget the thread mapped to a session key. Returns whether one
    /// existed.
    pub fn reset_session(&self, session_key: &str) -> Result<bool> {
        Ok(self
            .threads
            .lock()
            .map_err(|_| Error::Chat("thread store lock poisoned".to_string()))?
            .remove(session_key))
    }
}
