//! Document question answering.
//!
//! Each question is grounded by a retrieval pass over the index; the top
//! hits plus the tail of the session history go into one chat completion.
//! Sessions live in a bounded LRU map, so an abandoned session eventually
//! falls out instead of leaking.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use compliance_engine::{ChatProvider, ValidationCallError};
use retrieval_index::{IndexError, RetrievalIndex};
use tokio::sync::Mutex;
use tracing::info;

/// Sessions retained before the least recently used one is dropped.
const MAX_SESSIONS: usize = 256;
/// History messages included in each prompt.
const HISTORY_IN_PROMPT: usize = 10;
/// Retrieval hits included as context.
const CONTEXT_HITS: usize = 5;

const SYSTEM_PROMPT: &str =
    "You are a regulatory compliance assistant. Answer questions using the \
     provided document excerpts. When the excerpts do not contain the \
     answer, say so instead of guessing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Llm(#[from] ValidationCallError),
}

#[derive(Default)]
struct SessionStore {
    sessions: HashMap<String, Vec<ChatMessage>>,
    /// Session ids from least to most recently used.
    order: VecDeque<String>,
}

impl SessionStore {
    fn touch(&mut self, session_id: &str) {
        self.order.retain(|id| id != session_id);
        self.order.push_back(session_id.to_string());
        self.sessions.entry(session_id.to_string()).or_default();

        while self.order.len() > MAX_SESSIONS {
            if let Some(evicted) = self.order.pop_front() {
                self.sessions.remove(&evicted);
            }
        }
    }
}

pub struct ChatService {
    provider: Arc<dyn ChatProvider>,
    store: Mutex<SessionStore>,
}

impl ChatService {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            store: Mutex::new(SessionStore::default()),
        }
    }

    /// Answer a question within a session, grounded by index retrieval
    /// optionally scoped to one document.
    pub async fn ask(
        &self,
        index: &RetrievalIndex,
        session_id: &str,
        document_id: Option<i64>,
        question: &str,
    ) -> Result<String, ChatError> {
        info!(session_id, ?document_id, "answering chat question");

        let hits = index.search(question, CONTEXT_HITS, document_id).await?;
        let context = if hits.is_empty() {
            "(no relevant excerpts found)".to_string()
        } else {
            hits.iter()
                .map(|hit| format!("[{}]\n{}", hit.metadata.title, hit.content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let history = {
            let mut store = self.store.lock().await;
            store.touch(session_id);
            let messages = &store.sessions[session_id];
            messages
                .iter()
                .rev()
                .take(HISTORY_IN_PROMPT)
                .rev()
                .map(|m| match m.role {
                    Role::User => format!("User: {}", m.content),
                    Role::Assistant => format!("Assistant: {}", m.content),
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            "Document excerpts:\n{context}\n\n\
             Conversation so far:\n{history}\n\n\
             User question: {question}",
            history = if history.is_empty() { "(none)" } else { &history },
        );

        let answer = self.provider.chat(SYSTEM_PROMPT, &prompt, false).await?;

        let mut store = self.store.lock().await;
        store.touch(session_id);
        if let Some(messages) = store.sessions.get_mut(session_id) {
            messages.push(ChatMessage {
                role: Role::User,
                content: question.to_string(),
            });
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: answer.clone(),
            });
        }

        Ok(answer)
    }

    pub async fn history(&self, session_id: &str) -> Option<Vec<ChatMessage>> {
        self.store.lock().await.sessions.get(session_id).cloned()
    }
}
