use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use modelrelay_common::{ConversationId, Error, Message, Result, Role};
use serde::Serialize;
use tracing::debug;

use crate::truncation::truncate;

/// A growing sequence of messages bound to one model at a time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub model_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    fn new(id: ConversationId, model_id: String, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id,
            model_id,
            messages,
            created_at: now,
            updated_at: now,
        }
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
        // Wall clock may step backwards; updated_at must not.
        self.updated_at = self.updated_at.max(Utc::now());
    }
}

type Shared = Arc<Mutex<Conversation>>;

/// Volatile registry of conversations keyed by id.
///
/// The map is sharded and each conversation carries its own mutex, so operations on
/// different conversations never wait on each other. Every mutating or snapshotting
/// operation holds the conversation mutex for its full duration.
pub struct ConversationStore {
    conversations: DashMap<ConversationId, Shared>,
    truncate_limit: usize,
}

impl ConversationStore {
    pub fn new(truncate_limit: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            truncate_limit,
        }
    }

    pub fn truncate_limit(&self) -> usize {
        self.truncate_limit
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Start an empty conversation bound to `model_id`.
    pub fn create(&self, model_id: &str) -> ConversationId {
        self.insert(model_id, Vec::new())
    }

    pub fn get(&self, id: &ConversationId) -> Result<Conversation> {
        let entry = self.entry(id)?;
        let conversation = lock(&entry).clone();
        Ok(conversation)
    }

    pub fn append(&self, id: &ConversationId, role: Role, content: impl Into<String>) -> Result<()> {
        let entry = self.entry(id)?;
        lock(&entry).push(Message {
            role,
            content: content.into(),
        });
        Ok(())
    }

    /// Record a user turn and its reply as one contiguous pair.
    pub fn append_exchange(
        &self,
        id: &ConversationId,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) -> Result<()> {
        let entry = self.entry(id)?;
        let mut conversation = lock(&entry);
        conversation.push(Message::user(user));
        conversation.push(Message::assistant(assistant));
        Ok(())
    }

    /// Truncated view of the conversation's messages.
    pub fn history(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let entry = self.entry(id)?;
        let conversation = lock(&entry);
        Ok(truncate(&conversation.messages, self.truncate_limit))
    }

    /// Copy the full history of `source` into a new conversation bound to `model_id`.
    pub fn clone_conversation(&self, source: &ConversationId, model_id: &str) -> Result<ConversationId> {
        let entry = self.entry(source)?;
        let messages = lock(&entry).messages.clone();
        let copied = messages.len();
        let id = self.insert(model_id, messages);
        debug!("cloned conversation {source} into {id} ({copied} messages, model {model_id})");
        Ok(id)
    }

    fn insert(&self, model_id: &str, messages: Vec<Message>) -> ConversationId {
        loop {
            let id = ConversationId::new();
            if let Entry::Vacant(slot) = self.conversations.entry(id.clone()) {
                let conversation = Conversation::new(id.clone(), model_id.to_string(), messages);
                slot.insert(Arc::new(Mutex::new(conversation)));
                return id;
            }
        }
    }

    fn entry(&self, id: &ConversationId) -> Result<Shared> {
        // Clone the Arc out so the shard guard is released before locking.
        self.conversations
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

fn lock(entry: &Shared) -> MutexGuard<'_, Conversation> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
