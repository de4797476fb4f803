use crate::matching::GroupMatcher;
use dash_core::error::{DashError, Result};
use dash_core::time::resolve_local_time_ms;
use dash_core::types::{Analysis, Message, MessagePatch};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MESSAGES_FILE: &str = "messages.json";
const ANALYSIS_FILE: &str = "analysis.json";

/// Message and analysis collections, optionally persisted to a directory.
///
/// Every mutation rewrites the affected collection file when a directory is
/// configured. Without one the store lives purely in memory.
pub struct MessageStore {
    dir: Option<PathBuf>,
    messages: Vec<Message>,
    analyses: Vec<Analysis>,
}

impl MessageStore {
    /// Open (or create) a store rooted at `dir`, loading existing collections.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let messages = load_collection(&dir.join(MESSAGES_FILE))?;
        let analyses = load_collection(&dir.join(ANALYSIS_FILE))?;
        tracing::info!(
            "Opened message store at {:?} ({} messages, {} analyses)",
            dir,
            messages.len(),
            analyses.len()
        );
        Ok(Self {
            dir: Some(dir),
            messages,
            analyses,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            messages: Vec::new(),
            analyses: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages in insertion order.
    pub fn list_all(&self) -> &[Message] {
        &self.messages
    }

    /// Find a message by record id.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The latest message of every conversation, newest first.
    ///
    /// Ties on time keep the later-inserted record.
    pub fn latest_per_group(&self) -> Vec<Message> {
        latest_per_group(&self.messages)
    }

    /// One conversation's messages, oldest first.
    pub fn by_group(&self, conversation_id: &str) -> Vec<Message> {
        let matcher = GroupMatcher::new(conversation_id);
        let mut selected: Vec<(i64, Message)> = matcher
            .select(&self.messages, |m| m.conversation_id.as_str())
            .into_iter()
            .map(|m| (resolve_local_time_ms(m), m.clone()))
            .collect();
        selected.sort_by_key(|(t, _)| *t);
        selected.into_iter().map(|(_, m)| m).collect()
    }

    pub fn get_analysis(&self, conversation_id: &str) -> Option<&Analysis> {
        let matcher = GroupMatcher::new(conversation_id);
        matcher
            .select(&self.analyses, |a| a.conversation_id.as_str())
            .into_iter()
            .next()
    }

    /// Insert or replace the analysis for a conversation.
    pub fn put_analysis(&mut self, analysis: Analysis) -> Result<()> {
        if analysis.conversation_id.trim().is_empty() {
            return Err(DashError::InvalidInput("conversation_id is required".into()));
        }
        match self
            .analyses
            .iter_mut()
            .find(|a| a.conversation_id == analysis.conversation_id)
        {
            Some(existing) => *existing = analysis,
            None => self.analyses.push(analysis),
        }
        self.persist_analyses()
    }

    /// Insert a new message, assigning an id when none is given.
    pub fn create(&mut self, mut message: Message) -> Result<Message> {
        validate(&message)?;
        if message.id.trim().is_empty() {
            message.id = Uuid::new_v4().to_string();
        } else if self.get(&message.id).is_some() {
            return Err(DashError::Conflict(format!(
                "Message already exists: {}",
                message.id
            )));
        }
        self.messages.push(message.clone());
        self.persist_messages()?;
        tracing::debug!("Created message {} in {}", message.id, message.conversation_id);
        Ok(message)
    }

    /// Bulk insert, skipping records whose id already exists. Returns the
    /// number of records added.
    pub fn import(&mut self, messages: Vec<Message>) -> Result<usize> {
        let mut added = 0;
        for mut message in messages {
            if validate(&message).is_err() {
                tracing::warn!("Skipping message without conversation_id");
                continue;
            }
            if message.id.trim().is_empty() {
                message.id = Uuid::new_v4().to_string();
            } else if self.get(&message.id).is_some() {
                continue;
            }
            self.messages.push(message);
            added += 1;
        }
        if added > 0 {
            self.persist_messages()?;
        }
        tracing::info!("Imported {} message(s)", added);
        Ok(added)
    }

    pub fn update(&mut self, id: &str, patch: MessagePatch) -> Result<Message> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| DashError::NotFound(format!("Message not found: {}", id)))?;
        let mut updated = message.clone();
        patch.apply(&mut updated);
        validate(&updated)?;
        *message = updated.clone();
        self.persist_messages()?;
        Ok(updated)
    }

    pub fn delete(&mut self, id: &str) -> Result<Message> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| DashError::NotFound(format!("Message not found: {}", id)))?;
        let removed = self.messages.remove(index);
        self.persist_messages()?;
        Ok(removed)
    }

    fn persist_messages(&self) -> Result<()> {
        match &self.dir {
            Some(dir) => save_collection(&dir.join(MESSAGES_FILE), &self.messages),
            None => Ok(()),
        }
    }

    fn persist_analyses(&self) -> Result<()> {
        match &self.dir {
            Some(dir) => save_collection(&dir.join(ANALYSIS_FILE), &self.analyses),
            None => Ok(()),
        }
    }
}

/// Keep the newest message per conversation, newest conversations first.
pub fn latest_per_group(messages: &[Message]) -> Vec<Message> {
    let mut latest: HashMap<&str, (i64, usize)> = HashMap::new();
    for (index, message) in messages.iter().enumerate() {
        let t = resolve_local_time_ms(message);
        latest
            .entry(message.conversation_id.as_str())
            .and_modify(|entry| {
                if t >= entry.0 {
                    *entry = (t, index);
                }
            })
            .or_insert((t, index));
    }

    let mut picked: Vec<(i64, usize)> = latest.into_values().collect();
    picked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    picked
        .into_iter()
        .map(|(_, index)| messages[index].clone())
        .collect()
}

fn validate(message: &Message) -> Result<()> {
    if message.conversation_id.trim().is_empty() {
        return Err(DashError::InvalidInput("conversation_id is required".into()));
    }
    Ok(())
}

fn load_collection<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = std::fs::read_to_string(path)?;
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let items: Vec<T> = serde_json::from_str(&json)
        .map_err(|e| DashError::Store(format!("Corrupt collection {:?}: {}", path, e)))?;
    Ok(items)
}

fn save_collection<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(items)?;
    std::fs::write(path, json)?;
    Ok(())
}
