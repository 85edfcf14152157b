use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::thread;

use super::Id;
use super::model::Message;

#[async_trait]
pub trait MessageRepository {
    async fn save(&self, message: &Message) -> super::Result<()>;

    /// Messages of a thread by ascending date, undated ones last.
    async fn find_by_thread(&self, thread: &thread::Id) -> super::Result<Vec<Message>>;
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<HashMap<Id, Message>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn save(&self, message: &Message) -> super::Result<()> {
        let id = message.id().ok_or(super::Error::IdNotPresent)?;
        self.messages
            .write()
            .await
            .insert(id.clone(), message.clone());
        Ok(())
    }

    async fn find_by_thread(&self, thread: &thread::Id) -> super::Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .read()
            .await
            .values()
            .filter(|m| m.thread() == Some(thread))
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.date().is_none(), m.date(), m.id().cloned()));
        Ok(messages)
    }
}
