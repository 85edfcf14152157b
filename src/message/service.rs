use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, warn};
use serde_json::Value;

use crate::integration::store::{Store, Update};
use crate::notification::service::NotificationService;
use crate::notification::timestamp;
use crate::path;
use crate::thread::{self, model::Thread};
use crate::user::model::Session;

use super::model::Message;
use super::{Id, Repository};

#[async_trait]
pub trait MessageService {
    /// Stores `message`, stamps the thread activity and pushes it to the
    /// other members, in that order. Only a failed store write fails the
    /// send.
    async fn send_message(&self, session: &Session, message: Message) -> super::Result<Message>;

    /// Next batch of messages older than `from`, oldest first. Starts from
    /// the newest message when `from` is `None`.
    async fn load_more_messages(
        &self,
        thread: &Thread,
        from: Option<&Message>,
    ) -> super::Result<Vec<Message>>;
}

#[derive(Clone)]
pub struct MessageServiceImpl {
    store: Store,
    repo: Repository,
    thread_repo: thread::Repository,
    notifications: Arc<NotificationService>,
    messages_per_batch: usize,
}

impl MessageServiceImpl {
    pub fn new(
        store: Store,
        repo: Repository,
        thread_repo: thread::Repository,
        notifications: NotificationService,
        messages_per_batch: usize,
    ) -> Self {
        Self {
            store,
            repo,
            thread_repo,
            notifications: Arc::new(notifications),
            messages_per_batch,
        }
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn send_message(&self, session: &Session, message: Message) -> super::Result<Message> {
        let thread_id = message.thread().cloned().ok_or(super::Error::MissingThread)?;
        let mut thread = self
            .thread_repo
            .find_by_id(&thread_id)
            .await?
            .ok_or(super::Error::ThreadNotFound(thread_id.clone()))?;

        let id = Id::parse(self.store.push(&path::thread_messages(&thread_id)).await?)?;
        let message = message
            .with_id(id.clone())
            .with_date(chrono::Utc::now().timestamp_millis());

        let write = Update::new()
            .server_timestamp(path::message_field(&thread_id, &id, path::DATE))
            .set(path::message_field(&thread_id, &id, path::TYPE), message.kind().as_str())
            .set(path::message_field(&thread_id, &id, path::PAYLOAD), message.payload())
            .set(path::message_field(&thread_id, &id, path::SENDER), message.sender().as_str());
        if let Err(e) = self.store.update(&write).await {
            error!("failed to send message to thread {thread_id}: {e}");
            return Err(e.into());
        }

        // the message is stored from here on, later failures are only logged
        if let Err(e) = self.repo.save(&message).await {
            warn!("could not keep message {id} locally: {e}");
        }

        if let Err(e) = self.stamp_activity(&thread_id, &mut thread).await {
            warn!("could not stamp activity of thread {thread_id}: {e}");
        }

        let message = match self.notifications.notify(session, message.clone(), &thread).await {
            Ok(message) => message,
            Err(e) => {
                warn!("could not notify members of thread {thread_id}: {e}");
                message
            }
        };

        debug!("sent message {id} to thread {thread_id}");
        Ok(message)
    }

    async fn load_more_messages(
        &self,
        thread: &Thread,
        from: Option<&Message>,
    ) -> super::Result<Vec<Message>> {
        let thread_id = thread.id().ok_or(thread::Error::IdNotPresent)?;

        let before = match from {
            Some(from) => match from.date() {
                Some(date) => Some(date),
                None => {
                    debug!("message {:?} has no date, nothing older to load", from.id());
                    return Ok(Vec::new());
                }
            },
            None => None,
        };

        let Some(Value::Object(snapshot)) = self
            .store
            .read_once(&path::thread_messages(thread_id))
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut messages: Vec<Message> = snapshot
            .iter()
            .filter_map(|(id, value)| Message::from_snapshot(thread_id, id, value))
            .filter(|m| match (before, m.date()) {
                (None, _) => true,
                (Some(before), Some(date)) => date < before,
                (Some(_), None) => false,
            })
            .collect();
        messages.sort_by_key(|m| (m.date(), m.id().cloned()));

        let skip = messages.len().saturating_sub(self.messages_per_batch);
        let batch = messages.split_off(skip);

        for m in &batch {
            self.repo.save(m).await?;
        }

        debug!("loaded {} messages of thread {thread_id}", batch.len());
        Ok(batch)
    }
}

impl MessageServiceImpl {
    /// Stamps the thread activity on the server clock and mirrors it locally.
    async fn stamp_activity(&self, thread_id: &thread::Id, thread: &mut Thread) -> super::Result<()> {
        let activity = path::thread_details_field(thread_id, path::LAST_MESSAGE_ADDED);
        self.store
            .update(&Update::new().server_timestamp(activity.as_str()))
            .await?;

        let stamped = self.store.read_once(&activity).await?;
        if let Some(millis) = stamped.as_ref().and_then(timestamp::normalize) {
            thread.set_last_message_added(millis);
            self.thread_repo.save(thread).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::integration::pubsub::test::{FailingTransport, RecordingTransport};
    use crate::integration::store::{MemoryStore, SyncStore};
    use crate::message::repository::{InMemoryMessageRepository, MessageRepository};
    use crate::message::{self, Kind};
    use crate::thread::Kind as ThreadKind;
    use crate::thread::repository::{InMemoryThreadRepository, ThreadRepository};
    use crate::user::{self, model::User, repository::InMemoryUserRepository};
    use crate::integration;

    use super::*;

    fn sub(id: &str) -> user::Id {
        user::Id::parse(id).unwrap()
    }

    fn tid(id: &str) -> thread::Id {
        thread::Id::parse(id).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        transport: Arc<RecordingTransport>,
        threads: Arc<InMemoryThreadRepository>,
        messages: Arc<InMemoryMessageRepository>,
        service: MessageServiceImpl,
        jora: Session,
    }

    async fn fixture(batch: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::default());
        let threads = Arc::new(InMemoryThreadRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let notifications = NotificationService::new(
            store.clone(),
            Some(transport.clone()),
            Arc::new(InMemoryUserRepository::new()),
            messages.clone(),
        );
        let service = MessageServiceImpl::new(
            store.clone(),
            messages.clone(),
            threads.clone(),
            notifications,
            batch,
        );

        for (id, kind) in [("chat", ThreadKind::Private1to1), ("room", ThreadKind::Public)] {
            threads
                .save(&Thread::existing(tid(id), kind, [sub("jora"), sub("valera")]))
                .await
                .unwrap();
        }

        Fixture {
            store,
            transport,
            threads,
            messages,
            service,
            jora: Session::new(User::new(sub("jora"), "Jora")),
        }
    }

    fn details_updates(history: &[Update]) -> usize {
        history
            .iter()
            .filter(|u| u.paths().any(|p| p.ends_with("/details/last_message_added")))
            .count()
    }

    #[tokio::test]
    async fn should_send_message() {
        let f = fixture(30).await;

        let msg = f
            .service
            .send_message(&f.jora, Message::text(&tid("chat"), &sub("jora"), "salut"))
            .await
            .unwrap();

        let id = msg.id().unwrap();
        let stored = f
            .store
            .read_once(&format!("threads/chat/messages/{id}"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["payload"], json!("salut"));
        assert_eq!(stored["type"], json!("text"));
        assert_eq!(stored["sender"], json!("jora"));
        assert_eq!(msg.date(), stored["date"].as_i64());

        let history = f.store.history().await;
        assert_eq!(details_updates(&history), 1);

        let calls = f.transport.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec![user::Channel::for_user(&sub("valera"))]);
        assert_eq!(calls[0].1.message_id(), id);

        let thread = f.threads.find_by_id(&tid("chat")).await.unwrap().unwrap();
        assert!(thread.last_message_added().is_some());
    }

    #[tokio::test]
    async fn should_reject_message_without_thread() {
        let f = fixture(30).await;
        let orphan = Message::new(None, sub("jora"), Kind::Text, "salut");

        let res = f.service.send_message(&f.jora, orphan).await;

        assert!(matches!(res, Err(message::Error::MissingThread)));
        assert!(f.store.history().await.is_empty());
        assert!(f.transport.calls().await.is_empty());
    }

    #[tokio::test]
    async fn should_reject_unknown_thread() {
        let f = fixture(30).await;

        let res = f
            .service
            .send_message(&f.jora, Message::text(&tid("nope"), &sub("jora"), "salut"))
            .await;

        assert!(matches!(res, Err(message::Error::ThreadNotFound(_))));
        assert!(f.store.history().await.is_empty());
    }

    #[tokio::test]
    async fn should_skip_side_effects_when_write_fails() {
        let f = fixture(30).await;
        f.store.reject_writes(Some("permission denied")).await;

        let res = f
            .service
            .send_message(&f.jora, Message::text(&tid("chat"), &sub("jora"), "salut"))
            .await;

        assert!(matches!(
            res,
            Err(message::Error::_Integration(integration::Error::Rejected(_)))
        ));
        assert!(f.store.history().await.is_empty());
        assert!(f.transport.calls().await.is_empty());
        assert!(f.messages.find_by_thread(&tid("chat")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_not_push_public_message() {
        let f = fixture(30).await;

        f.service
            .send_message(&f.jora, Message::text(&tid("room"), &sub("jora"), "salut"))
            .await
            .unwrap();

        assert_eq!(details_updates(&f.store.history().await), 1);
        assert!(f.transport.calls().await.is_empty());
    }

    #[tokio::test]
    async fn should_load_messages_in_batches() {
        let f = fixture(2).await;
        let chat = f.threads.find_by_id(&tid("chat")).await.unwrap().unwrap();
        let mut sent = Vec::new();
        for text in ["one", "two", "three"] {
            let msg = f
                .service
                .send_message(&f.jora, Message::text(&tid("chat"), &sub("jora"), text))
                .await
                .unwrap();
            sent.push(msg);
        }

        let newest = f.service.load_more_messages(&chat, None).await.unwrap();
        let older = f
            .service
            .load_more_messages(&chat, newest.first())
            .await
            .unwrap();

        let texts = |ms: &[Message]| ms.iter().map(|m| m.payload().to_owned()).collect::<Vec<_>>();
        assert_eq!(texts(&newest), vec!["two", "three"]);
        assert_eq!(texts(&older), vec!["one"]);
        assert_eq!(older[0].id(), sent[0].id());
    }

    #[tokio::test]
    async fn should_send_despite_transport_failure() {
        let f = fixture(30).await;
        let notifications = NotificationService::new(
            f.store.clone(),
            Some(Arc::new(FailingTransport::new("nats down"))),
            Arc::new(InMemoryUserRepository::new()),
            f.messages.clone(),
        );
        let service = MessageServiceImpl::new(
            f.store.clone(),
            f.messages.clone(),
            f.threads.clone(),
            notifications,
            30,
        );

        let msg = service
            .send_message(&f.jora, Message::text(&tid("chat"), &sub("jora"), "salut"))
            .await
            .unwrap();

        let id = msg.id().unwrap();
        let stored = f
            .store
            .read_once(&format!("threads/chat/messages/{id}/payload"))
            .await
            .unwrap();
        assert_eq!(stored, Some(json!("salut")));
        assert_eq!(details_updates(&f.store.history().await), 1);

        let local = f.messages.find_by_thread(&tid("chat")).await.unwrap();
        assert_eq!(local, vec![msg]);
    }

    #[tokio::test]
    async fn should_load_nothing_before_undated_message() {
        let f = fixture(30).await;
        let chat = f.threads.find_by_id(&tid("chat")).await.unwrap().unwrap();
        f.service
            .send_message(&f.jora, Message::text(&tid("chat"), &sub("jora"), "salut"))
            .await
            .unwrap();
        let draft = Message::text(&tid("chat"), &sub("jora"), "draft")
            .with_id(message::Id::parse("m0").unwrap());

        let loaded = f
            .service
            .load_more_messages(&chat, Some(&draft))
            .await
            .unwrap();

        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn should_load_nothing_from_empty_thread() {
        let f = fixture(30).await;
        let chat = f.threads.find_by_id(&tid("chat")).await.unwrap().unwrap();

        let loaded = f.service.load_more_messages(&chat, None).await.unwrap();

        assert!(loaded.is_empty());
    }
}
