use std::collections::BTreeSet;

use futures::future::try_join_all;
use log::{debug, warn};

use crate::integration::pubsub::Transport;
use crate::integration::store::Store;
use crate::message::{self, model::Message};
use crate::path;
use crate::thread::model::Thread;
use crate::user::{self, model::Session, model::User};

use super::model::PushPayload;
use super::timestamp;

/// Pushes sent messages to the other members of private threads.
#[derive(Clone)]
pub struct NotificationService {
    store: Store,
    transport: Option<Transport>,
    users: user::Repository,
    messages: message::Repository,
}

impl NotificationService {
    pub fn new(
        store: Store,
        transport: Option<Transport>,
        users: user::Repository,
        messages: message::Repository,
    ) -> Self {
        Self {
            store,
            transport,
            users,
            messages,
        }
    }
}

impl NotificationService {
    /// Settles the message date on the server clock and fans the message out.
    ///
    /// Must run after the message write is confirmed. Returns the message
    /// with its server date when one could be read back. A missing or
    /// unreadable date skips the push, and a failed push is only logged.
    pub async fn notify(
        &self,
        session: &Session,
        message: Message,
        thread: &Thread,
    ) -> super::Result<Message> {
        if !thread.kind().is_private() {
            return Ok(message);
        }

        let (Some(thread_id), Some(message_id)) = (message.thread(), message.id()) else {
            warn!("message is not stored yet, skipping push");
            return Ok(message);
        };

        let date_path = path::message_field(thread_id, message_id, path::DATE);
        let date = match self.store.read_once(&date_path).await {
            Ok(value) => value.as_ref().and_then(timestamp::normalize),
            Err(e) => {
                warn!("could not read back {date_path}: {e:?}");
                None
            }
        };
        let Some(date) = date else {
            warn!("no server date for message {message_id}, skipping push");
            return Ok(message);
        };

        let message = message.with_date(date);
        self.messages.save(&message).await?;

        let recipients: BTreeSet<&user::Id> = thread
            .members()
            .iter()
            .filter(|m| *m != message.sender())
            .collect();

        if let Err(e) = self.push_to_users(session, &message, date, recipients).await {
            warn!("could not push message {:?}: {e}", message.id());
        }

        Ok(message)
    }

    async fn push_to_users(
        &self,
        session: &Session,
        message: &Message,
        date: i64,
        recipients: BTreeSet<&user::Id>,
    ) -> super::Result<()> {
        let Some(transport) = &self.transport else {
            debug!("no push transport configured");
            return Ok(());
        };
        if recipients.is_empty() {
            return Ok(());
        }
        let (Some(thread_id), Some(message_id)) = (message.thread(), message.id()) else {
            return Ok(());
        };

        let channels = try_join_all(recipients.iter().map(|r| self.find_user(r))).await?
            .iter()
            .map(User::push_channel)
            .collect::<Vec<_>>();

        let sender = if message.sender() == session.user().id() {
            session.user().clone()
        } else {
            self.find_user(message.sender()).await?
        };

        let payload = PushPayload::new(message_id, thread_id, message, date, &sender);
        transport.push_to_channels(&channels, &payload).await?;

        debug!("pushed message {message_id} to {} users", channels.len());
        Ok(())
    }

    /// Users not synced locally yet fall back to their id.
    async fn find_user(&self, id: &user::Id) -> super::Result<User> {
        let user = self.users.find_by_id(id).await?;
        Ok(user.unwrap_or_else(|| User::new(id.clone(), id.as_str())))
    }
}
