use log::{debug, error, warn};
use serde_json::Value;

use crate::integration::store::{Entry, Store, Update};
use crate::{path, user};

use super::model::Thread;
use super::{Id, Kind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    Present,
    Absent,
}

impl Link {
    fn entry(&self) -> Entry {
        match self {
            Self::Present => Entry::Set(Value::Bool(true)),
            Self::Absent => Entry::Remove,
        }
    }
}

/// Writes for linking `users` to a thread, and the paths to clean up when
/// the session drops.
///
/// Private threads are linked from both sides. Public threads only list
/// their users, so a user's public threads can't be resolved from the user
/// side.
pub fn links(thread: &Id, kind: &Kind, users: &[user::Id], link: Link) -> (Update, Vec<String>) {
    let mut update = Update::new();
    let mut on_disconnect = Vec::new();

    for user in users {
        let thread_users = path::thread_users(thread, user);

        if kind.is_private() {
            update.insert(path::user_threads(user, thread), link.entry());
        } else if link == Link::Present {
            on_disconnect.push(thread_users.clone());
        }
        update.insert(thread_users, link.entry());
    }

    (update, on_disconnect)
}

/// Keeps the thread/users and user/threads indexes in step.
#[derive(Clone)]
pub struct Membership {
    store: Store,
}

impl Membership {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn set_link(&self, thread: &Thread, users: &[user::Id], link: Link) -> super::Result<()> {
        let id = thread.id().ok_or(super::Error::IdNotPresent)?;
        let (update, on_disconnect) = links(id, thread.kind(), users, link);

        for path in on_disconnect {
            if let Err(e) = self.store.on_disconnect_remove(&path).await {
                warn!("could not register disconnect cleanup for {path}: {e:?}");
            }
        }

        self.store.update(&update).await.map_err(|e| {
            error!("failed to set {link:?} link for {} users of thread {id}: {e}", users.len());
            super::Error::from(e)
        })?;

        debug!("set {link:?} link for {} users of thread {id}", users.len());
        Ok(())
    }

    pub async fn add_users(&self, thread: &Thread, users: &[user::Id]) -> super::Result<()> {
        self.set_link(thread, users, Link::Present).await
    }

    pub async fn remove_users(&self, thread: &Thread, users: &[user::Id]) -> super::Result<()> {
        self.set_link(thread, users, Link::Absent).await
    }
}
