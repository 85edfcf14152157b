use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{thread, user};

use super::model::Thread;
use super::{Id, Kind};

/// Local copy of the threads this process knows about.
#[async_trait]
pub trait ThreadRepository {
    async fn save(&self, thread: &Thread) -> super::Result<()>;

    async fn find_by_local_id(&self, local_id: &Uuid) -> super::Result<Option<Thread>>;

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Thread>>;

    async fn find_by_kind(&self, kind: &Kind) -> super::Result<Vec<Thread>>;

    async fn find_by_user(&self, user: &user::Id) -> super::Result<Vec<Thread>>;

    /// Local-only user to thread index, never synced.
    async fn connect_user(&self, user: &user::Id, local_id: &Uuid) -> super::Result<()>;
}

#[derive(Default)]
pub struct InMemoryThreadRepository {
    threads: RwLock<HashMap<Uuid, Thread>>,
    user_threads: RwLock<HashMap<user::Id, BTreeSet<Uuid>>>,
}

impl InMemoryThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn save(&self, thread: &Thread) -> super::Result<()> {
        self.threads
            .write()
            .await
            .insert(*thread.local_id(), thread.clone());
        Ok(())
    }

    async fn find_by_local_id(&self, local_id: &Uuid) -> super::Result<Option<Thread>> {
        Ok(self.threads.read().await.get(local_id).cloned())
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Thread>> {
        let thread = self
            .threads
            .read()
            .await
            .values()
            .find(|t| t.id() == Some(id))
            .cloned();
        Ok(thread)
    }

    async fn find_by_kind(&self, kind: &Kind) -> super::Result<Vec<Thread>> {
        let mut threads: Vec<Thread> = self
            .threads
            .read()
            .await
            .values()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect();
        threads.sort_by_key(Thread::creation_date);
        Ok(threads)
    }

    async fn find_by_user(&self, user: &user::Id) -> super::Result<Vec<Thread>> {
        let local_ids = self
            .user_threads
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default();

        let threads = self.threads.read().await;
        Ok(local_ids
            .iter()
            .filter_map(|local_id| threads.get(local_id).cloned())
            .collect())
    }

    async fn connect_user(&self, user: &user::Id, local_id: &Uuid) -> super::Result<()> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(local_id)
            .ok_or(thread::Error::NotStored(*local_id))?;
        thread.add_member(user);

        self.user_threads
            .write()
            .await
            .entry(user.clone())
            .or_default()
            .insert(*local_id);
        Ok(())
    }
}
