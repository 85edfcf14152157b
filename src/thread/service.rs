use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::Value;

use crate::integration::store::{Store, Update};
use crate::path;
use crate::user::{self, model::Session};

use super::membership::{Link, Membership};
use super::model::Thread;
use super::{Id, Kind, Repository};

#[async_trait]
pub trait ThreadService {
    async fn add_users_to_thread(&self, thread: &Thread, users: &[user::Id]) -> super::Result<()>;

    async fn remove_users_from_thread(
        &self,
        thread: &Thread,
        users: &[user::Id],
    ) -> super::Result<()>;

    /// Writes the thread details, reserving an id first if the thread has
    /// none.
    async fn push_thread(&self, thread: &Thread) -> super::Result<Thread>;

    async fn create_thread(
        &self,
        session: &Session,
        name: Option<&str>,
        users: &[user::Id],
    ) -> super::Result<Thread>;

    async fn delete_thread(&self, session: &Session, thread: &Thread) -> super::Result<()>;

    async fn delete_thread_by_id(&self, session: &Session, id: &Id) -> super::Result<()>;

    async fn leave_thread(&self, session: &Session, thread: &Thread) -> super::Result<()>;

    async fn join_thread(&self, session: &Session, thread: &Thread) -> super::Result<()>;
}

#[derive(Clone)]
pub struct ThreadServiceImpl {
    store: Store,
    repo: Repository,
    membership: Membership,
}

impl ThreadServiceImpl {
    pub fn new(store: Store, repo: Repository) -> Self {
        Self {
            membership: Membership::new(store.clone()),
            store,
            repo,
        }
    }
}

#[async_trait]
impl ThreadService for ThreadServiceImpl {
    async fn add_users_to_thread(&self, thread: &Thread, users: &[user::Id]) -> super::Result<()> {
        self.membership.add_users(thread, users).await
    }

    async fn remove_users_from_thread(
        &self,
        thread: &Thread,
        users: &[user::Id],
    ) -> super::Result<()> {
        self.membership.remove_users(thread, users).await
    }

    async fn push_thread(&self, thread: &Thread) -> super::Result<Thread> {
        let mut thread = thread.clone();

        let id = match thread.id() {
            Some(id) => id.clone(),
            None => {
                let id = Id::parse(self.store.push(path::THREADS).await?)?;
                thread.set_id(id.clone());
                id
            }
        };

        let mut details = Update::new()
            .set(path::thread_details_field(&id, path::CREATION_DATE), thread.creation_date())
            .set(path::thread_details_field(&id, path::TYPE), thread.kind().as_str());
        if let Some(creator) = thread.creator() {
            details = details.set(path::thread_details_field(&id, path::CREATOR), creator.as_str());
        }
        details = match thread.name() {
            Some(name) => details.set(path::thread_details_field(&id, path::NAME), name),
            None => details.set(path::thread_details_field(&id, path::NAME), Value::Null),
        };

        self.store.update(&details).await?;
        self.repo.save(&thread).await?;

        debug!("pushed thread {id}");
        Ok(thread)
    }

    async fn create_thread(
        &self,
        session: &Session,
        name: Option<&str>,
        users: &[user::Id],
    ) -> super::Result<Thread> {
        let me = session.user().id();

        let mut members: Vec<user::Id> = Vec::with_capacity(users.len() + 1);
        for u in users.iter().chain(std::iter::once(me)) {
            if !members.contains(u) {
                members.push(u.clone());
            }
        }

        let reusable = match members.as_slice() {
            [a, b] => self.find_chat(me, if a == me { b } else { a }).await?,
            _ => None,
        };

        let mut thread = match reusable {
            Some(chat) => chat,
            None => {
                let kind = if members.len() == 2 {
                    Kind::Private1to1
                } else {
                    Kind::PrivateGroup
                };
                let draft = Thread::new(kind, me, name, members.iter().cloned());
                self.repo.save(&draft).await?;
                draft
            }
        };

        // a revived chat only gets here without an id if its first push failed
        if thread.id().is_none() {
            thread = self
                .push_thread(&thread)
                .await
                .map_err(|e| super::Error::NotCreated(Box::new(e)))?;

            // links point at the id reserved above
            self.add_users_to_thread(&thread, &members)
                .await
                .map_err(|e| {
                    error!("thread {:?} created without memberships", thread.id());
                    super::Error::NotCreated(Box::new(e))
                })?;
        }

        self.repo.connect_user(me, thread.local_id()).await?;
        let thread = self
            .repo
            .find_by_local_id(thread.local_id())
            .await?
            .ok_or(super::Error::NotStored(*thread.local_id()))?;

        info!("{} thread {:?} ready for {me}", thread.kind().as_str(), thread.id());
        Ok(thread)
    }

    async fn delete_thread(&self, session: &Session, thread: &Thread) -> super::Result<()> {
        let me = session.user().id();

        self.membership
            .set_link(thread, std::slice::from_ref(me), Link::Absent)
            .await?;

        let mut thread = thread.clone();
        thread.set_deleted(true);
        self.repo.save(&thread).await?;

        debug!("deleted thread {:?} for {me}", thread.id());
        Ok(())
    }

    async fn delete_thread_by_id(&self, session: &Session, id: &Id) -> super::Result<()> {
        let thread = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(id.clone()))?;

        self.delete_thread(session, &thread).await
    }

    async fn leave_thread(&self, _session: &Session, _thread: &Thread) -> super::Result<()> {
        Err(super::Error::Unsupported("leaving a thread"))
    }

    async fn join_thread(&self, _session: &Session, _thread: &Thread) -> super::Result<()> {
        Err(super::Error::Unsupported("joining a thread"))
    }
}

impl ThreadServiceImpl {
    /// Revives the local 1:1 thread between `me` and `other`, if any.
    ///
    /// Only the local copy is scanned: two devices creating the same chat at
    /// once can both miss and end up with two threads.
    async fn find_chat(&self, me: &user::Id, other: &user::Id) -> super::Result<Option<Thread>> {
        let chats = self.repo.find_by_kind(&Kind::Private1to1).await?;
        let Some(mut chat) = chats.into_iter().find(|t| t.is_between(me, other)) else {
            return Ok(None);
        };

        chat.set_deleted(false);
        self.repo.save(&chat).await?;

        debug!("reusing thread {:?} between {me} and {other}", chat.id());
        Ok(Some(chat))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;

    use crate::integration::store::{MemoryStore, SyncStore};
    use crate::thread::repository::{InMemoryThreadRepository, ThreadRepository};
    use crate::user::model::User;
    use crate::{integration, thread};

    use super::*;

    fn sub(id: &str) -> user::Id {
        user::Id::parse(id).unwrap()
    }

    fn session(id: &str) -> Session {
        Session::new(User::new(sub(id), id))
    }

    struct Device {
        repo: Arc<InMemoryThreadRepository>,
        service: ThreadServiceImpl,
    }

    fn device(store: &Arc<MemoryStore>) -> Device {
        let repo = Arc::new(InMemoryThreadRepository::new());
        let service = ThreadServiceImpl::new(store.clone(), repo.clone());
        Device { repo, service }
    }

    #[tokio::test]
    async fn should_create_chat() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");

        let chat = d
            .service
            .create_thread(&jora, None, &[sub("valera")])
            .await
            .unwrap();

        let id = chat.id().unwrap();
        assert_eq!(chat.kind(), &Kind::Private1to1);
        assert_eq!(chat.creator(), Some(&sub("jora")));
        assert!(chat.is_between(&sub("jora"), &sub("valera")));
        assert!(!chat.is_deleted());

        for u in ["jora", "valera"] {
            let thread_users = store.read_once(&format!("threads/{id}/users/{u}")).await.unwrap();
            let user_threads = store.read_once(&format!("users/{u}/threads/{id}")).await.unwrap();
            assert_eq!(thread_users, Some(json!(true)));
            assert_eq!(user_threads, Some(json!(true)));
        }

        let kind = store
            .read_once(&format!("threads/{id}/details/type"))
            .await
            .unwrap();
        assert_eq!(kind, Some(json!("private_1to1")));

        let mine = d.repo.find_by_user(&sub("jora")).await.unwrap();
        assert_eq!(mine, vec![chat]);
    }

    #[tokio::test]
    async fn should_reuse_chat() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");

        let first = d
            .service
            .create_thread(&jora, None, &[sub("valera")])
            .await
            .unwrap();
        let second = d
            .service
            .create_thread(&jora, None, &[sub("valera"), sub("jora")])
            .await
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(d.repo.find_by_kind(&Kind::Private1to1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_revive_deleted_chat_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");
        let chat = Thread::existing(
            thread::Id::parse("t1").unwrap(),
            Kind::Private1to1,
            [sub("jora"), sub("valera")],
        )
        .with_deleted(true);
        d.repo.save(&chat).await.unwrap();

        let revived = d
            .service
            .create_thread(&jora, Some("ignored"), &[sub("valera")])
            .await
            .unwrap();

        assert_eq!(revived.id(), chat.id());
        assert!(!revived.is_deleted());
        assert!(store.history().await.is_empty());

        let stored = d.repo.find_by_local_id(chat.local_id()).await.unwrap().unwrap();
        assert!(!stored.is_deleted());
    }

    #[tokio::test]
    async fn should_create_group() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");

        let group = d
            .service
            .create_thread(&jora, Some("lads"), &[sub("valera"), sub("radu"), sub("valera")])
            .await
            .unwrap();

        let id = group.id().unwrap();
        assert_eq!(group.kind(), &Kind::PrivateGroup);
        assert_eq!(group.name(), Some("lads"));
        assert_eq!(group.members().len(), 3);

        let users = store.read_once(&format!("threads/{id}/users")).await.unwrap();
        assert_eq!(users, Some(json!({"jora": true, "radu": true, "valera": true})));
    }

    #[tokio::test]
    async fn should_not_reuse_chat_for_group() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");
        let chat = d
            .service
            .create_thread(&jora, None, &[sub("valera")])
            .await
            .unwrap();

        let group = d
            .service
            .create_thread(&jora, None, &[sub("valera"), sub("radu")])
            .await
            .unwrap();

        assert_ne!(chat.id(), group.id());
    }

    #[tokio::test]
    async fn should_fail_creation_when_rejected() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        store.reject_writes(Some("network down")).await;

        let res = d
            .service
            .create_thread(&session("jora"), None, &[sub("valera")])
            .await;

        assert!(matches!(res, Err(thread::Error::NotCreated(_))));
        assert!(store.read_once("users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_push_draft_left_by_failed_creation() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");
        store.reject_writes(Some("network down")).await;
        let failed = d.service.create_thread(&jora, None, &[sub("valera")]).await;
        assert!(failed.is_err());
        store.reject_writes(None).await;

        let chat = d
            .service
            .create_thread(&jora, None, &[sub("valera")])
            .await
            .unwrap();

        let id = chat.id().unwrap();
        let users = store.read_once(&format!("threads/{id}/users")).await.unwrap();
        assert_eq!(users, Some(json!({"jora": true, "valera": true})));
        assert_eq!(d.repo.find_by_kind(&Kind::Private1to1).await.unwrap().len(), 1);
    }

    // Duplicate scan is local only: two devices racing on the same pair both
    // create a thread. Reconciliation happens elsewhere.
    #[tokio::test]
    async fn should_race_between_devices() {
        let store = Arc::new(MemoryStore::new());
        let phone = device(&store);
        let laptop = device(&store);

        let (jora, valera) = (session("jora"), session("valera"));
        let (to_valera, to_jora) = ([sub("valera")], [sub("jora")]);

        let (a, b) = tokio::join!(
            phone.service.create_thread(&jora, None, &to_valera),
            laptop.service.create_thread(&valera, None, &to_jora),
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.id(), b.id());
        assert!(a.is_between(&sub("jora"), &sub("valera")));
        assert!(b.is_between(&sub("jora"), &sub("valera")));
    }

    #[tokio::test]
    async fn should_push_thread_once() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let draft = Thread::new(Kind::Public, &sub("jora"), Some("lobby"), Vec::new());

        let pushed = d.service.push_thread(&draft).await.unwrap();
        let again = d.service.push_thread(&pushed).await.unwrap();

        let id = pushed.id().unwrap();
        assert_eq!(again.id(), Some(id));

        let details = store.read_once(&path::thread_details(id)).await.unwrap().unwrap();
        assert_eq!(details["name"], json!("lobby"));
        assert_eq!(details["type"], json!("public"));
        assert_eq!(details["creator"], json!("jora"));
    }

    #[tokio::test]
    async fn should_delete_thread() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");
        let chat = d
            .service
            .create_thread(&jora, None, &[sub("valera")])
            .await
            .unwrap();
        let id = chat.id().unwrap().clone();

        d.service.delete_thread_by_id(&jora, &id).await.unwrap();

        assert!(store.read_once(&format!("threads/{id}/users/jora")).await.unwrap().is_none());
        assert!(store.read_once(&format!("users/jora/threads/{id}")).await.unwrap().is_none());
        let valera = store.read_once(&format!("users/valera/threads/{id}")).await.unwrap();
        assert_eq!(valera, Some(json!(true)));

        let stored = d.repo.find_by_id(&id).await.unwrap().unwrap();
        assert!(stored.is_deleted());
    }

    #[tokio::test]
    async fn should_not_delete_unknown_thread() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let id = thread::Id::parse("nope").unwrap();

        let res = d.service.delete_thread_by_id(&session("jora"), &id).await;

        assert!(matches!(res, Err(thread::Error::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn should_propagate_delete_rejection() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");
        let chat = d
            .service
            .create_thread(&jora, None, &[sub("valera")])
            .await
            .unwrap();
        store.reject_writes(Some("permission denied")).await;

        let res = d.service.delete_thread(&jora, &chat).await;

        assert!(matches!(
            res,
            Err(thread::Error::_Integration(integration::Error::Rejected(_)))
        ));
        let stored = d.repo.find_by_local_id(chat.local_id()).await.unwrap().unwrap();
        assert!(!stored.is_deleted());
    }

    #[tokio::test]
    async fn should_not_support_leave_and_join() {
        let store = Arc::new(MemoryStore::new());
        let d = device(&store);
        let jora = session("jora");
        let room = Thread::existing(thread::Id::parse("t1").unwrap(), Kind::Public, Vec::new());

        let leave = d.service.leave_thread(&jora, &room).await;
        let join = d.service.join_thread(&jora, &room).await;

        assert!(matches!(leave, Err(thread::Error::Unsupported(_))));
        assert!(matches!(join, Err(thread::Error::Unsupported(_))));
        assert!(store.history().await.is_empty());
    }
}
