use std::sync::Arc;

use log::info;

use crate::integration::cache::{self, RedisStore};
use crate::integration::pubsub::{NatsTransport, Transport};
use crate::integration::store::Store;
use crate::integration::{self, Config};
use crate::message::repository::InMemoryMessageRepository;
use crate::message::service::MessageServiceImpl;
use crate::notification::service::NotificationService;
use crate::thread::repository::InMemoryThreadRepository;
use crate::thread::service::ThreadServiceImpl;
use crate::user::repository::InMemoryUserRepository;
use crate::{message, thread, user};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub user_repo: user::Repository,
    pub thread_repo: thread::Repository,
    pub message_repo: message::Repository,

    pub thread_service: thread::Service,
    pub message_service: message::Service,
}

impl AppState {
    /// Wires the services over `store` with empty local repositories.
    pub fn new(config: Config, store: Store, transport: Option<Transport>) -> Self {
        let user_repo: user::Repository = Arc::new(InMemoryUserRepository::new());
        let thread_repo: thread::Repository = Arc::new(InMemoryThreadRepository::new());
        let message_repo: message::Repository = Arc::new(InMemoryMessageRepository::new());

        let notifications = NotificationService::new(
            store.clone(),
            transport,
            user_repo.clone(),
            message_repo.clone(),
        );

        let thread_service = Arc::new(ThreadServiceImpl::new(store.clone(), thread_repo.clone()));
        let message_service = Arc::new(MessageServiceImpl::new(
            store.clone(),
            message_repo.clone(),
            thread_repo.clone(),
            notifications,
            config.messages_per_batch,
        ));

        Self {
            config,
            store,
            user_repo,
            thread_repo,
            message_repo,
            thread_service,
            message_service,
        }
    }

    /// Connects to Redis and, when configured, to NATS.
    pub async fn init(config: Config) -> crate::Result<Self> {
        let con = cache::init(&config.redis).await?;
        let store: Store = Arc::new(RedisStore::new(con, config.redis.session()));

        let transport: Option<Transport> = match &config.pubsub {
            Some(pubsub) => {
                let client = pubsub.connect().await?;
                Some(Arc::new(NatsTransport::new(client)))
            }
            None => None,
        };

        info!(
            "state initialized, session {}, push {}",
            config.redis.session(),
            if transport.is_some() { "enabled" } else { "disabled" }
        );
        Ok(Self::new(config, store, transport))
    }

    /// Same as [`AppState::init`] with the configuration read from the
    /// environment.
    pub async fn from_env() -> crate::Result<Self> {
        integration::init_logger()?;
        Self::init(Config::env()).await
    }
}
