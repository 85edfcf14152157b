use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Id;
use super::model::User;

#[async_trait]
pub trait UserRepository {
    async fn upsert(&self, user: &User) -> super::Result<()>;

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<User>>;
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Id, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn upsert(&self, user: &User) -> super::Result<()> {
        self.users
            .write()
            .await
            .insert(user.id().clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }
}
