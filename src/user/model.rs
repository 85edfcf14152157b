use serde::{Deserialize, Serialize};

use super::{Channel, Id};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct User {
    id: Id,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    push_channel: Option<Channel>,
}

impl User {
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            push_channel: None,
        }
    }

    pub fn with_push_channel(self, channel: Channel) -> Self {
        Self {
            push_channel: Some(channel),
            ..self
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_channel(&self) -> Channel {
        self.push_channel
            .clone()
            .unwrap_or_else(|| Channel::for_user(&self.id))
    }
}

/// Identity of whoever drives the current operation.
#[derive(Clone, Debug)]
pub struct Session {
    user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub const fn user(&self) -> &User {
        &self.user
    }
}
