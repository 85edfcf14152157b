use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::path;

use repository::UserRepository;

pub mod model;
pub mod repository;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn UserRepository + Send + Sync>;

#[derive(Clone, Debug, Deserialize, Serialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if path::is_valid_key(&id) {
            Ok(Self(id))
        } else {
            Err(Error::InvalidId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Push channel a user registered for offline notifications.
#[derive(Clone, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
pub struct Channel(String);

impl Channel {
    pub fn parse(channel: impl Into<String>) -> Result<Self> {
        let channel = channel.into();
        if channel.is_empty() {
            return Err(Error::InvalidChannel(channel));
        }
        Ok(Self(channel))
    }

    /// Channel a user subscribes to by default: `user_{id}` with anything
    /// but ASCII alphanumerics replaced by `_`.
    pub fn for_user(id: &Id) -> Self {
        let sanitized: String = id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self(format!("user_{sanitized}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid user id: {0:?}")]
    InvalidId(String),
    #[error("invalid push channel: {0:?}")]
    InvalidChannel(String),
}
