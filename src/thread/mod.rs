use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{integration, path, user};

use repository::ThreadRepository;
use service::ThreadService;

pub mod membership;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn ThreadRepository + Send + Sync>;
pub type Service = Arc<dyn ThreadService + Send + Sync>;

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

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[serde(rename = "private_1to1")]
    Private1to1,
    PrivateGroup,
    Public,
}

impl Kind {
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Private1to1 => "private_1to1",
            Self::PrivateGroup => "private_group",
            Self::Public => "public",
        }
    }

    pub const fn is_private(&self) -> bool {
        matches!(self, Self::Private1to1 | Self::PrivateGroup)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("thread not found: {0}")]
    NotFound(Id),
    #[error("thread not stored locally: {0}")]
    NotStored(Uuid),
    #[error("thread has no id yet")]
    IdNotPresent,
    #[error("invalid thread id: {0:?}")]
    InvalidId(String),
    #[error("could not create thread")]
    NotCreated(#[source] Box<Error>),
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
}
