use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{integration, notification, path, thread, user};

use repository::MessageRepository;
use service::MessageService;

pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn MessageRepository + Send + Sync>;
pub type Service = Arc<dyn MessageService + Send + Sync>;

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
    Text,
    Location,
    Image,
    Audio,
    Video,
    System,
    Sticker,
    File,
}

impl Kind {
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Location => "location",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::System => "system",
            Self::Sticker => "sticker",
            Self::File => "file",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message has no thread")]
    MissingThread,
    #[error("thread not stored locally: {0}")]
    ThreadNotFound(thread::Id),
    #[error("message has no id yet")]
    IdNotPresent,
    #[error("invalid message id: {0:?}")]
    InvalidId(String),

    #[error(transparent)]
    _Thread(#[from] thread::Error),
    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _Notification(#[from] notification::Error),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
}
