use crate::{integration, message, user};

pub mod model;
pub mod service;
pub mod timestamp;

type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _Message(#[from] Box<message::Error>),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
}

impl From<message::Error> for Error {
    fn from(e: message::Error) -> Self {
        Self::_Message(Box::new(e))
    }
}
