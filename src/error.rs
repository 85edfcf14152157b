use crate::{integration, message, notification, thread, user};

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    _Integration(#[from] integration::Error),
    _User(#[from] user::Error),
    _Thread(#[from] thread::Error),
    _Message(#[from] message::Error),
    _Notification(#[from] notification::Error),
}
