//! Storage path layout of the sync store.
//!
//! ```text
//! threads/{thread}/users/{user}            = true
//! users/{user}/threads/{thread}            = true
//! threads/{thread}/details/{field}         = ...
//! threads/{thread}/messages/{message}/...  = ...
//! ```

use crate::{message, thread, user};

pub const THREADS: &str = "threads";
pub const USERS: &str = "users";
pub const DETAILS: &str = "details";
pub const MESSAGES: &str = "messages";

pub const LAST_MESSAGE_ADDED: &str = "last_message_added";
pub const CREATOR: &str = "creator";
pub const CREATION_DATE: &str = "creation_date";
pub const NAME: &str = "name";
pub const TYPE: &str = "type";

pub const DATE: &str = "date";
pub const PAYLOAD: &str = "payload";
pub const SENDER: &str = "sender";

pub fn thread(thread: &thread::Id) -> String {
    format!("{THREADS}/{thread}")
}

pub fn thread_users(thread: &thread::Id, user: &user::Id) -> String {
    format!("{THREADS}/{thread}/{USERS}/{user}")
}

pub fn user_threads(user: &user::Id, thread: &thread::Id) -> String {
    format!("{USERS}/{user}/{THREADS}/{thread}")
}

pub fn thread_details(thread: &thread::Id) -> String {
    format!("{THREADS}/{thread}/{DETAILS}")
}

pub fn thread_details_field(thread: &thread::Id, field: &str) -> String {
    format!("{}/{field}", thread_details(thread))
}

pub fn thread_messages(thread: &thread::Id) -> String {
    format!("{THREADS}/{thread}/{MESSAGES}")
}

pub fn message(thread: &thread::Id, message: &message::Id) -> String {
    format!("{}/{message}", thread_messages(thread))
}

pub fn message_field(thread: &thread::Id, message: &message::Id, field: &str) -> String {
    format!("{}/{field}", self::message(thread, message))
}

/// Whether `key` can be used as a single path segment.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
}
