use serde::{Deserialize, Serialize};

use crate::message::{self, model::Message};
use crate::{thread, user::model::User};

pub const ACTION_MESSAGE: &str = "message";
pub const BADGE_INCREMENT: &str = "Increment";
pub const SOUND_DEFAULT: &str = "default";

/// Text shown instead of the raw payload for kinds that can't be read as
/// text.
pub const fn summary_placeholder(kind: &message::Kind) -> Option<&'static str> {
    match kind {
        message::Kind::Location => Some("Location message"),
        message::Kind::Image => Some("Image message"),
        message::Kind::Text
        | message::Kind::Audio
        | message::Kind::Video
        | message::Kind::System
        | message::Kind::Sticker
        | message::Kind::File => None,
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PushPayload {
    action: String,
    content: String,
    message_id: message::Id,
    thread_id: thread::Id,
    message_date: i64,
    sender_id: String,
    sender_name: String,
    message_type: message::Kind,
    message_payload: String,
    badge: String,
    alert: String,
    sound: String,
}

impl PushPayload {
    pub fn new(
        message_id: &message::Id,
        thread_id: &thread::Id,
        message: &Message,
        date: i64,
        sender: &User,
    ) -> Self {
        let summary = summary_placeholder(message.kind()).unwrap_or(message.payload());
        let content = format!("{} {summary}", sender.name());

        Self {
            action: ACTION_MESSAGE.to_owned(),
            message_id: message_id.clone(),
            thread_id: thread_id.clone(),
            message_date: date,
            sender_id: sender.id().to_string(),
            sender_name: sender.name().to_owned(),
            message_type: *message.kind(),
            message_payload: message.payload().to_owned(),
            badge: BADGE_INCREMENT.to_owned(),
            alert: content.clone(),
            sound: SOUND_DEFAULT.to_owned(),
            content,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub const fn message_id(&self) -> &message::Id {
        &self.message_id
    }

    pub const fn thread_id(&self) -> &thread::Id {
        &self.thread_id
    }

    pub const fn message_date(&self) -> i64 {
        self.message_date
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub const fn message_type(&self) -> &message::Kind {
        &self.message_type
    }

    pub fn message_payload(&self) -> &str {
        &self.message_payload
    }

    pub fn alert(&self) -> &str {
        &self.alert
    }
}
