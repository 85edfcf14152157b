use log::warn;
use serde_json::Value;

use crate::notification::timestamp;
use crate::{path, thread, user};

use super::{Id, Kind};

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    id: Option<Id>,
    thread: Option<thread::Id>,
    sender: user::Id,
    kind: Kind,
    payload: String,
    date: Option<i64>,
}

impl Message {
    pub fn new(
        thread: Option<thread::Id>,
        sender: user::Id,
        kind: Kind,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            thread,
            sender,
            kind,
            payload: payload.into(),
            date: None,
        }
    }

    pub fn text(thread: &thread::Id, sender: &user::Id, text: &str) -> Self {
        Self::new(Some(thread.clone()), sender.clone(), Kind::Text, text)
    }

    pub fn with_id(self, id: Id) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    pub fn with_date(self, date: i64) -> Self {
        Self {
            date: Some(date),
            ..self
        }
    }

    pub const fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub const fn thread(&self) -> Option<&thread::Id> {
        self.thread.as_ref()
    }

    pub const fn sender(&self) -> &user::Id {
        &self.sender
    }

    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Epoch millis; the client clock until the server time is read back.
    pub const fn date(&self) -> Option<i64> {
        self.date
    }

    /// Rebuilds a message from its stored `threads/{thread}/messages/{id}`
    /// subtree.
    pub(crate) fn from_snapshot(thread: &thread::Id, id: &str, snapshot: &Value) -> Option<Self> {
        let parsed = Self::parse(thread, id, snapshot);
        if parsed.is_none() {
            warn!("skipping malformed message {id} of thread {thread}");
        }
        parsed
    }

    fn parse(thread: &thread::Id, id: &str, snapshot: &Value) -> Option<Self> {
        let id = Id::parse(id).ok()?;
        let sender = user::Id::parse(snapshot.get(path::SENDER)?.as_str()?).ok()?;
        let kind = serde_json::from_value::<Kind>(snapshot.get(path::TYPE)?.clone()).ok()?;
        let payload = snapshot
            .get(path::PAYLOAD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let date = snapshot.get(path::DATE).and_then(timestamp::normalize);

        Some(Self {
            id: Some(id),
            thread: Some(thread.clone()),
            sender,
            kind,
            payload: payload.to_owned(),
            date,
        })
    }
}
