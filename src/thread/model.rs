use std::collections::BTreeSet;

use uuid::Uuid;

use crate::user;

use super::{Id, Kind};

#[derive(Clone, Debug, PartialEq)]
pub struct Thread {
    local_id: Uuid,
    id: Option<Id>,
    kind: Kind,
    creator: Option<user::Id>,
    creation_date: i64,
    name: Option<String>,
    deleted: bool,
    members: BTreeSet<user::Id>,
    last_message_added: Option<i64>,
}

impl Thread {
    /// A thread not yet known to the backend.
    pub fn new(
        kind: Kind,
        creator: &user::Id,
        name: Option<&str>,
        members: impl IntoIterator<Item = user::Id>,
    ) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            id: None,
            kind,
            creator: Some(creator.clone()),
            creation_date: chrono::Utc::now().timestamp_millis(),
            name: name.map(str::to_owned),
            deleted: false,
            members: members.into_iter().collect(),
            last_message_added: None,
        }
    }

    /// A thread that already lives in the backend, e.g. one synced from
    /// another device.
    pub fn existing(id: Id, kind: Kind, members: impl IntoIterator<Item = user::Id>) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            id: Some(id),
            kind,
            creator: None,
            creation_date: chrono::Utc::now().timestamp_millis(),
            name: None,
            deleted: false,
            members: members.into_iter().collect(),
            last_message_added: None,
        }
    }

    pub fn with_deleted(self, deleted: bool) -> Self {
        Self { deleted, ..self }
    }

    pub const fn local_id(&self) -> &Uuid {
        &self.local_id
    }

    pub const fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    pub const fn creator(&self) -> Option<&user::Id> {
        self.creator.as_ref()
    }

    pub const fn creation_date(&self) -> i64 {
        self.creation_date
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub const fn members(&self) -> &BTreeSet<user::Id> {
        &self.members
    }

    pub const fn last_message_added(&self) -> Option<i64> {
        self.last_message_added
    }

    /// Whether exactly `a` and `b` take part in this thread.
    pub fn is_between(&self, a: &user::Id, b: &user::Id) -> bool {
        self.members.len() == 2 && self.members.contains(a) && self.members.contains(b)
    }
}

impl Thread {
    pub(crate) fn set_id(&mut self, id: Id) {
        self.id = Some(id);
    }

    pub(crate) fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    pub(crate) fn add_member(&mut self, user: &user::Id) {
        self.members.insert(user.clone());
    }

    pub(crate) fn set_last_message_added(&mut self, millis: i64) {
        self.last_message_added = Some(millis);
    }
}
