use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::integration;

pub type Store = Arc<dyn SyncStore + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Set(Value),
    /// Replaced by the backend clock (epoch ms) when the update is applied.
    ServerTimestamp,
    Remove,
}

/// Path to entry map applied as a single all-or-nothing write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update(BTreeMap<String, Entry>);

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(path, Entry::Set(value.into()));
        self
    }

    pub fn server_timestamp(mut self, path: impl Into<String>) -> Self {
        self.insert(path, Entry::ServerTimestamp);
        self
    }

    pub fn remove(mut self, path: impl Into<String>) -> Self {
        self.insert(path, Entry::Remove);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: Entry) {
        self.0.insert(path.into(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.0.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowers the update into leaf operations. Every entry first clears its
    /// path and subtree, then object values are spread over leaf paths.
    pub(crate) fn ops(&self) -> Vec<Op> {
        let mut ops = Vec::with_capacity(self.0.len() * 2);
        for (path, entry) in &self.0 {
            ops.push(Op::Clear(path.clone()));
            match entry {
                Entry::Set(value) => flatten(path, value, &mut ops),
                Entry::ServerTimestamp => ops.push(Op::Stamp(path.clone())),
                Entry::Remove => {}
            }
        }
        ops
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Op {
    Clear(String),
    Put(String, Value),
    Stamp(String),
}

fn flatten(path: &str, value: &Value, ops: &mut Vec<Op>) {
    match value {
        Value::Null => {}
        Value::Object(children) => {
            for (key, child) in children {
                flatten(&format!("{path}/{key}"), child, ops);
            }
        }
        leaf => ops.push(Op::Put(path.to_owned(), leaf.clone())),
    }
}

/// Assembles the nested object stored under `root` out of its leaves.
pub(crate) fn subtree<'a>(
    root: &str,
    leaves: impl IntoIterator<Item = (&'a str, Value)>,
) -> Option<Value> {
    let prefix = format!("{root}/");
    let mut tree = Map::new();

    for (path, value) in leaves {
        let Some(rest) = path.strip_prefix(&prefix) else {
            continue;
        };

        let mut segments = rest.split('/').peekable();
        let mut node = &mut tree;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                node.insert(segment.to_owned(), value);
                break;
            }

            let child = node
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            match child {
                Value::Object(map) => node = map,
                _ => unreachable!("child was just made an object"),
            }
        }
    }

    if tree.is_empty() {
        None
    } else {
        Some(Value::Object(tree))
    }
}

/// Push ids sort in creation order: 12 hex digits of clock, 8 of sequence.
pub(crate) fn push_id(millis: i64, seq: u64) -> String {
    format!("{:012x}{:08x}", millis.max(0), seq & 0xffff_ffff)
}

/// Realtime key-value store the thread and message operations sync through.
#[async_trait]
pub trait SyncStore {
    /// Applies every path of `update` or none of them.
    async fn update(&self, update: &Update) -> super::Result<()>;

    /// Reserves a new child id under `path`.
    async fn push(&self, path: &str) -> super::Result<String>;

    async fn read_once(&self, path: &str) -> super::Result<Option<Value>>;

    /// Registers `path` for removal when this session goes away without
    /// cleaning up.
    async fn on_disconnect_remove(&self, path: &str) -> super::Result<()>;
}

#[derive(Default)]
struct State {
    leaves: BTreeMap<String, Value>,
    clock: i64,
    seq: u64,
    on_disconnect: BTreeSet<String>,
    history: Vec<Update>,
    rejection: Option<String>,
}

impl State {
    fn tick(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis().max(self.clock + 1);
        self.clock = now;
        now
    }

    fn apply(&mut self, update: &Update) {
        let now = self.tick();
        for op in update.ops() {
            match op {
                Op::Clear(path) => {
                    let prefix = format!("{path}/");
                    self.leaves
                        .retain(|key, _| key != &path && !key.starts_with(&prefix));
                }
                Op::Put(path, value) => self.put(path, value),
                Op::Stamp(path) => self.put(path, Value::from(now)),
            }
        }
        self.history.push(update.clone());
    }

    /// A leaf replaces any leaf above it.
    fn put(&mut self, path: String, value: Value) {
        for (i, _) in path.rmatch_indices('/') {
            self.leaves.remove(&path[..i]);
        }
        self.leaves.insert(path, value);
    }
}

/// In-process store with a monotonic server clock.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the registered disconnect cleanups as one update.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        let paths = std::mem::take(&mut state.on_disconnect);
        if paths.is_empty() {
            return;
        }

        debug!("running {} disconnect cleanups", paths.len());
        let mut update = Update::new();
        for path in paths {
            update.insert(path, Entry::Remove);
        }
        state.apply(&update);
    }

    /// Updates applied so far, oldest first.
    pub async fn history(&self) -> Vec<Update> {
        self.state.read().await.history.clone()
    }

    /// Makes every following write fail with `reason`, or accepts writes
    /// again when `None`.
    pub async fn reject_writes(&self, reason: Option<&str>) {
        self.state.write().await.rejection = reason.map(str::to_owned);
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn update(&self, update: &Update) -> super::Result<()> {
        let mut state = self.state.write().await;
        if let Some(reason) = &state.rejection {
            return Err(integration::Error::Rejected(reason.clone()));
        }

        if !update.is_empty() {
            state.apply(update);
        }
        Ok(())
    }

    async fn push(&self, _path: &str) -> super::Result<String> {
        let mut state = self.state.write().await;
        let now = state.tick();
        state.seq += 1;
        Ok(push_id(now, state.seq))
    }

    async fn read_once(&self, path: &str) -> super::Result<Option<Value>> {
        let state = self.state.read().await;
        if let Some(value) = state.leaves.get(path) {
            return Ok(Some(value.clone()));
        }

        let prefix = format!("{path}/");
        let leaves = state
            .leaves
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key.as_str(), value.clone()));

        Ok(subtree(path, leaves))
    }

    async fn on_disconnect_remove(&self, path: &str) -> super::Result<()> {
        self.state
            .write()
            .await
            .on_disconnect
            .insert(path.to_owned());
        Ok(())
    }
}
