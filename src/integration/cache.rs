use std::env;

use async_trait::async_trait;
use log::{debug, error};
use redis::aio::ConnectionManager;
use serde_json::Value;

use crate::integration;
use crate::integration::Result;

use super::store::{Entry, Op, SyncStore, Update, push_id, subtree};

const PUSH_SEQ_KEY: &str = "__push_seq";

// Every branch path keeps a set `__children:{path}` of its child segments.
// Leaves are plain string keys holding JSON text. A path is never both.
const TREE_FUNCTIONS: &str = r#"
local function index(path)
    return '__children:' .. path
end

local function parent(path)
    return string.match(path, '^(.*)/([^/]+)$')
end

local function clear(path)
    redis.call('DEL', path)
    local idx = index(path)
    for _, child in ipairs(redis.call('SMEMBERS', idx)) do
        clear(path .. '/' .. child)
    end
    redis.call('DEL', idx)
end

local function unlink(path)
    local up, name = parent(path)
    while up do
        local idx = index(up)
        redis.call('SREM', idx, name)
        if redis.call('SCARD', idx) > 0 or redis.call('EXISTS', up) == 1 then
            return
        end
        up, name = parent(up)
    end
end

local function link(path)
    local up, name = parent(path)
    while up do
        redis.call('DEL', up)
        if redis.call('SADD', index(up), name) == 0 then
            return
        end
        up, name = parent(up)
    end
end
"#;

// KEYS: paths; ARGV per key: op, value
const UPDATE_SCRIPT: &str = r#"
local t = redis.call('TIME')
local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
local stamp = string.format('%d', now)
for i, key in ipairs(KEYS) do
    local op = ARGV[i * 2 - 1]
    if op == 'clear' then
        clear(key)
        unlink(key)
    elseif op == 'put' then
        redis.call('SET', key, ARGV[i * 2])
        link(key)
    elseif op == 'stamp' then
        redis.call('SET', key, stamp)
        link(key)
    end
end
return now
"#;

// KEYS[1]: path; returns flat leaf path, JSON pairs
const READ_SCRIPT: &str = r#"
local out = {}
local function walk(path)
    local value = redis.call('GET', path)
    if value then
        table.insert(out, path)
        table.insert(out, value)
        return
    end
    for _, child in ipairs(redis.call('SMEMBERS', index(path))) do
        walk(path .. '/' .. child)
    end
end
walk(KEYS[1])
return out
"#;

const PUSH_SCRIPT: &str = r#"
local t = redis.call('TIME')
local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
local seq = redis.call('INCR', KEYS[1])
return {now, seq}
"#;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    session: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 6379,
            session: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn env() -> Result<Self> {
        let host = env::var("REDIS_HOST")?;
        let port = env::var("REDIS_PORT")?.parse()?;
        let session = env::var("REDIS_SESSION").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());
        Ok(Self {
            host,
            port,
            session,
        })
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

pub async fn init_client(config: &Config) -> Result<redis::Client> {
    redis::Client::open(format!("redis://{}:{}", &config.host, &config.port))
        .map_err(integration::Error::from)
}

pub async fn init(config: &Config) -> Result<ConnectionManager> {
    init_client(config)
        .await?
        .get_connection_manager()
        .await
        .map_err(integration::Error::from)
}

/// Store keeping every leaf path as its own Redis key holding JSON text,
/// with a child index per branch so subtrees are cleared and read without
/// scanning the keyspace.
///
/// Redis has no connection-bound triggers, so disconnect cleanups are kept in
/// a per-session set and applied by [`RedisStore::disconnect`], or by
/// [`RedisStore::reap`] from any process once the session is known dead.
#[derive(Clone)]
pub struct RedisStore {
    con: ConnectionManager,
    session: String,
    update_script: redis::Script,
    read_script: redis::Script,
    push_script: redis::Script,
}

impl RedisStore {
    pub fn new(con: ConnectionManager, session: impl Into<String>) -> Self {
        Self {
            con,
            session: session.into(),
            update_script: redis::Script::new(&format!("{TREE_FUNCTIONS}{UPDATE_SCRIPT}")),
            read_script: redis::Script::new(&format!("{TREE_FUNCTIONS}{READ_SCRIPT}")),
            push_script: redis::Script::new(PUSH_SCRIPT),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.reap(&self.session).await
    }

    /// Applies the disconnect cleanups registered by `session`.
    pub async fn reap(&self, session: &str) -> Result<()> {
        let mut con = self.con.clone();
        let key = on_disconnect_key(session);

        let paths: Vec<String> = redis::cmd("SMEMBERS")
            .arg(&key)
            .query_async(&mut con)
            .await?;
        if paths.is_empty() {
            return Ok(());
        }

        debug!("reaping {} paths of session {session}", paths.len());
        let mut update = Update::new();
        for path in paths {
            update.insert(path, Entry::Remove);
        }
        self.update(&update).await?;

        let _: () = redis::cmd("DEL").arg(&key).query_async(&mut con).await?;
        Ok(())
    }
}

#[async_trait]
impl SyncStore for RedisStore {
    async fn update(&self, update: &Update) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut invocation = self.update_script.prepare_invoke();
        for op in update.ops() {
            match op {
                Op::Clear(path) => {
                    invocation.key(path).arg("clear").arg("");
                }
                Op::Put(path, value) => {
                    let json = serde_json::to_string(&value)?;
                    invocation.key(path).arg("put").arg(json);
                }
                Op::Stamp(path) => {
                    invocation.key(path).arg("stamp").arg("");
                }
            }
        }

        let mut con = self.con.clone();
        let res: redis::RedisResult<i64> = invocation.invoke_async(&mut con).await;
        match res {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("redis update of {} paths failed: {e}", update.len());
                Err(integration::Error::Rejected(e.to_string()))
            }
        }
    }

    async fn push(&self, _path: &str) -> Result<String> {
        let mut con = self.con.clone();
        let (millis, seq): (i64, u64) = self
            .push_script
            .key(PUSH_SEQ_KEY)
            .invoke_async(&mut con)
            .await?;

        Ok(push_id(millis, seq))
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>> {
        let mut con = self.con.clone();
        let flat: Vec<String> = self
            .read_script
            .key(path)
            .invoke_async(&mut con)
            .await?;

        let mut leaves = Vec::with_capacity(flat.len() / 2);
        for pair in flat.chunks_exact(2) {
            let value = serde_json::from_str::<Value>(&pair[1])?;
            if pair[0] == path {
                return Ok(Some(value));
            }
            leaves.push((pair[0].as_str(), value));
        }

        Ok(subtree(path, leaves))
    }

    async fn on_disconnect_remove(&self, path: &str) -> Result<()> {
        let mut con = self.con.clone();
        let _: () = redis::cmd("SADD")
            .arg(on_disconnect_key(&self.session))
            .arg(path)
            .query_async(&mut con)
            .await?;
        Ok(())
    }
}

fn on_disconnect_key(session: &str) -> String {
    format!("__on_disconnect:{session}")
}
