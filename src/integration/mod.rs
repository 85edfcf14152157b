use std::env;
use std::fs::File;
use std::str::FromStr;

use dotenv::dotenv;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};

pub mod cache;
pub mod pubsub;
pub mod store;

pub type Result<T> = std::result::Result<T, Error>;

const DEFAULT_MESSAGES_PER_BATCH: usize = 30;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("backend rejected write: {0}")]
    Rejected(String),

    #[error(transparent)]
    _Redis(#[from] redis::RedisError),
    #[error(transparent)]
    _NatsConnect(#[from] async_nats::ConnectError),
    #[error(transparent)]
    _NatsPublish(#[from] async_nats::PublishError),
    #[error(transparent)]
    _NatsFlush(#[from] async_nats::client::FlushError),
    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
    #[error(transparent)]
    _Env(#[from] env::VarError),
    #[error(transparent)]
    _ParseInt(#[from] std::num::ParseIntError),
    #[error(transparent)]
    _Logger(#[from] log::SetLoggerError),
    #[error(transparent)]
    _Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct Config {
    pub redis: cache::Config,
    pub pubsub: Option<pubsub::Config>,
    pub messages_per_batch: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: cache::Config::default(),
            pubsub: None,
            messages_per_batch: DEFAULT_MESSAGES_PER_BATCH,
        }
    }
}

impl Config {
    pub fn env() -> Self {
        dotenv().ok();

        let messages_per_batch = env::var("MESSAGES_PER_BATCH")
            .ok()
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MESSAGES_PER_BATCH);

        Self {
            redis: cache::Config::env().unwrap_or_default(),
            pubsub: pubsub::Config::env(),
            messages_per_batch,
        }
    }
}

/// Logs to the terminal and to `{SERVICE_NAME}.log` at the `RUST_LOG` level.
pub fn init_logger() -> Result<()> {
    dotenv().ok();

    let rust_log = env::var("RUST_LOG").unwrap_or("info".into());
    let level = LevelFilter::from_str(&rust_log).unwrap_or(LevelFilter::Info);
    let log_file = env::var("SERVICE_NAME")
        .map(|pkg| format!("{pkg}.log"))
        .unwrap_or("thread_sync.log".into());

    CombinedLogger::init(vec![
        TermLogger::new(
            level,
            simplelog::Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(level, simplelog::Config::default(), File::create(log_file)?),
    ])?;

    Ok(())
}
