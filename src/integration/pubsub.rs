use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};

use crate::integration::Result;
use crate::notification::model::PushPayload;
use crate::user;

pub type Transport = Arc<dyn PushTransport + Send + Sync>;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 4222,
        }
    }
}

impl Config {
    pub fn env() -> Option<Self> {
        let host = env::var("NATS_HOST").ok();
        let port = env::var("NATS_PORT")
            .unwrap_or_else(|_| "4222".to_string())
            .parse()
            .ok();

        if let (Some(host), Some(port)) = (host, port) {
            Some(Self { host, port })
        } else {
            warn!("NATS env is not configured, push notifications are disabled");
            None
        }
    }

    pub async fn connect(&self) -> Result<async_nats::Client> {
        let client = async_nats::connect(&format!("{}:{}", self.host, self.port)).await?;
        Ok(client)
    }
}

/// Delivery channel for offline push notifications.
#[async_trait]
pub trait PushTransport {
    async fn push_to_channels(&self, channels: &[user::Channel], payload: &PushPayload)
    -> Result<()>;
}

#[derive(Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
}

impl NatsTransport {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PushTransport for NatsTransport {
    async fn push_to_channels(
        &self,
        channels: &[user::Channel],
        payload: &PushPayload,
    ) -> Result<()> {
        let bytes = Bytes::from(serde_json::to_vec(payload)?);
        for channel in channels {
            self.client.publish(channel, bytes.clone()).await?;
        }
        self.client.flush().await?;

        debug!("pushed message to {} channels", channels.len());
        Ok(())
    }
}

impl async_nats::subject::ToSubject for &user::Channel {
    fn to_subject(&self) -> async_nats::Subject {
        format!("push.{self}").into()
    }
}
