use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};
use serde_json::Value;
use tracing::info;

use interaction_common::error::NormalizeError;
use interaction_common::types::RawInteractionRecord;

use crate::config::KafkaConfig;

/// Outcome of a single bounded poll of the feed.
#[derive(Debug)]
pub enum FeedPoll {
    /// Nothing arrived before the timeout.
    Idle,
    /// A message, possibly without a payload.
    Message(Option<Vec<u8>>),
    /// The feed reported an error for this poll.
    Error(String),
    /// The feed will not deliver anything else.
    Closed,
}

/// A subscribed source of interaction messages, delivered in order.
#[async_trait]
pub trait InteractionFeed: Send {
    async fn poll(&mut self, timeout: Duration) -> FeedPoll;
}

pub struct KafkaFeed {
    consumer: StreamConsumer,
}

impl KafkaFeed {
    /// Create a consumer in `config.group_id` and subscribe it to `topic`.
    pub fn subscribe(config: &KafkaConfig, topic: &str) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", &config.offset_reset);

        if let Some(protocol) = &config.security_protocol {
            client_config.set("security.protocol", protocol.as_str());
        }
        if let Some(mechanisms) = &config.sasl_mechanisms {
            client_config.set("sasl.mechanisms", mechanisms.as_str());
        }
        if let Some(username) = &config.sasl_username {
            client_config.set("sasl.username", username.as_str());
        }
        if let Some(password) = &config.sasl_password {
            client_config.set("sasl.password", password.as_str());
        }

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[topic])?;

        info!(
            topic,
            group_id = %config.group_id,
            bootstrap_servers = %config.bootstrap_servers,
            "subscribed to interaction feed"
        );

        Ok(Self { consumer })
    }
}

#[async_trait]
impl InteractionFeed for KafkaFeed {
    async fn poll(&mut self, timeout: Duration) -> FeedPoll {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => FeedPoll::Idle,
            Ok(Err(e)) => FeedPoll::Error(e.to_string()),
            Ok(Ok(message)) => FeedPoll::Message(message.payload().map(<[u8]>::to_vec)),
        }
    }
}

/// Decode a message payload: a UTF-8 JSON object with the fields of a raw record.
/// Fields it doesn't carry stay absent; extra fields are ignored.
pub fn decode_payload(payload: &[u8]) -> Result<RawInteractionRecord, NormalizeError> {
    let parse_error = || NormalizeError::ParseError {
        field: "payload",
        value: String::from_utf8_lossy(payload).into_owned(),
    };

    let value: Value = serde_json::from_slice(payload).map_err(|_| parse_error())?;
    if !value.is_object() {
        return Err(parse_error());
    }

    serde_json::from_value(value).map_err(|_| parse_error())
}
