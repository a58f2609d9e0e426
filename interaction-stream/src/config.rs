use envconfig::Envconfig;

use interaction_common::config::{EnvMsDuration, NonEmptyString, SessionConfig};

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub port: u16,

    #[envconfig(from = "POLL_TIMEOUT_MS", default = "1000")]
    pub poll_timeout: EnvMsDuration,

    #[envconfig(nested = true)]
    pub session: SessionConfig,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Each museum's kiosks publish to a topic named after the museum, unless told otherwise.
    pub fn topic(&self) -> &str {
        match &self.kafka.topic {
            Some(topic) => topic.as_str(),
            None => self.session.museum(),
        }
    }
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(from = "KAFKA_BOOTSTRAP_SERVERS", default = "localhost:9092")]
    pub bootstrap_servers: String,

    #[envconfig(from = "KAFKA_GROUP_ID", default = "museum-interactions")]
    pub group_id: String,

    #[envconfig(from = "KAFKA_TOPIC")]
    pub topic: Option<NonEmptyString>,

    #[envconfig(from = "KAFKA_SECURITY_PROTOCOL")]
    pub security_protocol: Option<NonEmptyString>,

    #[envconfig(from = "KAFKA_SASL_MECHANISMS")]
    pub sasl_mechanisms: Option<NonEmptyString>,

    #[envconfig(from = "KAFKA_SASL_USERNAME")]
    pub sasl_username: Option<NonEmptyString>,

    #[envconfig(from = "KAFKA_SASL_PASSWORD")]
    pub sasl_password: Option<NonEmptyString>,

    // We default to "earliest" so that messages published while no worker ran are still stored.
    #[envconfig(from = "KAFKA_OFFSET_RESET", default = "earliest")]
    pub offset_reset: String, // earliest, latest
}
