use std::time::Duration;

use crate::query::DEFAULT_QUERY_TIMEOUT;

// ============================================================================
// Configuration - environment driven
// ============================================================================
//
// Required: broker list plus the consumer groups and topics shared with the
// other flashsale services. Optional: query timeout, metrics port and the
// group this process reads responses with.
//
// ============================================================================

pub const DEFAULT_METRICS_PORT: u16 = 9090;
pub const DEFAULT_RESPONSE_GROUP: &str = "flashsale-query.responses";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub consumer_event_group: String,
    pub consumer_event_topic: String,
    pub consumer_event_query_group: String,
    pub consumer_event_query_topic: String,
    pub producer_event_topic: String,
    pub producer_event_query_topic: String,
    pub producer_response_topic: String,
    /// Group used to read `producer_response_topic`.
    pub response_consumer_group: String,
}

impl KafkaConfig {
    /// Brokers joined the way librdkafka expects them.
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub kafka: KafkaConfig,
    pub query_timeout: Duration,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let raw_brokers = required("KAFKA_BROKERS")?;
        let brokers: Vec<String> = raw_brokers
            .split(',')
            .map(str::trim)
            .filter(|broker| !broker.is_empty())
            .map(str::to_string)
            .collect();
        if brokers.is_empty() {
            return Err(ConfigError::Invalid {
                name: "KAFKA_BROKERS",
                value: raw_brokers,
                reason: "no broker addresses".to_string(),
            });
        }

        let kafka = KafkaConfig {
            brokers,
            consumer_event_group: required("KAFKA_CONSUMER_EVENT_GROUP")?,
            consumer_event_topic: required("KAFKA_CONSUMER_EVENT_TOPIC")?,
            consumer_event_query_group: required("KAFKA_CONSUMER_EVENT_QUERY_GROUP")?,
            consumer_event_query_topic: required("KAFKA_CONSUMER_EVENT_QUERY_TOPIC")?,
            producer_event_topic: required("KAFKA_PRODUCER_EVENT_TOPIC")?,
            producer_event_query_topic: required("KAFKA_PRODUCER_EVENT_QUERY_TOPIC")?,
            producer_response_topic: required("KAFKA_PRODUCER_RESPONSE_TOPIC")?,
            response_consumer_group: get("KAFKA_RESPONSE_CONSUMER_GROUP")
                .unwrap_or_else(|| DEFAULT_RESPONSE_GROUP.to_string()),
        };

        let query_timeout = match get("QUERY_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>().map_err(|e| e.to_string()) {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        name: "QUERY_TIMEOUT_SECS",
                        value,
                        reason: "must be positive".to_string(),
                    })
                }
                Err(reason) => {
                    return Err(ConfigError::Invalid {
                        name: "QUERY_TIMEOUT_SECS",
                        value,
                        reason,
                    })
                }
            },
            None => DEFAULT_QUERY_TIMEOUT,
        };

        let metrics_port = match get("METRICS_PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "METRICS_PORT",
                reason: e.to_string(),
                value: value.clone(),
            })?,
            None => DEFAULT_METRICS_PORT,
        };

        Ok(Self {
            kafka,
            query_timeout,
            metrics_port,
        })
    }
}
