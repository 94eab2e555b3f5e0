/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Layered producer/consumer/reader configuration.
//!
//! Each handle configuration is assembled in three ordered steps:
//! built-in defaults, then the user override map, then the authoritative fields derived
//! from the destination. The authoritative fields are separate struct members that the
//! override map has no path to, and reserved keys found in the override map are dropped.

use crate::broker::{InitialPosition, MessagePosition, SubscriptionMode, SubscriptionType};
use crate::config::resolver::{parse_bool, parse_u64, value_to_string, Properties};
use crate::error::{Error, Result};
use crate::observability::events;
use std::time::Duration;
use tracing::warn;

const COMPONENT: &str = "layered_config";

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_NEGATIVE_ACK_REDELIVERY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RECEIVER_QUEUE_SIZE: u32 = 1000;

const PRODUCER_RESERVED_KEYS: &[&str] = &["topicName", "topic"];
const CONSUMER_RESERVED_KEYS: &[&str] = &[
    "topicNames",
    "topic",
    "subscriptionName",
    "subscriptionType",
    "subscriptionMode",
    "subscriptionInitialPosition",
    "readerName",
    "startMessageId",
];

/// Overridable producer settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ProducerOptions {
    /// `None` disables the client-side send timeout.
    pub send_timeout: Option<Duration>,
    pub batching_enabled: bool,
    pub producer_name: Option<String>,
    /// Override keys this layer does not interpret, forwarded to the broker client.
    pub properties: Properties,
}

impl ProducerOptions {
    pub fn defaults() -> Self {
        Self {
            send_timeout: Some(DEFAULT_SEND_TIMEOUT),
            batching_enabled: true,
            producer_name: None,
            properties: Properties::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: &Properties) -> Result<Self> {
        for (key, value) in overrides {
            match key.as_str() {
                "sendTimeoutMs" => {
                    let millis = parse_u64(key, value)?;
                    self.send_timeout = (millis > 0).then(|| Duration::from_millis(millis));
                }
                "batchingEnabled" => self.batching_enabled = parse_bool(value),
                "producerName" => self.producer_name = value_to_string(value),
                reserved if PRODUCER_RESERVED_KEYS.contains(&reserved) => {
                    drop_reserved_key("producerConfig", reserved)
                }
                _ => {
                    self.properties.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(self)
    }
}

/// Overridable consumer and reader settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumerOptions {
    pub negative_ack_redelivery_delay: Duration,
    pub receiver_queue_size: u32,
    pub consumer_name: Option<String>,
    pub properties: Properties,
}

impl ConsumerOptions {
    pub fn defaults() -> Self {
        Self {
            negative_ack_redelivery_delay: DEFAULT_NEGATIVE_ACK_REDELIVERY_DELAY,
            receiver_queue_size: DEFAULT_RECEIVER_QUEUE_SIZE,
            consumer_name: None,
            properties: Properties::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: &Properties) -> Result<Self> {
        for (key, value) in overrides {
            match key.as_str() {
                "negativeAckRedeliveryDelayMicros" => {
                    self.negative_ack_redelivery_delay =
                        Duration::from_micros(parse_u64(key, value)?);
                }
                "receiverQueueSize" => {
                    let size = parse_u64(key, value)?;
                    self.receiver_queue_size = u32::try_from(size).map_err(|_| {
                        Error::config(key, format!("{size} does not fit a queue size"))
                    })?;
                }
                "consumerName" => self.consumer_name = value_to_string(value),
                reserved if CONSUMER_RESERVED_KEYS.contains(&reserved) => {
                    drop_reserved_key("consumerConfig", reserved)
                }
                _ => {
                    self.properties.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(self)
    }
}

fn drop_reserved_key(section: &str, key: &str) {
    warn!(
        event = events::CONFIG_RESERVED_KEY_DROPPED,
        component = COMPONENT,
        section,
        key,
        "ignoring override of a setting derived from the destination"
    );
}

/// Everything a broker client needs to open a producer.
#[derive(Clone, Debug, PartialEq)]
pub struct ProducerConfig {
    pub topic: String,
    pub transactional: bool,
    pub options: ProducerOptions,
}

impl ProducerConfig {
    pub fn new(topic: &str, transactional: bool, options: ProducerOptions) -> Self {
        let mut options = options;
        if transactional {
            // transactional sends cannot carry a client-side timeout
            options.send_timeout = None;
        }
        Self {
            topic: topic.to_string(),
            transactional,
            options,
        }
    }
}

/// Everything a broker client needs to subscribe a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumerConfig {
    pub topic: String,
    pub subscription_name: String,
    pub subscription_mode: SubscriptionMode,
    pub subscription_type: SubscriptionType,
    pub initial_position: InitialPosition,
    pub options: ConsumerOptions,
}

/// Everything a broker client needs to open a reader.
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderConfig {
    pub topic: String,
    pub reader_name: String,
    pub start: MessagePosition,
    pub start_inclusive: bool,
    pub options: ConsumerOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: serde_json::Value) -> Properties {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn producer_overrides_layer_over_defaults() {
        let options = ProducerOptions::defaults()
            .with_overrides(&overrides(json!({
                "sendTimeoutMs": "5000",
                "batchingEnabled": false,
                "compressionType": "LZ4"
            })))
            .expect("valid overrides");

        assert_eq!(options.send_timeout, Some(Duration::from_millis(5000)));
        assert!(!options.batching_enabled);
        assert_eq!(options.properties["compressionType"], json!("LZ4"));
    }

    #[test]
    fn transactional_producer_always_disables_send_timeout() {
        let options = ProducerOptions::defaults()
            .with_overrides(&overrides(json!({"sendTimeoutMs": 5000})))
            .expect("valid overrides");

        let plain = ProducerConfig::new("persistent://public/default/t", false, options.clone());
        let transactional = ProducerConfig::new("persistent://public/default/t", true, options);

        assert_eq!(plain.options.send_timeout, Some(Duration::from_millis(5000)));
        assert_eq!(transactional.options.send_timeout, None);
    }

    #[test]
    fn reserved_consumer_keys_never_reach_the_broker() {
        let options = ConsumerOptions::defaults()
            .with_overrides(&overrides(json!({
                "subscriptionName": "hijack",
                "subscriptionType": "Exclusive",
                "topicNames": ["other"],
                "receiverQueueSize": 5,
                "ackTimeoutMillis": 100
            })))
            .expect("valid overrides");

        assert_eq!(options.receiver_queue_size, 5);
        assert_eq!(
            options.negative_ack_redelivery_delay,
            DEFAULT_NEGATIVE_ACK_REDELIVERY_DELAY
        );
        assert!(!options.properties.contains_key("subscriptionName"));
        assert!(!options.properties.contains_key("subscriptionType"));
        assert!(!options.properties.contains_key("topicNames"));
        assert!(options.properties.contains_key("ackTimeoutMillis"));
    }

    #[test]
    fn negative_ack_delay_is_overridable() {
        let options = ConsumerOptions::defaults()
            .with_overrides(&overrides(json!({"negativeAckRedeliveryDelayMicros": 250})))
            .expect("valid overrides");
        assert_eq!(
            options.negative_ack_redelivery_delay,
            Duration::from_micros(250)
        );
    }

    #[test]
    fn malformed_numeric_override_is_a_config_error() {
        let err = ConsumerOptions::defaults()
            .with_overrides(&overrides(json!({"receiverQueueSize": "lots"})))
            .expect_err("must fail");
        assert!(matches!(err, Error::Config { .. }));
    }
}
