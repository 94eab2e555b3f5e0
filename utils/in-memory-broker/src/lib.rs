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

//! In-process, log-structured broker implementing the `pulsar_jms::broker` traits.
//!
//! Every topic is an append-only log. Subscriptions are durable cursors over it: an
//! acknowledged set plus a delivery position, so consumers attached to the same
//! subscription compete for messages and distinct subscriptions each see every message.
//! Readers walk the log independently of any subscription.
//!
//! Intended for tests and demos: it can be scripted to reject the first admin calls as
//! unavailable and it exposes counters for connections and producers.
//!
//! ```
//! use in_memory_broker::InMemoryBroker;
//! use pulsar_jms::broker::{BrokerConnector, MessagePosition, OutgoingMessage};
//! use pulsar_jms::config::{Properties, ProducerConfig, ProducerOptions, ResolvedConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let broker = InMemoryBroker::new();
//! let resolved = ResolvedConfig::resolve(&mut Properties::new()).unwrap();
//! let admin = broker.connect_admin(&resolved.admin).await.unwrap();
//! let client = broker.connect_client(&resolved.client).await.unwrap();
//!
//! let topic = "persistent://public/default/orders";
//! admin
//!     .create_subscription(topic, "jms-queue", MessagePosition::Earliest)
//!     .await
//!     .unwrap();
//! let producer = client
//!     .create_producer(ProducerConfig::new(topic, false, ProducerOptions::defaults()))
//!     .await
//!     .unwrap();
//! producer.send(OutgoingMessage::new("hello")).await.unwrap();
//!
//! assert_eq!(broker.backlog(topic, "jms-queue"), Some(1));
//! assert_eq!(broker.producers_created(), 1);
//! # }
//! ```

mod handles;
mod state;

use async_trait::async_trait;
use handles::{MemoryAdmin, MemoryClient};
use pulsar_jms::broker::{BrokerAdmin, BrokerClient, BrokerConnector, BrokerResult};
use pulsar_jms::config::{AdminSettings, ClientSettings};
use state::BrokerState;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

const COMPONENT: &str = "in_memory_broker";

#[derive(Default)]
pub(crate) struct BrokerCore {
    state: Mutex<BrokerState>,
    /// Woken whenever a waiting consumer or reader may have something new to look at.
    appended: Notify,
}

impl BrokerCore {
    pub(crate) fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to one in-process broker. Clones share the same topics.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    core: Arc<BrokerCore>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `calls` admin operations fail with `Unavailable`, as a broker does while
    /// its namespaces are still being loaded.
    pub fn fail_next_admin_calls(&self, calls: usize) {
        self.core.state().admin_failures = calls;
    }

    pub fn producers_created(&self) -> usize {
        self.core.state().producers_created
    }

    /// Admin plus data-plane connections opened so far.
    pub fn connects(&self) -> usize {
        self.core.state().connects
    }

    pub fn topics(&self) -> Vec<String> {
        self.core.state().topic_names()
    }

    /// Subscription names of `topic`; empty when the topic does not exist.
    pub fn subscriptions(&self, topic: &str) -> Vec<String> {
        self.core.state().subscriptions_of(topic).unwrap_or_default()
    }

    /// Unacknowledged messages of a subscription, `None` when it does not exist.
    pub fn backlog(&self, topic: &str, subscription: &str) -> Option<usize> {
        self.core.state().backlog(topic, subscription)
    }
}

#[async_trait]
impl BrokerConnector for InMemoryBroker {
    async fn connect_admin(&self, settings: &AdminSettings) -> BrokerResult<Arc<dyn BrokerAdmin>> {
        self.core.state().connects += 1;
        debug!(
            component = COMPONENT,
            url = %settings.service_http_url,
            "admin client connected"
        );
        Ok(Arc::new(MemoryAdmin::new(self.core.clone())))
    }

    async fn connect_client(
        &self,
        settings: &ClientSettings,
    ) -> BrokerResult<Arc<dyn BrokerClient>> {
        self.core.state().connects += 1;
        debug!(
            component = COMPONENT,
            url = %settings.service_url,
            "client connected"
        );
        Ok(Arc::new(MemoryClient::new(self.core.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryBroker;
    use pulsar_jms::broker::{
        BrokerAdmin, BrokerClient, BrokerConnector, BrokerErrorKind, InitialPosition, Message,
        MessagePosition, OutgoingMessage, SubscriptionMode, SubscriptionType,
    };
    use pulsar_jms::config::{
        ConsumerConfig, ConsumerOptions, ProducerConfig, ProducerOptions, Properties,
        ReaderConfig, ResolvedConfig,
    };
    use std::sync::Arc;
    use std::time::Duration;

    const TOPIC: &str = "persistent://public/default/orders";

    async fn connect(broker: &InMemoryBroker) -> (Arc<dyn BrokerAdmin>, Arc<dyn BrokerClient>) {
        let resolved = ResolvedConfig::resolve(&mut Properties::new()).expect("defaults");
        let admin = broker.connect_admin(&resolved.admin).await.expect("admin");
        let client = broker
            .connect_client(&resolved.client)
            .await
            .expect("client");
        (admin, client)
    }

    fn consumer_config(subscription: &str, options: ConsumerOptions) -> ConsumerConfig {
        ConsumerConfig {
            topic: TOPIC.to_string(),
            subscription_name: subscription.to_string(),
            subscription_mode: SubscriptionMode::Durable,
            subscription_type: SubscriptionType::Shared,
            initial_position: InitialPosition::Earliest,
            options,
        }
    }

    fn producer_config() -> ProducerConfig {
        ProducerConfig::new(TOPIC, false, ProducerOptions::defaults())
    }

    #[tokio::test]
    async fn receive_wakes_up_when_a_message_is_appended() {
        let broker = InMemoryBroker::new();
        let (_, client) = connect(&broker).await;
        let consumer = client
            .subscribe(consumer_config("jms-queue", ConsumerOptions::defaults()))
            .await
            .expect("consumer");
        let producer = client
            .create_producer(producer_config())
            .await
            .expect("producer");

        let waiting = tokio::spawn({
            let consumer = consumer.clone();
            async move { consumer.receive(Duration::from_secs(5)).await }
        });
        tokio::task::yield_now().await;
        producer
            .send(OutgoingMessage::new("late"))
            .await
            .expect("send");

        let message = waiting.await.expect("join").expect("receive");
        assert_eq!(message.map(|m| m.payload), Some(b"late".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn negative_acknowledgement_redelivers_after_the_delay() {
        let broker = InMemoryBroker::new();
        let (_, client) = connect(&broker).await;
        let mut options = ConsumerOptions::defaults();
        options.negative_ack_redelivery_delay = Duration::from_millis(500);
        let consumer = client
            .subscribe(consumer_config("jms-queue", options))
            .await
            .expect("consumer");
        let producer = client
            .create_producer(producer_config())
            .await
            .expect("producer");
        producer
            .send(OutgoingMessage::new("retry-me"))
            .await
            .expect("send");

        let first = consumer
            .receive(Duration::from_secs(1))
            .await
            .expect("receive")
            .expect("message");
        consumer
            .negative_acknowledge(&first.id)
            .await
            .expect("nack");
        assert!(consumer
            .receive(Duration::from_millis(100))
            .await
            .expect("receive")
            .is_none());

        let again = consumer
            .receive(Duration::from_secs(1))
            .await
            .expect("receive")
            .expect("redelivered");
        assert_eq!(again.id, first.id);
        consumer.acknowledge(&again.id).await.expect("ack");
        assert_eq!(broker.backlog(TOPIC, "jms-queue"), Some(0));
    }

    #[tokio::test]
    async fn readers_walk_the_log_independently() {
        let broker = InMemoryBroker::new();
        let (_, client) = connect(&broker).await;
        let producer = client
            .create_producer(producer_config())
            .await
            .expect("producer");
        let first = producer.send(OutgoingMessage::new("a")).await.expect("a");
        producer.send(OutgoingMessage::new("b")).await.expect("b");

        let reader = |start, start_inclusive| ReaderConfig {
            topic: TOPIC.to_string(),
            reader_name: "browser".to_string(),
            start,
            start_inclusive,
            options: ConsumerOptions::defaults(),
        };
        let inclusive = client
            .create_reader(reader(MessagePosition::At(first), true))
            .await
            .expect("inclusive");
        let exclusive = client
            .create_reader(reader(MessagePosition::At(first), false))
            .await
            .expect("exclusive");
        let tail = client
            .create_reader(reader(MessagePosition::Latest, true))
            .await
            .expect("tail");

        let short = Duration::from_millis(10);
        let payload = |message: Option<Message>| message.map(|m| m.payload);
        let from_first = inclusive.read_next(short).await.expect("read");
        let after_first = exclusive.read_next(short).await.expect("read");
        let at_tail = tail.read_next(short).await.expect("read");
        assert_eq!(payload(from_first), Some(b"a".to_vec()));
        assert_eq!(payload(after_first), Some(b"b".to_vec()));
        assert_eq!(payload(at_tail), None);
    }

    #[tokio::test]
    async fn scripted_admin_failures_run_out() {
        let broker = InMemoryBroker::new();
        let (admin, _) = connect(&broker).await;
        broker.fail_next_admin_calls(2);

        for _ in 0..2 {
            let err = admin
                .create_subscription(TOPIC, "jms-queue", MessagePosition::Earliest)
                .await
                .expect_err("unavailable");
            assert_eq!(err.kind, BrokerErrorKind::Unavailable);
        }
        admin
            .create_subscription(TOPIC, "jms-queue", MessagePosition::Earliest)
            .await
            .expect("available");
        let again = admin
            .create_subscription(TOPIC, "jms-queue", MessagePosition::Earliest)
            .await
            .expect_err("exists");
        assert!(again.is_conflict());
        assert_eq!(broker.connects(), 2);
    }

    #[tokio::test]
    async fn forced_topic_deletion_disconnects_consumers() {
        let broker = InMemoryBroker::new();
        let (admin, client) = connect(&broker).await;
        let consumer = client
            .subscribe(consumer_config("jms-queue", ConsumerOptions::defaults()))
            .await
            .expect("consumer");

        let refused = admin.delete_topic(TOPIC, false).await.expect_err("in use");
        assert_eq!(refused.kind, BrokerErrorKind::Other);

        admin.delete_topic(TOPIC, true).await.expect("forced");
        assert!(broker.topics().is_empty());
        let err = consumer
            .receive(Duration::from_millis(10))
            .await
            .expect_err("disconnected");
        assert_eq!(err.kind, BrokerErrorKind::Closed);
    }
}
