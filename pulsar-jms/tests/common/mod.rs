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

#![allow(dead_code)]

use in_memory_broker::InMemoryBroker;
use pulsar_jms::broker::{Consumer, SessionMode, SubscriptionMode, SubscriptionType};
use pulsar_jms::{ClientIdRegistry, Connection, ConnectionFactory, Destination};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const NAMESPACE: &str = "public/default";
pub const QUEUE_SUBSCRIPTION: &str = "jms-queue";
pub const SHORT_WAIT: Duration = Duration::from_millis(50);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A factory over `broker` with its own client id registry.
pub fn factory(broker: &InMemoryBroker, properties: Value) -> Arc<ConnectionFactory> {
    init_tracing();
    let properties = properties
        .as_object()
        .cloned()
        .expect("properties must be a JSON object");
    Arc::new(
        ConnectionFactory::new(properties, Arc::new(broker.clone()))
            .with_client_id_registry(Arc::new(ClientIdRegistry::new())),
    )
}

pub fn topic_of(destination: &Destination) -> String {
    destination.topic_name(NAMESPACE)
}

pub async fn queue_consumer(connection: &Connection, queue: &Destination) -> Arc<dyn Consumer> {
    connection
        .create_consumer(
            queue,
            "worker",
            SessionMode::AutoAcknowledge,
            SubscriptionMode::Durable,
            SubscriptionType::Shared,
        )
        .await
        .expect("queue consumer")
}

pub async fn topic_consumer(
    connection: &Connection,
    topic: &Destination,
    name: &str,
) -> Arc<dyn Consumer> {
    connection
        .create_consumer(
            topic,
            name,
            SessionMode::AutoAcknowledge,
            SubscriptionMode::Durable,
            SubscriptionType::Shared,
        )
        .await
        .expect("topic consumer")
}

/// Receives until the consumer stays idle for [`SHORT_WAIT`], acknowledging everything.
pub async fn drain(consumer: &Arc<dyn Consumer>) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(message) = consumer.receive(SHORT_WAIT).await.expect("receive") {
        consumer.acknowledge(&message.id).await.expect("acknowledge");
        payloads.push(String::from_utf8(message.payload).expect("utf-8 payload"));
    }
    payloads
}
