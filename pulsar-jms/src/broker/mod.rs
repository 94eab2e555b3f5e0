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

//! Broker boundary layer.
//!
//! Everything this crate needs from the underlying log-structured broker is expressed
//! through the traits below. Implementations own the wire protocol; this crate only
//! decides *which* topics, subscriptions and cursors to ask for.
//!
//! Handles are shared as `Arc<dyn Trait>` and compared by pointer identity when they are
//! tracked for teardown.

mod error;
mod types;

pub use error::{BrokerError, BrokerErrorKind};
pub use types::{
    InitialPosition, Message, MessageId, MessagePosition, OutgoingMessage, SessionMode,
    SubscriptionMode, SubscriptionType,
};

use crate::config::{
    AdminSettings, ClientSettings, ConsumerConfig, ProducerConfig, ReaderConfig,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Builds the two network handles from resolved settings.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect_admin(&self, settings: &AdminSettings) -> BrokerResult<Arc<dyn BrokerAdmin>>;

    async fn connect_client(
        &self,
        settings: &ClientSettings,
    ) -> BrokerResult<Arc<dyn BrokerClient>>;
}

/// Control-plane operations.
#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    /// Fails with [`BrokerErrorKind::Conflict`] when the subscription already exists.
    async fn create_subscription(
        &self,
        topic: &str,
        subscription: &str,
        position: MessagePosition,
    ) -> BrokerResult<()>;

    async fn delete_subscription(
        &self,
        topic: &str,
        subscription: &str,
        force: bool,
    ) -> BrokerResult<()>;

    async fn list_topics(&self, namespace: &str) -> BrokerResult<Vec<String>>;

    async fn list_subscriptions(&self, topic: &str) -> BrokerResult<Vec<String>>;

    /// Returns up to `count` of the oldest unacknowledged messages without consuming them.
    async fn peek_messages(
        &self,
        topic: &str,
        subscription: &str,
        count: usize,
    ) -> BrokerResult<Vec<Message>>;

    async fn delete_topic(&self, topic: &str, force: bool) -> BrokerResult<()>;

    async fn close(&self) -> BrokerResult<()>;
}

/// Data-plane operations.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn create_producer(&self, config: ProducerConfig) -> BrokerResult<Arc<dyn Producer>>;

    async fn subscribe(&self, config: ConsumerConfig) -> BrokerResult<Arc<dyn Consumer>>;

    async fn create_reader(&self, config: ReaderConfig) -> BrokerResult<Arc<dyn Reader>>;

    async fn close(&self) -> BrokerResult<()>;
}

#[async_trait]
pub trait Producer: Send + Sync {
    fn topic(&self) -> &str;

    async fn send(&self, message: OutgoingMessage) -> BrokerResult<MessageId>;

    async fn close(&self) -> BrokerResult<()>;
}

#[async_trait]
pub trait Consumer: Send + Sync {
    fn topic(&self) -> &str;

    fn subscription(&self) -> &str;

    /// Waits up to `timeout` for the next message; `None` when nothing arrived.
    async fn receive(&self, timeout: Duration) -> BrokerResult<Option<Message>>;

    async fn acknowledge(&self, id: &MessageId) -> BrokerResult<()>;

    async fn negative_acknowledge(&self, id: &MessageId) -> BrokerResult<()>;

    async fn close(&self) -> BrokerResult<()>;
}

#[async_trait]
pub trait Reader: Send + Sync {
    fn topic(&self) -> &str;

    async fn read_next(&self, timeout: Duration) -> BrokerResult<Option<Message>>;

    async fn close(&self) -> BrokerResult<()>;
}
