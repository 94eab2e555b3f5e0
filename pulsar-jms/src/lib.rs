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

//! # pulsar-jms
//!
//! `pulsar-jms` maps JMS-style messaging concepts (connections, queues, topics, durable
//! subscriptions, queue browsers) onto a log-structured pub/sub broker and manages the
//! lifecycle of the broker handles behind them.
//!
//! Typical usage is API-first and stays centered on [`ConnectionFactory`] and
//! [`Connection`]. The broker itself is reached through the traits in [`broker`], so any
//! client implementation can be plugged in through a [`broker::BrokerConnector`].
//!
//! ## Queue round trip
//!
//! ```
//! use in_memory_broker::InMemoryBroker;
//! use pulsar_jms::broker::{OutgoingMessage, SessionMode, SubscriptionMode, SubscriptionType};
//! use pulsar_jms::{ConnectionFactory, Destination};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let properties = json!({"jms.queueName": "orders-workers"})
//!     .as_object()
//!     .cloned()
//!     .unwrap();
//! let factory = Arc::new(ConnectionFactory::new(
//!     properties,
//!     Arc::new(InMemoryBroker::new()),
//! ));
//! let connection = factory.create_connection().await.unwrap();
//!
//! let queue = Destination::queue("orders");
//! let consumer = connection
//!     .create_consumer(
//!         &queue,
//!         "worker",
//!         SessionMode::AutoAcknowledge,
//!         SubscriptionMode::Durable,
//!         SubscriptionType::Shared,
//!     )
//!     .await
//!     .unwrap();
//! let producer = connection.producer(&queue, false).await.unwrap();
//! producer.send(OutgoingMessage::new("hello")).await.unwrap();
//!
//! let message = consumer
//!     .receive(Duration::from_secs(1))
//!     .await
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(message.payload, b"hello");
//! consumer.acknowledge(&message.id).await.unwrap();
//!
//! factory.close().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: `ConnectionFactory`/`Connection` surface
//! - Configuration: property bag resolution and layered producer/consumer options
//! - Routing: destination naming and per-kind subscription policy
//! - Control plane: client handle lifecycle, subscription provisioning and deletion,
//!   client id registry
//! - Data plane: producer pool, consumer/browser construction, live handle tracking
//! - Runtime: clock and sleep used by the bounded startup retry
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber. Binaries and
//! tests are responsible for one-time `tracing_subscriber` initialization at process
//! boundaries.

mod api;
pub use api::{Connection, ConnectionFactory};

pub mod broker;
pub mod config;

mod control_plane;
pub use control_plane::ClientIdRegistry;

mod data_plane;
pub use data_plane::ProducerKey;

mod error;
pub use error::{Error, ErrorCode, Result};

#[doc(hidden)]
pub mod observability;

pub mod routing;
pub use routing::{Destination, DestinationKind};

pub mod runtime;

#[cfg(test)]
mod testing;
