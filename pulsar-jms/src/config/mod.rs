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

//! Configuration layer.
//!
//! Splits the flat property bag into typed settings consumed here, the producer and
//! consumer override maps, and the residual map handed unmodified to the data-plane
//! client builder.
//!
//! ```
//! use pulsar_jms::config::{Properties, ResolvedConfig};
//! use serde_json::json;
//!
//! let mut bag: Properties = json!({
//!     "webServiceUrl": "http://localhost:8080",
//!     "jms.queueName": "orders",
//!     "operationTimeoutMs": 3000
//! })
//! .as_object()
//! .cloned()
//! .unwrap();
//!
//! let resolved = ResolvedConfig::resolve(&mut bag).unwrap();
//! assert_eq!(resolved.queue_subscription_name, "orders");
//! assert!(bag.contains_key("operationTimeoutMs"));
//! assert!(!bag.contains_key("jms.queueName"));
//! ```

mod layered;
mod resolver;

pub use layered::{
    ConsumerConfig, ConsumerOptions, ProducerConfig, ProducerOptions, ReaderConfig,
    DEFAULT_NEGATIVE_ACK_REDELIVERY_DELAY, DEFAULT_RECEIVER_QUEUE_SIZE, DEFAULT_SEND_TIMEOUT,
};
pub use resolver::*;
