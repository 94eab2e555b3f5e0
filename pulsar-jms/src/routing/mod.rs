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

//! Routing layer.
//!
//! Owns the destination model and the pure mapping from a destination kind to the
//! subscription semantics the broker must be asked for.
//!
//! ```
//! use pulsar_jms::broker::{InitialPosition, SubscriptionMode, SubscriptionType};
//! use pulsar_jms::routing::{Destination, SubscriptionPolicy};
//!
//! let queue = Destination::queue("orders");
//! let policy = SubscriptionPolicy::for_consumer(
//!     &queue,
//!     "ignored-for-queues",
//!     "jms-queue",
//!     SubscriptionMode::Durable,
//!     SubscriptionType::Shared,
//! )
//! .unwrap();
//! assert_eq!(policy.subscription_name, "jms-queue");
//! assert_eq!(policy.initial_position, InitialPosition::Earliest);
//!
//! // Exclusive consumers on a queue would break competing-consumer delivery.
//! assert!(SubscriptionPolicy::for_consumer(
//!     &queue,
//!     "c",
//!     "jms-queue",
//!     SubscriptionMode::Durable,
//!     SubscriptionType::Exclusive,
//! )
//! .is_err());
//! ```

mod destination;
mod subscription_policy;

pub use destination::{Destination, DestinationKind};
pub use subscription_policy::SubscriptionPolicy;
