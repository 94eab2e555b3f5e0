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

//! Destination kind to subscription semantics.

use crate::broker::{InitialPosition, SubscriptionMode, SubscriptionType};
use crate::error::{Error, Result};
use crate::routing::destination::Destination;

/// Broker-side subscription settings a consumer of a destination must use.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriptionPolicy {
    pub subscription_name: String,
    pub initial_position: InitialPosition,
    pub mode: SubscriptionMode,
    pub subscription_type: SubscriptionType,
}

impl SubscriptionPolicy {
    /// Subscription name: the shared queue subscription for queues, the consumer's own
    /// name for topics.
    pub fn subscription_name<'a>(
        destination: &Destination,
        consumer_name: &'a str,
        queue_subscription_name: &'a str,
    ) -> &'a str {
        if destination.is_queue() {
            queue_subscription_name
        } else {
            consumer_name
        }
    }

    /// Queues start at the earliest message so nothing enqueued before the first
    /// consumer is lost; topics only see what is published after subscribing.
    pub fn initial_position(destination: &Destination) -> InitialPosition {
        if destination.is_topic() {
            InitialPosition::Latest
        } else {
            InitialPosition::Earliest
        }
    }

    /// Validates the requested mode/type and derives the full policy.
    ///
    /// Queues accept only `Durable` + `Shared`; anything else is rejected before any
    /// network call.
    pub fn for_consumer(
        destination: &Destination,
        consumer_name: &str,
        queue_subscription_name: &str,
        mode: SubscriptionMode,
        subscription_type: SubscriptionType,
    ) -> Result<Self> {
        if destination.is_queue() {
            if mode != SubscriptionMode::Durable {
                return Err(Error::illegal_state("only durable mode for queues"));
            }
            if subscription_type != SubscriptionType::Shared {
                return Err(Error::illegal_state(
                    "only Shared SubscriptionType for queues",
                ));
            }
        }

        Ok(Self {
            subscription_name: Self::subscription_name(
                destination,
                consumer_name,
                queue_subscription_name,
            )
            .to_string(),
            initial_position: Self::initial_position(destination),
            mode,
            subscription_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionPolicy;
    use crate::broker::{InitialPosition, SubscriptionMode, SubscriptionType};
    use crate::error::Error;
    use crate::routing::Destination;

    #[test]
    fn queue_consumers_share_the_queue_subscription_from_earliest() {
        let policy = SubscriptionPolicy::for_consumer(
            &Destination::queue("orders"),
            "consumer-a",
            "jms-queue",
            SubscriptionMode::Durable,
            SubscriptionType::Shared,
        )
        .expect("valid queue policy");

        assert_eq!(policy.subscription_name, "jms-queue");
        assert_eq!(policy.initial_position, InitialPosition::Earliest);
    }

    #[test]
    fn topic_consumers_get_their_own_subscription_from_latest() {
        for subscription_type in [SubscriptionType::Exclusive, SubscriptionType::Shared] {
            let policy = SubscriptionPolicy::for_consumer(
                &Destination::topic("prices"),
                "consumer-a",
                "jms-queue",
                SubscriptionMode::NonDurable,
                subscription_type,
            )
            .expect("any topic policy is valid");

            assert_eq!(policy.subscription_name, "consumer-a");
            assert_eq!(policy.initial_position, InitialPosition::Latest);
            assert_eq!(policy.subscription_type, subscription_type);
        }
    }

    #[test]
    fn queue_rejects_non_durable_mode() {
        let err = SubscriptionPolicy::for_consumer(
            &Destination::queue("orders"),
            "c",
            "jms-queue",
            SubscriptionMode::NonDurable,
            SubscriptionType::Shared,
        )
        .expect_err("non durable queue subscription");
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn queue_rejects_non_shared_type() {
        for subscription_type in [
            SubscriptionType::Exclusive,
            SubscriptionType::Failover,
            SubscriptionType::KeyShared,
        ] {
            assert!(matches!(
                SubscriptionPolicy::for_consumer(
                    &Destination::queue("orders"),
                    "c",
                    "jms-queue",
                    SubscriptionMode::Durable,
                    subscription_type,
                ),
                Err(Error::IllegalState(_))
            ));
        }
    }
}
