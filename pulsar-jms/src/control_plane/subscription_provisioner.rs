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

//! Idempotent provisioning of broker-side durable subscriptions.

use crate::broker::{BrokerAdmin, BrokerErrorKind, MessagePosition};
use crate::error::{Error, Result};
use crate::observability::events;
use crate::runtime::RetryClock;
use std::time::Duration;
use tracing::{debug, info, warn};

const COMPONENT: &str = "subscription_provisioner";

pub(crate) const STARTUP_RETRY_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) struct SubscriptionProvisioner<'a> {
    admin: &'a dyn BrokerAdmin,
    clock: &'a dyn RetryClock,
}

impl<'a> SubscriptionProvisioner<'a> {
    pub(crate) fn new(admin: &'a dyn BrokerAdmin, clock: &'a dyn RetryClock) -> Self {
        Self { admin, clock }
    }

    /// Creates the shared queue subscription at the earliest position.
    ///
    /// An existing subscription counts as success. Any other failure is retried every
    /// [`STARTUP_RETRY_INTERVAL`] until `startup_timeout` elapsed, so applications can
    /// start while the broker or namespace is still coming up.
    pub(crate) async fn ensure_queue_subscription(
        &self,
        topic: &str,
        subscription: &str,
        startup_timeout: Duration,
    ) -> Result<()> {
        let start = self.clock.now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self
                .admin
                .create_subscription(topic, subscription, MessagePosition::Earliest)
                .await
            {
                Ok(()) => {
                    info!(
                        event = events::SUBSCRIPTION_CREATED,
                        component = COMPONENT,
                        topic,
                        subscription,
                        attempt,
                        "created queue subscription"
                    );
                    return Ok(());
                }
                Err(err) if err.is_conflict() => {
                    debug!(
                        event = events::SUBSCRIPTION_ALREADY_EXISTS,
                        component = COMPONENT,
                        topic,
                        subscription,
                        "queue subscription already exists"
                    );
                    return Ok(());
                }
                Err(err) if err.kind == BrokerErrorKind::Unauthorized => return Err(err.into()),
                Err(err) => err,
            };

            let waited = self.clock.now().saturating_duration_since(start);
            if waited > startup_timeout {
                warn!(
                    event = events::SUBSCRIPTION_RETRY_EXHAUSTED,
                    component = COMPONENT,
                    topic,
                    subscription,
                    attempt,
                    waited_ms = waited.as_millis() as u64,
                    err = %err,
                    "giving up on queue subscription"
                );
                return Err(Error::StartupTimeout {
                    destination: topic.to_string(),
                    waited_ms: waited.as_millis() as u64,
                    last_error: err,
                });
            }

            info!(
                event = events::SUBSCRIPTION_RETRY,
                component = COMPONENT,
                topic,
                subscription,
                attempt,
                err = %err,
                "queue subscription not created yet, broker may still be starting"
            );
            if self.clock.sleep(STARTUP_RETRY_INTERVAL).await.is_err() {
                warn!(
                    event = events::SUBSCRIPTION_RETRY_INTERRUPTED,
                    component = COMPONENT,
                    topic,
                    subscription,
                    "interrupted while waiting for the broker"
                );
                return Err(Error::Interrupted { last_error: err });
            }
        }
    }

    /// Creates a subscription at the latest position; an existing one is fine.
    pub(crate) async fn ensure_subscription(&self, topic: &str, subscription: &str) -> Result<()> {
        info!(
            event = events::SUBSCRIPTION_CREATED,
            component = COMPONENT,
            topic,
            subscription,
            "creating subscription"
        );
        match self
            .admin
            .create_subscription(topic, subscription, MessagePosition::Latest)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_conflict() => {
                info!(
                    event = events::SUBSCRIPTION_ALREADY_EXISTS,
                    component = COMPONENT,
                    topic,
                    subscription,
                    "subscription already exists, this is usually not a problem"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
