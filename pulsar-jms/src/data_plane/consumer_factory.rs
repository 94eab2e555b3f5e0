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

//! Opens consumers and queue browsers and tracks them until they are closed.

use super::live_handles::LiveSet;
use crate::broker::{
    BrokerError, Consumer, MessagePosition, Reader, SessionMode, SubscriptionMode,
    SubscriptionType,
};
use crate::config::{ConsumerConfig, ReaderConfig};
use crate::control_plane::{InitializedState, SubscriptionProvisioner};
use crate::error::{Error, Result};
use crate::observability::{events, fields};
use crate::routing::{Destination, SubscriptionPolicy};
use crate::runtime::RetryClock;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "consumer_factory";

pub(crate) const BROWSER_NAME_PREFIX: &str = "jms-queue-browser-";

#[derive(Default)]
pub(crate) struct ConsumerFactory {
    consumers: LiveSet<dyn Consumer>,
    readers: LiveSet<dyn Reader>,
}

impl ConsumerFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Validates the subscription policy, provisions the subscription, then subscribes.
    ///
    /// Override maps can tune the consumer, but topic, subscription name, mode, type and
    /// initial position always come from the destination.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn create_consumer(
        &self,
        state: &InitializedState,
        clock: &dyn RetryClock,
        destination: &Destination,
        consumer_name: &str,
        session_mode: SessionMode,
        subscription_mode: SubscriptionMode,
        subscription_type: SubscriptionType,
    ) -> Result<Arc<dyn Consumer>> {
        let config = &state.config;
        let policy = SubscriptionPolicy::for_consumer(
            destination,
            consumer_name,
            &config.queue_subscription_name,
            subscription_mode,
            subscription_type,
        )
        .map_err(|err| {
            warn!(
                event = events::CONSUMER_POLICY_REJECTED,
                component = COMPONENT,
                destination = %fields::format_destination(destination),
                mode = ?subscription_mode,
                subscription_type = ?subscription_type,
                err = %err,
                "rejected consumer"
            );
            err
        })?;

        let topic = destination.topic_name(&config.system_namespace);
        debug!(
            component = COMPONENT,
            topic = %topic,
            consumer_name,
            session_mode = ?session_mode,
            mode = ?subscription_mode,
            subscription_type = ?subscription_type,
            "creating consumer"
        );

        let provisioner = SubscriptionProvisioner::new(state.handles.admin.as_ref(), clock);
        if destination.is_queue() {
            provisioner
                .ensure_queue_subscription(
                    &topic,
                    &policy.subscription_name,
                    config.wait_for_server_startup_timeout,
                )
                .await?;
        } else if subscription_mode == SubscriptionMode::Durable {
            provisioner
                .ensure_subscription(&topic, &policy.subscription_name)
                .await?;
        }

        let consumer = state
            .handles
            .client
            .subscribe(ConsumerConfig {
                topic: topic.clone(),
                subscription_name: policy.subscription_name.clone(),
                subscription_mode: policy.mode,
                subscription_type: policy.subscription_type,
                initial_position: policy.initial_position,
                options: state.consumer_options.clone(),
            })
            .await?;
        self.consumers.insert(consumer.clone());
        info!(
            event = events::CONSUMER_CREATED,
            component = COMPONENT,
            topic = %topic,
            subscription = %policy.subscription_name,
            live_consumers = self.consumers.len(),
            "created consumer"
        );
        Ok(consumer)
    }

    /// Opens a reader positioned on the oldest message still pending on the queue
    /// subscription, or at the tail when nothing is pending.
    pub(crate) async fn create_browser_reader(
        &self,
        state: &InitializedState,
        destination: &Destination,
    ) -> Result<Arc<dyn Reader>> {
        if !destination.is_queue() {
            return Err(Error::illegal_state("browsers are only supported on queues"));
        }
        let config = &state.config;
        let topic = destination.topic_name(&config.system_namespace);
        let pending = state
            .handles
            .admin
            .peek_messages(&topic, &config.queue_subscription_name, 1)
            .await?;
        let start = pending
            .first()
            .map(|message| MessagePosition::At(message.id))
            .unwrap_or(MessagePosition::Latest);

        let reader_name = format!("{BROWSER_NAME_PREFIX}{}", Uuid::new_v4());
        info!(
            event = events::BROWSER_CREATED,
            component = COMPONENT,
            topic = %topic,
            start = %start,
            reader_name = %reader_name,
            "creating queue browser"
        );
        let reader = state
            .handles
            .client
            .create_reader(ReaderConfig {
                topic,
                reader_name,
                start,
                start_inclusive: true,
                options: state.consumer_options.clone(),
            })
            .await?;
        self.readers.insert(reader.clone());
        Ok(reader)
    }

    /// No-op when the consumer is not tracked anymore.
    pub(crate) fn remove_consumer(&self, consumer: &Arc<dyn Consumer>) -> bool {
        self.consumers.remove(consumer)
    }

    pub(crate) fn remove_reader(&self, reader: &Arc<dyn Reader>) -> bool {
        self.readers.remove(reader)
    }

    pub(crate) fn live_consumers(&self) -> usize {
        self.consumers.len()
    }

    pub(crate) fn live_readers(&self) -> usize {
        self.readers.len()
    }

    /// Closes every tracked consumer and reader, collecting failures.
    pub(crate) async fn close_all(&self) -> Vec<BrokerError> {
        let mut failures = Vec::new();
        for consumer in self.consumers.drain() {
            if let Err(err) = consumer.close().await {
                warn!(
                    event = events::CLOSE_RESOURCE_FAILED,
                    component = COMPONENT,
                    resource = "consumer",
                    topic = consumer.topic(),
                    err = %err,
                    "unable to close consumer"
                );
                failures.push(err);
            }
        }
        for reader in self.readers.drain() {
            if let Err(err) = reader.close().await {
                warn!(
                    event = events::CLOSE_RESOURCE_FAILED,
                    component = COMPONENT,
                    resource = "reader",
                    topic = reader.topic(),
                    err = %err,
                    "unable to close reader"
                );
                failures.push(err);
            }
        }
        failures
    }
}
