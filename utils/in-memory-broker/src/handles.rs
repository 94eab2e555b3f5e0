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

use crate::state::Dispatch;
use crate::{BrokerCore, COMPONENT};
use async_trait::async_trait;
use pulsar_jms::broker::{
    BrokerAdmin, BrokerClient, BrokerError, BrokerResult, Consumer, Message, MessageId,
    MessagePosition, OutgoingMessage, Producer, Reader,
};
use pulsar_jms::config::{ConsumerConfig, ProducerConfig, ReaderConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;


fn ensure_open(flags: &[&AtomicBool], what: &str) -> BrokerResult<()> {
    if flags.iter().any(|flag| flag.load(Ordering::Acquire)) {
        return Err(BrokerError::closed(format!("{what} is closed")));
    }
    Ok(())
}

pub(crate) struct MemoryAdmin {
    core: Arc<BrokerCore>,
    closed: AtomicBool,
}

impl MemoryAdmin {
    pub(crate) fn new(core: Arc<BrokerCore>) -> Self {
        Self {
            core,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        ensure_open(&[&self.closed], "admin client")
    }
}

#[async_trait]
impl BrokerAdmin for MemoryAdmin {
    async fn create_subscription(
        &self,
        topic: &str,
        subscription: &str,
        position: MessagePosition,
    ) -> BrokerResult<()> {
        self.ensure_open()?;
        let mut state = self.core.state();
        state.admin_call()?;
        state.create_subscription(topic, subscription, position)?;
        debug!(component = COMPONENT, topic, subscription, %position, "subscription created");
        Ok(())
    }

    async fn delete_subscription(
        &self,
        topic: &str,
        subscription: &str,
        force: bool,
    ) -> BrokerResult<()> {
        self.ensure_open()?;
        {
            let mut state = self.core.state();
            state.admin_call()?;
            state.delete_subscription(topic, subscription, force)?;
        }
        self.core.appended.notify_waiters();
        Ok(())
    }

    async fn list_topics(&self, namespace: &str) -> BrokerResult<Vec<String>> {
        self.ensure_open()?;
        let mut state = self.core.state();
        state.admin_call()?;
        Ok(state.topics_in(namespace))
    }

    async fn list_subscriptions(&self, topic: &str) -> BrokerResult<Vec<String>> {
        self.ensure_open()?;
        let mut state = self.core.state();
        state.admin_call()?;
        state.subscriptions_of(topic)
    }

    async fn peek_messages(
        &self,
        topic: &str,
        subscription: &str,
        count: usize,
    ) -> BrokerResult<Vec<Message>> {
        self.ensure_open()?;
        let mut state = self.core.state();
        state.admin_call()?;
        state.peek(topic, subscription, count)
    }

    async fn delete_topic(&self, topic: &str, force: bool) -> BrokerResult<()> {
        self.ensure_open()?;
        {
            let mut state = self.core.state();
            state.admin_call()?;
            state.delete_topic(topic, force)?;
        }
        self.core.appended.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

pub(crate) struct MemoryClient {
    core: Arc<BrokerCore>,
    closed: Arc<AtomicBool>,
}

impl MemoryClient {
    pub(crate) fn new(core: Arc<BrokerCore>) -> Self {
        Self {
            core,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        ensure_open(&[&self.closed], "client")
    }
}

#[async_trait]
impl BrokerClient for MemoryClient {
    async fn create_producer(&self, config: ProducerConfig) -> BrokerResult<Arc<dyn Producer>> {
        self.ensure_open()?;
        self.core.state().producers_created += 1;
        Ok(Arc::new(MemoryProducer {
            core: self.core.clone(),
            topic: config.topic,
            client_closed: self.closed.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn subscribe(&self, config: ConsumerConfig) -> BrokerResult<Arc<dyn Consumer>> {
        self.ensure_open()?;
        let id = self.core.state().attach(
            &config.topic,
            &config.subscription_name,
            config.subscription_mode,
            config.subscription_type,
            config.initial_position.into(),
        )?;
        debug!(
            component = COMPONENT,
            topic = %config.topic,
            subscription = %config.subscription_name,
            consumer = id,
            "consumer attached"
        );
        Ok(Arc::new(MemoryConsumer {
            core: self.core.clone(),
            topic: config.topic,
            subscription: config.subscription_name,
            id,
            redelivery_delay: config.options.negative_ack_redelivery_delay,
            client_closed: self.closed.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn create_reader(&self, config: ReaderConfig) -> BrokerResult<Arc<dyn Reader>> {
        self.ensure_open()?;
        let start = self.core.state().reader_start(
            &config.topic,
            config.start,
            config.start_inclusive,
        );
        Ok(Arc::new(MemoryReader {
            core: self.core.clone(),
            topic: config.topic,
            position: Mutex::new(start),
            client_closed: self.closed.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::Release);
        self.core.appended.notify_waiters();
        Ok(())
    }
}

struct MemoryProducer {
    core: Arc<BrokerCore>,
    topic: String,
    client_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

#[async_trait]
impl Producer for MemoryProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn send(&self, message: OutgoingMessage) -> BrokerResult<MessageId> {
        ensure_open(&[&self.client_closed, &self.closed], "producer")?;
        let id = self.core.state().append(&self.topic, message);
        self.core.appended.notify_waiters();
        Ok(id)
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct MemoryConsumer {
    core: Arc<BrokerCore>,
    topic: String,
    subscription: String,
    id: u64,
    redelivery_delay: Duration,
    client_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

#[async_trait]
impl Consumer for MemoryConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn subscription(&self) -> &str {
        &self.subscription
    }

    async fn receive(&self, timeout: Duration) -> BrokerResult<Option<Message>> {
        let deadline = Instant::now() + timeout;
        loop {
            let appended = self.core.appended.notified();
            ensure_open(&[&self.client_closed, &self.closed], "consumer")?;
            let dispatch = {
                let mut state = self.core.state();
                state.dispatch(&self.topic, &self.subscription, self.id, Instant::now())?
            };
            let redelivery = match dispatch {
                Dispatch::Message(message) => return Ok(Some(message)),
                Dispatch::Idle(redelivery) => redelivery,
            };
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let wake_at = redelivery.map_or(deadline, |at| at.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, appended).await;
        }
    }

    async fn acknowledge(&self, id: &MessageId) -> BrokerResult<()> {
        ensure_open(&[&self.client_closed, &self.closed], "consumer")?;
        self.core
            .state()
            .acknowledge(&self.topic, &self.subscription, id);
        Ok(())
    }

    async fn negative_acknowledge(&self, id: &MessageId) -> BrokerResult<()> {
        ensure_open(&[&self.client_closed, &self.closed], "consumer")?;
        let redeliver_at = Instant::now() + self.redelivery_delay;
        self.core
            .state()
            .negative_acknowledge(&self.topic, &self.subscription, id, redeliver_at);
        self.core.appended.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.core
            .state()
            .detach(&self.topic, &self.subscription, self.id);
        self.core.appended.notify_waiters();
        debug!(
            component = COMPONENT,
            topic = %self.topic,
            subscription = %self.subscription,
            consumer = self.id,
            "consumer detached"
        );
        Ok(())
    }
}

struct MemoryReader {
    core: Arc<BrokerCore>,
    topic: String,
    position: Mutex<usize>,
    client_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl MemoryReader {
    fn position(&self) -> MutexGuard<'_, usize> {
        self.position
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Reader for MemoryReader {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn read_next(&self, timeout: Duration) -> BrokerResult<Option<Message>> {
        let deadline = Instant::now() + timeout;
        loop {
            let appended = self.core.appended.notified();
            ensure_open(&[&self.client_closed, &self.closed], "reader")?;
            let next = {
                let mut position = self.position();
                let message = self.core.state().read(&self.topic, *position)?;
                if message.is_some() {
                    *position += 1;
                }
                message
            };
            if next.is_some() {
                return Ok(next);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let _ = tokio::time::timeout_at(deadline, appended).await;
        }
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
