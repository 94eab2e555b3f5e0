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

//! Hand-written broker doubles shared by the unit tests.

use crate::broker::{
    BrokerAdmin, BrokerClient, BrokerConnector, BrokerError, BrokerResult, Consumer, Message,
    MessageId, MessagePosition, OutgoingMessage, Producer, Reader,
};
use crate::config::{
    AdminSettings, ClientSettings, ConsumerConfig, ConsumerOptions, ProducerConfig,
    ProducerOptions, ReaderConfig, ResolvedConfig,
};
use crate::control_plane::{ClientHandles, InitializedState};
use crate::runtime::{Interrupted, RetryClock};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Resolves `properties` the way initialization does and wires in the doubles.
pub(crate) fn initialized_state(
    admin: Arc<RecordingAdmin>,
    client: Arc<RecordingClient>,
    properties: serde_json::Value,
) -> InitializedState {
    let mut properties = properties.as_object().cloned().expect("object literal");
    let config = ResolvedConfig::resolve(&mut properties).expect("valid configuration");
    let producer_options = ProducerOptions::defaults()
        .with_overrides(&config.producer_overrides)
        .expect("producer overrides");
    let consumer_options = ConsumerOptions::defaults()
        .with_overrides(&config.consumer_overrides)
        .expect("consumer overrides");
    InitializedState {
        config,
        producer_options,
        consumer_options,
        handles: ClientHandles { admin, client },
    }
}

/// Simulated clock: sleeping advances time instantly.
pub(crate) struct ManualRetryClock {
    origin: Instant,
    state: Mutex<ClockState>,
}

#[derive(Default)]
struct ClockState {
    elapsed: Duration,
    sleeps: usize,
    interrupt_after: Option<usize>,
    interrupted: bool,
}

impl ManualRetryClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ClockState::default()),
        }
    }

    /// Lets `sleeps` sleeps complete, then interrupts the next one.
    pub(crate) fn interrupt_after(&self, sleeps: usize) {
        self.state.lock().expect("lock clock").interrupt_after = Some(sleeps);
    }

    pub(crate) fn sleeps(&self) -> usize {
        self.state.lock().expect("lock clock").sleeps
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.state.lock().expect("lock clock").elapsed
    }
}

#[async_trait]
impl RetryClock for ManualRetryClock {
    fn now(&self) -> Instant {
        self.origin + self.state.lock().expect("lock clock").elapsed
    }

    async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let mut state = self.state.lock().expect("lock clock");
        if state.interrupted || state.interrupt_after == Some(state.sleeps) {
            state.interrupted = true;
            return Err(Interrupted);
        }
        state.sleeps += 1;
        state.elapsed += duration;
        Ok(())
    }

    fn interrupt(&self) {
        self.state.lock().expect("lock clock").interrupted = true;
    }
}

#[derive(Default)]
struct AdminState {
    subscriptions: BTreeMap<String, Vec<String>>,
    created: Vec<(String, String, MessagePosition)>,
    deleted: Vec<(String, String, bool)>,
    deleted_topics: Vec<(String, bool)>,
    create_failures: usize,
    create_failure: Option<BrokerError>,
    peekable: HashMap<String, Vec<Message>>,
    close_error: Option<BrokerError>,
    closes: usize,
}

/// Admin double keeping topics and subscriptions in memory.
#[derive(Default)]
pub(crate) struct RecordingAdmin {
    state: Mutex<AdminState>,
}

impl RecordingAdmin {
    pub(crate) fn fail_next_creates(&self, times: usize, error: BrokerError) {
        let mut state = self.state.lock().expect("lock admin");
        state.create_failures = times;
        state.create_failure = Some(error);
    }

    pub(crate) fn with_subscription(self, topic: &str, subscription: &str) -> Self {
        self.state
            .lock()
            .expect("lock admin")
            .subscriptions
            .entry(topic.to_string())
            .or_default()
            .push(subscription.to_string());
        self
    }

    pub(crate) fn with_backlog(self, topic: &str, messages: Vec<Message>) -> Self {
        self.state
            .lock()
            .expect("lock admin")
            .peekable
            .insert(topic.to_string(), messages);
        self
    }

    pub(crate) fn failing_close(self, error: BrokerError) -> Self {
        self.state.lock().expect("lock admin").close_error = Some(error);
        self
    }

    pub(crate) fn created(&self) -> Vec<(String, String, MessagePosition)> {
        self.state.lock().expect("lock admin").created.clone()
    }

    pub(crate) fn deleted(&self) -> Vec<(String, String, bool)> {
        self.state.lock().expect("lock admin").deleted.clone()
    }

    pub(crate) fn deleted_topics(&self) -> Vec<(String, bool)> {
        self.state.lock().expect("lock admin").deleted_topics.clone()
    }

    pub(crate) fn subscriptions_of(&self, topic: &str) -> Vec<String> {
        self.state
            .lock()
            .expect("lock admin")
            .subscriptions
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn closes(&self) -> usize {
        self.state.lock().expect("lock admin").closes
    }
}

#[async_trait]
impl BrokerAdmin for RecordingAdmin {
    async fn create_subscription(
        &self,
        topic: &str,
        subscription: &str,
        position: MessagePosition,
    ) -> BrokerResult<()> {
        let mut state = self.state.lock().expect("lock admin");
        if state.create_failures > 0 {
            state.create_failures -= 1;
            let error = state
                .create_failure
                .clone()
                .unwrap_or_else(|| BrokerError::unavailable("scripted failure"));
            return Err(error);
        }
        let existing = state.subscriptions.entry(topic.to_string()).or_default();
        if existing.iter().any(|name| name == subscription) {
            return Err(BrokerError::conflict(format!(
                "subscription {subscription} already exists on {topic}"
            )));
        }
        existing.push(subscription.to_string());
        state
            .created
            .push((topic.to_string(), subscription.to_string(), position));
        Ok(())
    }

    async fn delete_subscription(
        &self,
        topic: &str,
        subscription: &str,
        force: bool,
    ) -> BrokerResult<()> {
        let mut state = self.state.lock().expect("lock admin");
        let Some(existing) = state.subscriptions.get_mut(topic) else {
            return Err(BrokerError::not_found(format!("topic {topic} not found")));
        };
        let before = existing.len();
        existing.retain(|name| name != subscription);
        if existing.len() == before {
            return Err(BrokerError::not_found(format!(
                "subscription {subscription} not found on {topic}"
            )));
        }
        state
            .deleted
            .push((topic.to_string(), subscription.to_string(), force));
        Ok(())
    }

    async fn list_topics(&self, namespace: &str) -> BrokerResult<Vec<String>> {
        let prefix = format!("persistent://{namespace}/");
        Ok(self
            .state
            .lock()
            .expect("lock admin")
            .subscriptions
            .keys()
            .filter(|topic| topic.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn list_subscriptions(&self, topic: &str) -> BrokerResult<Vec<String>> {
        self.state
            .lock()
            .expect("lock admin")
            .subscriptions
            .get(topic)
            .cloned()
            .ok_or_else(|| BrokerError::not_found(format!("topic {topic} not found")))
    }

    async fn peek_messages(
        &self,
        topic: &str,
        _subscription: &str,
        count: usize,
    ) -> BrokerResult<Vec<Message>> {
        Ok(self
            .state
            .lock()
            .expect("lock admin")
            .peekable
            .get(topic)
            .map(|messages| messages.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_topic(&self, topic: &str, force: bool) -> BrokerResult<()> {
        let mut state = self.state.lock().expect("lock admin");
        state.subscriptions.remove(topic);
        state.deleted_topics.push((topic.to_string(), force));
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        let mut state = self.state.lock().expect("lock admin");
        state.closes += 1;
        match state.close_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Close calls observed across every handle built by one [`RecordingClient`].
#[derive(Default)]
pub(crate) struct HandleCloses {
    pub(crate) producers: AtomicUsize,
    pub(crate) consumers: AtomicUsize,
    pub(crate) readers: AtomicUsize,
    fail_producers: AtomicBool,
}

impl HandleCloses {
    fn record(&self, counter: &AtomicUsize, fail: bool, what: &str) -> BrokerResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if fail {
            return Err(BrokerError::closed(format!("{what} refused to close")));
        }
        Ok(())
    }
}

struct StubProducer {
    topic: String,
    closes: Arc<HandleCloses>,
}

#[async_trait]
impl Producer for StubProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn send(&self, _message: OutgoingMessage) -> BrokerResult<MessageId> {
        Ok(MessageId::new(0, 0))
    }

    async fn close(&self) -> BrokerResult<()> {
        let fail = self.closes.fail_producers.load(Ordering::SeqCst);
        self.closes.record(&self.closes.producers, fail, "producer")
    }
}

struct StubConsumer {
    topic: String,
    subscription: String,
    closes: Arc<HandleCloses>,
}

#[async_trait]
impl Consumer for StubConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn subscription(&self) -> &str {
        &self.subscription
    }

    async fn receive(&self, _timeout: Duration) -> BrokerResult<Option<Message>> {
        Ok(None)
    }

    async fn acknowledge(&self, _id: &MessageId) -> BrokerResult<()> {
        Ok(())
    }

    async fn negative_acknowledge(&self, _id: &MessageId) -> BrokerResult<()> {
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closes.record(&self.closes.consumers, false, "consumer")
    }
}

struct StubReader {
    topic: String,
    closes: Arc<HandleCloses>,
}

#[async_trait]
impl Reader for StubReader {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn read_next(&self, _timeout: Duration) -> BrokerResult<Option<Message>> {
        Ok(None)
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closes.record(&self.closes.readers, false, "reader")
    }
}

#[derive(Default)]
struct ClientState {
    producer_configs: Vec<ProducerConfig>,
    consumer_configs: Vec<ConsumerConfig>,
    reader_configs: Vec<ReaderConfig>,
    producer_failures: usize,
    close_error: Option<BrokerError>,
}

/// Data-plane double recording every builder request.
#[derive(Default)]
pub(crate) struct RecordingClient {
    state: Mutex<ClientState>,
    producer_delay: Duration,
    pub(crate) producer_builds: AtomicUsize,
    pub(crate) handle_closes: Arc<HandleCloses>,
    pub(crate) closes: AtomicUsize,
}

impl RecordingClient {
    pub(crate) fn with_producer_delay(mut self, delay: Duration) -> Self {
        self.producer_delay = delay;
        self
    }

    pub(crate) fn fail_next_producers(&self, times: usize) {
        self.state.lock().expect("lock client").producer_failures = times;
    }

    pub(crate) fn failing_producer_close(self) -> Self {
        self.handle_closes
            .fail_producers
            .store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_close(self, error: BrokerError) -> Self {
        self.state.lock().expect("lock client").close_error = Some(error);
        self
    }

    pub(crate) fn producer_configs(&self) -> Vec<ProducerConfig> {
        self.state.lock().expect("lock client").producer_configs.clone()
    }

    pub(crate) fn consumer_configs(&self) -> Vec<ConsumerConfig> {
        self.state.lock().expect("lock client").consumer_configs.clone()
    }

    pub(crate) fn reader_configs(&self) -> Vec<ReaderConfig> {
        self.state.lock().expect("lock client").reader_configs.clone()
    }
}

#[async_trait]
impl BrokerClient for RecordingClient {
    async fn create_producer(&self, config: ProducerConfig) -> BrokerResult<Arc<dyn Producer>> {
        self.producer_builds.fetch_add(1, Ordering::SeqCst);
        if !self.producer_delay.is_zero() {
            tokio::time::sleep(self.producer_delay).await;
        }
        let mut state = self.state.lock().expect("lock client");
        if state.producer_failures > 0 {
            state.producer_failures -= 1;
            return Err(BrokerError::unavailable("producer rejected"));
        }
        let topic = config.topic.clone();
        state.producer_configs.push(config);
        Ok(Arc::new(StubProducer {
            topic,
            closes: self.handle_closes.clone(),
        }))
    }

    async fn subscribe(&self, config: ConsumerConfig) -> BrokerResult<Arc<dyn Consumer>> {
        let consumer = StubConsumer {
            topic: config.topic.clone(),
            subscription: config.subscription_name.clone(),
            closes: self.handle_closes.clone(),
        };
        self.state
            .lock()
            .expect("lock client")
            .consumer_configs
            .push(config);
        Ok(Arc::new(consumer))
    }

    async fn create_reader(&self, config: ReaderConfig) -> BrokerResult<Arc<dyn Reader>> {
        let reader = StubReader {
            topic: config.topic.clone(),
            closes: self.handle_closes.clone(),
        };
        self.state
            .lock()
            .expect("lock client")
            .reader_configs
            .push(config);
        Ok(Arc::new(reader))
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match self.state.lock().expect("lock client").close_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Hands out the same pair of doubles on every connect and counts the calls.
pub(crate) struct StaticConnector {
    pub(crate) admin: Arc<RecordingAdmin>,
    pub(crate) client: Arc<RecordingClient>,
    pub(crate) connects: AtomicUsize,
    pub(crate) seen_client_settings: Mutex<Vec<ClientSettings>>,
}

impl StaticConnector {
    pub(crate) fn new(admin: RecordingAdmin, client: RecordingClient) -> Self {
        Self {
            admin: Arc::new(admin),
            client: Arc::new(client),
            connects: AtomicUsize::new(0),
            seen_client_settings: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BrokerConnector for StaticConnector {
    async fn connect_admin(
        &self,
        _settings: &AdminSettings,
    ) -> BrokerResult<Arc<dyn BrokerAdmin>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.admin.clone())
    }

    async fn connect_client(
        &self,
        settings: &ClientSettings,
    ) -> BrokerResult<Arc<dyn BrokerClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen_client_settings
            .lock()
            .expect("lock seen_client_settings")
            .push(settings.clone());
        Ok(self.client.clone())
    }
}
