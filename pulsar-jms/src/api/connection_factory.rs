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

use super::connection::{Connection, ConnectionState};
use crate::broker::{
    BrokerConnector, BrokerError, Consumer, Producer, Reader, SessionMode, SubscriptionMode,
    SubscriptionType,
};
use crate::config::{ProducerConfig, Properties};
use crate::control_plane::{
    delete_subscription, ClientHandleManager, ClientIdRegistry, InitializedState,
    SubscriptionProvisioner,
};
use crate::data_plane::{ConsumerFactory, LiveSet, ProducerPool};
use crate::error::{Error, Result};
use crate::observability::{events, fields};
use crate::routing::{Destination, SubscriptionPolicy};
use crate::runtime::{RetryClock, TokioRetryClock};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const COMPONENT: &str = "connection_factory";

/// Entry point of the mapping layer.
///
/// Holds the configuration until the first connection (or explicit
/// [`ensure_initialized`](Self::ensure_initialized)) builds the shared broker handles, then
/// hands out producers, consumers and browsers bound to those handles. Share it as
/// `Arc<ConnectionFactory>`; connections keep the factory alive.
pub struct ConnectionFactory {
    pending: Mutex<Properties>,
    handles: ClientHandleManager,
    registry: Arc<ClientIdRegistry>,
    clock: Arc<dyn RetryClock>,
    producers: ProducerPool,
    consumers: ConsumerFactory,
    connections: LiveSet<ConnectionState>,
}

impl ConnectionFactory {
    pub fn new(properties: Properties, connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            pending: Mutex::new(properties),
            handles: ClientHandleManager::new(connector),
            registry: ClientIdRegistry::global(),
            clock: Arc::new(TokioRetryClock::new()),
            producers: ProducerPool::new(),
            consumers: ConsumerFactory::new(),
            connections: LiveSet::default(),
        }
    }

    /// Parses a JSON object into the configuration; an empty document means no settings.
    pub fn from_json(json: &str, connector: Arc<dyn BrokerConnector>) -> Result<Self> {
        Ok(Self::new(parse_json_configuration(json)?, connector))
    }

    /// Replaces the process-wide client id registry, e.g. to isolate tests.
    pub fn with_client_id_registry(mut self, registry: Arc<ClientIdRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_retry_clock(mut self, clock: Arc<dyn RetryClock>) -> Self {
        self.clock = clock;
        self
    }

    fn pending(&self) -> MutexGuard<'_, Properties> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_configuration(&self, properties: Properties) -> Result<()> {
        if self.handles.is_initialized() {
            return Err(Error::illegal_state(
                "cannot change the configuration after the factory is initialized",
            ));
        }
        *self.pending() = properties;
        Ok(())
    }

    pub fn set_json_configuration(&self, json: &str) -> Result<()> {
        self.set_configuration(parse_json_configuration(json)?)
    }

    /// The configuration still pending; after initialization only the residual client
    /// settings remain.
    pub fn json_configuration(&self) -> String {
        Value::Object(self.pending().clone()).to_string()
    }

    /// Builds the admin and data-plane clients on first use. Safe to call concurrently.
    pub async fn ensure_initialized(&self) -> Result<()> {
        self.initialized().await.map(|_| ())
    }

    async fn initialized(&self) -> Result<Arc<InitializedState>> {
        self.handles.ensure_initialized(&self.pending).await
    }

    fn state(&self) -> Result<Arc<InitializedState>> {
        self.handles.current().ok_or(Error::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.handles.is_initialized()
    }

    pub async fn create_connection(self: &Arc<Self>) -> Result<Arc<Connection>> {
        let state = self.initialized().await?;
        let connection = Arc::new(ConnectionState::new());
        if let Some(client_id) = &state.config.default_client_id {
            connection.assign_client_id(client_id, |id| self.registry.register(id))?;
        }
        self.track_connection(&connection)?;
        info!(
            event = events::CONNECTION_CREATED,
            component = COMPONENT,
            connection_id = %connection.id(),
            client_id = ?connection.client_id(),
            open_connections = self.connections.len(),
            "created connection"
        );
        Ok(Arc::new(Connection::new(self.clone(), connection)))
    }

    /// Tracks a new connection unless the factory closed meanwhile, in which case the
    /// connection is released again.
    fn track_connection(&self, connection: &Arc<ConnectionState>) -> Result<()> {
        self.connections.insert(connection.clone());
        if self.handles.is_closed() {
            // close() may already have drained it
            if connection.mark_closed() {
                self.release_connection(connection);
            }
            return Err(Error::illegal_state("connection factory is closed"));
        }
        Ok(())
    }

    /// Checks the credentials against `jms.tckUsername`/`jms.tckPassword` when configured.
    ///
    /// Credentials are never forwarded: the broker client is shared by every connection.
    pub async fn create_connection_with_credentials(
        self: &Arc<Self>,
        username: &str,
        password: &str,
    ) -> Result<Arc<Connection>> {
        let state = self.initialized().await?;
        let config = &state.config;
        if !config.tck_username.is_empty()
            && config.tck_username != username
            && config.tck_password != password
        {
            return Err(Error::Security("Unauthorized".to_string()));
        }
        self.create_connection().await
    }

    /// Binds `client_id` to `connection`, failing if it is open anywhere in the process
    /// or the connection already has one.
    pub fn register_client_id(&self, connection: &Connection, client_id: &str) -> Result<()> {
        connection
            .state()
            .assign_client_id(client_id, |id| self.registry.register(id))
    }

    /// Releases the connection's client id and stops tracking it.
    pub fn unregister_connection(&self, connection: &Connection) {
        self.release_connection(connection.state());
    }

    fn release_connection(&self, connection: &Arc<ConnectionState>) {
        if let Some(client_id) = connection.take_client_id() {
            self.registry.unregister(&client_id);
        }
        self.connections.remove(connection);
    }

    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    pub async fn get_producer_for_destination(
        &self,
        destination: &Destination,
        transactional: bool,
    ) -> Result<Arc<dyn Producer>> {
        let state = self.initialized().await?;
        let topic = destination.topic_name(&state.config.system_namespace);
        let config = ProducerConfig::new(&topic, transactional, state.producer_options.clone());
        self.producers
            .get_or_create(state.handles.client.clone(), config)
            .await
    }

    pub async fn create_consumer(
        &self,
        destination: &Destination,
        consumer_name: &str,
        session_mode: SessionMode,
        subscription_mode: SubscriptionMode,
        subscription_type: SubscriptionType,
    ) -> Result<Arc<dyn Consumer>> {
        let state = self.initialized().await?;
        self.consumers
            .create_consumer(
                &state,
                self.clock.as_ref(),
                destination,
                consumer_name,
                session_mode,
                subscription_mode,
                subscription_type,
            )
            .await
    }

    pub async fn create_reader_for_browser(
        &self,
        destination: &Destination,
    ) -> Result<Arc<dyn Reader>> {
        let state = self.initialized().await?;
        self.consumers
            .create_browser_reader(&state, destination)
            .await
    }

    /// Stops tracking a consumer the caller closed. No-op when already removed.
    pub fn remove_consumer(&self, consumer: &Arc<dyn Consumer>) -> bool {
        self.consumers.remove_consumer(consumer)
    }

    pub fn remove_reader(&self, reader: &Arc<dyn Reader>) -> bool {
        self.consumers.remove_reader(reader)
    }

    /// Creates the shared queue subscription, waiting for the broker up to
    /// `jms.waitForServerStartupTimeout`.
    pub async fn ensure_queue_subscription(&self, destination: &Destination) -> Result<()> {
        let state = self.initialized().await?;
        let config = &state.config;
        SubscriptionProvisioner::new(state.handles.admin.as_ref(), self.clock.as_ref())
            .ensure_queue_subscription(
                &destination.topic_name(&config.system_namespace),
                &config.queue_subscription_name,
                config.wait_for_server_startup_timeout,
            )
            .await
    }

    /// Creates the subscription a consumer named `consumer_name` would use, at the
    /// latest position.
    pub async fn ensure_subscription(
        &self,
        destination: &Destination,
        consumer_name: &str,
    ) -> Result<()> {
        let state = self.initialized().await?;
        let config = &state.config;
        let subscription = SubscriptionPolicy::subscription_name(
            destination,
            consumer_name,
            &config.queue_subscription_name,
        );
        SubscriptionProvisioner::new(state.handles.admin.as_ref(), self.clock.as_ref())
            .ensure_subscription(&destination.topic_name(&config.system_namespace), subscription)
            .await
    }

    /// Deletes a durable subscription; without a destination every topic of the system
    /// namespace is searched. Returns whether anything was deleted.
    pub async fn delete_subscription(
        &self,
        destination: Option<&Destination>,
        name: &str,
    ) -> Result<bool> {
        let state = self.initialized().await?;
        let namespace = &state.config.system_namespace;
        let topic = destination.map(|destination| destination.topic_name(namespace));
        delete_subscription(
            state.handles.admin.as_ref(),
            namespace,
            topic.as_deref(),
            name,
        )
        .await
    }

    /// Closes every connection, producer, consumer and reader, then both clients.
    ///
    /// Returns immediately if the factory was never initialized. Individual teardown
    /// failures are logged; only a failure to close the data-plane client is returned.
    pub async fn close(&self) -> Result<()> {
        let Some(state) = self.handles.current() else {
            debug!(
                event = events::CLOSE_SKIPPED_UNINITIALIZED,
                component = COMPONENT,
                "factory was never initialized, nothing to close"
            );
            return Ok(());
        };
        if !self.handles.mark_closed() {
            warn!(
                event = events::CLOSE_REPEATED,
                component = COMPONENT,
                "factory already closed"
            );
            return Ok(());
        }
        self.clock.interrupt();

        let connections = self.connections.len();
        let producers = self.producers.len();
        let consumers = self.consumers.live_consumers();
        let readers = self.consumers.live_readers();
        let mut failures = 0_usize;
        for connection in self.connections.drain() {
            if let Err(err) = self.close_connection(&connection, &state).await {
                warn!(
                    event = events::CLOSE_RESOURCE_FAILED,
                    component = COMPONENT,
                    resource = "connection",
                    connection_id = %connection.id(),
                    err = %err,
                    "unable to close connection"
                );
                failures += 1;
            }
        }
        failures += self.producers.close_all().await.len();
        failures += self.consumers.close_all().await.len();

        if let Err(err) = state.handles.admin.close().await {
            warn!(
                event = events::CLOSE_RESOURCE_FAILED,
                component = COMPONENT,
                resource = "admin",
                err = %err,
                "unable to close admin client"
            );
            failures += 1;
        }
        let outcome = state.handles.client.close().await.map_err(Error::from);
        info!(
            event = events::CLOSE_COMPLETE,
            component = COMPONENT,
            connections,
            producers,
            consumers,
            readers,
            failures,
            client_closed = outcome.is_ok(),
            "connection factory closed"
        );
        outcome
    }

    pub(crate) async fn close_connection_if_open(
        &self,
        connection: &Arc<ConnectionState>,
    ) -> Result<()> {
        match self.handles.current() {
            Some(state) => self.close_connection(connection, &state).await,
            None => {
                self.release_connection(connection);
                Ok(())
            }
        }
    }

    /// Closes the connection's consumers and readers, deletes its temporary
    /// destinations and unregisters it. Idempotent.
    async fn close_connection(
        &self,
        connection: &Arc<ConnectionState>,
        state: &InitializedState,
    ) -> Result<()> {
        if !connection.mark_closed() {
            return Ok(());
        }

        let mut first_failure: Option<BrokerError> = None;
        for consumer in connection.consumers().drain() {
            self.consumers.remove_consumer(&consumer);
            if let Err(err) = consumer.close().await {
                first_failure.get_or_insert(err);
            }
        }
        for reader in connection.readers().drain() {
            self.consumers.remove_reader(&reader);
            if let Err(err) = reader.close().await {
                first_failure.get_or_insert(err);
            }
        }

        let force = state.config.force_delete_temporary_destinations;
        for destination in connection.take_temporary_destinations() {
            let topic = destination.topic_name(&state.config.system_namespace);
            if let Err(err) = state.handles.admin.delete_topic(&topic, force).await {
                warn!(
                    event = events::TEMPORARY_DESTINATION_DELETE_FAILED,
                    component = COMPONENT,
                    destination = %fields::format_destination(&destination),
                    force,
                    err = %err,
                    "unable to delete temporary destination"
                );
                first_failure.get_or_insert(err);
            }
        }

        self.release_connection(connection);
        info!(
            event = events::CONNECTION_CLOSED,
            component = COMPONENT,
            connection_id = %connection.id(),
            open_connections = self.connections.len(),
            "closed connection"
        );
        match first_failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    pub fn is_enable_transaction(&self) -> Result<bool> {
        Ok(self.state()?.config.enable_transaction)
    }

    pub fn is_enable_client_side_features(&self) -> Result<bool> {
        Ok(self.state()?.config.enable_client_side_features)
    }

    pub fn is_force_delete_temporary_destinations(&self) -> Result<bool> {
        Ok(self.state()?.config.force_delete_temporary_destinations)
    }

    pub fn queue_subscription_name(&self) -> Result<String> {
        Ok(self.state()?.config.queue_subscription_name.clone())
    }

    pub fn system_namespace(&self) -> Result<String> {
        Ok(self.state()?.config.system_namespace.clone())
    }

    pub fn default_client_id(&self) -> Result<Option<String>> {
        Ok(self.state()?.config.default_client_id.clone())
    }

    pub fn wait_for_server_startup_timeout(&self) -> Result<Duration> {
        Ok(self.state()?.config.wait_for_server_startup_timeout)
    }

    /// Subscription type for consumers created without an explicit one.
    pub fn simple_consumer_subscription_type(&self) -> Result<SubscriptionType> {
        if self
            .state()?
            .config
            .use_exclusive_subscriptions_for_simple_consumers
        {
            Ok(SubscriptionType::Exclusive)
        } else {
            Ok(SubscriptionType::Shared)
        }
    }
}

fn parse_json_configuration(json: &str) -> Result<Properties> {
    if json.trim().is_empty() {
        return Ok(Properties::new());
    }
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(properties)) => Ok(properties),
        Ok(other) => Err(Error::config(
            "json",
            format!("expected a JSON object, got {other}"),
        )),
        Err(err) => Err(Error::config("json", err.to_string())),
    }
}
