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

use super::ConnectionFactory;
use crate::broker::{Consumer, Producer, Reader, SessionMode, SubscriptionMode, SubscriptionType};
use crate::data_plane::LiveSet;
use crate::error::{Error, Result};
use crate::routing::Destination;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Bookkeeping of one connection, tracked by the factory for bulk teardown.
pub(crate) struct ConnectionState {
    id: Uuid,
    client_id: Mutex<Option<String>>,
    closed: AtomicBool,
    consumers: LiveSet<dyn Consumer>,
    readers: LiveSet<dyn Reader>,
    temporary_destinations: Mutex<Vec<Destination>>,
}

impl ConnectionState {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id: Mutex::new(None),
            closed: AtomicBool::new(false),
            consumers: LiveSet::default(),
            readers: LiveSet::default(),
            temporary_destinations: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    fn client_id_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.client_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn client_id(&self) -> Option<String> {
        self.client_id_slot().clone()
    }

    /// Stores `client_id` once `register` accepted it.
    pub(crate) fn assign_client_id(
        &self,
        client_id: &str,
        register: impl FnOnce(&str) -> Result<()>,
    ) -> Result<()> {
        let mut slot = self.client_id_slot();
        if let Some(current) = slot.as_deref() {
            return Err(Error::illegal_state(format!(
                "client id is already set to '{current}'"
            )));
        }
        register(client_id)?;
        *slot = Some(client_id.to_string());
        Ok(())
    }

    pub(crate) fn take_client_id(&self) -> Option<String> {
        self.client_id_slot().take()
    }

    /// `false` if the connection was already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn consumers(&self) -> &LiveSet<dyn Consumer> {
        &self.consumers
    }

    pub(crate) fn readers(&self) -> &LiveSet<dyn Reader> {
        &self.readers
    }

    fn temporary_destinations(&self) -> MutexGuard<'_, Vec<Destination>> {
        self.temporary_destinations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn take_temporary_destinations(&self) -> Vec<Destination> {
        std::mem::take(&mut *self.temporary_destinations())
    }
}

/// A logical connection: an optional client id plus the consumers, browsers and
/// temporary destinations opened through it.
///
/// Producers are pooled by the factory and shared across connections; they outlive the
/// connection and are closed with the factory.
pub struct Connection {
    factory: Arc<ConnectionFactory>,
    state: Arc<ConnectionState>,
}

impl Connection {
    pub(crate) fn new(factory: Arc<ConnectionFactory>, state: Arc<ConnectionState>) -> Self {
        Self { factory, state }
    }

    pub(crate) fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    pub fn factory(&self) -> &Arc<ConnectionFactory> {
        &self.factory
    }

    pub fn id(&self) -> Uuid {
        self.state.id()
    }

    pub fn client_id(&self) -> Option<String> {
        self.state.client_id()
    }

    pub fn set_client_id(&self, client_id: &str) -> Result<()> {
        self.ensure_open()?;
        self.factory.register_client_id(self, client_id)
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::illegal_state("connection is closed"));
        }
        Ok(())
    }

    pub async fn producer(
        &self,
        destination: &Destination,
        transactional: bool,
    ) -> Result<Arc<dyn Producer>> {
        self.ensure_open()?;
        self.factory
            .get_producer_for_destination(destination, transactional)
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
        self.ensure_open()?;
        let consumer = self
            .factory
            .create_consumer(
                destination,
                consumer_name,
                session_mode,
                subscription_mode,
                subscription_type,
            )
            .await?;
        self.state.consumers().insert(consumer.clone());
        if self.is_closed() {
            let tracked_by_factory = self.factory.remove_consumer(&consumer);
            if self.state.consumers().remove(&consumer) && tracked_by_factory {
                consumer.close().await?;
            }
            return Err(Error::illegal_state("connection is closed"));
        }
        Ok(consumer)
    }

    pub async fn create_browser_reader(
        &self,
        destination: &Destination,
    ) -> Result<Arc<dyn Reader>> {
        self.ensure_open()?;
        let reader = self.factory.create_reader_for_browser(destination).await?;
        self.state.readers().insert(reader.clone());
        if self.is_closed() {
            let tracked_by_factory = self.factory.remove_reader(&reader);
            if self.state.readers().remove(&reader) && tracked_by_factory {
                reader.close().await?;
            }
            return Err(Error::illegal_state("connection is closed"));
        }
        Ok(reader)
    }

    /// Closes one consumer and stops tracking it. Closing it twice is harmless.
    pub async fn close_consumer(&self, consumer: &Arc<dyn Consumer>) -> Result<()> {
        let tracked = self.state.consumers().remove(consumer);
        self.factory.remove_consumer(consumer);
        if tracked {
            consumer.close().await?;
        }
        Ok(())
    }

    pub async fn close_browser_reader(&self, reader: &Arc<dyn Reader>) -> Result<()> {
        let tracked = self.state.readers().remove(reader);
        self.factory.remove_reader(reader);
        if tracked {
            reader.close().await?;
        }
        Ok(())
    }

    /// A uniquely named queue whose subscription exists before the first send. Deleted
    /// when this connection closes.
    pub async fn create_temporary_queue(&self) -> Result<Destination> {
        self.ensure_open()?;
        let destination = Destination::temporary_queue();
        self.factory.ensure_queue_subscription(&destination).await?;
        self.state.temporary_destinations().push(destination.clone());
        Ok(destination)
    }

    pub async fn create_temporary_topic(&self) -> Result<Destination> {
        self.ensure_open()?;
        self.factory.ensure_initialized().await?;
        let destination = Destination::temporary_topic();
        self.state.temporary_destinations().push(destination.clone());
        Ok(destination)
    }

    /// Closes consumers and browsers opened here, deletes temporary destinations and
    /// releases the client id. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.factory.close_connection_if_open(&self.state).await
    }
}
