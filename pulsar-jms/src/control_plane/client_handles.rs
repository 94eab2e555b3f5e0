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

//! Lazy, exactly-once construction of the admin and data-plane clients.

use crate::broker::{BrokerAdmin, BrokerClient, BrokerConnector};
use crate::config::{ConsumerOptions, ProducerOptions, Properties, ResolvedConfig};
use crate::error::{Error, Result};
use crate::observability::events;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const COMPONENT: &str = "client_handles";

/// The two network handles shared by every connection of a factory.
pub(crate) struct ClientHandles {
    pub(crate) admin: Arc<dyn BrokerAdmin>,
    pub(crate) client: Arc<dyn BrokerClient>,
}

/// Everything that exists once initialization succeeded. Immutable afterwards.
pub(crate) struct InitializedState {
    pub(crate) config: ResolvedConfig,
    pub(crate) producer_options: ProducerOptions,
    pub(crate) consumer_options: ConsumerOptions,
    pub(crate) handles: ClientHandles,
}

pub(crate) struct ClientHandleManager {
    connector: Arc<dyn BrokerConnector>,
    init_lock: tokio::sync::Mutex<()>,
    state: ArcSwapOption<InitializedState>,
    closed: AtomicBool,
}

impl ClientHandleManager {
    pub(crate) fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            init_lock: tokio::sync::Mutex::new(()),
            state: ArcSwapOption::empty(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn current(&self) -> Option<Arc<InitializedState>> {
        self.state.load_full()
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.state.load().is_some()
    }

    /// Marks the handles as closed; `false` if that already happened.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves `pending` and connects both clients, once.
    ///
    /// Concurrent callers wait on the same lock and observe the committed state. The
    /// consumed keys are removed from `pending` only when both clients were built, so a
    /// failed attempt can be retried with the original configuration.
    pub(crate) async fn ensure_initialized(
        &self,
        pending: &Mutex<Properties>,
    ) -> Result<Arc<InitializedState>> {
        if self.is_closed() {
            return Err(Error::illegal_state("connection factory is closed"));
        }
        if let Some(state) = self.current() {
            return Ok(state);
        }

        let _guard = self.init_lock.lock().await;
        if let Some(state) = self.current() {
            return Ok(state);
        }

        let mut residual = pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let config = ResolvedConfig::resolve(&mut residual)?;
        let producer_options =
            ProducerOptions::defaults().with_overrides(&config.producer_overrides)?;
        let consumer_options =
            ConsumerOptions::defaults().with_overrides(&config.consumer_overrides)?;

        info!(
            event = events::CLIENT_INIT_START,
            component = COMPONENT,
            admin_url = %config.admin.service_http_url,
            service_url = %config.client.service_url,
            "connecting broker clients"
        );
        let handles = self.connect(&config).await?;

        *pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = residual;

        let state = Arc::new(InitializedState {
            config,
            producer_options,
            consumer_options,
            handles,
        });
        self.state.store(Some(state.clone()));
        debug!(
            event = events::CLIENT_INIT_OK,
            component = COMPONENT,
            "broker clients ready"
        );
        Ok(state)
    }

    async fn connect(&self, config: &ResolvedConfig) -> Result<ClientHandles> {
        let admin = self
            .connector
            .connect_admin(&config.admin)
            .await
            .map_err(|err| {
                warn!(
                    event = events::CLIENT_INIT_FAILED,
                    component = COMPONENT,
                    handle = "admin",
                    err = %err,
                    "unable to build admin client"
                );
                Error::from(err)
            })?;

        match self.connector.connect_client(&config.client).await {
            Ok(client) => Ok(ClientHandles { admin, client }),
            Err(err) => {
                warn!(
                    event = events::CLIENT_INIT_FAILED,
                    component = COMPONENT,
                    handle = "client",
                    err = %err,
                    "unable to build data-plane client, releasing admin client"
                );
                if let Err(close_err) = admin.close().await {
                    warn!(
                        event = events::CLIENT_INIT_ROLLBACK_FAILED,
                        component = COMPONENT,
                        err = %close_err,
                        "unable to close admin client after failed initialization"
                    );
                }
                Err(err.into())
            }
        }
    }
}
