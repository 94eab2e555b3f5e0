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

//! Process-wide uniqueness of connection client identifiers.

use crate::error::{Error, Result};
use crate::observability::events;
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const COMPONENT: &str = "client_id_registry";

lazy_static! {
    static ref PROCESS_REGISTRY: Arc<ClientIdRegistry> = Arc::new(ClientIdRegistry::new());
}

/// Set of client identifiers currently held by open connections.
///
/// Factories share [`ClientIdRegistry::global`] unless a dedicated instance is injected,
/// which keeps tests isolated from each other.
#[derive(Debug, Default)]
pub struct ClientIdRegistry {
    identifiers: Mutex<HashSet<String>>,
}

impl ClientIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every factory of this process.
    pub fn global() -> Arc<ClientIdRegistry> {
        PROCESS_REGISTRY.clone()
    }

    fn identifiers(&self) -> MutexGuard<'_, HashSet<String>> {
        // the set stays consistent even if a holder panicked
        self.identifiers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, client_id: &str) -> Result<()> {
        let mut identifiers = self.identifiers();
        if !identifiers.insert(client_id.to_string()) {
            return Err(Error::InvalidClientId(format!(
                "A connection with this client id '{client_id}' is already opened locally"
            )));
        }
        info!(
            event = events::CLIENT_ID_REGISTERED,
            component = COMPONENT,
            client_id,
            active = identifiers.len(),
            "registered client id"
        );
        Ok(())
    }

    /// Returns `false` when the identifier was not registered.
    pub fn unregister(&self, client_id: &str) -> bool {
        let mut identifiers = self.identifiers();
        let removed = identifiers.remove(client_id);
        if removed {
            info!(
                event = events::CLIENT_ID_UNREGISTERED,
                component = COMPONENT,
                client_id,
                active = identifiers.len(),
                "unregistered client id"
            );
        }
        removed
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.identifiers().contains(client_id)
    }
}
