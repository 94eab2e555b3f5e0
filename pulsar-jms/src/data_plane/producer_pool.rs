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

//! One producer per `(topic, transactional)`, built once and shared.

use crate::broker::{BrokerClient, BrokerError, Producer};
use crate::config::ProducerConfig;
use crate::error::{Error, Result};
use crate::observability::{events, fields};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const COMPONENT: &str = "producer_pool";

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProducerKey {
    pub topic: String,
    pub transactional: bool,
}

impl ProducerKey {
    pub fn new(topic: &str, transactional: bool) -> Self {
        Self {
            topic: topic.to_string(),
            transactional,
        }
    }
}

type PendingProducer = Shared<BoxFuture<'static, Result<Arc<dyn Producer>>>>;

enum Slot {
    Ready(Arc<dyn Producer>),
    Pending { attempt: u64, build: PendingProducer },
}

#[derive(Default)]
struct PoolState {
    slots: HashMap<ProducerKey, Slot>,
    next_attempt: u64,
    closed: bool,
}

#[derive(Default)]
struct PoolInner {
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Producer cache with single-flight creation.
///
/// The first requester of a key starts the build and parks a shared future in the slot;
/// concurrent requesters await that same future. No lock is held while the broker builds
/// the producer, so distinct keys build in parallel. A failed build clears its slot so a
/// later request starts over.
#[derive(Clone, Default)]
pub(crate) struct ProducerPool {
    inner: Arc<PoolInner>,
}

impl ProducerPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn get_or_create(
        &self,
        client: Arc<dyn BrokerClient>,
        config: ProducerConfig,
    ) -> Result<Arc<dyn Producer>> {
        let key = ProducerKey::new(&config.topic, config.transactional);
        let build = {
            let mut state = self.inner.state();
            if state.closed {
                return Err(Error::illegal_state("producer pool is closed"));
            }
            match state.slots.get(&key) {
                Some(Slot::Ready(producer)) => return Ok(producer.clone()),
                Some(Slot::Pending { build, .. }) => build.clone(),
                None => {
                    state.next_attempt += 1;
                    let attempt = state.next_attempt;
                    let build = self.build(client, config, key.clone(), attempt);
                    state.slots.insert(
                        key.clone(),
                        Slot::Pending {
                            attempt,
                            build: build.clone(),
                        },
                    );
                    build
                }
            }
        };
        build.await
    }

    fn build(
        &self,
        client: Arc<dyn BrokerClient>,
        config: ProducerConfig,
        key: ProducerKey,
        attempt: u64,
    ) -> PendingProducer {
        let inner = self.inner.clone();
        async move {
            let outcome = client.create_producer(config).await;
            let orphan = {
                let mut state = inner.state();
                let current = matches!(
                    state.slots.get(&key),
                    Some(Slot::Pending { attempt: a, .. }) if *a == attempt
                );
                match &outcome {
                    Ok(producer) if current && !state.closed => {
                        state
                            .slots
                            .insert(key.clone(), Slot::Ready(producer.clone()));
                        None
                    }
                    Ok(producer) => Some(producer.clone()),
                    Err(_) => {
                        if current {
                            state.slots.remove(&key);
                        }
                        None
                    }
                }
            };

            match outcome {
                Ok(producer) => {
                    if let Some(orphan) = orphan {
                        debug!(
                            event = events::PRODUCER_CREATE_FAILED,
                            component = COMPONENT,
                            key = %fields::format_producer_key(&key),
                            "pool closed while the producer was built, closing it"
                        );
                        if let Err(err) = orphan.close().await {
                            warn!(
                                event = events::CLOSE_RESOURCE_FAILED,
                                component = COMPONENT,
                                key = %fields::format_producer_key(&key),
                                err = %err,
                                "unable to close orphaned producer"
                            );
                        }
                        return Err(Error::illegal_state("producer pool is closed"));
                    }
                    info!(
                        event = events::PRODUCER_CREATED,
                        component = COMPONENT,
                        key = %fields::format_producer_key(&key),
                        "created producer"
                    );
                    Ok(producer)
                }
                Err(err) => {
                    warn!(
                        event = events::PRODUCER_CREATE_FAILED,
                        component = COMPONENT,
                        key = %fields::format_producer_key(&key),
                        err = %err,
                        "unable to create producer"
                    );
                    Err(err.into())
                }
            }
        }
        .boxed()
        .shared()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .state()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Refuses further requests and closes every cached producer.
    ///
    /// Every producer gets its close call; failures are collected, not propagated.
    pub(crate) async fn close_all(&self) -> Vec<(ProducerKey, BrokerError)> {
        let ready: Vec<(ProducerKey, Arc<dyn Producer>)> = {
            let mut state = self.inner.state();
            state.closed = true;
            state
                .slots
                .drain()
                .filter_map(|(key, slot)| match slot {
                    Slot::Ready(producer) => Some((key, producer)),
                    Slot::Pending { .. } => None,
                })
                .collect()
        };

        let mut failures = Vec::new();
        for (key, producer) in ready {
            if let Err(err) = producer.close().await {
                warn!(
                    event = events::CLOSE_RESOURCE_FAILED,
                    component = COMPONENT,
                    key = %fields::format_producer_key(&key),
                    err = %err,
                    "unable to close producer"
                );
                failures.push((key, err));
            }
        }
        failures
    }
}
