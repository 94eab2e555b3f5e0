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

//! Data-plane layer.
//!
//! Producer cache, consumer and browser construction, and the live handle sets drained
//! on shutdown.

mod consumer_factory;
mod live_handles;
mod producer_pool;

pub(crate) use consumer_factory::ConsumerFactory;
pub(crate) use live_handles::LiveSet;
pub(crate) use producer_pool::ProducerPool;
pub use producer_pool::ProducerKey;
