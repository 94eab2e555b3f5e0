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

//! Control-plane layer.
//!
//! Owns the lazily built broker handles, the process-wide client id registry, and
//! every administrative call: subscription provisioning with bounded startup retry and
//! subscription deletion.

mod client_handles;
mod client_id_registry;
mod subscription_cleanup;
mod subscription_provisioner;

#[cfg(test)]
pub(crate) use client_handles::ClientHandles;
pub(crate) use client_handles::{ClientHandleManager, InitializedState};
pub use client_id_registry::ClientIdRegistry;
pub(crate) use subscription_cleanup::delete_subscription;
pub(crate) use subscription_provisioner::SubscriptionProvisioner;
