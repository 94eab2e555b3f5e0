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

//! Stable event names and field helpers for `tracing` output.
//!
//! Every event emitted by the crate carries `event = events::...` and a `component`
//! field so logs can be filtered without parsing message text.

pub mod events {
    pub const CONFIG_RESOLVED: &str = "config_resolved";
    pub const CONFIG_RESERVED_KEY_DROPPED: &str = "config_reserved_key_dropped";

    pub const CLIENT_INIT_START: &str = "client_init_start";
    pub const CLIENT_INIT_OK: &str = "client_init_ok";
    pub const CLIENT_INIT_FAILED: &str = "client_init_failed";
    pub const CLIENT_INIT_ROLLBACK_FAILED: &str = "client_init_rollback_failed";

    pub const SUBSCRIPTION_CREATED: &str = "subscription_created";
    pub const SUBSCRIPTION_ALREADY_EXISTS: &str = "subscription_already_exists";
    pub const SUBSCRIPTION_RETRY: &str = "subscription_retry";
    pub const SUBSCRIPTION_RETRY_EXHAUSTED: &str = "subscription_retry_exhausted";
    pub const SUBSCRIPTION_RETRY_INTERRUPTED: &str = "subscription_retry_interrupted";
    pub const SUBSCRIPTION_DELETED: &str = "subscription_deleted";
    pub const SUBSCRIPTION_DELETE_NOT_FOUND: &str = "subscription_delete_not_found";
    pub const SUBSCRIPTION_SCAN_TOPIC: &str = "subscription_scan_topic";

    pub const PRODUCER_CREATED: &str = "producer_created";
    pub const PRODUCER_CREATE_FAILED: &str = "producer_create_failed";
    pub const CONSUMER_CREATED: &str = "consumer_created";
    pub const CONSUMER_POLICY_REJECTED: &str = "consumer_policy_rejected";
    pub const BROWSER_CREATED: &str = "browser_created";

    pub const CLIENT_ID_REGISTERED: &str = "client_id_registered";
    pub const CLIENT_ID_UNREGISTERED: &str = "client_id_unregistered";

    pub const CONNECTION_CREATED: &str = "connection_created";
    pub const CONNECTION_CLOSED: &str = "connection_closed";
    pub const TEMPORARY_DESTINATION_DELETE_FAILED: &str = "temporary_destination_delete_failed";

    pub const CLOSE_SKIPPED_UNINITIALIZED: &str = "close_skipped_uninitialized";
    pub const CLOSE_REPEATED: &str = "close_repeated";
    pub const CLOSE_RESOURCE_FAILED: &str = "close_resource_failed";
    pub const CLOSE_COMPLETE: &str = "close_complete";
}

pub mod fields {
    use crate::data_plane::ProducerKey;
    use crate::routing::Destination;

    pub fn format_destination(destination: &Destination) -> String {
        format!("{}({})", destination.kind(), destination.name())
    }

    pub fn format_producer_key(key: &ProducerKey) -> String {
        format!("{}-{}", key.topic, key.transactional)
    }
}
