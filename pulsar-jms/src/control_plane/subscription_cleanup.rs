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

//! Deletion of durable subscriptions (JMS `unsubscribe`).

use crate::broker::{BrokerAdmin, BrokerError};
use crate::error::Result;
use crate::observability::events;
use tracing::{debug, info};

const COMPONENT: &str = "subscription_cleanup";

/// Deletes `subscription` from `topic`, forcing disconnection of attached consumers.
///
/// With no topic, every topic of `namespace` is scanned and each subscription carrying
/// the name is deleted. Returns whether anything was deleted; a missing topic or
/// subscription is logged and reported as `false`.
pub(crate) async fn delete_subscription(
    admin: &dyn BrokerAdmin,
    namespace: &str,
    topic: Option<&str>,
    subscription: &str,
) -> Result<bool> {
    match topic {
        Some(topic) => delete_one(admin, topic, subscription).await,
        None => delete_by_scan(admin, namespace, subscription).await,
    }
}

async fn delete_one(admin: &dyn BrokerAdmin, topic: &str, subscription: &str) -> Result<bool> {
    match admin.delete_subscription(topic, subscription, true).await {
        Ok(()) => {
            info!(
                event = events::SUBSCRIPTION_DELETED,
                component = COMPONENT,
                topic,
                subscription,
                "deleted subscription"
            );
            Ok(true)
        }
        Err(err) if err.is_not_found() => {
            log_not_found(topic, subscription, &err);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

// One list call per topic of the namespace.
async fn delete_by_scan(
    admin: &dyn BrokerAdmin,
    namespace: &str,
    subscription: &str,
) -> Result<bool> {
    let topics = match admin.list_topics(namespace).await {
        Ok(topics) => topics,
        Err(err) if err.is_not_found() => {
            log_not_found(namespace, subscription, &err);
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    };

    let mut deleted_any = false;
    for topic in topics {
        debug!(
            event = events::SUBSCRIPTION_SCAN_TOPIC,
            component = COMPONENT,
            topic = %topic,
            subscription,
            "scanning topic for subscription"
        );
        let subscriptions = match admin.list_subscriptions(&topic).await {
            Ok(subscriptions) => subscriptions,
            // the topic may have vanished since it was listed
            Err(err) if err.is_not_found() => continue,
            Err(err) => return Err(err.into()),
        };
        if subscriptions.iter().any(|name| name == subscription) {
            deleted_any |= delete_one(admin, &topic, subscription).await?;
        }
    }
    Ok(deleted_any)
}

fn log_not_found(scope: &str, subscription: &str, err: &BrokerError) {
    info!(
        event = events::SUBSCRIPTION_DELETE_NOT_FOUND,
        component = COMPONENT,
        scope,
        subscription,
        err = %err,
        "cannot unsubscribe, not found"
    );
}
