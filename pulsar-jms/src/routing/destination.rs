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

//! Queue and topic destinations.

use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TOPIC_SCHEME_SEPARATOR: &str = "://";
const DEFAULT_TOPIC_DOMAIN: &str = "persistent";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DestinationKind {
    /// Competing consumers on one shared subscription.
    Queue,
    /// Broadcast: one subscription per consumer.
    Topic,
}

impl Display for DestinationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationKind::Queue => write!(f, "queue"),
            DestinationKind::Topic => write!(f, "topic"),
        }
    }
}

/// A named broker topic seen either as a queue or as a topic. Immutable.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Destination {
    kind: DestinationKind,
    name: String,
    temporary: bool,
}

impl Destination {
    pub fn queue(name: &str) -> Self {
        Self::build(DestinationKind::Queue, name.to_string(), false)
    }

    pub fn topic(name: &str) -> Self {
        Self::build(DestinationKind::Topic, name.to_string(), false)
    }

    /// A queue with a unique name, deleted when the owning connection closes.
    pub fn temporary_queue() -> Self {
        Self::build(
            DestinationKind::Queue,
            format!("jms-temp-queue-{}", Uuid::new_v4()),
            true,
        )
    }

    pub fn temporary_topic() -> Self {
        Self::build(
            DestinationKind::Topic,
            format!("jms-temp-topic-{}", Uuid::new_v4()),
            true,
        )
    }

    fn build(kind: DestinationKind, name: String, temporary: bool) -> Self {
        Self {
            kind,
            name,
            temporary,
        }
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_queue(&self) -> bool {
        self.kind == DestinationKind::Queue
    }

    pub fn is_topic(&self) -> bool {
        self.kind == DestinationKind::Topic
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Fully qualified broker topic name.
    ///
    /// `orders` becomes `persistent://<namespace>/orders`, `tenant/ns/orders` becomes
    /// `persistent://tenant/ns/orders`, and names carrying a scheme are kept as they are.
    pub fn topic_name(&self, namespace: &str) -> String {
        if self.name.contains(TOPIC_SCHEME_SEPARATOR) {
            self.name.clone()
        } else if self.name.contains('/') {
            format!("{DEFAULT_TOPIC_DOMAIN}{TOPIC_SCHEME_SEPARATOR}{}", self.name)
        } else {
            format!(
                "{DEFAULT_TOPIC_DOMAIN}{TOPIC_SCHEME_SEPARATOR}{namespace}/{}",
                self.name
            )
        }
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}
