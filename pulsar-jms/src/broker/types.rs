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

//! Value types exchanged with the broker clients.

use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Position of a message in a topic log. Ordered by ledger, then entry.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId {
    pub ledger_id: u64,
    pub entry_id: u64,
}

impl MessageId {
    pub fn new(ledger_id: u64, entry_id: u64) -> Self {
        Self {
            ledger_id,
            entry_id,
        }
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ledger_id, self.entry_id)
    }
}

/// Cursor position used when creating subscriptions or readers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessagePosition {
    Earliest,
    Latest,
    At(MessageId),
}

impl Display for MessagePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagePosition::Earliest => write!(f, "earliest"),
            MessagePosition::Latest => write!(f, "latest"),
            MessagePosition::At(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SubscriptionMode {
    Durable,
    NonDurable,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SubscriptionType {
    Exclusive,
    Shared,
    Failover,
    KeyShared,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum InitialPosition {
    Earliest,
    Latest,
}

impl From<InitialPosition> for MessagePosition {
    fn from(position: InitialPosition) -> Self {
        match position {
            InitialPosition::Earliest => MessagePosition::Earliest,
            InitialPosition::Latest => MessagePosition::Latest,
        }
    }
}

/// Acknowledgement mode of the session asking for a consumer.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SessionMode {
    #[default]
    AutoAcknowledge,
    ClientAcknowledge,
    DupsOkAcknowledge,
    SessionTransacted,
}

/// A message as stored in the broker log.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub topic: String,
    pub payload: Vec<u8>,
    pub properties: Map<String, Value>,
}

/// A message handed to a producer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutgoingMessage {
    pub payload: Vec<u8>,
    pub properties: Map<String, Value>,
}

impl OutgoingMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}
