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

//! Topic logs and subscription cursors. Pure bookkeeping, no waiting.

use pulsar_jms::broker::{
    BrokerError, BrokerErrorKind, BrokerResult, Message, MessageId, MessagePosition,
    OutgoingMessage, SubscriptionMode, SubscriptionType,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::time::Instant;

/// Outcome of asking a subscription for the next message.
pub(crate) enum Dispatch {
    Message(Message),
    /// Nothing deliverable now; a negatively acknowledged message becomes due at the
    /// given instant, if any.
    Idle(Option<Instant>),
}

#[derive(Debug)]
struct Cursor {
    mode: SubscriptionMode,
    subscription_type: Option<SubscriptionType>,
    /// Mark-delete position: entries before it are never visible.
    start: usize,
    /// Next entry that was never dispatched.
    read_position: usize,
    acked: BTreeSet<usize>,
    /// Dispatched but unacknowledged entries and the consumer holding them.
    pending: HashMap<usize, u64>,
    redeliveries: Vec<(usize, Instant)>,
    consumers: BTreeSet<u64>,
}

impl Cursor {
    fn new(mode: SubscriptionMode, start: usize) -> Self {
        Self {
            mode,
            subscription_type: None,
            start,
            read_position: start,
            acked: BTreeSet::new(),
            pending: HashMap::new(),
            redeliveries: Vec::new(),
            consumers: BTreeSet::new(),
        }
    }

    fn next_entry(&mut self, consumer: u64, now: Instant, log_len: usize) -> Option<usize> {
        let due = self
            .redeliveries
            .iter()
            .enumerate()
            .filter(|(_, (_, at))| *at <= now)
            .min_by_key(|(_, (entry, _))| *entry)
            .map(|(slot, _)| slot);
        if let Some(slot) = due {
            let (entry, _) = self.redeliveries.remove(slot);
            self.pending.insert(entry, consumer);
            return Some(entry);
        }

        while self.read_position < log_len {
            let entry = self.read_position;
            self.read_position += 1;
            if !self.acked.contains(&entry) {
                self.pending.insert(entry, consumer);
                return Some(entry);
            }
        }
        None
    }

    fn next_redelivery(&self) -> Option<Instant> {
        self.redeliveries.iter().map(|(_, at)| *at).min()
    }

    fn unacked(&self, log_len: usize) -> impl Iterator<Item = usize> + '_ {
        (self.start..log_len).filter(move |entry| !self.acked.contains(entry))
    }

    fn detach(&mut self, consumer: u64, now: Instant) {
        self.consumers.remove(&consumer);
        let held: Vec<usize> = self
            .pending
            .iter()
            .filter(|(_, holder)| **holder == consumer)
            .map(|(entry, _)| *entry)
            .collect();
        for entry in held {
            self.pending.remove(&entry);
            self.redeliveries.push((entry, now));
        }
        if self.consumers.is_empty() {
            self.subscription_type = None;
        }
    }
}

#[derive(Debug)]
struct TopicLog {
    ledger_id: u64,
    entries: Vec<Message>,
    subscriptions: BTreeMap<String, Cursor>,
}

impl TopicLog {
    fn entry_of(&self, id: &MessageId) -> Option<usize> {
        if id.ledger_id != self.ledger_id {
            return None;
        }
        usize::try_from(id.entry_id)
            .ok()
            .filter(|entry| *entry < self.entries.len())
    }

    fn position(&self, position: MessagePosition) -> usize {
        match position {
            MessagePosition::Earliest => 0,
            MessagePosition::Latest => self.entries.len(),
            MessagePosition::At(id) => self.entry_of(&id).unwrap_or(self.entries.len()),
        }
    }
}

/// Every topic of the broker plus the counters tests inspect.
#[derive(Debug, Default)]
pub(crate) struct BrokerState {
    topics: BTreeMap<String, TopicLog>,
    next_ledger_id: u64,
    next_consumer_id: u64,
    pub(crate) admin_failures: usize,
    pub(crate) producers_created: usize,
    pub(crate) connects: usize,
}

impl BrokerState {
    fn topic_or_create(&mut self, topic: &str) -> &mut TopicLog {
        let next_ledger_id = &mut self.next_ledger_id;
        self.topics.entry(topic.to_string()).or_insert_with(|| {
            *next_ledger_id += 1;
            TopicLog {
                ledger_id: *next_ledger_id,
                entries: Vec::new(),
                subscriptions: BTreeMap::new(),
            }
        })
    }

    fn topic(&self, topic: &str) -> BrokerResult<&TopicLog> {
        self.topics
            .get(topic)
            .ok_or_else(|| BrokerError::not_found(format!("topic {topic} does not exist")))
    }

    fn cursor_mut(&mut self, topic: &str, subscription: &str) -> BrokerResult<&mut Cursor> {
        self.topics
            .get_mut(topic)
            .and_then(|log| log.subscriptions.get_mut(subscription))
            .ok_or_else(|| {
                BrokerError::not_found(format!("subscription {subscription} on {topic}"))
            })
    }

    /// Consumes one scripted admin failure, if any are left.
    pub(crate) fn admin_call(&mut self) -> BrokerResult<()> {
        if self.admin_failures > 0 {
            self.admin_failures -= 1;
            return Err(BrokerError::unavailable("namespace is not served yet"));
        }
        Ok(())
    }

    pub(crate) fn append(&mut self, topic: &str, message: OutgoingMessage) -> MessageId {
        let log = self.topic_or_create(topic);
        let id = MessageId::new(log.ledger_id, log.entries.len() as u64);
        log.entries.push(Message {
            id,
            topic: topic.to_string(),
            payload: message.payload,
            properties: message.properties,
        });
        id
    }

    pub(crate) fn create_subscription(
        &mut self,
        topic: &str,
        subscription: &str,
        position: MessagePosition,
    ) -> BrokerResult<()> {
        let log = self.topic_or_create(topic);
        if log.subscriptions.contains_key(subscription) {
            return Err(BrokerError::conflict(format!(
                "subscription {subscription} already exists on {topic}"
            )));
        }
        let start = log.position(position);
        log.subscriptions.insert(
            subscription.to_string(),
            Cursor::new(SubscriptionMode::Durable, start),
        );
        Ok(())
    }

    /// Attaches a new consumer, creating the subscription at `position` when absent.
    pub(crate) fn attach(
        &mut self,
        topic: &str,
        subscription: &str,
        mode: SubscriptionMode,
        subscription_type: SubscriptionType,
        position: MessagePosition,
    ) -> BrokerResult<u64> {
        let log = self.topic_or_create(topic);
        let start = log.position(position);
        let cursor = log
            .subscriptions
            .entry(subscription.to_string())
            .or_insert_with(|| Cursor::new(mode, start));

        match cursor.subscription_type {
            Some(current) if current != subscription_type => {
                return Err(BrokerError::conflict(format!(
                    "subscription {subscription} is {current:?}, not {subscription_type:?}"
                )));
            }
            Some(SubscriptionType::Exclusive | SubscriptionType::Failover) => {
                return Err(BrokerError::conflict(format!(
                    "subscription {subscription} already has a consumer"
                )));
            }
            _ => {}
        }

        self.next_consumer_id += 1;
        let consumer = self.next_consumer_id;
        let cursor = self.cursor_mut(topic, subscription)?;
        cursor.subscription_type = Some(subscription_type);
        cursor.consumers.insert(consumer);
        Ok(consumer)
    }

    /// Detaches `consumer`, handing its unacknowledged messages back to the
    /// subscription. A non-durable subscription goes away with its last consumer.
    pub(crate) fn detach(&mut self, topic: &str, subscription: &str, consumer: u64) {
        let Some(log) = self.topics.get_mut(topic) else {
            return;
        };
        let Some(cursor) = log.subscriptions.get_mut(subscription) else {
            return;
        };
        cursor.detach(consumer, Instant::now());
        if cursor.consumers.is_empty() && cursor.mode == SubscriptionMode::NonDurable {
            log.subscriptions.remove(subscription);
        }
    }

    pub(crate) fn dispatch(
        &mut self,
        topic: &str,
        subscription: &str,
        consumer: u64,
        now: Instant,
    ) -> BrokerResult<Dispatch> {
        let log = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| BrokerError::closed(format!("topic {topic} was deleted")))?;
        let cursor = log
            .subscriptions
            .get_mut(subscription)
            .filter(|cursor| cursor.consumers.contains(&consumer))
            .ok_or_else(|| BrokerError::closed("consumer was disconnected by the broker"))?;

        Ok(match cursor.next_entry(consumer, now, log.entries.len()) {
            Some(entry) => Dispatch::Message(log.entries[entry].clone()),
            None => Dispatch::Idle(cursor.next_redelivery()),
        })
    }

    pub(crate) fn acknowledge(&mut self, topic: &str, subscription: &str, id: &MessageId) {
        let Some(log) = self.topics.get_mut(topic) else {
            return;
        };
        let Some(entry) = log.entry_of(id) else {
            return;
        };
        if let Some(cursor) = log.subscriptions.get_mut(subscription) {
            cursor.pending.remove(&entry);
            cursor.redeliveries.retain(|(pending, _)| *pending != entry);
            cursor.acked.insert(entry);
        }
    }

    pub(crate) fn negative_acknowledge(
        &mut self,
        topic: &str,
        subscription: &str,
        id: &MessageId,
        redeliver_at: Instant,
    ) {
        let Some(log) = self.topics.get_mut(topic) else {
            return;
        };
        let Some(entry) = log.entry_of(id) else {
            return;
        };
        if let Some(cursor) = log.subscriptions.get_mut(subscription) {
            if cursor.pending.remove(&entry).is_some() {
                cursor.redeliveries.push((entry, redeliver_at));
            }
        }
    }

    pub(crate) fn delete_subscription(
        &mut self,
        topic: &str,
        subscription: &str,
        force: bool,
    ) -> BrokerResult<()> {
        let cursor = self.cursor_mut(topic, subscription)?;
        if !cursor.consumers.is_empty() && !force {
            return Err(BrokerError::new(
                BrokerErrorKind::Other,
                format!("subscription {subscription} has active consumers"),
            ));
        }
        if let Some(log) = self.topics.get_mut(topic) {
            log.subscriptions.remove(subscription);
        }
        Ok(())
    }

    pub(crate) fn delete_topic(&mut self, topic: &str, force: bool) -> BrokerResult<()> {
        let log = self.topic(topic)?;
        let attached = log
            .subscriptions
            .values()
            .any(|cursor| !cursor.consumers.is_empty());
        if attached && !force {
            return Err(BrokerError::new(
                BrokerErrorKind::Other,
                format!("topic {topic} has active consumers"),
            ));
        }
        self.topics.remove(topic);
        Ok(())
    }

    pub(crate) fn topics_in(&self, namespace: &str) -> Vec<String> {
        let prefix = format!("persistent://{namespace}/");
        self.topics
            .keys()
            .filter(|topic| topic.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub(crate) fn subscriptions_of(&self, topic: &str) -> BrokerResult<Vec<String>> {
        Ok(self.topic(topic)?.subscriptions.keys().cloned().collect())
    }

    pub(crate) fn peek(
        &self,
        topic: &str,
        subscription: &str,
        count: usize,
    ) -> BrokerResult<Vec<Message>> {
        let log = self.topic(topic)?;
        let cursor = log.subscriptions.get(subscription).ok_or_else(|| {
            BrokerError::not_found(format!("subscription {subscription} on {topic}"))
        })?;
        Ok(cursor
            .unacked(log.entries.len())
            .take(count)
            .map(|entry| log.entries[entry].clone())
            .collect())
    }

    pub(crate) fn backlog(&self, topic: &str, subscription: &str) -> Option<usize> {
        let log = self.topics.get(topic)?;
        let cursor = log.subscriptions.get(subscription)?;
        Some(cursor.unacked(log.entries.len()).count())
    }

    /// Log index where a reader starts.
    pub(crate) fn reader_start(
        &mut self,
        topic: &str,
        position: MessagePosition,
        inclusive: bool,
    ) -> usize {
        let log = self.topic_or_create(topic);
        match position {
            MessagePosition::At(id) => match log.entry_of(&id) {
                Some(entry) if inclusive => entry,
                Some(entry) => entry + 1,
                None => log.entries.len(),
            },
            other => log.position(other),
        }
    }

    /// Entry at `index`; `Err(Closed)` once the topic is gone.
    pub(crate) fn read(&self, topic: &str, index: usize) -> BrokerResult<Option<Message>> {
        let log = self
            .topics
            .get(topic)
            .ok_or_else(|| BrokerError::closed(format!("topic {topic} was deleted")))?;
        Ok(log.entries.get(index).cloned())
    }

    pub(crate) fn topic_names(&self) -> Vec<String> {
        self.topics.keys().cloned().collect()
    }
}
