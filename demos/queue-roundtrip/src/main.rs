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

//! Sends a batch of messages to a queue and drains it with competing consumers.

use clap::Parser;
use in_memory_broker::InMemoryBroker;
use pulsar_jms::broker::{
    Consumer, OutgoingMessage, SessionMode, SubscriptionMode, SubscriptionType,
};
use pulsar_jms::{ConnectionFactory, Destination, Result};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "queue-roundtrip")]
#[command(about = "Send messages to a queue and drain them with competing consumers")]
struct Cli {
    /// Queue to send to.
    #[arg(long, default_value = "IN_QUEUE")]
    queue: String,
    #[arg(long, default_value_t = 100)]
    messages: usize,
    #[arg(long, default_value_t = 2)]
    consumers: usize,
    /// A consumer stops once nothing arrived for this long.
    #[arg(long, default_value_t = 200)]
    idle_timeout_ms: u64,
    /// Factory configuration as a JSON object.
    #[arg(long, default_value = "{}")]
    config: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(received) if received == cli.messages => ExitCode::SUCCESS,
        Ok(received) => {
            eprintln!("sent {} messages but received {received}", cli.messages);
            ExitCode::from(1)
        }
        Err(error) => {
            eprintln!("queue-roundtrip failed: {error}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> Result<usize> {
    let factory = Arc::new(ConnectionFactory::from_json(
        &cli.config,
        Arc::new(InMemoryBroker::new()),
    )?);
    let connection = factory.create_connection().await?;
    let queue = Destination::queue(&cli.queue);

    let mut consumers = Vec::with_capacity(cli.consumers);
    for index in 0..cli.consumers {
        let consumer = connection
            .create_consumer(
                &queue,
                &format!("worker-{index}"),
                SessionMode::AutoAcknowledge,
                SubscriptionMode::Durable,
                SubscriptionType::Shared,
            )
            .await?;
        consumers.push(consumer);
    }

    let producer = connection.producer(&queue, false).await?;
    for sequence in 0..cli.messages {
        producer
            .send(
                OutgoingMessage::new(format!("message {sequence}"))
                    .with_property("sequence", sequence),
            )
            .await?;
    }
    info!(queue = %cli.queue, messages = cli.messages, "sent");

    let idle = Duration::from_millis(cli.idle_timeout_ms);
    let workers: Vec<_> = consumers
        .into_iter()
        .enumerate()
        .map(|(index, consumer)| tokio::spawn(drain(index, consumer, idle)))
        .collect();

    let mut received = 0;
    for worker in workers {
        match worker.await {
            Ok(count) => received += count?,
            Err(join) => eprintln!("consumer task failed: {join}"),
        }
    }
    info!(queue = %cli.queue, received, "drained");

    connection.close().await?;
    factory.close().await?;
    Ok(received)
}

async fn drain(index: usize, consumer: Arc<dyn Consumer>, idle: Duration) -> Result<usize> {
    let mut count = 0;
    while let Some(message) = consumer.receive(idle).await? {
        consumer.acknowledge(&message.id).await?;
        count += 1;
    }
    info!(consumer = index, count, "consumer drained");
    Ok(count)
}
