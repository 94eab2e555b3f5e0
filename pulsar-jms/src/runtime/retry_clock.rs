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

//! Clock and sleep used by the startup retry loop.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// The sleep was cut short by [`RetryClock::interrupt`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Interrupted;

#[async_trait]
pub trait RetryClock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;

    /// Aborts every current and future sleep.
    fn interrupt(&self);
}

/// Wall clock backed by `tokio::time`, interruptible once.
pub struct TokioRetryClock {
    interrupted: watch::Sender<bool>,
}

impl TokioRetryClock {
    pub fn new() -> Self {
        let (interrupted, _) = watch::channel(false);
        Self { interrupted }
    }
}

impl Default for TokioRetryClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetryClock for TokioRetryClock {
    fn now(&self) -> Instant {
        // follows a paused tokio clock in tests
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let mut interrupted = self.interrupted.subscribe();
        if *interrupted.borrow_and_update() {
            return Err(Interrupted);
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = interrupted.wait_for(|flag| *flag) => Err(Interrupted),
        }
    }

    fn interrupt(&self) {
        self.interrupted.send_replace(true);
    }
}
