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

//! Error taxonomy of the mapping layer.
//!
//! Broker failures are translated into [`Error::Broker`] at the boundary. The type is
//! `Clone` so one failed producer creation can be reported to every caller that was
//! waiting on it.

use crate::broker::{BrokerError, BrokerErrorKind};
use thiserror::Error;

/// Coarse status code for an [`Error`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorCode {
    InvalidArgument,
    FailedPrecondition,
    AlreadyExists,
    NotFound,
    PermissionDenied,
    Unavailable,
    DeadlineExceeded,
    Cancelled,
    Internal,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("Invalid configuration for '{key}': {reason}")]
    Config { key: String, reason: String },

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Invalid client id: {0}")]
    InvalidClientId(String),

    #[error("Security violation: {0}")]
    Security(String),

    #[error("Broker not ready for {destination} after {waited_ms}ms: {last_error}")]
    StartupTimeout {
        destination: String,
        waited_ms: u64,
        last_error: BrokerError,
    },

    #[error("Interrupted while waiting for the broker: {last_error}")]
    Interrupted { last_error: BrokerError },

    #[error("Connection factory is not initialized")]
    NotInitialized,

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

impl Error {
    pub(crate) fn config(key: &str, reason: impl Into<String>) -> Self {
        Error::Config {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn illegal_state(reason: impl Into<String>) -> Self {
        Error::IllegalState(reason.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Config { .. } => ErrorCode::InvalidArgument,
            Error::IllegalState(_) | Error::NotInitialized => ErrorCode::FailedPrecondition,
            Error::InvalidClientId(_) => ErrorCode::AlreadyExists,
            Error::Security(_) => ErrorCode::PermissionDenied,
            Error::StartupTimeout { .. } => ErrorCode::DeadlineExceeded,
            Error::Interrupted { .. } => ErrorCode::Cancelled,
            Error::Broker(err) => match err.kind {
                BrokerErrorKind::Conflict => ErrorCode::AlreadyExists,
                BrokerErrorKind::NotFound => ErrorCode::NotFound,
                BrokerErrorKind::Unavailable => ErrorCode::Unavailable,
                BrokerErrorKind::Unauthorized => ErrorCode::PermissionDenied,
                BrokerErrorKind::Closed => ErrorCode::FailedPrecondition,
                BrokerErrorKind::Other => ErrorCode::Internal,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
