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

//! Sets of open handles, keyed by pointer identity.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

/// Compares and hashes a shared handle by the address of its allocation.
pub(crate) struct HandleKey<T: ?Sized> {
    handle: Arc<T>,
}

impl<T: ?Sized> HandleKey<T> {
    pub(crate) fn new(handle: Arc<T>) -> Self {
        Self { handle }
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.handle) as *const ()
    }
}

impl<T: ?Sized> Clone for HandleKey<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T: ?Sized> Hash for HandleKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T: ?Sized> PartialEq for HandleKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<T: ?Sized> Eq for HandleKey<T> {}

impl<T: ?Sized> Debug for HandleKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleKey")
            .field("address", &self.address())
            .finish()
    }
}

/// Open handles awaiting bulk teardown. Safe to mutate while a close drains it.
pub(crate) struct LiveSet<T: ?Sized> {
    handles: Mutex<HashSet<HandleKey<T>>>,
}

impl<T: ?Sized> Default for LiveSet<T> {
    fn default() -> Self {
        Self {
            handles: Mutex::new(HashSet::new()),
        }
    }
}

impl<T: ?Sized> LiveSet<T> {
    fn handles(&self) -> MutexGuard<'_, HashSet<HandleKey<T>>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn insert(&self, handle: Arc<T>) -> bool {
        self.handles().insert(HandleKey::new(handle))
    }

    /// Returns `false` when the handle was already removed.
    pub(crate) fn remove(&self, handle: &Arc<T>) -> bool {
        self.handles().remove(&HandleKey::new(handle.clone()))
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, handle: &Arc<T>) -> bool {
        self.handles().contains(&HandleKey::new(handle.clone()))
    }

    /// Empties the set and hands back its members.
    pub(crate) fn drain(&self) -> Vec<Arc<T>> {
        self.handles().drain().map(|key| key.handle).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.handles().len()
    }
}
