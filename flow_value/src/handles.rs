// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stream handle table.
//!
//! Live streams cannot be copied into sandbox memory, so the sandbox sees a small integer
//! instead. The table is keyed by [`HostRef`] identity and assigns handles first-seen-wins from a
//! counter that only restarts on [`HandleTable::clear`].
//!
//! Entries are never refcounted or removed one by one. A program that keeps minting new streams
//! without reloading grows the table without bound; callers that care should watch
//! [`HandleTable::len`].

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::host::HostRef;

/// A stream handle as seen by the sandbox.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct StreamHandle(u32);

impl StreamHandle {
    /// Creates a handle from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer stored in the sandbox.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Identity-keyed map between host streams and sandbox handles.
#[derive(Debug, Default)]
pub struct HandleTable {
    // Holding the refs keeps every identity alive, so an address is never reused for another
    // stream while the entry exists.
    streams: Vec<HostRef>,
    by_identity: HashMap<usize, StreamHandle>,
}

impl HandleTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `stream`, assigning the next one on first sight.
    pub fn handle_for(&mut self, stream: &HostRef) -> StreamHandle {
        if let Some(handle) = self.by_identity.get(&stream.identity()) {
            return *handle;
        }
        let handle = StreamHandle(u32::try_from(self.streams.len()).unwrap_or(u32::MAX));
        self.streams.push(stream.clone());
        self.by_identity.insert(stream.identity(), handle);
        tracing::trace!(handle = handle.0, "assigned stream handle");
        handle
    }

    /// Returns the stream behind `handle`, if this table assigned it.
    #[must_use]
    pub fn stream_for(&self, handle: StreamHandle) -> Option<&HostRef> {
        self.streams.get(handle.0 as usize)
    }

    /// Drops every entry and restarts the handle counter.
    pub fn clear(&mut self) {
        self.streams.clear();
        self.by_identity.clear();
    }

    /// Number of assigned handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns `true` if no handles are assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
