// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A mesh stack message that counts how it was released.
use meshlwf::engine::mesh::Ip6Message;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

/// Counts shared by every [`TestMessage`] created from it.
#[derive(Debug, Default)]
pub struct MessageTracker {
    created: AtomicUsize,
    freed: AtomicUsize,
    leaked: AtomicUsize,
}

impl MessageTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.created.load(SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(SeqCst)
    }

    /// Messages dropped without being freed.
    pub fn leaked(&self) -> usize {
        self.leaked.load(SeqCst)
    }

    /// Return `true` if every message created was freed exactly once.
    pub fn balanced(&self) -> bool {
        self.leaked() == 0 && self.created() == self.freed()
    }
}

/// An [`Ip6Message`] over a byte vector.
#[derive(Debug)]
pub struct TestMessage {
    data: Vec<u8>,
    short_by: usize,
    freed: bool,
    tracker: Arc<MessageTracker>,
}

impl TestMessage {
    pub fn new(tracker: &Arc<MessageTracker>, data: Vec<u8>) -> Self {
        tracker.created.fetch_add(1, SeqCst);
        Self { data, short_by: 0, freed: false, tracker: tracker.clone() }
    }

    /// Make every read come back `n` bytes short.
    pub fn short_read(mut self, n: usize) -> Self {
        self.short_by = n;
        self
    }
}

impl Ip6Message for TestMessage {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> usize {
        let Some(src) = self.data.get(offset..) else {
            return 0;
        };
        let n = src.len().min(buf.len()).saturating_sub(self.short_by);
        buf[..n].copy_from_slice(&src[..n]);
        n
    }

    fn free(mut self) {
        self.freed = true;
        self.tracker.freed.fetch_add(1, SeqCst);
    }
}

impl Drop for TestMessage {
    fn drop(&mut self) {
        if !self.freed {
            self.tracker.leaked.fetch_add(1, SeqCst);
        }
    }
}
