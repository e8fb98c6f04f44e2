// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The mesh stack's message type.

/// An IPv6 datagram owned by the mesh stack.
///
/// The message is heap-owned by the mesh stack's allocator and must be
/// released exactly once, which [`Ip6Message::free`] enforces by
/// consuming it.
pub trait Ip6Message {
    /// The length of the datagram in bytes.
    fn len(&self) -> usize;

    /// Copy up to `buf.len()` bytes starting at `offset` into `buf`,
    /// returning the number of bytes copied.
    fn read(&self, offset: usize, buf: &mut [u8]) -> usize;

    /// Give the message back to the mesh stack.
    fn free(self);
}
