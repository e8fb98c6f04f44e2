// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The host framework, as seen from the filter.
use crate::api::CancelId;
use crate::api::PortNumber;
use crate::ddi::nbl::NblChain;
use bitflags::bitflags;

bitflags! {
    /// Flags accompanying a receive indication.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ReceiveFlags: u32 {
        /// The caller is running at dispatch level.
        const DISPATCH_LEVEL = 1 << 0;
        /// The indicating layer keeps ownership: the receiver only
        /// borrows the chain until the call returns.
        const RESOURCES = 1 << 1;
        /// The indicating layer cannot let the chain be queued.
        const CANNOT_PEND = 1 << 2;
    }
}

bitflags! {
    /// Flags accompanying a send request.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct SendFlags: u32 {
        const DISPATCH_LEVEL = 1 << 0;
    }
}

bitflags! {
    /// Flags accompanying a send completion.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct SendCompleteFlags: u32 {
        const DISPATCH_LEVEL = 1 << 0;
    }
}

bitflags! {
    /// Flags accompanying the return of received chains.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ReturnFlags: u32 {
        const DISPATCH_LEVEL = 1 << 0;
    }
}

impl From<ReceiveFlags> for ReturnFlags {
    fn from(flags: ReceiveFlags) -> Self {
        if flags.contains(ReceiveFlags::DISPATCH_LEVEL) {
            Self::DISPATCH_LEVEL
        } else {
            Self::empty()
        }
    }
}

impl From<SendFlags> for SendCompleteFlags {
    fn from(flags: SendFlags) -> Self {
        if flags.contains(SendFlags::DISPATCH_LEVEL) {
            Self::DISPATCH_LEVEL
        } else {
            Self::empty()
        }
    }
}

/// The calls a filter makes into the host framework.
///
/// Every method that takes a chain takes ownership of it. The single
/// exception is [`FilterHost::indicate_receive_resources`], where the
/// filter keeps the chain and the host may only look at it.
pub trait FilterHost: Send + Sync {
    /// Indicate received chains to the layer above.
    fn indicate_receive(
        &self,
        chain: NblChain,
        port: PortNumber,
        count: usize,
        flags: ReceiveFlags,
    );

    /// Indicate received chains to the layer above, which may only
    /// borrow them until the call returns. `flags` always includes
    /// [`ReceiveFlags::RESOURCES`].
    fn indicate_receive_resources(
        &self,
        chain: &mut NblChain,
        port: PortNumber,
        count: usize,
        flags: ReceiveFlags,
    );

    /// Return received chains to the layer below.
    fn return_nbls(&self, chain: NblChain, flags: ReturnFlags);

    /// Complete send requests back to the layer above.
    fn send_complete(&self, chain: NblChain, flags: SendCompleteFlags);

    /// Propagate a send cancellation to the layer below.
    fn cancel_send(&self, id: CancelId);
}
