// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The delivery filter, and the read-only views of interface state it
//! consults.
//!
//! A datagram from the mesh stack is only indicated upward if it is
//! addressed to this interface, i.e. to a multicast group or to an
//! address in the interface's cached set, and if it is not MLE traffic
//! between link-local neighbours.
use super::ip6::Ipv6HdrError;
use super::ip6::Ipv6Meta;
use crate::api::Ipv6Addr;
use crate::api::PhyState;
use crate::d_error::DError;
use crate::ddi::sync::KRwLock;
use core::sync::atomic::AtomicU8;
use core::sync::atomic::Ordering::SeqCst;
use smoltcp::wire::IpProtocol;

/// The set of IPv6 addresses the interface owns.
///
/// The set is maintained by the address-notification component. The
/// filter only ever asks about membership, and accepts whatever
/// snapshot it sees at that moment.
pub trait AddrCache: Send + Sync {
    fn contains(&self, addr: &Ipv6Addr) -> bool;
}

/// An [`AddrCache`] replaced wholesale on every update.
#[derive(Default)]
pub struct CachedAddrs {
    addrs: KRwLock<Vec<Ipv6Addr>>,
}

impl CachedAddrs {
    pub fn new(addrs: Vec<Ipv6Addr>) -> Self {
        Self { addrs: KRwLock::new(addrs) }
    }

    pub fn update(&self, addrs: Vec<Ipv6Addr>) {
        *self.addrs.write() = addrs;
    }

    pub fn snapshot(&self) -> Vec<Ipv6Addr> {
        self.addrs.read().clone()
    }
}

impl AddrCache for CachedAddrs {
    fn contains(&self, addr: &Ipv6Addr) -> bool {
        self.addrs.read().contains(addr)
    }
}

/// A read-only view of the radio's operational state.
pub trait PhyStateSource: Send + Sync {
    fn phy_state(&self) -> PhyState;
}

/// A [`PhyStateSource`] the lifecycle component writes to.
#[derive(Debug, Default)]
pub struct PhyStateCell {
    state: AtomicU8,
}

impl PhyStateCell {
    pub fn new(state: PhyState) -> Self {
        Self { state: AtomicU8::new(state as u8) }
    }

    pub fn set(&self, state: PhyState) {
        self.state.store(state as u8, SeqCst);
    }
}

impl PhyStateSource for PhyStateCell {
    fn phy_state(&self) -> PhyState {
        // Only `set` writes the cell, so the value is always valid.
        PhyState::from_u8(self.state.load(SeqCst)).unwrap_or_default()
    }
}

/// Why an inbound datagram was not indicated upward.
#[derive(Clone, Copy, Debug, DError, Eq, PartialEq)]
pub enum RecvDropReason {
    Malformed(Ipv6HdrError),
    AddrNotOwned,
    Mle,
}

/// Decide whether the datagram in `buf` is deliverable to an interface
/// with link-local address `link_local` and owned addresses `addrs`.
///
/// On success the parsed header is handed back for logging.
pub fn check_deliverable(
    buf: &[u8],
    link_local: &Ipv6Addr,
    addrs: &dyn AddrCache,
) -> Result<Ipv6Meta, RecvDropReason> {
    let meta = Ipv6Meta::parse(buf).map_err(RecvDropReason::Malformed)?;

    if !meta.dst.is_multicast() && !addrs.contains(&meta.dst) {
        return Err(RecvDropReason::AddrNotOwned);
    }

    if meta.next_hdr == IpProtocol::Udp
        && meta.dst == *link_local
        && meta.is_mle()
    {
        return Err(RecvDropReason::Mle);
    }

    Ok(meta)
}
