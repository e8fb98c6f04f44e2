// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! meshlwf: the datapath of a lightweight filter that bridges a
//! link-layer driver stack and an embedded IPv6 mesh stack.
//!
//! Packets cross the bridge in two shapes. On the host side they are
//! chains of buffer-list nodes ([`ddi::nbl::NblChain`]) that move by
//! ownership between driver layers. On the mesh side they are discrete
//! IPv6 messages ([`engine::mesh::Ip6Message`]) owned by the mesh
//! stack. The [`engine::datapath::Datapath`] moves packets between the
//! two, filters what it delivers upward, and can be paused and resumed
//! while packets are in flight.

#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[macro_use]
extern crate cfg_if;

// This is needed so that the kstat-macro (`#[derive(KStatProvider)]`)
// can use fully-qualified type paths.
extern crate self as meshlwf;

pub use meshlwf_api as api;

pub mod d_error;
pub mod ddi;
pub mod engine;
pub mod provider;

// ================================================================
// DTrace USDT Provider
//
// Probes fire on the slow paths only: paused rejections and dropped
// datagrams.
// ================================================================
#[cfg(feature = "usdt")]
#[usdt::provider]
mod meshlwf_provider {
    fn ip6__drop(ifname: &str, reason: &str, len: u64) {}
    fn nbl__paused(ifname: &str, dir: &str, count: u64) {}
}

/// Register the USDT probes with the kernel, if enabled.
pub fn register_probes() {
    cfg_if! {
        if #[cfg(feature = "usdt")] {
            // A registration failure only means the probes are not
            // visible to DTrace.
            let _ = usdt::register_probes();
        }
    }
}

pub(crate) fn ip6_drop_probe<R: core::fmt::Display>(
    ifname: &str,
    reason: &R,
    len: u64,
) {
    cfg_if! {
        if #[cfg(feature = "usdt")] {
            let reason_s = reason.to_string();
            meshlwf_provider::ip6__drop!(|| (ifname, reason_s, len));
        } else {
            let (_, _, _) = (ifname, reason, len);
        }
    }
}

pub(crate) fn nbl_paused_probe(ifname: &str, dir: api::Direction, count: u64) {
    cfg_if! {
        if #[cfg(feature = "usdt")] {
            let dir = match dir {
                api::Direction::In => "in",
                api::Direction::Out => "out",
            };
            meshlwf_provider::nbl__paused!(|| (ifname, dir, count));
        } else {
            let (_, _, _) = (ifname, dir, count);
        }
    }
}
