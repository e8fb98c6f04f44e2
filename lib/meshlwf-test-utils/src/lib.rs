// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests and benchmarks.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod bridge;
pub mod datagram;
pub mod host;
pub mod log;
pub mod message;

// Let's make our lives easier and pub use a bunch of stuff.
pub use bridge::*;
pub use datagram::*;
pub use host::*;
pub use log::*;
pub use message::*;
pub use meshlwf::api::CancelId;
pub use meshlwf::api::DatapathCfg;
pub use meshlwf::api::Direction;
pub use meshlwf::api::Ipv6Addr;
pub use meshlwf::api::NblStatus;
pub use meshlwf::api::PhyState;
pub use meshlwf::api::PortNumber;
pub use meshlwf::api::VerifyCfg;
pub use meshlwf::ddi::nbl::ETHER_TYPE_IPV6;
pub use meshlwf::ddi::nbl::Nbl;
pub use meshlwf::ddi::nbl::NblChain;
pub use meshlwf::ddi::nbl::NblFlags;
pub use meshlwf::ddi::nbl::NblPool;
pub use meshlwf::ddi::nbl::PoolLimits;
pub use meshlwf::engine::Datapath;
pub use meshlwf::engine::DatapathBuilder;
pub use meshlwf::engine::datapath::DatapathStatsSnap;
pub use meshlwf::engine::events::EventProcessor;
pub use meshlwf::engine::events::EventQueue;
pub use meshlwf::engine::filter::CachedAddrs;
pub use meshlwf::engine::filter::PhyStateCell;
pub use meshlwf::engine::host::ReceiveFlags;
pub use meshlwf::engine::host::ReturnFlags;
pub use meshlwf::engine::host::SendCompleteFlags;
pub use meshlwf::engine::host::SendFlags;
pub use meshlwf::engine::ip6::MLE_PORT;
pub use meshlwf::provider::LogLevel;
pub use meshlwf::provider::Providers;
pub use smoltcp::wire::IpProtocol;
pub use std::sync::Arc;

/// The link-local address of every [`TestBridge`] interface.
pub const LINK_LOCAL: Ipv6Addr =
    Ipv6Addr::from_const([0xfe80, 0, 0, 0, 0x1ab4, 0x3000, 0, 0x1]);

/// A mesh-local address the interface owns.
pub const MESH_LOCAL: Ipv6Addr =
    Ipv6Addr::from_const([0xfd00, 0xdb8, 0, 0, 0, 0xff, 0xfe00, 0x1c00]);

/// A neighbour on the mesh.
pub const PEER_LINK_LOCAL: Ipv6Addr =
    Ipv6Addr::from_const([0xfe80, 0, 0, 0, 0x1ab4, 0x3000, 0, 0x2]);

/// An address nobody on this interface owns.
pub const STRANGER: Ipv6Addr =
    Ipv6Addr::from_const([0xfd00, 0xdb8, 0, 0, 0, 0xff, 0xfe00, 0x4400]);

/// The channel [`rx_chain`] tags received frames with.
pub const TEST_CHANNEL: u8 = 15;

/// Build a chain of `count` received frames, each `len` bytes filled
/// with its index, tagged with `channel`.
pub fn rx_chain(
    pool: &NblPool,
    count: usize,
    len: usize,
    channel: Option<u8>,
) -> NblChain {
    (0..count)
        .map(|i| {
            let mut nbl = pool.alloc_nbl_with(&vec![i as u8; len]).unwrap();
            nbl.channel = channel;
            nbl
        })
        .collect()
}

/// Build a chain of frames to send, one per entry of `frames`, each
/// tagged with the given cancellation id.
pub fn tx_chain(
    pool: &NblPool,
    frames: &[(&[u8], Option<CancelId>)],
) -> NblChain {
    frames
        .iter()
        .map(|(data, id)| {
            let mut nbl = pool.alloc_nbl_with(data).unwrap();
            nbl.cancel_id = *id;
            nbl
        })
        .collect()
}
