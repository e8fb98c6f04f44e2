// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use criterion::measurement::Measurement;
use criterion::measurement::WallTime;
use meshlwf::engine::host::FilterHost;
use meshlwf::provider::LogProvider;
use meshlwf_test_utils::*;

/// Additional labelling information for [`Measurement`]s for
/// pretty-printing and grouping.
pub trait MeasurementInfo: Measurement {
    fn label() -> &'static str;
}

impl MeasurementInfo for WallTime {
    fn label() -> &'static str {
        "wallclock"
    }
}

/// A datagram class delivered from the mesh stack.
#[derive(Clone, Copy, Debug)]
pub enum Datagram {
    /// Multicast to all nodes; always indicated.
    AllNodes,
    /// Unicast to an owned mesh-local address.
    MeshLocal,
    /// Unicast to an address nobody owns; dropped by the filter.
    Stranger,
    /// MLE to the link-local address; dropped by the filter.
    Mle,
}

impl Datagram {
    pub const ALL: [Self; 4] =
        [Self::AllNodes, Self::MeshLocal, Self::Stranger, Self::Mle];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AllNodes => "all-nodes",
            Self::MeshLocal => "mesh-local",
            Self::Stranger => "stranger",
            Self::Mle => "mle",
        }
    }

    /// Build the datagram with a UDP body of `body_len` bytes.
    pub fn build(&self, body_len: usize) -> Vec<u8> {
        let body = vec![0x5a; body_len];
        let (dst, port) = match self {
            Self::AllNodes => (Ipv6Addr::ALL_NODES, 5683),
            Self::MeshLocal => (MESH_LOCAL, 5683),
            Self::Stranger => (STRANGER, 5683),
            Self::Mle => (LINK_LOCAL, MLE_PORT),
        };
        ip6_udp(PEER_LINK_LOCAL, dst, port, port, &body)
    }
}

/// A host that frees everything handed to it.
pub struct NullHost;

impl FilterHost for NullHost {
    fn indicate_receive(
        &self,
        _chain: NblChain,
        _port: PortNumber,
        _count: usize,
        _flags: ReceiveFlags,
    ) {
    }

    fn indicate_receive_resources(
        &self,
        _chain: &mut NblChain,
        _port: PortNumber,
        _count: usize,
        _flags: ReceiveFlags,
    ) {
    }

    fn return_nbls(&self, _chain: NblChain, _flags: ReturnFlags) {}

    fn send_complete(&self, _chain: NblChain, _flags: SendCompleteFlags) {}

    fn cancel_send(&self, _id: CancelId) {}
}

pub struct NullLog;

impl LogProvider for NullLog {
    fn log(&self, _level: LogLevel, _msg: &str) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// A datapath whose collaborators keep nothing, so that long benchmark
/// runs do not grow memory.
pub struct BenchPath {
    pub dp: Datapath,
    pub pool: NblPool,
    pub events: Arc<EventQueue>,
    pub msgs: Arc<MessageTracker>,
}

impl BenchPath {
    pub fn new(cfg: DatapathCfg) -> Self {
        let pool = NblPool::new();
        let host = Arc::new(NullHost);
        let events = Arc::new(EventQueue::new(host.clone()));
        let phy = Arc::new(PhyStateCell::new(PhyState::Receive));
        let addrs = Arc::new(CachedAddrs::new(vec![LINK_LOCAL, MESH_LOCAL]));

        let dp = DatapathBuilder::new(
            "bench0",
            pool.clone(),
            host,
            events.clone(),
            phy,
        )
        .cfg(cfg)
        .link_local(LINK_LOCAL)
        .addrs(addrs)
        .providers(Providers::new(Box::new(NullLog)))
        .build()
        .unwrap();

        Self { dp, pool, events, msgs: MessageTracker::new() }
    }

    pub fn msg(&self, data: Vec<u8>) -> TestMessage {
        TestMessage::new(&self.msgs, data)
    }
}
