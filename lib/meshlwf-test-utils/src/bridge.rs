// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A datapath wired to recording collaborators.
use crate::LINK_LOCAL;
use crate::MESH_LOCAL;
use crate::host::TestHost;
use crate::log::CaptureLog;
use crate::log::test_logger;
use crate::message::MessageTracker;
use crate::message::TestMessage;
use meshlwf::api::DatapathCfg;
use meshlwf::api::PhyState;
use meshlwf::api::VerifyCfg;
use meshlwf::ddi::nbl::NblPool;
use meshlwf::ddi::nbl::PoolLimits;
use meshlwf::engine::Datapath;
use meshlwf::engine::DatapathBuilder;
use meshlwf::engine::events::EventQueue;
use meshlwf::engine::filter::CachedAddrs;
use meshlwf::engine::filter::PhyStateCell;
use meshlwf::provider::Providers;
use std::sync::Arc;

/// A [`Datapath`] plus handles on everything around it.
///
/// The interface owns [`LINK_LOCAL`] and [`MESH_LOCAL`], the radio is
/// receiving, and contract checks are on but not fatal.
pub struct TestBridge {
    pub dp: Datapath,
    pub pool: NblPool,
    pub host: Arc<TestHost>,
    pub events: Arc<EventQueue>,
    pub phy: Arc<PhyStateCell>,
    pub addrs: Arc<CachedAddrs>,
    pub log: CaptureLog,
    pub msgs: Arc<MessageTracker>,
}

impl TestBridge {
    pub fn new() -> Self {
        Self::with_cfg(Self::default_cfg(), PoolLimits::default())
    }

    pub fn default_cfg() -> DatapathCfg {
        DatapathCfg {
            verify: VerifyCfg::non_fatal(),
            ..Default::default()
        }
    }

    pub fn with_cfg(cfg: DatapathCfg, limits: PoolLimits) -> Self {
        let pool = NblPool::with_limits(limits);
        let host = Arc::new(TestHost::new());
        let events = Arc::new(EventQueue::new(host.clone()));
        let phy = Arc::new(PhyStateCell::new(PhyState::Receive));
        let addrs = Arc::new(CachedAddrs::new(vec![LINK_LOCAL, MESH_LOCAL]));
        let log = CaptureLog::with_echo(test_logger());

        let dp = DatapathBuilder::new(
            "mesh0",
            pool.clone(),
            host.clone(),
            events.clone(),
            phy.clone(),
        )
        .cfg(cfg)
        .link_local(LINK_LOCAL)
        .addrs(addrs.clone())
        .providers(Providers::new(Box::new(log.clone())))
        .build()
        .unwrap();

        Self {
            dp,
            pool,
            host,
            events,
            phy,
            addrs,
            log,
            msgs: MessageTracker::new(),
        }
    }

    /// Wrap `data` in a tracked mesh stack message.
    pub fn msg(&self, data: Vec<u8>) -> TestMessage {
        TestMessage::new(&self.msgs, data)
    }

    /// Hand `data` to the datapath as a datagram from the mesh stack.
    pub fn deliver(&self, data: Vec<u8>) {
        self.dp.receive_ip6_message(self.msg(data));
    }

    /// Give every chain the host holds back to the datapath.
    pub fn return_all(&self) {
        for chain in self.host.take_indicated() {
            self.dp.return_nbls(chain, Default::default());
        }
    }

    /// Drain both worker queues, freeing what was queued.
    pub fn drain_queues(&self) -> (usize, usize) {
        let mut counts = (0, 0);
        while let Some(q) = self.events.pop_ingress() {
            counts.0 += q.chain.len();
        }
        while let Some(q) = self.events.pop_egress() {
            counts.1 += q.chain.len();
        }
        counts
    }
}

impl Default for TestBridge {
    fn default() -> Self {
        Self::new()
    }
}
