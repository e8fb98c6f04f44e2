// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The datapath of a single attached interface.
//!
//! Chains arrive from two directions. The layer below indicates
//! received frames ([`Datapath::receive_nbls`]) and the layer above
//! asks for frames to be sent ([`Datapath::send_nbls`]). Both are
//! queued for the worker thread. Going the other way, the mesh stack
//! hands over IPv6 datagrams ([`Datapath::receive_ip6_message`]) which
//! are copied into fresh chains, filtered, and indicated upward.
//!
//! Everything except [`Datapath::disable`] runs without blocking and
//! may be called from any number of contexts at once.
use super::events::EventProcessor;
use super::events::QueuedNbls;
use super::filter;
use super::filter::AddrCache;
use super::filter::CachedAddrs;
use super::filter::PhyStateSource;
use super::filter::RecvDropReason;
use super::host::FilterHost;
use super::host::ReceiveFlags;
use super::host::ReturnFlags;
use super::host::SendCompleteFlags;
use super::host::SendFlags;
use super::mesh::Ip6Message;
use super::verify::Verifier;
use super::verify::Violation;
use crate::api::CancelId;
use crate::api::DatapathCfg;
use crate::api::Direction;
use crate::api::Ipv6Addr;
use crate::api::NblStatus;
use crate::api::PhyState;
use crate::api::PortNumber;
use crate::d_error;
use crate::d_error::DError;
use crate::ddi::kstat;
use crate::ddi::kstat::KStatNamed;
use crate::ddi::kstat::KStatProvider;
use crate::ddi::kstat::KStatU64;
use crate::ddi::nbl::ETHER_TYPE_IPV6;
use crate::ddi::nbl::NblChain;
use crate::ddi::nbl::NblError;
use crate::ddi::nbl::NblFlags;
use crate::ddi::nbl::NblId;
use crate::ddi::nbl::NblPool;
use crate::ddi::sync::KCondvar;
use crate::ddi::sync::KMutex;
use crate::ddi::sync::Rundown;
use crate::provider;
use crate::provider::LogLevel;
use crate::provider::LogProvider;
use crate::provider::Providers;
use core::fmt;
use core::time::Duration;
use std::sync::Arc;

#[derive(KStatProvider)]
pub struct DatapathStats {
    /// Received nodes queued for the worker.
    pub rx_queued: KStatU64,
    /// Received nodes returned as paused.
    pub rx_paused: KStatU64,
    /// Received nodes refused because they could not be queued.
    pub rx_not_supported: KStatU64,
    /// Indicated nodes reclaimed from the layer above.
    pub rx_returned: KStatU64,
    /// Reclaimed nodes carrying a failure status.
    pub rx_return_failed: KStatU64,

    pub tx_queued: KStatU64,
    pub tx_paused: KStatU64,
    pub tx_complete: KStatU64,
    pub cancel_req: KStatU64,

    /// Datagrams from the mesh stack indicated upward.
    pub ip6_indicated: KStatU64,
    pub ip6_drop_alloc: KStatU64,
    pub ip6_drop_resources: KStatU64,
    pub ip6_drop_contig: KStatU64,
    pub ip6_drop_short_read: KStatU64,
    pub ip6_drop_malformed: KStatU64,
    pub ip6_drop_addr: KStatU64,
    pub ip6_drop_mle: KStatU64,

    pub verify_fail: KStatU64,
}

/// Why a datagram from the mesh stack was not indicated upward.
#[derive(Clone, Copy, Debug, DError, Eq, PartialEq)]
#[derror(leaf_data = DeliverError::data)]
pub enum DeliverError {
    NoNbl,
    Resources { need: usize },
    NotContiguous { len: usize },
    ShortRead { expected: usize, got: usize },
    Filtered(RecvDropReason),
}

impl DeliverError {
    fn data(&self, data: &mut [u64]) {
        match self {
            Self::Resources { need } => data[0] = *need as u64,
            Self::NotContiguous { len } => data[0] = *len as u64,
            Self::ShortRead { expected, got } => {
                [data[0], data[1]] = [*expected as u64, *got as u64];
            }
            Self::NoNbl | Self::Filtered(_) => {}
        }
    }
}

impl fmt::Display for DeliverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", d_error::path(self))
    }
}

/// The rendezvous between a worker performing a synchronous send and
/// the completion path.
///
/// The worker arms the rendezvous with the id of the head node it is
/// about to send, passes the chain down, then waits. The completion
/// path deposits the chain and wakes the worker, which takes ownership
/// back.
#[derive(Default)]
pub struct SendCompletion {
    state: KMutex<SendState>,
    done: KCondvar,
}

#[derive(Default)]
struct SendState {
    armed: Option<NblId>,
    chain: Option<NblChain>,
}

impl SendCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a completion for the chain headed by `id`. Any completed
    /// chain not yet collected is freed.
    pub fn arm(&self, id: NblId) {
        let mut state = self.state.lock();
        state.armed = Some(id);
        state.chain = None;
    }

    /// The head node id of the send in flight, if any.
    pub fn armed(&self) -> Option<NblId> {
        self.state.lock().armed
    }

    /// Deposit a completed chain and wake the waiter.
    pub fn complete(&self, chain: NblChain) {
        let mut state = self.state.lock();
        state.chain = Some(chain);
        drop(state);
        self.done.notify_all();
    }

    /// Block until the completed chain arrives, then take it.
    pub fn wait(&self) -> NblChain {
        let mut state = self.state.lock();
        loop {
            if let Some(chain) = state.chain.take() {
                state.armed = None;
                return chain;
            }
            state = self.done.wait(state);
        }
    }

    /// Like [`Self::wait`], giving up after `timeout`. The rendezvous
    /// stays armed on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<NblChain> {
        let mut state = self.state.lock();
        let mut timed_out = false;
        loop {
            if let Some(chain) = state.chain.take() {
                state.armed = None;
                return Some(chain);
            }

            if timed_out {
                return None;
            }

            (state, timed_out) = self.done.wait_timeout(state, timeout);
        }
    }
}

/// Build a [`Datapath`].
pub struct DatapathBuilder {
    name: String,
    cfg: DatapathCfg,
    pool: NblPool,
    host: Arc<dyn FilterHost>,
    events: Arc<dyn EventProcessor>,
    link_local: Ipv6Addr,
    addrs: Arc<dyn AddrCache>,
    phy: Arc<dyn PhyStateSource>,
    providers: Providers,
}

impl DatapathBuilder {
    pub fn new(
        name: &str,
        pool: NblPool,
        host: Arc<dyn FilterHost>,
        events: Arc<dyn EventProcessor>,
        phy: Arc<dyn PhyStateSource>,
    ) -> Self {
        Self {
            name: name.to_string(),
            cfg: DatapathCfg::default(),
            pool,
            host,
            events,
            link_local: Ipv6Addr::ANY_ADDR,
            addrs: Arc::new(CachedAddrs::default()),
            phy,
            providers: Providers::default(),
        }
    }

    pub fn cfg(mut self, cfg: DatapathCfg) -> Self {
        self.cfg = cfg;
        self
    }

    /// The interface's link-local address, the destination of MLE.
    pub fn link_local(mut self, addr: Ipv6Addr) -> Self {
        self.link_local = addr;
        self
    }

    pub fn addrs(mut self, addrs: Arc<dyn AddrCache>) -> Self {
        self.addrs = addrs;
        self
    }

    pub fn providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    pub fn build(self) -> Result<Datapath, kstat::Error> {
        let stats =
            KStatNamed::new("meshlwf", &self.name, DatapathStats::new())?;
        let verifier = Verifier::new(self.cfg.verify.clone());

        Ok(Datapath {
            name: self.name,
            cfg: self.cfg,
            rundown: Rundown::new(),
            pool: self.pool,
            host: self.host,
            events: self.events,
            link_local: self.link_local,
            addrs: self.addrs,
            phy: self.phy,
            send_done: SendCompletion::new(),
            stats,
            log: self.providers.log,
            verifier,
        })
    }
}

/// The datapath of an attached interface.
pub struct Datapath {
    name: String,
    cfg: DatapathCfg,
    rundown: Rundown,
    pool: NblPool,
    host: Arc<dyn FilterHost>,
    events: Arc<dyn EventProcessor>,
    link_local: Ipv6Addr,
    addrs: Arc<dyn AddrCache>,
    phy: Arc<dyn PhyStateSource>,
    send_done: SendCompletion,
    stats: KStatNamed<DatapathStats>,
    log: Box<dyn LogProvider>,
    verifier: Verifier,
}

impl Datapath {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cfg(&self) -> &DatapathCfg {
        &self.cfg
    }

    pub fn pool(&self) -> &NblPool {
        &self.pool
    }

    /// The rendezvous the worker uses for synchronous sends.
    pub fn send_completion(&self) -> &SendCompletion {
        &self.send_done
    }

    pub fn stats(&self) -> &DatapathStats {
        &self.stats.vals
    }

    pub fn stats_snap(&self) -> DatapathStatsSnap {
        self.stats.vals.snapshot()
    }

    /// Return `true` if the datapath is refusing new operations.
    pub fn is_paused(&self) -> bool {
        self.rundown.is_draining()
    }

    /// The number of entry points currently inside the guard.
    #[cfg(any(feature = "test-help", test))]
    pub fn ops_in_flight(&self) -> usize {
        self.rundown.outstanding()
    }

    fn log(&self, level: LogLevel, msg: fmt::Arguments) {
        if self.log.enabled(level) {
            self.log.log(level, &format!("{}: {}", self.name, msg));
        }
    }

    fn violation(&self, v: Violation) {
        self.verifier.report(
            &self.name,
            self.log.as_ref(),
            &self.stats.vals.verify_fail,
            &v,
        );
    }

    /// Let datapath operations proceed again after [`Self::disable`].
    /// Enabling an enabled datapath does nothing.
    pub fn enable(&self) {
        self.rundown.reinit();
        self.log(LogLevel::Note, format_args!("datapath enabled"));
    }

    /// Refuse new datapath operations, and block until every
    /// operation already in progress has finished.
    pub fn disable(&self) {
        self.log(LogLevel::Note, format_args!("datapath disabling"));
        self.rundown.wait_for_release();
        self.log(LogLevel::Note, format_args!("datapath disabled"));
    }

    /// Accept chains indicated by the layer below.
    ///
    /// If the caller cannot let the chain be queued, every node is
    /// marked [`NblStatus::NotSupported`] and the chain is handed
    /// straight back: the return value is `Some` in that case only.
    /// Otherwise the datapath owns the chain from here on.
    pub fn receive_nbls(
        &self,
        mut chain: NblChain,
        port: PortNumber,
        count: usize,
        flags: ReceiveFlags,
    ) -> Option<NblChain> {
        let n = chain.len() as u64;
        if flags.contains(ReceiveFlags::CANNOT_PEND) {
            chain.set_status_all(NblStatus::NotSupported);
            self.stats.vals.rx_not_supported.add(n);
            self.log(
                LogLevel::Verbose,
                format_args!("refusing {count} unqueueable rx nbls"),
            );
            return Some(chain);
        }

        // A disabled radio short-circuits the guard.
        let guard = match self.phy.phy_state() {
            PhyState::Disabled => None,
            _ => self.rundown.enter(),
        };

        let Some(_guard) = guard else {
            chain.set_status_all(NblStatus::Paused);
            self.stats.vals.rx_paused.add(n);
            self.log(
                LogLevel::Verbose,
                format_args!("paused, returning {count} rx nbls"),
            );
            crate::nbl_paused_probe(&self.name, Direction::In, n);
            self.host.return_nbls(chain, ReturnFlags::from(flags));
            return None;
        };

        if self.verifier.channels() {
            for nbl in chain.iter() {
                if let Err(v) = Violation::check_channel(nbl.channel) {
                    self.violation(v);
                }
            }
        }

        self.stats.vals.rx_queued.add(n);
        self.events.indicate_new_nbls(QueuedNbls {
            chain,
            dir: Direction::In,
            port,
            dispatch: flags.contains(ReceiveFlags::DISPATCH_LEVEL),
        });
        None
    }

    /// Accept chains to be sent from the layer above. The datapath
    /// owns the chain from here on; it comes back up through the
    /// host's send completion.
    pub fn send_nbls(
        &self,
        mut chain: NblChain,
        port: PortNumber,
        flags: SendFlags,
    ) {
        let n = chain.len() as u64;
        let Some(_guard) = self.rundown.enter() else {
            chain.set_status_all(NblStatus::Paused);
            self.stats.vals.tx_paused.add(n);
            self.log(
                LogLevel::Verbose,
                format_args!("paused, completing {n} tx nbls"),
            );
            crate::nbl_paused_probe(&self.name, Direction::Out, n);
            self.host.send_complete(chain, SendCompleteFlags::from(flags));
            return;
        };

        self.stats.vals.tx_queued.add(n);
        self.events.indicate_new_nbls(QueuedNbls {
            chain,
            dir: Direction::Out,
            port,
            dispatch: flags.contains(SendFlags::DISPATCH_LEVEL),
        });
    }

    /// The layer below completed a send the worker made. Hand the
    /// chain back to the worker waiting on [`Self::send_completion`].
    pub fn send_nbls_complete(
        &self,
        chain: NblChain,
        _flags: SendCompleteFlags,
    ) {
        if self.verifier.send_complete() {
            let expected = self.send_done.armed();
            let got = chain.head_id();
            if expected.is_none() || expected != got {
                self.violation(Violation::UnexpectedSendComplete {
                    expected,
                    got,
                });
            }

            let state = self.phy.phy_state();
            if state != PhyState::Transmit {
                self.violation(Violation::SendCompleteNotTransmitting(state));
            }
        }

        self.stats.vals.tx_complete.incr();
        self.send_done.complete(chain);
    }

    /// The layer above is done with chains the datapath indicated.
    /// Give back the space reserved for their data, then free them.
    pub fn return_nbls(&self, chain: NblChain, _flags: ReturnFlags) {
        for mut nbl in chain {
            if !nbl.status.is_success() {
                self.stats.vals.rx_return_failed.incr();
                self.log(
                    LogLevel::Verbose,
                    format_args!("{} returned with {}", nbl.id(), nbl.status),
                );
            }

            let len = nbl.data_len();
            nbl.advance(len);
            self.stats.vals.rx_returned.incr();
        }
    }

    /// Cancel queued sends tagged with `id`.
    pub fn cancel_send_nbls(&self, id: CancelId) {
        self.stats.vals.cancel_req.incr();
        self.log(LogLevel::Verbose, format_args!("cancel sends {id}"));
        self.events.indicate_nbls_cancelled(id);
    }

    /// Take a datagram from the mesh stack, and indicate it upward if
    /// it is meant for this interface. The message is freed before
    /// any failure is reported, so it is released even when a fatal
    /// contract check panics.
    pub fn receive_ip6_message<M: Ip6Message>(&self, msg: M) {
        let len = msg.len();
        let res = self.deliver(&msg);
        msg.free();
        if let Err(e) = res {
            self.deliver_failed(&e, len);
        }
    }

    fn deliver<M: Ip6Message>(&self, msg: &M) -> Result<(), DeliverError> {
        let len = msg.len();
        let mut nbl = self.pool.alloc_nbl().ok_or(DeliverError::NoNbl)?;
        nbl.flags |= NblFlags::IS_IPV6;
        nbl.frame_type = ETHER_TYPE_IPV6;

        // A failed reservation leaves the node empty, and dropping it
        // frees it.
        nbl.retreat(len).map_err(|e| match e {
            NblError::Resources { need } => DeliverError::Resources { need },
        })?;

        let res = match nbl.data_mut(len) {
            Some(buf) => {
                let got = msg.read(0, buf);
                if got != len {
                    Err(DeliverError::ShortRead { expected: len, got })
                } else {
                    filter::check_deliverable(
                        buf,
                        &self.link_local,
                        self.addrs.as_ref(),
                    )
                    .map_err(DeliverError::Filtered)
                }
            }

            None => Err(DeliverError::NotContiguous { len }),
        };

        let meta = match res {
            Ok(meta) => meta,
            Err(e) => {
                nbl.advance(len);
                return Err(e);
            }
        };

        self.log(
            LogLevel::Verbose,
            format_args!(
                "ip6 recv {}: {} => {} ({len} bytes)",
                nbl.id(),
                meta.src,
                meta.dst,
            ),
        );

        if self.cfg.log_buffers {
            if let Some(buf) = nbl.data_mut(len) {
                provider::log_hex(
                    self.log.as_ref(),
                    LogLevel::Verbose,
                    &self.name,
                    buf,
                );
            }
        }

        let chain = NblChain::from(nbl);
        self.stats.vals.ip6_indicated.incr();
        if self.cfg.synchronous_receive {
            let mut chain = chain;
            self.host.indicate_receive_resources(
                &mut chain,
                PortNumber::DEFAULT,
                1,
                ReceiveFlags::RESOURCES | ReceiveFlags::DISPATCH_LEVEL,
            );
            self.return_nbls(chain, ReturnFlags::empty());
        } else {
            self.host.indicate_receive(
                chain,
                PortNumber::DEFAULT,
                1,
                ReceiveFlags::empty(),
            );
        }

        Ok(())
    }

    fn deliver_failed(&self, e: &DeliverError, len: usize) {
        let stats = &self.stats.vals;
        let level = match e {
            DeliverError::NoNbl => {
                stats.ip6_drop_alloc.incr();
                LogLevel::Warn
            }
            DeliverError::Resources { .. } => {
                stats.ip6_drop_resources.incr();
                LogLevel::Error
            }
            DeliverError::NotContiguous { .. } => {
                stats.ip6_drop_contig.incr();
                LogLevel::Error
            }
            DeliverError::ShortRead { expected, got } => {
                stats.ip6_drop_short_read.incr();
                self.violation(Violation::ShortRead {
                    expected: *expected,
                    got: *got,
                });
                LogLevel::Error
            }
            DeliverError::Filtered(RecvDropReason::Malformed(_)) => {
                stats.ip6_drop_malformed.incr();
                LogLevel::Verbose
            }
            DeliverError::Filtered(RecvDropReason::AddrNotOwned) => {
                stats.ip6_drop_addr.incr();
                LogLevel::Verbose
            }
            DeliverError::Filtered(RecvDropReason::Mle) => {
                stats.ip6_drop_mle.incr();
                LogLevel::Verbose
            }
        };

        self.log(
            level,
            format_args!("dropping ip6 message ({len} bytes): {e}"),
        );
        crate::ip6_drop_probe(&self.name, e, len as u64);
    }
}
