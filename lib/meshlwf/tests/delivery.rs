// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Tests of datagram delivery from the mesh stack.
use meshlwf::provider::LogProvider;
use meshlwf_test_utils::*;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;
use std::thread;

fn udp_to(dst: Ipv6Addr, sport: u16, dport: u16) -> Vec<u8> {
    ip6_udp(PEER_LINK_LOCAL, dst, sport, dport, b"mesh payload")
}

fn assert_all_freed(b: &TestBridge) {
    assert!(b.msgs.balanced(), "{:?}", b.msgs);
    assert_eq!(b.pool.outstanding(), 0);
    assert_eq!(b.pool.outstanding_bytes(), 0);
}

#[test]
fn multicast_indicated_verbatim() {
    let b = TestBridge::new();
    let pkt = udp_to(Ipv6Addr::ALL_NODES, 5683, 5683);
    b.deliver(pkt.clone());

    let ind = b.host.indications();
    assert_eq!(ind.len(), 1);
    assert_eq!(ind[0].data, pkt);
    assert_eq!(ind[0].frame_type, ETHER_TYPE_IPV6);
    assert!(ind[0].flags.contains(NblFlags::IS_IPV6));
    assert_eq!(ind[0].port, PortNumber::DEFAULT);
    assert_eq!(ind[0].count, 1);
    assert_eq!(ind[0].rx_flags, ReceiveFlags::empty());
    assert_eq!(b.host.calls(), vec![HostCall::Indicate(ind[0].id)]);
    assert!(b.log.contains(LogLevel::Verbose, "ff02::1"));

    // The host owns the chain until it hands it back.
    assert!(b.msgs.balanced());
    assert_eq!(b.pool.outstanding(), 1);
    assert_eq!(b.pool.outstanding_bytes(), pkt.len());
    b.return_all();
    assert_all_freed(&b);

    let stats = b.dp.stats_snap();
    assert_eq!(stats.ip6_indicated, 1);
    assert_eq!(stats.rx_returned, 1);
}

#[test]
fn owned_unicast_indicated() {
    let b = TestBridge::new();
    b.deliver(udp_to(MESH_LOCAL, 5683, 5683));
    b.deliver(udp_to(LINK_LOCAL, 5683, 5683));
    assert_eq!(b.host.indications().len(), 2);
    b.return_all();
    assert_all_freed(&b);
}

#[test]
fn unowned_unicast_dropped() {
    let b = TestBridge::new();
    b.deliver(udp_to(STRANGER, 5683, 5683));

    assert!(b.host.calls().is_empty());
    assert_eq!(b.dp.stats_snap().ip6_drop_addr, 1);
    assert!(b.log.contains(LogLevel::Verbose, "Filtered.AddrNotOwned"));
    assert_all_freed(&b);
}

#[test]
fn address_set_changes_take_effect() {
    let b = TestBridge::new();
    b.addrs.update(vec![LINK_LOCAL, STRANGER]);
    b.deliver(udp_to(STRANGER, 5683, 5683));
    b.deliver(udp_to(MESH_LOCAL, 5683, 5683));

    let ind = b.host.indications();
    assert_eq!(ind.len(), 1);
    assert_eq!(b.dp.stats_snap().ip6_drop_addr, 1);
    b.return_all();
    assert_all_freed(&b);
}

#[test]
fn link_local_mle_dropped() {
    let b = TestBridge::new();
    b.deliver(udp_to(LINK_LOCAL, MLE_PORT, MLE_PORT));

    assert!(b.host.calls().is_empty());
    assert_eq!(b.dp.stats_snap().ip6_drop_mle, 1);
    assert!(b.log.contains(LogLevel::Verbose, "Filtered.Mle"));
    assert_all_freed(&b);
}

#[test]
fn mle_lookalikes_indicated() {
    let b = TestBridge::new();
    // Only one port is MLE.
    b.deliver(udp_to(LINK_LOCAL, MLE_PORT, 12345));
    b.deliver(udp_to(LINK_LOCAL, 12345, MLE_PORT));
    // MLE, but not to the link-local address.
    b.deliver(udp_to(MESH_LOCAL, MLE_PORT, MLE_PORT));
    b.deliver(udp_to(Ipv6Addr::ALL_NODES, MLE_PORT, MLE_PORT));
    // Not UDP at all.
    let mut body = vec![0u8; 8];
    body[..2].copy_from_slice(&MLE_PORT.to_be_bytes());
    body[2..4].copy_from_slice(&MLE_PORT.to_be_bytes());
    b.deliver(ip6_datagram(
        PEER_LINK_LOCAL,
        LINK_LOCAL,
        IpProtocol::Tcp,
        &body,
    ));

    assert_eq!(b.host.indications().len(), 5);
    assert_eq!(b.dp.stats_snap().ip6_drop_mle, 0);
    b.return_all();
    assert_all_freed(&b);
}

#[test]
fn malformed_datagrams_dropped() {
    let b = TestBridge::new();
    b.deliver(vec![0x60; 20]);

    let mut pkt = udp_to(Ipv6Addr::ALL_NODES, 1, 1);
    pkt[0] = 0x40;
    b.deliver(pkt);

    assert!(b.host.calls().is_empty());
    assert_eq!(b.dp.stats_snap().ip6_drop_malformed, 2);
    assert!(b.log.contains(LogLevel::Verbose, "Malformed.Truncated"));
    assert!(b.log.contains(LogLevel::Verbose, "Malformed.BadVersion"));
    assert_all_freed(&b);
}

#[test]
fn empty_message_dropped() {
    let b = TestBridge::new();
    b.deliver(Vec::new());
    assert_eq!(b.dp.stats_snap().ip6_drop_malformed, 1);
    assert_all_freed(&b);
}

#[test]
fn no_nbl_available() {
    let limits = PoolLimits { max_nbls: Some(0), ..Default::default() };
    let b = TestBridge::with_cfg(TestBridge::default_cfg(), limits);
    b.deliver(udp_to(Ipv6Addr::ALL_NODES, 1, 1));

    assert!(b.host.calls().is_empty());
    assert_eq!(b.dp.stats_snap().ip6_drop_alloc, 1);
    assert!(b.log.contains(LogLevel::Warn, "NoNbl"));
    assert_all_freed(&b);
}

#[test]
fn reservation_failure() {
    let limits = PoolLimits { max_frag_bytes: Some(16), ..Default::default() };
    let b = TestBridge::with_cfg(TestBridge::default_cfg(), limits);
    b.deliver(udp_to(Ipv6Addr::ALL_NODES, 1, 1));

    assert!(b.host.calls().is_empty());
    assert_eq!(b.dp.stats_snap().ip6_drop_resources, 1);
    assert!(b.log.contains(LogLevel::Error, "Resources"));
    assert_all_freed(&b);
}

#[test]
fn non_contiguous_reservation() {
    let limits = PoolLimits { max_frag_size: Some(32), ..Default::default() };
    let b = TestBridge::with_cfg(TestBridge::default_cfg(), limits);
    b.deliver(udp_to(Ipv6Addr::ALL_NODES, 1, 1));

    assert!(b.host.calls().is_empty());
    assert_eq!(b.dp.stats_snap().ip6_drop_contig, 1);
    assert!(b.log.contains(LogLevel::Error, "NotContiguous"));
    assert_all_freed(&b);
}

#[test]
fn short_read_is_a_violation() {
    let b = TestBridge::new();
    let pkt = udp_to(Ipv6Addr::ALL_NODES, 1, 1);
    let len = pkt.len();
    b.dp.receive_ip6_message(b.msg(pkt).short_read(4));

    assert!(b.host.calls().is_empty());
    let stats = b.dp.stats_snap();
    assert_eq!(stats.ip6_drop_short_read, 1);
    assert_eq!(stats.verify_fail, 1);
    assert!(b.log.contains(LogLevel::Error, "contract violation: ShortRead"));
    assert!(b.log.contains(LogLevel::Error, &format!("({len} bytes)")));
    assert_all_freed(&b);
}

#[test]
fn synchronous_receive_reclaims_on_return() {
    let cfg = DatapathCfg {
        synchronous_receive: true,
        ..TestBridge::default_cfg()
    };
    let b = TestBridge::with_cfg(cfg, PoolLimits::default());
    let pkt = udp_to(MESH_LOCAL, 5683, 5683);
    b.deliver(pkt.clone());

    let ind = b.host.indications();
    assert_eq!(ind.len(), 1);
    assert_eq!(ind[0].data, pkt);
    assert_eq!(
        ind[0].rx_flags,
        ReceiveFlags::RESOURCES | ReceiveFlags::DISPATCH_LEVEL
    );
    assert_eq!(b.host.calls(), vec![HostCall::IndicateResources(ind[0].id)]);

    // Nothing is left with the host.
    assert!(b.host.take_indicated().is_empty());
    assert!(b.host.returned().is_empty());
    assert_eq!(b.dp.stats_snap().rx_returned, 1);
    assert_all_freed(&b);
}

#[test]
fn log_buffers_dumps_delivered_bytes() {
    let cfg = DatapathCfg { log_buffers: true, ..TestBridge::default_cfg() };
    let b = TestBridge::with_cfg(cfg, PoolLimits::default());
    let pkt = ip6_udp(PEER_LINK_LOCAL, MESH_LOCAL, 1, 2, &[0xab; 22]);
    assert_eq!(pkt.len(), 70);
    b.deliver(pkt);

    let is_dump = |m: &str| m.starts_with("mesh0 0");
    let lines = b.log.lines();
    let recv = lines.iter().position(|(_, m)| m.contains("ip6 recv"));
    let first_dump = lines.iter().position(|(_, m)| is_dump(m));
    assert!(recv.is_some());
    assert!(recv < first_dump, "dump precedes its header: {lines:?}");

    let dump: Vec<String> = b
        .log
        .lines()
        .into_iter()
        .filter(|(l, m)| *l == LogLevel::Verbose && is_dump(m))
        .map(|(_, m)| m)
        .collect();
    assert_eq!(dump.len(), 3);
    assert!(dump[0].starts_with("mesh0 0000: 60 00 00 00"));
    assert!(dump[1].starts_with("mesh0 0020:"));
    assert_eq!(dump[2], "mesh0 0040: ab ab ab ab ab ab");

    // Dropped datagrams are not dumped.
    b.log.clear();
    b.deliver(udp_to(STRANGER, 1, 1));
    assert!(!b.log.lines().iter().any(|(_, m)| is_dump(m)));

    b.return_all();
    assert_all_freed(&b);
}

#[test]
fn concurrent_delivery() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let b = TestBridge::new();
    thread::scope(|s| {
        for t in 0..THREADS {
            let b = &b;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let dst = match i % 3 {
                        0 => Ipv6Addr::ALL_NODES,
                        1 => MESH_LOCAL,
                        _ => STRANGER,
                    };
                    b.deliver(udp_to(dst, t as u16, i as u16));
                }
            });
        }
    });

    let total = THREADS * PER_THREAD;
    let stats = b.dp.stats_snap();
    assert_eq!(
        (stats.ip6_indicated + stats.ip6_drop_addr) as usize,
        total
    );
    assert_eq!(b.host.indications().len(), stats.ip6_indicated as usize);
    assert_eq!(b.msgs.created(), total);

    b.return_all();
    assert_all_freed(&b);
}

#[test]
fn short_read_frees_message_before_fatal_check() {
    let cfg = DatapathCfg {
        verify: VerifyCfg { channels: true, send_complete: true, fatal: true },
        ..Default::default()
    };
    let b = TestBridge::with_cfg(cfg, PoolLimits::default());
    let msg = b.msg(udp_to(Ipv6Addr::ALL_NODES, 1, 1)).short_read(4);

    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        b.dp.receive_ip6_message(msg);
    }));
    assert!(res.is_err());
    assert_eq!(b.msgs.freed(), 1);
    assert_all_freed(&b);
}

/// Counts every message it is handed. Only Note and above are enabled.
#[derive(Default)]
struct NoteOnlyLog {
    calls: AtomicUsize,
    bytes: AtomicUsize,
}

impl LogProvider for NoteOnlyLog {
    fn log(&self, _level: LogLevel, msg: &str) {
        self.calls.fetch_add(1, SeqCst);
        self.bytes.fetch_add(msg.len(), SeqCst);
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= LogLevel::Note
    }
}

struct NoteOnlyRef(Arc<NoteOnlyLog>);

impl LogProvider for NoteOnlyRef {
    fn log(&self, level: LogLevel, msg: &str) {
        self.0.log(level, msg);
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.0.enabled(level)
    }
}

#[test]
fn disabled_verbose_level_builds_no_messages() {
    let log = Arc::new(NoteOnlyLog::default());
    let pool = NblPool::new();
    let host = Arc::new(TestHost::new());
    let events = Arc::new(EventQueue::new(host.clone()));
    let phy = Arc::new(PhyStateCell::new(PhyState::Receive));
    let cfg = DatapathCfg {
        log_buffers: true,
        verify: VerifyCfg::non_fatal(),
        ..Default::default()
    };
    let dp = DatapathBuilder::new(
        "quiet0",
        pool.clone(),
        host.clone(),
        events,
        phy,
    )
    .cfg(cfg)
    .link_local(LINK_LOCAL)
    .addrs(Arc::new(CachedAddrs::new(vec![LINK_LOCAL, MESH_LOCAL])))
    .providers(Providers::new(Box::new(NoteOnlyRef(log.clone()))))
    .build()
    .unwrap();
    let msgs = MessageTracker::new();

    for _ in 0..1000 {
        let pkt = udp_to(Ipv6Addr::ALL_NODES, 5683, 5683);
        dp.receive_ip6_message(TestMessage::new(&msgs, pkt));
    }
    dp.receive_ip6_message(TestMessage::new(
        &msgs,
        udp_to(STRANGER, 5683, 5683),
    ));

    assert_eq!(log.calls.load(SeqCst), 0);
    assert_eq!(log.bytes.load(SeqCst), 0);
    assert_eq!(host.indications().len(), 1000);
    assert_eq!(dp.stats_snap().ip6_drop_addr, 1);
    assert!(msgs.balanced());

    // Levels the provider enables still get through.
    dp.disable();
    assert_eq!(log.calls.load(SeqCst), 2);

    for chain in host.take_indicated() {
        dp.return_nbls(chain, ReturnFlags::empty());
    }
    assert_eq!(pool.outstanding(), 0);
}
