// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Tests of pausing the datapath while operations are in flight.
use meshlwf::api::CancelId;
use meshlwf::ddi::sync::KMutex;
use meshlwf::engine::events::QueuedNbls;
use meshlwf_test_utils::*;
use rand::Rng;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// An event processor that holds every indication until the test
/// releases it.
struct GatedEvents {
    queue: EventQueue,
    entered: mpsc::Sender<()>,
    release: KMutex<mpsc::Receiver<()>>,
}

impl EventProcessor for GatedEvents {
    fn indicate_new_nbls(&self, queued: QueuedNbls) {
        let _ = self.entered.send(());
        let _ = self.release.lock().recv();
        self.queue.indicate_new_nbls(queued);
    }

    fn indicate_nbls_cancelled(&self, id: CancelId) {
        self.queue.indicate_nbls_cancelled(id);
    }
}

#[test]
fn disable_waits_for_in_flight_ops() {
    let host = Arc::new(TestHost::new());
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let events = Arc::new(GatedEvents {
        queue: EventQueue::new(host.clone()),
        entered: entered_tx,
        release: KMutex::new(release_rx),
    });
    let pool = NblPool::new();
    let phy = Arc::new(PhyStateCell::new(PhyState::Receive));
    let dp = DatapathBuilder::new(
        "gate0",
        pool.clone(),
        host.clone(),
        events.clone(),
        phy,
    )
    .build()
    .unwrap();

    thread::scope(|s| {
        let sender = s.spawn(|| {
            let chain = tx_chain(&pool, &[(b"held", None)]);
            dp.send_nbls(chain, PortNumber::DEFAULT, SendFlags::empty());
        });
        entered_rx.recv().unwrap();
        assert_eq!(dp.ops_in_flight(), 1);

        let disabler = s.spawn(|| dp.disable());
        while !dp.is_paused() {
            thread::yield_now();
        }

        // New operations are refused while the drain is waiting.
        let chain = tx_chain(&pool, &[(b"late", None)]);
        dp.send_nbls(chain, PortNumber::DEFAULT, SendFlags::empty());
        let done = host.completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].data, b"late");
        assert_eq!(done[0].status, NblStatus::Paused);

        thread::sleep(Duration::from_millis(20));
        assert!(!disabler.is_finished());
        assert_eq!(dp.ops_in_flight(), 1);

        release_tx.send(()).unwrap();
        sender.join().unwrap();
        disabler.join().unwrap();
    });

    assert!(dp.is_paused());
    assert_eq!(dp.ops_in_flight(), 0);
    assert_eq!(events.queue.queued_nbls(), (0, 1));

    dp.enable();
    assert!(!dp.is_paused());
    release_tx.send(()).unwrap();
    let chain = tx_chain(&pool, &[(b"after", None)]);
    dp.send_nbls(chain, PortNumber::DEFAULT, SendFlags::empty());
    assert_eq!(events.queue.queued_nbls(), (0, 2));
    assert_eq!(dp.stats_snap().tx_paused, 1);
}

#[test]
fn repeated_disable_and_enable() {
    let b = TestBridge::new();
    for _ in 0..3 {
        b.dp.disable();
        b.dp.disable();
        assert!(b.dp.is_paused());
        b.dp.enable();
        b.dp.enable();
        assert!(!b.dp.is_paused());
    }
    assert!(b.log.contains(LogLevel::Note, "datapath disabled"));
    assert!(b.log.contains(LogLevel::Note, "datapath enabled"));
}

#[test]
fn every_node_accounted_for_across_pauses() {
    const THREADS: usize = 4;
    const ITERS: usize = 300;

    let b = TestBridge::new();
    let rx_sent = AtomicU64::new(0);
    let tx_sent = AtomicU64::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut rng = rand::rng();
                for _ in 0..ITERS {
                    let n = rng.random_range(1..=3usize);
                    if rng.random_bool(0.5) {
                        let chain =
                            rx_chain(&b.pool, n, 16, Some(TEST_CHANNEL));
                        b.dp.receive_nbls(
                            chain,
                            PortNumber::DEFAULT,
                            n,
                            ReceiveFlags::DISPATCH_LEVEL,
                        );
                        rx_sent.fetch_add(n as u64, SeqCst);
                    } else {
                        let frames = vec![(&b"stress"[..], None); n];
                        let chain = tx_chain(&b.pool, &frames);
                        b.dp.send_nbls(
                            chain,
                            PortNumber::DEFAULT,
                            SendFlags::empty(),
                        );
                        tx_sent.fetch_add(n as u64, SeqCst);
                    }
                }
            });
        }

        for _ in 0..10 {
            b.dp.disable();
            assert_eq!(b.dp.ops_in_flight(), 0);
            thread::sleep(Duration::from_millis(1));
            b.dp.enable();
            thread::sleep(Duration::from_millis(1));
        }
    });

    let stats = b.dp.stats_snap();
    assert_eq!(stats.rx_queued + stats.rx_paused, rx_sent.load(SeqCst));
    assert_eq!(stats.tx_queued + stats.tx_paused, tx_sent.load(SeqCst));
    assert_eq!(b.host.returned().len() as u64, stats.rx_paused);
    assert_eq!(b.host.completed().len() as u64, stats.tx_paused);

    let (rx, tx) = b.drain_queues();
    assert_eq!(rx as u64, stats.rx_queued);
    assert_eq!(tx as u64, stats.tx_queued);
    assert_eq!(b.dp.ops_in_flight(), 0);
    assert_eq!(b.pool.outstanding(), 0);
    assert_eq!(b.pool.outstanding_bytes(), 0);
}
