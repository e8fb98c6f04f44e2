// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Handing work to the worker thread.
//!
//! The datapath's entry points never block on packet processing: they
//! queue chains through an [`EventProcessor`] and return. The worker
//! that drains the queues, and the policy it schedules them with, live
//! outside the datapath. [`EventQueue`] is the stock processor.
use super::host::FilterHost;
use super::host::SendCompleteFlags;
use crate::api::CancelId;
use crate::api::Direction;
use crate::api::NblStatus;
use crate::api::PortNumber;
use crate::ddi::nbl::NblChain;
use crate::ddi::sync::KCondvar;
use crate::ddi::sync::KMutex;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;

/// A chain queued for the worker, along with the context it arrived
/// in.
#[derive(Debug)]
pub struct QueuedNbls {
    pub chain: NblChain,
    pub dir: Direction,
    pub port: PortNumber,
    /// The chain was handed over at dispatch level.
    pub dispatch: bool,
}

/// The worker's side of the datapath.
///
/// Both calls must return without blocking on packet processing.
pub trait EventProcessor: Send + Sync {
    /// Take ownership of chains for asynchronous processing. Chains
    /// are processed in the order they are queued within a direction;
    /// there is no ordering between directions.
    fn indicate_new_nbls(&self, queued: QueuedNbls);

    /// Cancel every queued outbound node tagged with `id`.
    ///
    /// Each such node is failed with [`NblStatus::RequestAborted`] and
    /// completed to the host. Every other node stays queued in order.
    /// The cancellation is then propagated to the host. Nodes the
    /// worker already dequeued are not affected.
    fn indicate_nbls_cancelled(&self, id: CancelId);
}

#[derive(Default)]
struct Queues {
    ingress: VecDeque<QueuedNbls>,
    egress: VecDeque<QueuedNbls>,
}

/// A pair of FIFO queues drained by a worker thread.
pub struct EventQueue {
    queues: KMutex<Queues>,
    work: KCondvar,
    host: Arc<dyn FilterHost>,
}

impl EventQueue {
    pub fn new(host: Arc<dyn FilterHost>) -> Self {
        Self {
            queues: KMutex::new(Queues::default()),
            work: KCondvar::new(),
            host,
        }
    }

    pub fn pop_ingress(&self) -> Option<QueuedNbls> {
        self.queues.lock().ingress.pop_front()
    }

    pub fn pop_egress(&self) -> Option<QueuedNbls> {
        self.queues.lock().egress.pop_front()
    }

    /// The number of queued nodes, inbound and outbound.
    pub fn queued_nbls(&self) -> (usize, usize) {
        let q = self.queues.lock();
        let count = |d: &VecDeque<QueuedNbls>| -> usize {
            d.iter().map(|e| e.chain.len()).sum()
        };
        (count(&q.ingress), count(&q.egress))
    }

    /// Block until either queue is non-empty, or `timeout` elapses.
    /// Returns `true` if there is work.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        let mut q = self.queues.lock();
        if q.ingress.is_empty() && q.egress.is_empty() {
            (q, _) = self.work.wait_timeout(q, timeout);
        }
        !q.ingress.is_empty() || !q.egress.is_empty()
    }
}

impl EventProcessor for EventQueue {
    fn indicate_new_nbls(&self, queued: QueuedNbls) {
        let mut q = self.queues.lock();
        match queued.dir {
            Direction::In => q.ingress.push_back(queued),
            Direction::Out => q.egress.push_back(queued),
        }
        drop(q);
        self.work.notify_all();
    }

    fn indicate_nbls_cancelled(&self, id: CancelId) {
        let mut aborted = NblChain::empty();
        {
            let mut q = self.queues.lock();
            for entry in q.egress.iter_mut() {
                aborted.extend(
                    entry.chain.take_matching(|n| n.cancel_id == Some(id)),
                );
            }
            q.egress.retain(|e| !e.chain.is_empty());
        }

        // The host is never called with the queue lock held.
        if !aborted.is_empty() {
            aborted.set_status_all(NblStatus::RequestAborted);
            self.host.send_complete(aborted, SendCompleteFlags::empty());
        }
        self.host.cancel_send(id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ddi::nbl::Nbl;
    use crate::ddi::nbl::NblPool;
    use crate::engine::host::ReceiveFlags;
    use crate::engine::host::ReturnFlags;

    #[derive(Default)]
    struct Host {
        completed: KMutex<Vec<(Vec<u8>, NblStatus)>>,
        cancels: KMutex<Vec<CancelId>>,
    }

    impl FilterHost for Host {
        fn indicate_receive(
            &self,
            _: NblChain,
            _: PortNumber,
            _: usize,
            _: ReceiveFlags,
        ) {
        }

        fn indicate_receive_resources(
            &self,
            _: &mut NblChain,
            _: PortNumber,
            _: usize,
            _: ReceiveFlags,
        ) {
        }

        fn return_nbls(&self, _: NblChain, _: ReturnFlags) {}

        fn send_complete(&self, chain: NblChain, _: SendCompleteFlags) {
            let mut done = self.completed.lock();
            for nbl in chain {
                done.push((nbl.copy_data(), nbl.status));
            }
        }

        fn cancel_send(&self, id: CancelId) {
            self.cancels.lock().push(id);
        }
    }

    fn tagged(pool: &NblPool, byte: u8, id: u64) -> Nbl {
        let mut nbl = pool.alloc_nbl_with(&[byte]).unwrap();
        nbl.cancel_id = Some(CancelId(id));
        nbl
    }

    fn out(chain: NblChain) -> QueuedNbls {
        QueuedNbls {
            chain,
            dir: Direction::Out,
            port: PortNumber::DEFAULT,
            dispatch: false,
        }
    }

    #[test]
    fn cancel_scoped_to_id() {
        let pool = NblPool::new();
        let host = Arc::new(Host::default());
        let q = EventQueue::new(host.clone());

        q.indicate_new_nbls(out(
            [tagged(&pool, 1, 7), tagged(&pool, 2, 8)].into_iter().collect(),
        ));
        q.indicate_new_nbls(out(NblChain::from(tagged(&pool, 3, 7))));
        q.indicate_new_nbls(out(NblChain::from(tagged(&pool, 4, 9))));
        assert_eq!(q.queued_nbls(), (0, 4));

        q.indicate_nbls_cancelled(CancelId(7));
        assert_eq!(
            *host.completed.lock(),
            vec![
                (vec![1], NblStatus::RequestAborted),
                (vec![3], NblStatus::RequestAborted),
            ]
        );
        assert_eq!(*host.cancels.lock(), vec![CancelId(7)]);

        let left: Vec<u8> = std::iter::from_fn(|| q.pop_egress())
            .flat_map(|e| e.chain.into_iter())
            .map(|n| n.copy_data()[0])
            .collect();
        assert_eq!(left, vec![2, 4]);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn cancel_with_nothing_queued_still_propagates() {
        let host = Arc::new(Host::default());
        let q = EventQueue::new(host.clone());
        q.indicate_nbls_cancelled(CancelId(1));
        assert!(host.completed.lock().is_empty());
        assert_eq!(*host.cancels.lock(), vec![CancelId(1)]);
    }

    #[test]
    fn directions_are_separate_queues() {
        let pool = NblPool::new();
        let q = EventQueue::new(Arc::new(Host::default()));
        assert!(!q.wait_for_work(Duration::from_millis(1)));

        q.indicate_new_nbls(QueuedNbls {
            chain: NblChain::from(tagged(&pool, 1, 7)),
            dir: Direction::In,
            port: PortNumber(3),
            dispatch: true,
        });
        assert!(q.wait_for_work(Duration::from_millis(1)));
        assert!(q.pop_egress().is_none());

        // Ingress nodes are never cancelled, even when tagged.
        q.indicate_nbls_cancelled(CancelId(7));
        let e = q.pop_ingress().unwrap();
        assert_eq!(e.port, PortNumber(3));
        assert!(e.dispatch);
        assert_eq!(e.chain.len(), 1);
    }
}
