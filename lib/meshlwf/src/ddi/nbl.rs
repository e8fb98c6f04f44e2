// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Buffer lists: the host framework's packet representation.
//!
//! A packet on the host side is an [`Nbl`] (a buffer-list node), which
//! owns one or more fragments holding a byte range plus per-node
//! metadata. Nodes travel between driver layers as an ordered
//! [`NblChain`]. Every node is allocated from, and charged against, an
//! [`NblPool`]; dropping a node returns it and all of its fragments
//! to the pool. Holding an `Nbl` *is* owning it: every handoff in the
//! datapath is a move.
//!
//! The data of a node starts `data_offset` bytes into its first
//! fragment and runs for `data_len` bytes, possibly across fragment
//! boundaries. Space in front of the data is claimed with
//! [`Nbl::retreat`] (allocating a new fragment when there is not
//! enough headroom) and given back with [`Nbl::advance`].
use crate::api::CancelId;
use crate::api::NblStatus;
use bitflags::bitflags;
use core::fmt;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering::SeqCst;
use std::collections::VecDeque;
use std::collections::vec_deque;
use std::sync::Arc;

/// EtherType of an IPv6 frame, stored in [`Nbl::frame_type`].
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;

/// The lowest 802.15.4 channel in the 2.4 GHz band.
pub const CHANNEL_MIN: u8 = 11;

/// The highest 802.15.4 channel in the 2.4 GHz band.
pub const CHANNEL_MAX: u8 = 26;

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum NblError {
    #[error("pool could not supply {need} bytes of fragment space")]
    Resources { need: usize },
}

bitflags! {
    /// Out-of-band node flags.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct NblFlags: u32 {
        /// The node carries an IPv6 datagram.
        const IS_IPV6 = 1 << 0;
    }
}

/// A pool-unique node identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NblId(pub u64);

impl fmt::Display for NblId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "nbl#{}", self.0)
    }
}

/// Limits applied by an [`NblPool`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolLimits {
    /// Maximum number of nodes outstanding at once.
    pub max_nbls: Option<usize>,

    /// Maximum number of fragment bytes outstanding at once.
    pub max_frag_bytes: Option<usize>,

    /// Largest single fragment. Larger allocations are split across
    /// several fragments, so their data is not contiguous.
    pub max_frag_size: Option<usize>,
}

struct PoolInner {
    limits: PoolLimits,
    next_id: AtomicU64,
    nbls: AtomicUsize,
    frag_bytes: AtomicUsize,
}

/// A shared, thread-safe allocator of buffer-list nodes and their
/// fragments.
///
/// Cloning the pool produces another handle to the same allocator.
#[derive(Clone)]
pub struct NblPool {
    inner: Arc<PoolInner>,
}

impl Default for NblPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NblPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NblPool")
            .field("limits", &self.inner.limits)
            .field("outstanding", &self.outstanding())
            .field("outstanding_bytes", &self.outstanding_bytes())
            .finish()
    }
}

impl NblPool {
    /// Create an unlimited pool.
    pub fn new() -> Self {
        Self::with_limits(PoolLimits::default())
    }

    pub fn with_limits(limits: PoolLimits) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                limits,
                next_id: AtomicU64::new(1),
                nbls: AtomicUsize::new(0),
                frag_bytes: AtomicUsize::new(0),
            }),
        }
    }

    /// Allocate an empty node: no fragments, no data, default
    /// metadata. Returns `None` if the pool is exhausted.
    pub fn alloc_nbl(&self) -> Option<Nbl> {
        let inner = &self.inner;
        let mut cur = inner.nbls.load(SeqCst);
        loop {
            if let Some(max) = inner.limits.max_nbls {
                if cur >= max {
                    return None;
                }
            }

            match inner.nbls.compare_exchange_weak(cur, cur + 1, SeqCst, SeqCst)
            {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }

        Some(Nbl {
            id: NblId(inner.next_id.fetch_add(1, SeqCst)),
            frags: VecDeque::new(),
            data_offset: 0,
            data_len: 0,
            status: NblStatus::Success,
            flags: NblFlags::empty(),
            frame_type: 0,
            channel: None,
            cancel_id: None,
            pool: self.clone(),
        })
    }

    /// Allocate a node holding a copy of `data`.
    pub fn alloc_nbl_with(&self, data: &[u8]) -> Option<Nbl> {
        let mut nbl = self.alloc_nbl()?;
        if nbl.retreat(data.len()).is_err() {
            return None;
        }
        nbl.copy_in(0, data);
        Some(nbl)
    }

    /// Number of nodes currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.inner.nbls.load(SeqCst)
    }

    /// Number of fragment bytes currently outstanding.
    pub fn outstanding_bytes(&self) -> usize {
        self.inner.frag_bytes.load(SeqCst)
    }

    fn alloc_frag(&self, len: usize) -> Result<Box<[u8]>, NblError> {
        let prev = self.inner.frag_bytes.fetch_add(len, SeqCst);
        if let Some(max) = self.inner.limits.max_frag_bytes {
            if prev + len > max {
                self.inner.frag_bytes.fetch_sub(len, SeqCst);
                return Err(NblError::Resources { need: len });
            }
        }
        Ok(vec![0u8; len].into_boxed_slice())
    }

    fn free_frag(&self, frag: Box<[u8]>) {
        self.inner.frag_bytes.fetch_sub(frag.len(), SeqCst);
    }
}

/// A single buffer-list node.
pub struct Nbl {
    id: NblId,
    frags: VecDeque<Box<[u8]>>,
    data_offset: usize,
    data_len: usize,

    pub status: NblStatus,
    pub flags: NblFlags,
    pub frame_type: u16,
    /// Radio channel the frame was received on.
    pub channel: Option<u8>,
    pub cancel_id: Option<CancelId>,

    pool: NblPool,
}

impl fmt::Debug for Nbl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Nbl")
            .field("id", &self.id)
            .field("frags", &self.frags.len())
            .field("data_offset", &self.data_offset)
            .field("data_len", &self.data_len)
            .field("status", &self.status)
            .field("flags", &self.flags)
            .field("frame_type", &self.frame_type)
            .field("channel", &self.channel)
            .field("cancel_id", &self.cancel_id)
            .finish()
    }
}

impl Nbl {
    pub fn id(&self) -> NblId {
        self.id
    }

    /// The number of data bytes described by this node.
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// The offset of the data into the first fragment.
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    pub fn frag_count(&self) -> usize {
        self.frags.len()
    }

    /// Grow the data range by `len` bytes at the front.
    ///
    /// Headroom in the first fragment is used when there is enough of
    /// it. Otherwise the shortfall is allocated from the pool as new
    /// fragments. On failure the node is left unchanged.
    pub fn retreat(&mut self, len: usize) -> Result<(), NblError> {
        if len <= self.data_offset {
            self.data_offset -= len;
            self.data_len += len;
            return Ok(());
        }

        let need = len - self.data_offset;
        let max = self.pool.inner.limits.max_frag_size.unwrap_or(need).max(1);
        let mut new_frags = Vec::with_capacity(need.div_ceil(max));
        let mut left = need;
        while left > 0 {
            let sz = left.min(max);
            match self.pool.alloc_frag(sz) {
                Ok(frag) => new_frags.push(frag),
                Err(e) => {
                    for frag in new_frags {
                        self.pool.free_frag(frag);
                    }
                    return Err(e);
                }
            }
            left -= sz;
        }

        for frag in new_frags.into_iter().rev() {
            self.frags.push_front(frag);
        }
        self.data_offset = 0;
        self.data_len += len;
        Ok(())
    }

    /// Shrink the data range by `len` bytes at the front. Fragments the
    /// data no longer touches go back to the pool.
    pub fn advance(&mut self, len: usize) {
        debug_assert!(len <= self.data_len, "advance past end of data");
        let len = len.min(self.data_len);
        self.data_len -= len;

        let mut off = self.data_offset + len;
        while let Some(first) = self.frags.front() {
            if off < first.len() {
                break;
            }
            off -= first.len();
            if let Some(frag) = self.frags.pop_front() {
                self.pool.free_frag(frag);
            }
        }
        self.data_offset = off;
    }

    /// Return a writable view of the first `len` data bytes, if they
    /// sit contiguously in the first fragment.
    pub fn data_mut(&mut self, len: usize) -> Option<&mut [u8]> {
        if len > self.data_len {
            return None;
        }

        if len == 0 {
            return Some(Default::default());
        }

        let start = self.data_offset;
        let first = self.frags.front_mut()?;
        first.get_mut(start..start + len)
    }

    /// Copy the data bytes out of the node.
    pub fn copy_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data_len);
        let mut skip = self.data_offset;
        for frag in &self.frags {
            if out.len() == self.data_len {
                break;
            }
            let frag = if skip >= frag.len() {
                skip -= frag.len();
                continue;
            } else {
                &frag[skip..]
            };
            skip = 0;
            let take = frag.len().min(self.data_len - out.len());
            out.extend_from_slice(&frag[..take]);
        }
        out
    }

    // Copy `src` into the data range starting `offset` bytes in,
    // crossing fragment boundaries as needed.
    fn copy_in(&mut self, offset: usize, src: &[u8]) {
        debug_assert!(offset + src.len() <= self.data_len);
        let mut skip = self.data_offset + offset;
        let mut src = src;
        for frag in self.frags.iter_mut() {
            if src.is_empty() {
                break;
            }
            if skip >= frag.len() {
                skip -= frag.len();
                continue;
            }
            let n = (frag.len() - skip).min(src.len());
            frag[skip..skip + n].copy_from_slice(&src[..n]);
            src = &src[n..];
            skip = 0;
        }
    }
}

impl Drop for Nbl {
    fn drop(&mut self) {
        for frag in self.frags.drain(..) {
            self.pool.free_frag(frag);
        }
        self.pool.inner.nbls.fetch_sub(1, SeqCst);
    }
}

/// An ordered chain of buffer-list nodes.
///
/// Dropping the chain frees every node in it.
#[derive(Debug, Default)]
pub struct NblChain {
    nbls: VecDeque<Nbl>,
}

impl NblChain {
    /// Create an empty chain.
    pub fn empty() -> Self {
        Self { nbls: VecDeque::new() }
    }

    /// The number of nodes in the chain.
    pub fn len(&self) -> usize {
        self.nbls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nbls.is_empty()
    }

    /// The identifier of the first node, if any.
    pub fn head_id(&self) -> Option<NblId> {
        self.nbls.front().map(Nbl::id)
    }

    /// Removes the next node from the front of the chain and returns
    /// it, taking ownership.
    pub fn pop_front(&mut self) -> Option<Nbl> {
        self.nbls.pop_front()
    }

    /// Adds an owned node to the end of this chain.
    pub fn append(&mut self, nbl: Nbl) {
        self.nbls.push_back(nbl);
    }

    /// Move every node of `other` onto the end of this chain.
    pub fn extend(&mut self, mut other: NblChain) {
        self.nbls.append(&mut other.nbls);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nbl> {
        self.nbls.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Nbl> {
        self.nbls.iter_mut()
    }

    /// Set the status of every node in the chain.
    pub fn set_status_all(&mut self, status: NblStatus) {
        for nbl in self.nbls.iter_mut() {
            nbl.status = status;
        }
    }

    /// Move every node matching `pred` into a new chain. Both chains
    /// keep their relative order.
    pub fn take_matching<F>(&mut self, mut pred: F) -> NblChain
    where
        F: FnMut(&Nbl) -> bool,
    {
        let mut taken = NblChain::empty();
        let mut kept = VecDeque::with_capacity(self.nbls.len());
        for nbl in self.nbls.drain(..) {
            if pred(&nbl) {
                taken.nbls.push_back(nbl);
            } else {
                kept.push_back(nbl);
            }
        }
        self.nbls = kept;
        taken
    }
}

impl From<Nbl> for NblChain {
    fn from(nbl: Nbl) -> Self {
        let mut chain = NblChain::empty();
        chain.append(nbl);
        chain
    }
}

impl FromIterator<Nbl> for NblChain {
    fn from_iter<I: IntoIterator<Item = Nbl>>(iter: I) -> Self {
        Self { nbls: iter.into_iter().collect() }
    }
}

impl IntoIterator for NblChain {
    type Item = Nbl;
    type IntoIter = vec_deque::IntoIter<Nbl>;

    fn into_iter(self) -> Self::IntoIter {
        self.nbls.into_iter()
    }
}
