// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A host framework that records every call made into it.
use meshlwf::api::CancelId;
use meshlwf::api::NblStatus;
use meshlwf::api::PortNumber;
use meshlwf::ddi::nbl::NblChain;
use meshlwf::ddi::nbl::NblFlags;
use meshlwf::ddi::nbl::NblId;
use meshlwf::ddi::sync::KMutex;
use meshlwf::engine::host::FilterHost;
use meshlwf::engine::host::ReceiveFlags;
use meshlwf::engine::host::ReturnFlags;
use meshlwf::engine::host::SendCompleteFlags;

/// What the host saw of one indicated node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Indication {
    pub id: NblId,
    pub data: Vec<u8>,
    pub frame_type: u16,
    pub flags: NblFlags,
    pub port: PortNumber,
    pub count: usize,
    pub rx_flags: ReceiveFlags,
}

/// What the host saw of one completed or returned node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Completion {
    pub id: NblId,
    pub data: Vec<u8>,
    pub status: NblStatus,
    pub dispatch: bool,
}

/// A recorded call into the host, in call order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostCall {
    Indicate(NblId),
    IndicateResources(NblId),
    Return(NblId),
    SendComplete(NblId),
    CancelSend(CancelId),
}

/// A [`FilterHost`] that records every call.
///
/// Chains indicated with ownership are held until the test takes them
/// back with [`TestHost::take_indicated`]. Returned and completed
/// chains are recorded, then freed.
#[derive(Default)]
pub struct TestHost {
    calls: KMutex<Vec<HostCall>>,
    indications: KMutex<Vec<Indication>>,
    held: KMutex<Vec<NblChain>>,
    returned: KMutex<Vec<Completion>>,
    completed: KMutex<Vec<Completion>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn indications(&self) -> Vec<Indication> {
        self.indications.lock().clone()
    }

    pub fn returned(&self) -> Vec<Completion> {
        self.returned.lock().clone()
    }

    pub fn completed(&self) -> Vec<Completion> {
        self.completed.lock().clone()
    }

    pub fn cancels(&self) -> Vec<CancelId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::CancelSend(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Take back every chain the host was given ownership of.
    pub fn take_indicated(&self) -> Vec<NblChain> {
        core::mem::take(&mut *self.held.lock())
    }

    fn record_indication(
        &self,
        chain: &NblChain,
        port: PortNumber,
        count: usize,
        rx_flags: ReceiveFlags,
    ) {
        let mut ind = self.indications.lock();
        for nbl in chain.iter() {
            ind.push(Indication {
                id: nbl.id(),
                data: nbl.copy_data(),
                frame_type: nbl.frame_type,
                flags: nbl.flags,
                port,
                count,
                rx_flags,
            });
        }
    }

    fn record_completion(chain: &NblChain, dispatch: bool) -> Vec<Completion> {
        chain
            .iter()
            .map(|nbl| Completion {
                id: nbl.id(),
                data: nbl.copy_data(),
                status: nbl.status,
                dispatch,
            })
            .collect()
    }
}

impl FilterHost for TestHost {
    fn indicate_receive(
        &self,
        chain: NblChain,
        port: PortNumber,
        count: usize,
        flags: ReceiveFlags,
    ) {
        self.record_indication(&chain, port, count, flags);
        let mut calls = self.calls.lock();
        calls.extend(chain.iter().map(|n| HostCall::Indicate(n.id())));
        drop(calls);
        self.held.lock().push(chain);
    }

    fn indicate_receive_resources(
        &self,
        chain: &mut NblChain,
        port: PortNumber,
        count: usize,
        flags: ReceiveFlags,
    ) {
        self.record_indication(chain, port, count, flags);
        let mut calls = self.calls.lock();
        calls.extend(chain.iter().map(|n| HostCall::IndicateResources(n.id())));
    }

    fn return_nbls(&self, chain: NblChain, flags: ReturnFlags) {
        let dispatch = flags.contains(ReturnFlags::DISPATCH_LEVEL);
        let recs = Self::record_completion(&chain, dispatch);
        let mut calls = self.calls.lock();
        calls.extend(recs.iter().map(|c| HostCall::Return(c.id)));
        drop(calls);
        self.returned.lock().extend(recs);
    }

    fn send_complete(&self, chain: NblChain, flags: SendCompleteFlags) {
        let dispatch = flags.contains(SendCompleteFlags::DISPATCH_LEVEL);
        let recs = Self::record_completion(&chain, dispatch);
        let mut calls = self.calls.lock();
        calls.extend(recs.iter().map(|c| HostCall::SendComplete(c.id)));
        drop(calls);
        self.completed.lock().extend(recs);
    }

    fn cancel_send(&self, id: CancelId) {
        self.calls.lock().push(HostCall::CancelSend(id));
    }
}
