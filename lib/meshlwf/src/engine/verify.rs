// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Cross-layer contract checks.
//!
//! A failed check means a collaborator broke its side of a contract:
//! the host framework handed us a frame without a valid channel, a send
//! completion arrived that nobody was waiting for, or the mesh stack
//! gave back fewer bytes than the message claimed to hold.
use crate::api::PhyState;
use crate::api::VerifyCfg;
use crate::d_error;
use crate::d_error::DError;
use crate::ddi::kstat::KStatU64;
use crate::ddi::nbl::CHANNEL_MAX;
use crate::ddi::nbl::CHANNEL_MIN;
use crate::ddi::nbl::NblId;
use crate::provider::LogLevel;
use crate::provider::LogProvider;

#[derive(Clone, Copy, Debug, DError, Eq, PartialEq)]
#[derror(leaf_data = Violation::data)]
pub enum Violation {
    MissingChannel,
    #[leaf]
    ChannelOutOfRange(u8),
    UnexpectedSendComplete {
        expected: Option<NblId>,
        got: Option<NblId>,
    },
    #[leaf]
    SendCompleteNotTransmitting(PhyState),
    ShortRead {
        expected: usize,
        got: usize,
    },
}

impl Violation {
    fn data(&self, data: &mut [u64]) {
        let id = |id: &Option<NblId>| id.map(|i| i.0).unwrap_or(0);
        match self {
            Self::MissingChannel => {}
            Self::ChannelOutOfRange(ch) => data[0] = u64::from(*ch),
            Self::UnexpectedSendComplete { expected, got } => {
                [data[0], data[1]] = [id(expected), id(got)];
            }
            Self::SendCompleteNotTransmitting(state) => {
                data[0] = *state as u64;
            }
            Self::ShortRead { expected, got } => {
                [data[0], data[1]] = [*expected as u64, *got as u64];
            }
        }
    }

    /// Check the channel a frame was received on.
    pub fn check_channel(channel: Option<u8>) -> Result<(), Self> {
        match channel {
            None => Err(Self::MissingChannel),
            Some(ch) if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&ch) => {
                Err(Self::ChannelOutOfRange(ch))
            }
            Some(_) => Ok(()),
        }
    }
}

/// Reports violations according to a [`VerifyCfg`].
pub struct Verifier {
    cfg: VerifyCfg,
}

impl Verifier {
    pub fn new(cfg: VerifyCfg) -> Self {
        Self { cfg }
    }

    pub fn channels(&self) -> bool {
        self.cfg.channels
    }

    pub fn send_complete(&self) -> bool {
        self.cfg.send_complete
    }

    /// Log and count a violation, then panic if checks are fatal.
    pub fn report(
        &self,
        name: &str,
        log: &dyn LogProvider,
        counter: &KStatU64,
        v: &Violation,
    ) {
        counter.incr();
        let (Ok(block) | Err(block)) =
            d_error::ErrorBlock::<2>::from_err(v);
        let msg = format!(
            "{name}: contract violation: {} {:?}",
            d_error::path(v),
            block.data(),
        );
        log.log(LogLevel::Error, &msg);

        if self.cfg.fatal {
            panic!("{msg}");
        }
    }
}
