// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Datapath configuration.

use serde::Deserialize;
use serde::Serialize;

/// Configuration of a single datapath instance.
///
/// The configuration is fixed when the datapath is built. Every field
/// has a default, so a partial document deserializes cleanly.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DatapathCfg {
    /// Indicate delivered datagrams with the host only borrowing the
    /// chain, and reclaim it as soon as the indication returns. This
    /// makes delivery deterministic for tests.
    pub synchronous_receive: bool,

    /// Hex dump every delivered datagram at verbose level.
    pub log_buffers: bool,

    /// Cross-layer contract checks.
    pub verify: VerifyCfg,
}

/// Cross-layer contract checks.
///
/// A failed check is always logged and counted. When `fatal` is set
/// it also panics, which is what debug builds want: these checks catch
/// a collaborator breaking its side of the contract.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct VerifyCfg {
    /// Check that every received node carries a channel in [11, 26].
    pub channels: bool,

    /// Check that a send completion matches the armed synchronous send
    /// and arrives while the radio is transmitting.
    pub send_complete: bool,

    /// Panic on a failed check.
    pub fatal: bool,
}

impl Default for VerifyCfg {
    fn default() -> Self {
        let on = cfg!(debug_assertions);
        Self { channels: on, send_complete: on, fatal: on }
    }
}

impl VerifyCfg {
    /// All checks enabled, none of them fatal.
    pub fn non_fatal() -> Self {
        Self { channels: true, send_complete: true, fatal: false }
    }

    /// No checks at all.
    pub fn off() -> Self {
        Self { channels: false, send_complete: false, fatal: false }
    }
}
