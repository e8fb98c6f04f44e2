// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types shared between the meshlwf datapath and its consumers: the
//! host framework glue, the lifecycle component, and tooling.

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod cfg;
pub mod ip;

pub use cfg::*;
pub use ip::*;

/// The direction a buffer chain is travelling relative to the mesh
/// stack.
///
/// `In` chains arrived from the host framework (receive indications),
/// `Out` chains were handed down by the upper layer for transmission.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Direction {
    In = 1,
    Out = 2,
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dirstr = match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        };

        write!(f, "{dirstr}")
    }
}

/// The operational state of the radio as seen by the datapath.
///
/// The state is owned by the lifecycle component. The datapath only
/// ever reads it: ingress refuses traffic while `Disabled`, and a send
/// completion is only expected while `Transmit`.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[repr(u8)]
pub enum PhyState {
    #[default]
    Disabled = 0,
    Sleep = 1,
    Receive = 2,
    Transmit = 3,
}

impl PhyState {
    pub const fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Disabled),
            1 => Some(Self::Sleep),
            2 => Some(Self::Receive),
            3 => Some(Self::Transmit),
            _ => None,
        }
    }
}

impl Display for PhyState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Sleep => "sleep",
            Self::Receive => "receive",
            Self::Transmit => "transmit",
        };
        write!(f, "{s}")
    }
}

impl core::str::FromStr for PhyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "sleep" => Ok(Self::Sleep),
            "receive" => Ok(Self::Receive),
            "transmit" => Ok(Self::Transmit),
            _ => Err(format!("invalid phy state: {s}")),
        }
    }
}

/// A host framework port number.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct PortNumber(pub u32);

impl PortNumber {
    /// The port used for every indication the datapath originates.
    pub const DEFAULT: Self = Self(0);
}

impl Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque identifier grouping outbound chains for cancellation.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct CancelId(pub u64);

impl Display for CancelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The completion status carried by each buffer-list node.
///
/// The datapath itself only ever writes [`Self::Success`],
/// [`Self::Paused`] and [`Self::NotSupported`]. The worker's queue
/// writes [`Self::RequestAborted`] for cancelled sends. Anything else
/// was propagated from a lower layer.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum NblStatus {
    #[default]
    Success,
    Paused,
    NotSupported,
    RequestAborted,
    Failure(u32),
}

impl NblStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for NblStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Paused => write!(f, "paused"),
            Self::NotSupported => write!(f, "not supported"),
            Self::RequestAborted => write!(f, "request aborted"),
            Self::Failure(code) => write!(f, "failure ({code:#010x})"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn phy_state_round_trips_through_u8() {
        for state in [
            PhyState::Disabled,
            PhyState::Sleep,
            PhyState::Receive,
            PhyState::Transmit,
        ] {
            assert_eq!(PhyState::from_u8(state as u8), Some(state));
        }
        assert_eq!(PhyState::from_u8(4), None);
    }

    #[test]
    fn phy_state_parse() {
        assert_eq!("transmit".parse::<PhyState>(), Ok(PhyState::Transmit));
        assert!("bogus".parse::<PhyState>().is_err());
    }

    #[test]
    fn status_display() {
        assert_eq!(NblStatus::Paused.to_string(), "paused");
        assert_eq!(
            NblStatus::Failure(0xc000_0001).to_string(),
            "failure (0xc0000001)"
        );
        assert!(NblStatus::Success.is_success());
        assert!(!NblStatus::NotSupported.is_success());
    }
}
