// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The datapath engine.
//!
//! [`datapath::Datapath`] holds the entry points the host framework
//! and the mesh stack call. The other modules are the pieces it is
//! built from: the seams to its collaborators ([`host`], [`mesh`],
//! [`events`]), the delivery filter ([`filter`], [`ip6`]), and the
//! contract checks ([`verify`]).
pub mod datapath;
pub mod events;
pub mod filter;
pub mod host;
pub mod ip6;
pub mod mesh;
pub mod verify;

pub use datapath::Datapath;
pub use datapath::DatapathBuilder;
