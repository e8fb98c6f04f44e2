// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Abstractions over the host framework's driver services: locking,
//! counters, and the buffer-list packet representation.
pub mod kstat;
pub mod nbl;
pub mod sync;
