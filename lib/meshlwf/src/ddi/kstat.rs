// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Named 64-bit counters.
//!
//! A provider is a struct of [`KStatU64`] fields deriving
//! [`KStatProvider`]. The counters are atomic, so entry points running
//! concurrently on different contexts update them through `&self`.
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering::Relaxed;
pub use kstat_macro::KStatProvider;

/// Longest counter name accepted, including the terminating NUL the
/// host's statistics facility stores.
pub const KSTAT_STRLEN: usize = 31;

/// A provider of named counters.
///
/// Rather than implementing this trait manually, the kstat-macro
/// should be used.
///
/// ```ignore
/// #[derive(KStatProvider)]
/// struct SomeStats {
///     bytes_out: KStatU64,
///     errors_in: KStatU64,
/// }
/// ```
pub trait KStatProvider {
    const NUM_FIELDS: u32;
    type Snap;

    fn init(&mut self) -> Result<(), Error>;

    fn new() -> Self;

    fn num_fields(&self) -> u32 {
        Self::NUM_FIELDS
    }

    /// Return a snapshot of the stats. This is how you obtain a copy,
    /// as opposed to the traditional clone().
    fn snapshot(&self) -> Self::Snap;
}

/// An initialized [`KStatProvider`], registered under a module and
/// instance name.
///
/// Readers may see counters that are not consistent *as a whole*:
/// each value is uncorrupted, but a snapshot taken mid-operation can
/// show one counter bumped and a related one not yet.
pub struct KStatNamed<T: KStatProvider> {
    module: String,
    name: String,
    pub vals: Box<T>,
}

impl<T: KStatProvider> KStatNamed<T> {
    pub fn new(
        module: &str,
        name: &str,
        provider: T,
    ) -> Result<KStatNamed<T>, Error> {
        check_name(module)?;
        check_name(name)?;
        let mut vals = Box::new(provider);
        vals.init()?;
        Ok(Self { module: module.to_string(), name: name.to_string(), vals })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn check_name(name: &str) -> Result<(), Error> {
    if name.contains('\0') {
        return Err(Error::NulChar);
    }

    if name.len() + 1 > KSTAT_STRLEN {
        return Err(Error::NameTooLong(name.to_string()));
    }

    Ok(())
}

/// A 64-bit unsigned named counter.
#[derive(Debug, Default)]
pub struct KStatU64 {
    value: AtomicU64,
}

impl KStatU64 {
    pub fn init(&mut self, name: &str) -> Result<(), Error> {
        check_name(name)
    }

    pub fn new() -> Self {
        Self { value: AtomicU64::new(0) }
    }

    #[inline]
    pub fn incr(&self) {
        self.value.fetch_add(1, Relaxed);
    }

    #[inline]
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Relaxed);
    }

    pub fn set(&self, val: u64) {
        self.value.store(val, Relaxed);
    }

    pub fn val(&self) -> u64 {
        self.value.load(Relaxed)
    }
}

impl core::ops::AddAssign<u64> for KStatU64 {
    fn add_assign(&mut self, other: u64) {
        *self.value.get_mut() += other;
    }
}

/// A kstat error.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("kstat name too long: {0}")]
    NameTooLong(String),

    #[error("kstat name contains NUL char")]
    NulChar,
}
