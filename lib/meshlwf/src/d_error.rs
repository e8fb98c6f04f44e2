// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Utility for converting nested drop reasons into lists of static
//! names, so a probe or log line can report them without paying the
//! `fmt` tax on the hot path.

pub use derror_macro::DError;

/// A trait used for walking chains of errors which store useful data in
/// a leaf node.
pub trait DError {
    /// Provide the name of an error's discriminant.
    fn discriminant(&self) -> &'static str;

    /// Provide a reference to the next error in the chain.
    fn child(&self) -> Option<&dyn DError>;

    /// Store data from a leaf error to be bundled with a probe.
    fn leaf_data(&self, _data: &mut [u64]) {}
}

/// A flattened error trace: the names of all `enum` discriminants
/// encountered when resolving an error, plus the data from its leaf.
#[derive(Clone, Debug)]
pub struct ErrorBlock<const L: usize> {
    len: usize,
    more: bool,
    data: [u64; 2],
    entries: [&'static str; L],
}

/// Signals that an [`ErrorBlock`] could not contain a new entry.
#[derive(Clone, Copy, Debug)]
pub struct ErrorBlockFull;

impl<const L: usize> Default for ErrorBlock<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const L: usize> ErrorBlock<L> {
    /// Create storage to hold at most `L` entries.
    pub fn new() -> Self {
        Self { entries: [""; L], len: 0, more: false, data: [0; 2] }
    }

    /// Flatten a nested error into a name list.
    ///
    /// This returns the partial block as an error if `err` has more
    /// layers than fit in this `ErrorBlock`.
    pub fn from_err(err: &dyn DError) -> Result<ErrorBlock<L>, ErrorBlock<L>> {
        let mut out = ErrorBlock::new();

        if out.append(err).is_err() { Err(out) } else { Ok(out) }
    }

    /// Push all layers (and data) of an error into a block.
    pub fn append(&mut self, err: &dyn DError) -> Result<(), ErrorBlockFull> {
        let mut top: Option<&dyn DError> = Some(err);
        while let Some(el) = top {
            self.append_name(el)?;
            top = el.child();

            if top.is_none() {
                el.leaf_data(&mut self.data[..]);
            }
        }
        Ok(())
    }

    /// Appends the top layer name of a given error.
    pub fn append_name(
        &mut self,
        err: &dyn DError,
    ) -> Result<(), ErrorBlockFull> {
        if self.len >= L {
            self.more = true;
            return Err(ErrorBlockFull);
        }

        self.entries[self.len] = err.discriminant();
        self.len += 1;

        Ok(())
    }

    /// Return the number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return whether this block contains no layer names.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return whether some layers did not fit.
    pub fn truncated(&self) -> bool {
        self.more
    }

    pub fn entries(&self) -> &[&'static str] {
        &self.entries[..self.len]
    }

    /// Provides access to data stored in a leaf error.
    pub fn data(&self) -> &[u64] {
        &self.data[..]
    }
}

/// Render an error as its `.`-joined discriminant path, e.g.
/// `Header.Truncated`.
pub fn path(err: &dyn DError) -> String {
    let mut out = String::from(err.discriminant());
    let mut top = err.child();
    while let Some(el) = top {
        out.push('.');
        out.push_str(el.discriminant());
        top = el.child();
    }
    out
}
