//! Per-pass reference tables
//!
//! AMF deduplicates repeated entries by sending a small integer handle
//! instead of the entry itself. Two flavors are needed and must not be
//! conflated:
//!
//! - [`EqualityTable`]: equal values share a handle (strings, traits)
//! - [`StrictTable`]: only the same instance shares a handle (objects,
//!   arrays, dictionaries, vectors, byte arrays)
//!
//! Handles are allocated from 0 in first-seen order. The decode side
//! mirrors this with [`ReadTable`], which appends in consumption order.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{AmfError, TableKind};

use super::value::NodeId;

/// Outcome of interning a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interned {
    /// First sighting; the caller must write the full definition
    New(u32),
    /// Already seen; the caller writes a reference to this handle
    Existing(u32),
}

impl Interned {
    /// The handle regardless of whether it was just allocated
    pub fn handle(self) -> u32 {
        match self {
            Interned::New(h) | Interned::Existing(h) => h,
        }
    }

    /// Check if this call allocated the handle
    pub fn is_new(self) -> bool {
        matches!(self, Interned::New(_))
    }
}

/// Common contract shared by both table flavors
pub trait ReferenceTable {
    type Key;

    /// Return the handle for `key`, allocating the next one on first sight
    fn intern(&mut self, key: &Self::Key) -> Interned;

    /// Number of handles allocated so far
    fn size(&self) -> usize;

    /// Forget every handle (start of a new body)
    fn clear(&mut self);
}

/// Table keyed by `Hash + Eq`: equal values collapse to one handle
#[derive(Debug, Clone)]
pub struct EqualityTable<K> {
    handles: HashMap<K, u32>,
}

impl<K: Hash + Eq + Clone> EqualityTable<K> {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    /// Intern through a borrowed form, cloning into the table only on first sight
    pub fn intern_borrowed<Q>(&mut self, key: &Q) -> Interned
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(&handle) = self.handles.get(key) {
            return Interned::Existing(handle);
        }
        let handle = self.handles.len() as u32;
        self.handles.insert(key.to_owned(), handle);
        Interned::New(handle)
    }

    /// Look up a handle without allocating
    pub fn get<Q>(&self, key: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.handles.get(key).copied()
    }
}

impl<K: Hash + Eq + Clone> Default for EqualityTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone> ReferenceTable for EqualityTable<K> {
    type Key = K;

    fn intern(&mut self, key: &K) -> Interned {
        if let Some(&handle) = self.handles.get(key) {
            return Interned::Existing(handle);
        }
        let handle = self.handles.len() as u32;
        self.handles.insert(key.clone(), handle);
        Interned::New(handle)
    }

    fn size(&self) -> usize {
        self.handles.len()
    }

    fn clear(&mut self) {
        self.handles.clear();
    }
}

/// Table keyed by instance identity
///
/// In the codecs the identity is the arena [`NodeId`]; the host encoder
/// keys it by pointer address instead. Inline dates, byte arrays and XML
/// (scalars without a node) take an anonymous slot via
/// [`StrictTable::reserve`].
#[derive(Debug, Clone)]
pub struct StrictTable<I = NodeId> {
    handles: HashMap<I, u32>,
    next_handle: u32,
}

impl<I: Hash + Eq + Copy> StrictTable<I> {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Consume the next handle without a key
    pub fn reserve(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Look up a handle without allocating
    pub fn get(&self, id: &I) -> Option<u32> {
        self.handles.get(id).copied()
    }
}

impl<I: Hash + Eq + Copy> Default for StrictTable<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Hash + Eq + Copy> ReferenceTable for StrictTable<I> {
    type Key = I;

    fn intern(&mut self, id: &I) -> Interned {
        if let Some(&handle) = self.handles.get(id) {
            return Interned::Existing(handle);
        }
        let handle = self.reserve();
        self.handles.insert(*id, handle);
        Interned::New(handle)
    }

    fn size(&self) -> usize {
        self.next_handle as usize
    }

    fn clear(&mut self) {
        self.handles.clear();
        self.next_handle = 0;
    }
}

/// Decode-side table: entries are appended as definitions are consumed
#[derive(Debug, Clone)]
pub struct ReadTable<T> {
    entries: Vec<T>,
    kind: TableKind,
    max: usize,
}

impl<T> ReadTable<T> {
    pub fn new(kind: TableKind, max: usize) -> Self {
        Self {
            entries: Vec::new(),
            kind,
            max,
        }
    }

    /// Append an entry, returning its handle
    pub fn push(&mut self, entry: T) -> Result<u32, AmfError> {
        if self.entries.len() >= self.max {
            return Err(AmfError::TooManyReferences {
                table: self.kind,
                max: self.max,
            });
        }
        self.entries.push(entry);
        Ok((self.entries.len() - 1) as u32)
    }

    /// Resolve a handle read from the wire at `offset`
    pub fn get(&self, index: u32, offset: usize) -> Result<&T, AmfError> {
        self.entries
            .get(index as usize)
            .ok_or(AmfError::InvalidReference {
                table: self.kind,
                index,
                offset,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
