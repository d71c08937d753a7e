//! Per-binding scratch registers.
//!
//! Sparse `RegisterKey -> u32` store. A missing key is a register miss
//! (`None`), distinct from a stored zero. `BTreeMap` keeps iteration order
//! deterministic for transcripts.

use std::collections::BTreeMap;

use crate::operators::event::{BindingInfo, BindingScope};

/// Address of one register: the binding that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterKey {
    pub scope: BindingScope,
    pub cell: u16,
    pub slot: u8,
}

impl RegisterKey {
    #[must_use]
    pub const fn action(layer: u8, cell: u16, slot: u8) -> Self {
        Self {
            scope: BindingScope::Action { layer },
            cell,
            slot,
        }
    }

    #[must_use]
    pub const fn effect(cell: u16, slot: u8) -> Self {
        Self {
            scope: BindingScope::Effect,
            cell,
            slot,
        }
    }
}

impl From<BindingInfo> for RegisterKey {
    fn from(binding: BindingInfo) -> Self {
        Self {
            scope: binding.scope,
            cell: binding.cell,
            slot: binding.slot,
        }
    }
}

/// The register store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterStore {
    values: BTreeMap<RegisterKey, u32>,
}

impl RegisterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous value if any.
    pub fn set(&mut self, key: RegisterKey, value: u32) -> Option<u32> {
        self.values.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: RegisterKey) -> Option<u32> {
        self.values.get(&key).copied()
    }

    /// Remove `key`, returning its value if it was set.
    pub fn clear(&mut self, key: RegisterKey) -> Option<u32> {
        self.values.remove(&key)
    }

    pub fn clear_all(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All set registers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (RegisterKey, u32)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }
}
