//! Capabilities: the externally supplied behavior behind each name hash.
//!
//! The descriptor only names capabilities; what `"note"` or `"color"` does
//! is decided by whoever builds the [`CapabilityRegistry`]. The kernel
//! orchestrates decode, lookup, and side-effect routing and nothing more.
//!
//! A capability sees one record at a time through an [`ActionContext`]:
//! the binding's identity, the binding's own register, and the sink. It
//! cannot reach other bindings' registers or the layer state.

use std::collections::BTreeMap;
use std::fmt;

use crate::carrier::descriptor::Operands;
use crate::carrier::name_hash::NameHash;
use crate::operators::event::{ActionEvent, BindingInfo};
use crate::operators::registers::{RegisterKey, RegisterStore};
use crate::operators::sink::{EffectSink, SideEffect};

/// What the dispatcher does after a record runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// The event stops at this layer.
    Consume,
    /// Continue the walk at the next lower enabled layer.
    Fallthrough,
}

/// A capability rejected its operands or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityError {
    pub detail: String,
}

impl CapabilityError {
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    /// Operand `index` is missing or has the wrong type.
    #[must_use]
    pub fn operand(index: usize, expected: &str) -> Self {
        Self::new(format!("operand {index}: expected {expected}"))
    }
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for CapabilityError {}

/// Behavior bound to a name hash.
///
/// Implementations must return promptly: no blocking, no waiting across
/// events. Multi-step behavior keeps its progress in the binding register.
pub trait Capability {
    /// Name hashed with [`NameHash::of`] to form the registry key.
    fn name(&self) -> &str;

    /// Run one record.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError`] when the operands or event are not
    /// acceptable. The dispatcher reports the failure and carries on.
    fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        event: &ActionEvent,
        operands: &Operands<'_>,
    ) -> Result<Flow, CapabilityError>;
}

/// Per-record view handed to a capability.
pub struct ActionContext<'r> {
    binding: BindingInfo,
    registers: &'r mut RegisterStore,
    sink: &'r mut dyn EffectSink,
}

impl<'r> ActionContext<'r> {
    #[must_use]
    pub fn new(
        binding: BindingInfo,
        registers: &'r mut RegisterStore,
        sink: &'r mut dyn EffectSink,
    ) -> Self {
        Self {
            binding,
            registers,
            sink,
        }
    }

    #[must_use]
    pub const fn binding(&self) -> BindingInfo {
        self.binding
    }

    /// This binding's register, `None` on a miss.
    #[must_use]
    pub fn register(&self) -> Option<u32> {
        self.registers.get(RegisterKey::from(self.binding))
    }

    pub fn set_register(&mut self, value: u32) -> Option<u32> {
        self.registers.set(RegisterKey::from(self.binding), value)
    }

    pub fn clear_register(&mut self) -> Option<u32> {
        self.registers.clear(RegisterKey::from(self.binding))
    }

    /// Request a color for this binding's cell.
    pub fn set_color(&mut self, rgb: u32) {
        self.sink.emit(SideEffect::Color {
            cell: self.binding.cell,
            rgb,
        });
    }

    pub fn emit(&mut self, effect: SideEffect) {
        self.sink.emit(effect);
    }
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("binding", &self.binding)
            .field("register", &self.register())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Error type for registry construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two capabilities hash to the same key.
    DuplicateName { hash: NameHash, name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { hash, name } => {
                write!(f, "capability \"{name}\" collides with an existing entry at {hash}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Name hash to capability. `BTreeMap` for deterministic iteration.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<NameHash, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability under the hash of its name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the hash is taken.
    pub fn register(&mut self, capability: Box<dyn Capability>) -> Result<NameHash, RegistryError> {
        let hash = NameHash::of(capability.name());
        if self.entries.contains_key(&hash) {
            return Err(RegistryError::DuplicateName {
                hash,
                name: capability.name().to_owned(),
            });
        }
        self.entries.insert(hash, capability);
        Ok(hash)
    }

    #[must_use]
    pub fn get(&self, hash: NameHash) -> Option<&dyn Capability> {
        self.entries.get(&hash).map(|c| &**c)
    }

    #[must_use]
    pub fn contains(&self, hash: NameHash) -> bool {
        self.entries.contains_key(&hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in hash order.
    pub fn names(&self) -> impl Iterator<Item = (NameHash, &str)> + '_ {
        self.entries.iter().map(|(&h, c)| (h, c.name()))
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.names()).finish()
    }
}
