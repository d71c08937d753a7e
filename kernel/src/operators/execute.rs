//! The record interpreter: resolve a record's name hash and run it.
//!
//! Three-phase, per record:
//! 1. Index lookup: the record's index selects an entry of the action or
//!    effect name list.
//! 2. Registry lookup: the name hash must have a registered capability.
//! 3. Execution: the capability runs against a context scoped to the
//!    binding.
//!
//! Failures are values, never panics. The caller decides how a failure
//! affects dispatch.

use std::fmt;

use crate::carrier::descriptor::{Record, Records};
use crate::carrier::name_hash::NameHash;
use crate::operators::capability::{ActionContext, CapabilityRegistry, Flow};
use crate::operators::event::{ActionEvent, BindingInfo, BindingScope};
use crate::operators::registers::RegisterStore;
use crate::operators::sink::EffectSink;

/// Typed failure for one record. Fail-closed: the record has no effect
/// beyond what the capability did before rejecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteFailure {
    /// The name hash has no registered capability.
    UnresolvedReference { hash: NameHash },
    /// The capability rejected its operands or event.
    Capability { name: String, detail: String },
    /// The record bytes or index could not be decoded.
    CorruptRecord { detail: String },
}

impl fmt::Display for ExecuteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedReference { hash } => {
                write!(f, "no capability registered for {hash}")
            }
            Self::Capability { name, detail } => write!(f, "capability \"{name}\" failed: {detail}"),
            Self::CorruptRecord { detail } => write!(f, "corrupt record: {detail}"),
        }
    }
}

impl std::error::Error for ExecuteFailure {}

/// A failure tied to the binding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingFailure {
    pub binding: BindingInfo,
    pub failure: ExecuteFailure,
}

/// Summary of running every record of one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellOutcome {
    /// Records in the cell.
    pub records: usize,
    /// Records whose capability returned `Ok`.
    pub invocations: usize,
    /// Records that failed with [`ExecuteFailure::UnresolvedReference`].
    pub unresolved: usize,
    /// Some record asked to continue the layer walk.
    pub fallthrough: bool,
}

impl CellOutcome {
    /// Every record was unresolved: the cell behaves as unbound for this
    /// event. An empty cell is not unresolved.
    #[must_use]
    pub const fn all_unresolved(&self) -> bool {
        self.records > 0 && self.unresolved == self.records
    }
}

/// Executes records against one name list and capability registry.
pub struct Interpreter<'r> {
    names: &'r [NameHash],
    registry: &'r CapabilityRegistry,
    registers: &'r mut RegisterStore,
    sink: &'r mut dyn EffectSink,
}

impl<'r> Interpreter<'r> {
    /// `names` is the action list for action bindings and the effect list
    /// for effect bindings.
    #[must_use]
    pub fn new(
        names: &'r [NameHash],
        registry: &'r CapabilityRegistry,
        registers: &'r mut RegisterStore,
        sink: &'r mut dyn EffectSink,
    ) -> Self {
        Self {
            names,
            registry,
            registers,
            sink,
        }
    }

    /// Run one record.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteFailure`] if the index is outside the name list,
    /// the hash is unregistered, or the capability rejects the call.
    pub fn execute(
        &mut self,
        binding: BindingInfo,
        record: &Record<'_>,
        event: &ActionEvent,
    ) -> Result<Flow, ExecuteFailure> {
        // Phase 1: index -> name hash.
        let hash = usize::try_from(record.index)
            .ok()
            .and_then(|i| self.names.get(i))
            .copied()
            .ok_or_else(|| ExecuteFailure::CorruptRecord {
                detail: format!(
                    "index {} outside name list of {} entries",
                    record.index,
                    self.names.len()
                ),
            })?;

        // Phase 2: name hash -> capability.
        let Some(capability) = self.registry.get(hash) else {
            tracing::warn!(%hash, %binding, "unresolved capability reference");
            return Err(ExecuteFailure::UnresolvedReference { hash });
        };

        // Phase 3: execute.
        let mut ctx = ActionContext::new(binding, self.registers, self.sink);
        capability
            .execute(&mut ctx, event, &record.operands)
            .map_err(|e| ExecuteFailure::Capability {
                name: capability.name().to_owned(),
                detail: e.detail,
            })
    }

    /// Run every record of one cell in slot order.
    ///
    /// Failures are appended to `failures`; they never stop the remaining
    /// records from running.
    pub fn execute_cell(
        &mut self,
        scope: BindingScope,
        cell: u16,
        records: Records<'_>,
        event: &ActionEvent,
        failures: &mut Vec<BindingFailure>,
    ) -> CellOutcome {
        let mut outcome = CellOutcome::default();
        for (slot, record) in records.enumerate() {
            outcome.records += 1;
            let binding = BindingInfo {
                scope,
                cell,
                slot: u8::try_from(slot).unwrap_or(u8::MAX),
            };
            let result = match record {
                Ok(record) => self.execute(binding, &record, event),
                Err(e) => Err(ExecuteFailure::CorruptRecord {
                    detail: e.to_string(),
                }),
            };
            match result {
                Ok(flow) => {
                    outcome.invocations += 1;
                    outcome.fallthrough |= flow == Flow::Fallthrough;
                }
                Err(failure) => {
                    if matches!(failure, ExecuteFailure::UnresolvedReference { .. }) {
                        outcome.unresolved += 1;
                    }
                    failures.push(BindingFailure { binding, failure });
                }
            }
        }
        outcome
    }
}

impl fmt::Debug for Interpreter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("names", &self.names)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
