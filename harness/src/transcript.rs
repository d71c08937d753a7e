//! Replay transcript: what a scenario did, step by step, as canonical JSON.
//!
//! The transcript records every observable outcome of a replay: dispatch
//! outcomes, emitted side effects in order, per-binding failures, and the
//! final register contents. It is content-addressed through
//! [`Transcript::digest`], so two replays agree exactly when their digests
//! match.
//!
//! # Layout
//!
//! ```text
//! {
//!   "descriptor": { "digest", "version", "width", "height", "layers",
//!                   "actions", "effects", "bound_actions", "bound_effects" },
//!   "entries": [ { "step", "op", "result", "effects", "failures" }, ... ],
//!   "registers": [ { "scope", "layer"?, "cell", "slot", "value" }, ... ],
//!   "schema_version": "transcript.v1"
//! }
//! ```

use uad_kernel::carrier::digest::{canonical_hash, ContentHash, HashDomain};
use uad_kernel::operators::event::BindingScope;
use uad_kernel::operators::execute::BindingFailure;
use uad_kernel::operators::registers::RegisterKey;
use uad_kernel::operators::sink::SideEffect;
use uad_kernel::runtime::dispatcher::{DispatchOutcome, LoadSummary};

use crate::canon::{canonical_json_bytes, CanonError};

/// Schema tag written into every transcript.
pub const TRANSCRIPT_SCHEMA_VERSION: &str = "transcript.v1";

/// One executed scenario step.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub step: usize,
    pub op: &'static str,
    /// Step-specific result object.
    pub result: serde_json::Value,
    pub effects: Vec<SideEffect>,
    pub failures: Vec<BindingFailure>,
}

/// A complete replay record.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub descriptor: LoadSummary,
    pub entries: Vec<TranscriptEntry>,
    pub registers: Vec<(RegisterKey, u32)>,
}

impl Transcript {
    /// JSON form (not yet canonical).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let d = &self.descriptor;
        serde_json::json!({
            "descriptor": {
                "actions": d.action_count,
                "bound_actions": d.bound_actions,
                "bound_effects": d.bound_effects,
                "digest": d.digest.as_str(),
                "effects": d.effect_count,
                "height": d.geometry.height,
                "layers": d.layer_count,
                "version": d.version,
                "width": d.geometry.width,
            },
            "entries": self.entries.iter().map(entry_json).collect::<Vec<_>>(),
            "registers": self
                .registers
                .iter()
                .map(|&(key, value)| register_json(key, value))
                .collect::<Vec<_>>(),
            "schema_version": TRANSCRIPT_SCHEMA_VERSION,
        })
    }

    /// Canonical JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CanonError`] if canonicalization fails.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CanonError> {
        canonical_json_bytes(&self.to_json())
    }

    /// Content digest over the canonical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CanonError`] if canonicalization fails.
    pub fn digest(&self) -> Result<ContentHash, CanonError> {
        Ok(canonical_hash(HashDomain::Transcript, &self.canonical_bytes()?))
    }

    /// All side effects across all entries, in emission order.
    pub fn effects(&self) -> impl Iterator<Item = &SideEffect> + '_ {
        self.entries.iter().flat_map(|e| e.effects.iter())
    }
}

/// Result object for a key dispatch.
#[must_use]
pub fn outcome_json(outcome: DispatchOutcome, invocations: usize) -> serde_json::Value {
    let (name, layer) = match outcome {
        DispatchOutcome::NotLoaded => ("not_loaded", None),
        DispatchOutcome::Unmapped => ("unmapped", None),
        DispatchOutcome::Handled { layer } => ("handled", Some(layer)),
        DispatchOutcome::Unhandled { stopped_at } => ("unhandled", stopped_at),
    };
    serde_json::json!({
        "invocations": invocations,
        "layer": layer,
        "outcome": name,
    })
}

fn entry_json(entry: &TranscriptEntry) -> serde_json::Value {
    serde_json::json!({
        "effects": entry.effects.iter().map(effect_json).collect::<Vec<_>>(),
        "failures": entry.failures.iter().map(failure_json).collect::<Vec<_>>(),
        "op": entry.op,
        "result": entry.result,
        "step": entry.step,
    })
}

fn effect_json(effect: &SideEffect) -> serde_json::Value {
    match effect {
        SideEffect::Color { cell, rgb } => serde_json::json!({
            "cell": cell,
            "kind": "color",
            "rgb": format!("{rgb:06x}"),
        }),
        SideEffect::Message { payload } => serde_json::json!({
            "kind": "message",
            "payload": hex::encode(payload),
        }),
    }
}

fn failure_json(failure: &BindingFailure) -> serde_json::Value {
    serde_json::json!({
        "binding": failure.binding.to_string(),
        "error": failure.failure.to_string(),
    })
}

fn register_json(key: RegisterKey, value: u32) -> serde_json::Value {
    let (scope, layer) = match key.scope {
        BindingScope::Action { layer } => ("action", Some(layer)),
        BindingScope::Effect => ("effect", None),
    };
    serde_json::json!({
        "cell": key.cell,
        "layer": layer,
        "scope": scope,
        "slot": key.slot,
        "value": value,
    })
}
