//! Scenario replay: drive a [`Runtime`] step by step and record a
//! [`Transcript`].
//!
//! [`Session`] owns the runtime, a recording sink and the transcript being
//! built. [`replay`] is the one-call form; [`replay_files`] and
//! [`write_transcript`] add the file boundary used by the `uad_replay`
//! binary.

use std::path::Path;

use uad_kernel::carrier::descriptor::DescriptorError;
use uad_kernel::carrier::digest::ContentHash;
use uad_kernel::operators::capability::{CapabilityRegistry, RegistryError};
use uad_kernel::operators::execute::BindingFailure;
use uad_kernel::operators::sink::RecordingSink;
use uad_kernel::runtime::config::RuntimeConfig;
use uad_kernel::runtime::dispatcher::{LifecycleReport, LoadSummary, Runtime};
use uad_kernel::runtime::layer_state::LayerKind;

use crate::canon::CanonError;
use crate::capabilities::{standard_registry, unregistered_names};
use crate::scenario::{parse_scenario, Scenario, ScenarioError, Step};
use crate::transcript::{outcome_json, Transcript, TranscriptEntry};

/// Transcript file written by [`write_transcript`].
pub const TRANSCRIPT_FILENAME: &str = "transcript.json";
/// Digest file written by [`write_transcript`].
pub const DIGEST_FILENAME: &str = "transcript_digest.txt";

/// Error from a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    Descriptor(DescriptorError),
    Scenario(ScenarioError),
    Registry(RegistryError),
    Canon(CanonError),
    /// [`Session::finish`] before a successful load.
    NotLoaded,
    Io { detail: String },
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Descriptor(e) => write!(f, "descriptor rejected: {e}"),
            Self::Scenario(e) => write!(f, "{e}"),
            Self::Registry(e) => write!(f, "capability registry: {e}"),
            Self::Canon(e) => write!(f, "transcript: {e}"),
            Self::NotLoaded => write!(f, "no descriptor loaded"),
            Self::Io { detail } => write!(f, "I/O error: {detail}"),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Descriptor(e) => Some(e),
            Self::Scenario(e) => Some(e),
            Self::Registry(e) => Some(e),
            Self::Canon(e) => Some(e),
            Self::NotLoaded | Self::Io { .. } => None,
        }
    }
}

impl From<DescriptorError> for ReplayError {
    fn from(e: DescriptorError) -> Self {
        Self::Descriptor(e)
    }
}

impl From<ScenarioError> for ReplayError {
    fn from(e: ScenarioError) -> Self {
        Self::Scenario(e)
    }
}

impl From<RegistryError> for ReplayError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<CanonError> for ReplayError {
    fn from(e: CanonError) -> Self {
        Self::Canon(e)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A runtime plus everything needed to record what it does.
pub struct Session<'a, 'r> {
    runtime: Runtime<'a>,
    registry: &'r CapabilityRegistry,
    sink: RecordingSink,
    summary: Option<LoadSummary>,
    entries: Vec<TranscriptEntry>,
}

impl<'a, 'r> Session<'a, 'r> {
    #[must_use]
    pub fn new(config: RuntimeConfig, registry: &'r CapabilityRegistry) -> Self {
        Self {
            runtime: Runtime::new(config),
            registry,
            sink: RecordingSink::new(),
            summary: None,
            entries: Vec::new(),
        }
    }

    /// Load descriptor bytes into the runtime.
    ///
    /// # Errors
    ///
    /// Returns the runtime's [`DescriptorError`]; the session keeps any
    /// previously loaded descriptor.
    pub fn load(&mut self, bytes: &'a [u8]) -> Result<&LoadSummary, DescriptorError> {
        let summary = self.runtime.load(bytes)?;
        if let Some(descriptor) = self.runtime.descriptor() {
            for hash in unregistered_names(descriptor, self.registry) {
                tracing::warn!(%hash, "descriptor references an unregistered capability");
            }
        }
        Ok(self.summary.insert(summary))
    }

    #[must_use]
    pub const fn runtime(&self) -> &Runtime<'a> {
        &self.runtime
    }

    /// Entries recorded so far.
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Execute one step and record it.
    pub fn run_step(&mut self, step: Step) -> &TranscriptEntry {
        let (result, failures) = match step {
            Step::Key { key, info } => {
                let report = self
                    .runtime
                    .key_event(key, info, self.registry, &mut self.sink);
                let mut result = outcome_json(report.outcome, report.invocations);
                result["key"] = key.to_string().into();
                result["state"] = info.state.as_str().into();
                (result, report.failures)
            }
            Step::Render => {
                let report = self.runtime.render_tick(self.registry, &mut self.sink);
                (
                    serde_json::json!({ "cells": report.cells, "invocations": report.invocations }),
                    report.failures,
                )
            }
            Step::Effects { cell } => {
                let report = self
                    .runtime
                    .execute_effects(cell, self.registry, &mut self.sink);
                (
                    serde_json::json!({
                        "cell": cell,
                        "cells": report.cells,
                        "invocations": report.invocations,
                    }),
                    report.failures,
                )
            }
            Step::SetLayer { layer, kind, on } => {
                let changed = self.runtime.set_layer_state(layer, kind, on);
                (
                    serde_json::json!({
                        "changed": changed,
                        "kind": match kind {
                            LayerKind::Enabled => "enabled",
                            LayerKind::Passthrough => "passthrough",
                        },
                        "layer": layer,
                        "on": on,
                        "top_layer": self.runtime.top_layer(),
                    }),
                    Vec::new(),
                )
            }
            Step::ResetLayers => {
                self.runtime.reset_layer_state();
                (
                    serde_json::json!({ "top_layer": self.runtime.top_layer() }),
                    Vec::new(),
                )
            }
            Step::InitLayer(selector) => lifecycle_result(self.runtime.initialize_layer(
                selector,
                self.registry,
                &mut self.sink,
            )),
            Step::DeinitLayer(selector) => lifecycle_result(self.runtime.deinitialize_layer(
                selector,
                self.registry,
                &mut self.sink,
            )),
        };

        let index = self.entries.len();
        tracing::debug!(
            step = index,
            op = step.op(),
            effects = self.sink.len(),
            failures = failures.len(),
            "scenario step"
        );
        self.entries.push(TranscriptEntry {
            step: index,
            op: step.op(),
            result,
            effects: self.sink.take(),
            failures,
        });
        &self.entries[index]
    }

    /// Execute every step in order.
    pub fn run(&mut self, steps: &[Step]) {
        for &step in steps {
            self.run_step(step);
        }
    }

    /// Close the session into a transcript.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::NotLoaded`] if no descriptor was ever loaded.
    pub fn finish(self) -> Result<Transcript, ReplayError> {
        let descriptor = self.summary.ok_or(ReplayError::NotLoaded)?;
        Ok(Transcript {
            descriptor,
            entries: self.entries,
            registers: self.runtime.registers().iter().collect(),
        })
    }
}

fn lifecycle_result(report: LifecycleReport) -> (serde_json::Value, Vec<BindingFailure>) {
    (
        serde_json::json!({
            "cells": report.cells,
            "invocations": report.invocations,
            "layer": report.layer,
        }),
        report.failures,
    )
}

// ---------------------------------------------------------------------------
// One-call replay
// ---------------------------------------------------------------------------

/// Load `descriptor` and run `scenario` against it.
///
/// # Errors
///
/// Returns [`ReplayError::Descriptor`] if the descriptor is rejected.
pub fn replay(
    descriptor: &[u8],
    scenario: &Scenario,
    registry: &CapabilityRegistry,
) -> Result<Transcript, ReplayError> {
    let mut session = Session::new(scenario.config, registry);
    let summary = session.load(descriptor)?;
    tracing::info!(
        digest = %summary.digest,
        layers = summary.layer_count,
        steps = scenario.steps.len(),
        "replaying scenario"
    );
    session.run(&scenario.steps);
    session.finish()
}

/// Read a descriptor and a `scenario.v1` file and replay them with the
/// stock capabilities.
///
/// # Errors
///
/// Returns [`ReplayError`] on I/O failure, a bad scenario, or a rejected
/// descriptor.
pub fn replay_files(descriptor_path: &Path, scenario_path: &Path) -> Result<Transcript, ReplayError> {
    let descriptor = read(descriptor_path)?;
    let scenario = parse_scenario(&read(scenario_path)?)?;
    let registry = standard_registry()?;
    replay(&descriptor, &scenario, &registry)
}

/// Write `transcript.json` (canonical) and `transcript_digest.txt` into
/// `dir`, creating it if needed. Returns the digest.
///
/// # Errors
///
/// Returns [`ReplayError::Io`] on filesystem failure.
pub fn write_transcript(dir: &Path, transcript: &Transcript) -> Result<ContentHash, ReplayError> {
    let bytes = transcript.canonical_bytes()?;
    let digest = transcript.digest()?;
    std::fs::create_dir_all(dir).map_err(|e| ReplayError::Io {
        detail: format!("create_dir_all {}: {e}", dir.display()),
    })?;
    write(&dir.join(TRANSCRIPT_FILENAME), &bytes)?;
    write(&dir.join(DIGEST_FILENAME), digest.as_str().as_bytes())?;
    Ok(digest)
}

fn read(path: &Path) -> Result<Vec<u8>, ReplayError> {
    std::fs::read(path).map_err(|e| ReplayError::Io {
        detail: format!("read {}: {e}", path.display()),
    })
}

fn write(path: &Path, content: &[u8]) -> Result<(), ReplayError> {
    std::fs::write(path, content).map_err(|e| ReplayError::Io {
        detail: format!("write {}: {e}", path.display()),
    })
}
