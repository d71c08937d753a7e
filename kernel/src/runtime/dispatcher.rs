//! `Runtime`: the single owner of loaded descriptor state, layer state, and
//! registers, and the entry point for every inbound event.
//!
//! Every entry point takes `&mut self`, so a load can never interleave with
//! an in-flight dispatch. Capabilities and the sink are passed per call;
//! the runtime owns neither.
//!
//! # Dispatch walk
//!
//! For a grid key, enabled layers are visited from the top down:
//!
//! - bound cell: all records run; the event stops here unless a record
//!   returned [`Flow::Fallthrough`]. A cell whose records are all
//!   unresolved counts as unbound for this event.
//! - unbound cell: the walk continues only if the layer's passthrough bit
//!   is set; otherwise it stops unhandled at that layer.
//!
//! [`Flow::Fallthrough`]: crate::operators::capability::Flow::Fallthrough

use crate::carrier::descriptor::{Descriptor, DescriptorError, Geometry};
use crate::carrier::digest::{descriptor_digest, ContentHash};
use crate::operators::capability::CapabilityRegistry;
use crate::operators::event::{ActionEvent, BindingScope, KeyId, KeyInfo};
use crate::operators::execute::{BindingFailure, Interpreter};
use crate::operators::registers::{RegisterKey, RegisterStore};
use crate::operators::sink::EffectSink;
use crate::runtime::config::RuntimeConfig;
use crate::runtime::layer_state::{LayerKind, LayerSelector, LayerState};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Facts about a successfully loaded descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub version: u64,
    pub geometry: Geometry,
    pub layer_count: u8,
    pub action_count: usize,
    pub effect_count: usize,
    /// Bound cells across all action layers.
    pub bound_actions: usize,
    pub bound_effects: usize,
    pub digest: ContentHash,
}

/// Where a key event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
    /// No descriptor is loaded.
    NotLoaded,
    /// Non-grid key, or a grid key outside the loaded geometry.
    Unmapped,
    /// Consumed by a binding on `layer`.
    Handled { layer: u8 },
    /// Nothing consumed the event. `stopped_at` is the non-passthrough
    /// layer that blocked the walk, `None` if the walk ran out of layers.
    ///
    /// Records may still have run: a binding that returns
    /// `Flow::Fallthrough` passes the event on, and if no lower layer
    /// consumes it the outcome stays `Unhandled`. Check
    /// [`DispatchReport::invocations`] to tell the two apart.
    Unhandled { stopped_at: Option<u8> },
}

impl DispatchOutcome {
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

/// Result of one key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    /// Records whose capability ran successfully.
    pub invocations: usize,
    pub failures: Vec<BindingFailure>,
}

impl DispatchReport {
    const fn bare(outcome: DispatchOutcome) -> Self {
        Self {
            outcome,
            invocations: 0,
            failures: Vec::new(),
        }
    }
}

/// Result of running effect bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectsReport {
    /// Bound effect cells that ran.
    pub cells: usize,
    pub invocations: usize,
    pub failures: Vec<BindingFailure>,
}

/// Result of a layer lifecycle walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    /// Resolved layer, `None` if nothing is loaded or the selector did not
    /// resolve.
    pub layer: Option<u8>,
    /// Bound cells visited.
    pub cells: usize,
    pub invocations: usize,
    pub failures: Vec<BindingFailure>,
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// The UAD runtime. Borrows descriptor bytes for `'a`.
#[derive(Debug, Clone)]
pub struct Runtime<'a> {
    config: RuntimeConfig,
    descriptor: Option<Descriptor<'a>>,
    layers: LayerState,
    registers: RegisterStore,
}

impl Default for Runtime<'_> {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl<'a> Runtime<'a> {
    /// A runtime with nothing loaded and layer state from `config`.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            layers: LayerState::new(&config),
            config,
            descriptor: None,
            registers: RegisterStore::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // --- Loading -----------------------------------------------------------

    /// Parse `bytes` and, on success, replace the loaded descriptor.
    ///
    /// All-or-nothing: on failure the previous descriptor, registers, and
    /// layer state are untouched. On success registers are cleared and the
    /// layer bitmaps are kept, masked to the new layer count.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] for any malformed, mismatched, or
    /// out-of-range descriptor.
    pub fn load(&mut self, bytes: &'a [u8]) -> Result<LoadSummary, DescriptorError> {
        let descriptor = match Descriptor::parse_with(bytes, self.config.parse_options()) {
            Ok(d) => d,
            Err(error) => {
                tracing::warn!(%error, len = bytes.len(), "descriptor rejected");
                return Err(error);
            }
        };

        let summary = LoadSummary {
            version: descriptor.version(),
            geometry: descriptor.geometry(),
            layer_count: descriptor.layer_count(),
            action_count: descriptor.actions().len(),
            effect_count: descriptor.effects().len(),
            bound_actions: descriptor.action_table().bound_count(),
            bound_effects: descriptor.effect_table().bound_count(),
            digest: descriptor_digest(bytes),
        };

        self.layers.set_width(descriptor.layer_count());
        self.registers.clear_all();
        self.descriptor = Some(descriptor);

        tracing::debug!(
            width = summary.geometry.width,
            height = summary.geometry.height,
            layers = summary.layer_count,
            actions = summary.action_count,
            effects = summary.effect_count,
            digest = %summary.digest,
            "descriptor loaded"
        );
        Ok(summary)
    }

    /// Drop the loaded descriptor and all registers. Returns whether
    /// anything was loaded.
    pub fn unload(&mut self) -> bool {
        let was_loaded = self.descriptor.take().is_some();
        self.registers.clear_all();
        self.layers.set_width(crate::carrier::descriptor::MAX_LAYERS);
        was_loaded
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.descriptor.is_some()
    }

    #[must_use]
    pub const fn descriptor(&self) -> Option<&Descriptor<'a>> {
        self.descriptor.as_ref()
    }

    /// Cell index of a key within the loaded geometry.
    #[must_use]
    pub fn cell_for_key(&self, key: KeyId) -> Option<u16> {
        let (x, y) = key.grid_xy()?;
        self.descriptor.as_ref()?.geometry().cell_index(x, y)
    }

    // --- Layer state -------------------------------------------------------

    #[must_use]
    pub const fn layer_state(&self) -> &LayerState {
        &self.layers
    }

    #[must_use]
    pub const fn top_layer(&self) -> Option<u8> {
        self.layers.top_layer()
    }

    /// Set one layer bit. Out-of-range layers are ignored; returns whether
    /// the write applied.
    pub fn set_layer_state(&mut self, layer: u8, kind: LayerKind, on: bool) -> bool {
        let applied = self.layers.set(layer, kind, on);
        tracing::trace!(layer, ?kind, on, applied, "layer state set");
        applied
    }

    #[must_use]
    pub const fn get_layer_state(&self, layer: u8, kind: LayerKind) -> bool {
        self.layers.get(layer, kind)
    }

    /// Restore both bitmaps to the configured defaults.
    pub fn reset_layer_state(&mut self) {
        self.layers.reset(&self.config);
    }

    // --- Registers ---------------------------------------------------------

    pub fn set_register(&mut self, key: RegisterKey, value: u32) -> Option<u32> {
        self.registers.set(key, value)
    }

    #[must_use]
    pub fn get_register(&self, key: RegisterKey) -> Option<u32> {
        self.registers.get(key)
    }

    pub fn clear_register(&mut self, key: RegisterKey) -> Option<u32> {
        self.registers.clear(key)
    }

    #[must_use]
    pub const fn registers(&self) -> &RegisterStore {
        &self.registers
    }

    // --- Dispatch ----------------------------------------------------------

    /// Dispatch one physical key transition through the layer stack.
    pub fn key_event(
        &mut self,
        key: KeyId,
        info: KeyInfo,
        registry: &CapabilityRegistry,
        sink: &mut dyn EffectSink,
    ) -> DispatchReport {
        let Some(descriptor) = self.descriptor.as_ref() else {
            return DispatchReport::bare(DispatchOutcome::NotLoaded);
        };
        let Some(cell) = key
            .grid_xy()
            .and_then(|(x, y)| descriptor.geometry().cell_index(x, y))
        else {
            tracing::trace!(%key, "unmapped key");
            return DispatchReport::bare(DispatchOutcome::Unmapped);
        };

        let event = ActionEvent::KeyEvent(info);
        let mut report = DispatchReport::bare(DispatchOutcome::Unhandled { stopped_at: None });
        let mut interp = Interpreter::new(descriptor.actions(), registry, &mut self.registers, sink);

        for layer in self.layers.enabled_layers() {
            let outcome = match descriptor.action_records(layer, cell) {
                Some(records) => {
                    let scope = BindingScope::Action { layer };
                    interp.execute_cell(scope, cell, records, &event, &mut report.failures)
                }
                None => {
                    if self.layers.is_passthrough(layer) {
                        continue;
                    }
                    report.outcome = DispatchOutcome::Unhandled {
                        stopped_at: Some(layer),
                    };
                    break;
                }
            };
            report.invocations += outcome.invocations;

            if outcome.all_unresolved() {
                if self.layers.is_passthrough(layer) {
                    continue;
                }
                report.outcome = DispatchOutcome::Unhandled {
                    stopped_at: Some(layer),
                };
                break;
            }
            if !outcome.fallthrough {
                report.outcome = DispatchOutcome::Handled { layer };
                break;
            }
        }

        tracing::trace!(
            %key,
            state = info.state.as_str(),
            outcome = ?report.outcome,
            invocations = report.invocations,
            failures = report.failures.len(),
            "key event dispatched"
        );
        report
    }

    /// Run the effect bindings of one cell with [`ActionEvent::Update`].
    pub fn execute_effects(
        &mut self,
        cell: u16,
        registry: &CapabilityRegistry,
        sink: &mut dyn EffectSink,
    ) -> EffectsReport {
        let mut report = EffectsReport::default();
        let Some(descriptor) = self.descriptor.as_ref() else {
            return report;
        };
        let Some(records) = descriptor.effect_records(cell) else {
            return report;
        };
        let mut interp = Interpreter::new(descriptor.effects(), registry, &mut self.registers, sink);
        let outcome = interp.execute_cell(
            BindingScope::Effect,
            cell,
            records,
            &ActionEvent::Update,
            &mut report.failures,
        );
        report.cells = 1;
        report.invocations = outcome.invocations;
        report
    }

    /// One render tick: run every bound effect cell in ascending cell order.
    pub fn render_tick(
        &mut self,
        registry: &CapabilityRegistry,
        sink: &mut dyn EffectSink,
    ) -> EffectsReport {
        let mut report = EffectsReport::default();
        let Some(descriptor) = self.descriptor.as_ref() else {
            return report;
        };
        let mut interp = Interpreter::new(descriptor.effects(), registry, &mut self.registers, sink);
        for (cell, offset) in descriptor.effect_table().bound_cells() {
            let Ok(cell) = u16::try_from(cell) else {
                continue;
            };
            let outcome = interp.execute_cell(
                BindingScope::Effect,
                cell,
                descriptor.records_at(offset),
                &ActionEvent::Update,
                &mut report.failures,
            );
            report.cells += 1;
            report.invocations += outcome.invocations;
        }
        tracing::trace!(
            cells = report.cells,
            invocations = report.invocations,
            failures = report.failures.len(),
            "render tick"
        );
        report
    }

    // --- Layer lifecycle ---------------------------------------------------

    /// Send [`ActionEvent::Initialization`] once to every bound record of
    /// the selected layer.
    pub fn initialize_layer(
        &mut self,
        selector: LayerSelector,
        registry: &CapabilityRegistry,
        sink: &mut dyn EffectSink,
    ) -> LifecycleReport {
        self.lifecycle(selector, ActionEvent::Initialization, registry, sink)
    }

    /// Send [`ActionEvent::Deinitialization`] once to every bound record of
    /// the selected layer.
    pub fn deinitialize_layer(
        &mut self,
        selector: LayerSelector,
        registry: &CapabilityRegistry,
        sink: &mut dyn EffectSink,
    ) -> LifecycleReport {
        self.lifecycle(selector, ActionEvent::Deinitialization, registry, sink)
    }

    fn lifecycle(
        &mut self,
        selector: LayerSelector,
        event: ActionEvent,
        registry: &CapabilityRegistry,
        sink: &mut dyn EffectSink,
    ) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        let Some(descriptor) = self.descriptor.as_ref() else {
            return report;
        };
        let Some(layer) = self.layers.resolve(selector) else {
            tracing::debug!(?selector, "lifecycle selector did not resolve");
            return report;
        };
        report.layer = Some(layer);

        let mut interp = Interpreter::new(descriptor.actions(), registry, &mut self.registers, sink);
        for (cell, offset) in descriptor.action_table().bound_cells(usize::from(layer)) {
            let Ok(cell) = u16::try_from(cell) else {
                continue;
            };
            let outcome = interp.execute_cell(
                BindingScope::Action { layer },
                cell,
                descriptor.records_at(offset),
                &event,
                &mut report.failures,
            );
            report.cells += 1;
            report.invocations += outcome.invocations;
        }
        tracing::debug!(
            layer,
            event = event.kind_name(),
            cells = report.cells,
            invocations = report.invocations,
            "layer lifecycle"
        );
        report
    }
}
