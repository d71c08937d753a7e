//! Layer walk lock tests.
//!
//! Proves:
//! 1. A binding that exists only on a disabled layer never runs
//! 2. Passthrough law: unbound + passthrough continues, unbound without
//!    passthrough stops and reports the layer
//! 3. Fallthrough continues the walk even from a bound cell, and an event
//!    that falls through to nothing is unhandled with its invocations counted
//! 4. A cell whose records all fail to resolve behaves as unbound
//! 5. `top_layer` and `index_in_bitmap` bit semantics

use lock_tests::probe::{probe_calls, probe_registry, ProbeCall, EVENT_KEY};
use uad_kernel::carrier::descriptor_writer::{DescriptorBuilder, Operand, RecordSpec};
use uad_kernel::carrier::name_hash::NameHash;
use uad_kernel::operators::event::{KeyId, KeyInfo, KeyState};
use uad_kernel::operators::sink::RecordingSink;
use uad_kernel::runtime::config::RuntimeConfig;
use uad_kernel::runtime::dispatcher::{DispatchOutcome, Runtime};
use uad_kernel::runtime::layer_state::{index_in_bitmap, LayerKind, LayerState};

/// Four layers on a 4x1 grid.
///
/// | cell | layer 0 | layer 1             | layer 2 | layer 3           |
/// |------|---------|---------------------|---------|-------------------|
/// | 0    | probe 0 |                     |         | probe 3           |
/// | 1    | probe 0 | probe_fallthrough 1 |         |                   |
/// | 2    | probe 0 |                     | probe 2 | unresolved        |
/// | 3    |         |                     |         |                   |
fn stack() -> Vec<u8> {
    let mut b = DescriptorBuilder::new(4, 1, 4);
    let probe = b.action("probe");
    let fall = b.action("probe_fallthrough");
    let missing = b.action("not_registered");
    for x in 0..3 {
        b.bind_action(0, x, 0, RecordSpec::new(probe).with(Operand::Unsigned(0)));
    }
    b.bind_action(1, 1, 0, RecordSpec::new(fall).with(Operand::Unsigned(1)))
        .bind_action(2, 2, 0, RecordSpec::new(probe).with(Operand::Unsigned(2)))
        .bind_action(3, 0, 0, RecordSpec::new(probe).with(Operand::Unsigned(3)))
        .bind_action(3, 2, 0, RecordSpec::new(missing));
    b.to_bytes().unwrap()
}

fn all_enabled() -> RuntimeConfig {
    RuntimeConfig {
        initial_enabled: Some(0b1111),
        ..RuntimeConfig::default()
    }
}

fn press(rt: &mut Runtime<'_>, x: u8) -> (DispatchOutcome, Vec<ProbeCall>) {
    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let report = rt.key_event(
        KeyId::grid(x, 0).unwrap(),
        KeyInfo::new(KeyState::Pressed, u16::MAX),
        &registry,
        &mut sink,
    );
    (report.outcome, probe_calls(sink.effects()))
}

fn tags(calls: &[ProbeCall]) -> Vec<u8> {
    calls.iter().map(|c| c.tag).collect()
}

// ---------------------------------------------------------------------------
// 1. Disabled layers
// ---------------------------------------------------------------------------

#[test]
fn disabled_layer_bindings_never_run() {
    let bytes = stack();
    let mut rt = Runtime::new(all_enabled());
    rt.load(&bytes).unwrap();
    rt.set_layer_state(3, LayerKind::Enabled, false);
    rt.set_layer_state(2, LayerKind::Enabled, false);

    for x in 0..4 {
        let (_, calls) = press(&mut rt, x);
        assert!(
            calls.iter().all(|c| c.layer != Some(3) && c.layer != Some(2)),
            "key {x} reached a disabled layer: {calls:?}"
        );
    }
    let (outcome, calls) = press(&mut rt, 0);
    assert_eq!(outcome, DispatchOutcome::Handled { layer: 0 });
    assert_eq!(tags(&calls), vec![0]);
}

#[test]
fn only_base_layer_by_default() {
    let bytes = stack();
    let mut rt = Runtime::default();
    rt.load(&bytes).unwrap();
    assert_eq!(rt.top_layer(), Some(0));
    let (outcome, calls) = press(&mut rt, 0);
    assert_eq!(outcome, DispatchOutcome::Handled { layer: 0 });
    assert_eq!(tags(&calls), vec![0]);
}

#[test]
fn nothing_enabled_is_unhandled() {
    let bytes = stack();
    let mut rt = Runtime::new(RuntimeConfig {
        initial_enabled: Some(0),
        ..RuntimeConfig::default()
    });
    rt.load(&bytes).unwrap();
    assert_eq!(rt.top_layer(), None);
    let (outcome, calls) = press(&mut rt, 0);
    assert_eq!(outcome, DispatchOutcome::Unhandled { stopped_at: None });
    assert!(calls.is_empty());
}

// ---------------------------------------------------------------------------
// 2. Passthrough law
// ---------------------------------------------------------------------------

#[test]
fn unbound_with_passthrough_consults_next_layer() {
    let bytes = stack();
    let mut rt = Runtime::new(all_enabled());
    rt.load(&bytes).unwrap();

    // Cell 1: unbound on 3 and 2, fallthrough on 1, probe on 0.
    let (outcome, calls) = press(&mut rt, 1);
    assert_eq!(outcome, DispatchOutcome::Handled { layer: 0 });
    assert_eq!(tags(&calls), vec![1, 0]);
}

#[test]
fn unbound_without_passthrough_stops() {
    let bytes = stack();
    let mut rt = Runtime::new(all_enabled());
    rt.load(&bytes).unwrap();
    rt.set_layer_state(2, LayerKind::Passthrough, false);

    let (outcome, calls) = press(&mut rt, 1);
    assert_eq!(outcome, DispatchOutcome::Unhandled { stopped_at: Some(2) });
    assert!(calls.is_empty());
}

#[test]
fn walk_off_the_bottom_is_unhandled() {
    let bytes = stack();
    let mut rt = Runtime::new(all_enabled());
    rt.load(&bytes).unwrap();
    let (outcome, calls) = press(&mut rt, 3);
    assert_eq!(outcome, DispatchOutcome::Unhandled { stopped_at: None });
    assert!(calls.is_empty());
}

#[test]
fn bound_cell_consumes_regardless_of_passthrough() {
    let bytes = stack();
    let mut rt = Runtime::new(all_enabled());
    rt.load(&bytes).unwrap();
    let (outcome, calls) = press(&mut rt, 0);
    assert_eq!(outcome, DispatchOutcome::Handled { layer: 3 });
    assert_eq!(tags(&calls), vec![3]);
    assert_eq!(calls[0].event, EVENT_KEY);
}

// ---------------------------------------------------------------------------
// 3-4. Fallthrough and unresolved references
// ---------------------------------------------------------------------------

#[test]
fn unresolved_cell_behaves_as_unbound() {
    let bytes = stack();
    let mut rt = Runtime::new(all_enabled());
    rt.load(&bytes).unwrap();
    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let report = rt.key_event(
        KeyId::grid(2, 0).unwrap(),
        KeyInfo::new(KeyState::Pressed, u16::MAX),
        &registry,
        &mut sink,
    );
    assert_eq!(report.outcome, DispatchOutcome::Handled { layer: 2 });
    assert_eq!(report.failures.len(), 1);
    assert_eq!(tags(&probe_calls(sink.effects())), vec![2]);

    rt.set_layer_state(3, LayerKind::Passthrough, false);
    let (outcome, calls) = press(&mut rt, 2);
    assert_eq!(outcome, DispatchOutcome::Unhandled { stopped_at: Some(3) });
    assert!(calls.is_empty());
}

/// Layer 1 falls through at cell 0; layer 0 leaves cell 0 unbound.
fn fallthrough_over_unbound() -> Vec<u8> {
    let mut b = DescriptorBuilder::new(1, 1, 2);
    let fall = b.action("probe_fallthrough");
    b.bind_action(1, 0, 0, RecordSpec::new(fall).with(Operand::Unsigned(1)));
    b.to_bytes().unwrap()
}

#[test]
fn fallthrough_into_opaque_unbound_layer_is_unhandled_after_running() {
    let bytes = fallthrough_over_unbound();
    let mut rt = Runtime::new(RuntimeConfig {
        initial_enabled: Some(0b11),
        ..RuntimeConfig::default()
    });
    rt.load(&bytes).unwrap();
    rt.set_layer_state(0, LayerKind::Passthrough, false);

    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let report = rt.key_event(
        KeyId::grid(0, 0).unwrap(),
        KeyInfo::new(KeyState::Pressed, u16::MAX),
        &registry,
        &mut sink,
    );
    assert_eq!(report.outcome, DispatchOutcome::Unhandled { stopped_at: Some(0) });
    assert_eq!(report.invocations, 1);
    assert!(report.failures.is_empty());
    assert_eq!(tags(&probe_calls(sink.effects())), vec![1]);
}

#[test]
fn fallthrough_off_the_bottom_is_unhandled_after_running() {
    let bytes = fallthrough_over_unbound();
    let mut rt = Runtime::new(RuntimeConfig {
        initial_enabled: Some(0b11),
        ..RuntimeConfig::default()
    });
    rt.load(&bytes).unwrap();

    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let report = rt.key_event(
        KeyId::grid(0, 0).unwrap(),
        KeyInfo::new(KeyState::Pressed, u16::MAX),
        &registry,
        &mut sink,
    );
    assert_eq!(report.outcome, DispatchOutcome::Unhandled { stopped_at: None });
    assert_eq!(report.invocations, 1);
    assert_eq!(tags(&probe_calls(sink.effects())), vec![1]);
}

#[test]
fn precomputed_hash_resolves_like_name() {
    let mut b = DescriptorBuilder::new(1, 1, 1);
    let hash = NameHash::of("probe").to_u32();
    let idx = b.action_hash(hash);
    b.bind_action(0, 0, 0, RecordSpec::new(idx).with(Operand::Unsigned(5)));
    let bytes = b.to_bytes().unwrap();
    let mut rt = Runtime::default();
    rt.load(&bytes).unwrap();
    let (outcome, calls) = press(&mut rt, 0);
    assert_eq!(outcome, DispatchOutcome::Handled { layer: 0 });
    assert_eq!(tags(&calls), vec![5]);
}

#[test]
fn unmapped_keys() {
    let bytes = stack();
    let mut rt = Runtime::default();
    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let info = KeyInfo::new(KeyState::Pressed, u16::MAX);

    let report = rt.key_event(KeyId::grid(0, 0).unwrap(), info, &registry, &mut sink);
    assert_eq!(report.outcome, DispatchOutcome::NotLoaded);

    rt.load(&bytes).unwrap();
    let report = rt.key_event(KeyId::grid(0, 1).unwrap(), info, &registry, &mut sink);
    assert_eq!(report.outcome, DispatchOutcome::Unmapped);
    let report = rt.key_event(KeyId::from_raw(0xffff), info, &registry, &mut sink);
    assert_eq!(report.outcome, DispatchOutcome::Unmapped);
    assert!(sink.is_empty());
}

// ---------------------------------------------------------------------------
// 5. Bit semantics
// ---------------------------------------------------------------------------

#[test]
fn top_layer_is_highest_enabled_bit() {
    let mut state = LayerState::new(&RuntimeConfig {
        initial_enabled: Some(0),
        ..RuntimeConfig::default()
    });
    assert_eq!(state.top_layer(), None);
    state.set(0, LayerKind::Enabled, true);
    assert_eq!(state.top_layer(), Some(0));
    state.set(9, LayerKind::Enabled, true);
    state.set(4, LayerKind::Enabled, true);
    assert_eq!(state.top_layer(), Some(9));
    assert_eq!(state.enabled_layers().collect::<Vec<_>>(), vec![9, 4, 0]);
    state.set(9, LayerKind::Enabled, false);
    assert_eq!(state.top_layer(), Some(4));
}

#[test]
fn top_layer_masked_by_loaded_layer_count() {
    let bytes = stack();
    let mut rt = Runtime::new(RuntimeConfig {
        initial_enabled: Some(0b1_0000_0001),
        ..RuntimeConfig::default()
    });
    assert_eq!(rt.top_layer(), Some(8));
    rt.load(&bytes).unwrap();
    assert_eq!(rt.top_layer(), Some(0));
    assert!(!rt.set_layer_state(8, LayerKind::Enabled, true));
    assert!(!rt.get_layer_state(8, LayerKind::Enabled));
    rt.unload();
    assert_eq!(rt.top_layer(), Some(8));
}

#[test]
fn index_in_bitmap_counts_set_bits_from_lsb() {
    assert_eq!(index_in_bitmap(0b1011, 0), Some(0));
    assert_eq!(index_in_bitmap(0b1011, 1), Some(1));
    assert_eq!(index_in_bitmap(0b1011, 2), Some(3));
    assert_eq!(index_in_bitmap(0b1011, 3), None);
    assert_eq!(index_in_bitmap(0, 0), None);
    assert_eq!(index_in_bitmap(1 << 63, 0), Some(63));
    assert_eq!(index_in_bitmap(u64::MAX, 63), Some(63));
    assert_eq!(index_in_bitmap(u64::MAX, 64), None);
}

#[test]
fn reset_restores_configured_bits() {
    let bytes = stack();
    let mut rt = Runtime::new(RuntimeConfig {
        initial_enabled: Some(0b0101),
        initial_passthrough: Some(0b0001),
        ..RuntimeConfig::default()
    });
    rt.load(&bytes).unwrap();
    rt.set_layer_state(1, LayerKind::Enabled, true);
    rt.set_layer_state(0, LayerKind::Passthrough, false);
    rt.reset_layer_state();
    assert_eq!(rt.layer_state().enabled_bits(), 0b0101);
    assert_eq!(rt.layer_state().passthrough_bits(), 0b0001);
    assert_eq!(rt.top_layer(), Some(2));
}
