//! Register and layer lifecycle lock tests.
//!
//! Proves:
//! 1. set -> get returns the value, clear -> get misses, distinct keys never
//!    alias
//! 2. Registers written by capabilities persist across events and are
//!    cleared by a new load
//! 3. `initialize_layer` / `deinitialize_layer` deliver exactly one event
//!    per bound record of the target layer, regardless of key traffic in
//!    between

use lock_tests::probe::{probe_calls, probe_registry, EVENT_DEINIT, EVENT_INIT, EVENT_UPDATE};
use uad_harness::capabilities::standard_registry;
use uad_kernel::carrier::descriptor_writer::{DescriptorBuilder, Operand, RecordSpec};
use uad_kernel::operators::event::{KeyId, KeyInfo, KeyState};
use uad_kernel::operators::registers::{RegisterKey, RegisterStore};
use uad_kernel::operators::sink::{RecordingSink, SideEffect};
use uad_kernel::runtime::config::RuntimeConfig;
use uad_kernel::runtime::dispatcher::Runtime;
use uad_kernel::runtime::layer_state::{LayerKind, LayerSelector};

// ---------------------------------------------------------------------------
// 1. Store semantics
// ---------------------------------------------------------------------------

#[test]
fn set_get_clear() {
    let mut store = RegisterStore::new();
    let key = RegisterKey::action(1, 5, 0);
    assert_eq!(store.get(key), None);
    assert_eq!(store.set(key, 0), None);
    assert_eq!(store.get(key), Some(0));
    assert_eq!(store.set(key, 7), Some(0));
    assert_eq!(store.get(key), Some(7));
    assert_eq!(store.clear(key), Some(7));
    assert_eq!(store.get(key), None);
    assert!(store.is_empty());
}

#[test]
fn distinct_keys_never_alias() {
    let keys = [
        RegisterKey::action(0, 0, 0),
        RegisterKey::action(1, 0, 0),
        RegisterKey::action(0, 1, 0),
        RegisterKey::action(0, 0, 1),
        RegisterKey::effect(0, 0),
        RegisterKey::effect(0, 1),
        RegisterKey::effect(1, 0),
    ];
    let mut store = RegisterStore::new();
    for (value, &key) in (100u32..).zip(keys.iter()) {
        store.set(key, value);
    }
    assert_eq!(store.len(), keys.len());
    for (value, &key) in (100u32..).zip(keys.iter()) {
        assert_eq!(store.get(key), Some(value), "{key:?}");
    }
    store.clear(keys[0]);
    assert_eq!(store.get(keys[0]), None);
    assert_eq!(store.get(keys[1]), Some(101));
}

// ---------------------------------------------------------------------------
// 2. Capability-owned registers
// ---------------------------------------------------------------------------

fn toggle_descriptor() -> Vec<u8> {
    let mut b = DescriptorBuilder::new(2, 1, 1);
    let toggle = b.action("toggle");
    b.bind_action(
        0,
        1,
        0,
        RecordSpec::new(toggle)
            .with(Operand::Unsigned(0x00_ff00))
            .with(Operand::Unsigned(0x00_0000)),
    );
    b.to_bytes().unwrap()
}

#[test]
fn toggle_state_persists_and_reload_clears_it() {
    let bytes = toggle_descriptor();
    let registry = standard_registry().unwrap();
    let mut sink = RecordingSink::new();
    let mut rt = Runtime::default();
    rt.load(&bytes).unwrap();

    let key = KeyId::grid(1, 0).unwrap();
    let press = KeyInfo::new(KeyState::Pressed, u16::MAX);
    let release = KeyInfo::new(KeyState::Released, 0);
    let reg = RegisterKey::action(0, 1, 0);

    rt.key_event(key, press, &registry, &mut sink);
    assert_eq!(rt.get_register(reg), Some(1));
    rt.key_event(key, release, &registry, &mut sink);
    assert_eq!(rt.get_register(reg), Some(1));
    rt.key_event(key, press, &registry, &mut sink);
    assert_eq!(rt.get_register(reg), Some(0));

    let colors: Vec<u32> = sink
        .take()
        .into_iter()
        .filter_map(|e| match e {
            SideEffect::Color { cell: 1, rgb } => Some(rgb),
            _ => None,
        })
        .collect();
    assert_eq!(colors.first(), Some(&0x00_ff00));
    assert_eq!(colors.last(), Some(&0x00_0000));

    rt.set_register(RegisterKey::effect(0, 0), 5);
    rt.load(&bytes).unwrap();
    assert!(rt.registers().is_empty());
}

// ---------------------------------------------------------------------------
// 3. Lifecycle exactly-once
// ---------------------------------------------------------------------------

/// Layer 1 of a 3x2 grid carries five probe records over three cells;
/// layer 0 carries one. Effects carry one probe that must not see
/// lifecycle events.
fn lifecycle_descriptor() -> Vec<u8> {
    let mut b = DescriptorBuilder::new(3, 2, 2);
    let probe = b.action("probe");
    let fx = b.effect("probe");
    b.bind_action(0, 0, 0, RecordSpec::new(probe).with(Operand::Unsigned(10)))
        .bind_action(1, 0, 0, RecordSpec::new(probe).with(Operand::Unsigned(1)))
        .bind_action(1, 0, 0, RecordSpec::new(probe).with(Operand::Unsigned(2)))
        .bind_action(1, 2, 0, RecordSpec::new(probe).with(Operand::Unsigned(3)))
        .bind_action(1, 1, 1, RecordSpec::new(probe).with(Operand::Unsigned(4)))
        .bind_action(1, 1, 1, RecordSpec::new(probe).with(Operand::Unsigned(5)))
        .block_action(1, 2, 1)
        .bind_effect(0, 1, RecordSpec::new(fx));
    b.to_bytes().unwrap()
}

#[test]
fn initialize_and_deinitialize_visit_each_record_once() {
    let bytes = lifecycle_descriptor();
    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let mut rt = Runtime::new(RuntimeConfig {
        initial_enabled: Some(0b11),
        ..RuntimeConfig::default()
    });
    rt.load(&bytes).unwrap();

    let init = rt.initialize_layer(LayerSelector::Index(1), &registry, &mut sink);
    assert_eq!(init.layer, Some(1));
    assert_eq!(init.cells, 4);
    assert_eq!(init.invocations, 5);
    assert!(init.failures.is_empty());
    let calls = probe_calls(&sink.take());
    assert_eq!(calls.len(), 5);
    assert!(calls.iter().all(|c| c.event == EVENT_INIT && c.layer == Some(1)));
    let mut seen: Vec<u8> = calls.iter().map(|c| c.tag).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);

    // Key traffic and renders in between do not change the count.
    for x in 0..3 {
        rt.key_event(
            KeyId::grid(x, 0).unwrap(),
            KeyInfo::new(KeyState::Pressed, u16::MAX),
            &registry,
            &mut sink,
        );
    }
    let render = rt.render_tick(&registry, &mut sink);
    assert_eq!(render.cells, 1);
    let between = probe_calls(&sink.take());
    assert!(between.iter().any(|c| c.event == EVENT_UPDATE && c.layer.is_none()));

    let deinit = rt.deinitialize_layer(LayerSelector::Index(1), &registry, &mut sink);
    assert_eq!(deinit.invocations, 5);
    let calls = probe_calls(&sink.take());
    assert_eq!(calls.len(), 5);
    assert!(calls.iter().all(|c| c.event == EVENT_DEINIT && c.layer == Some(1)));
}

#[test]
fn top_selector_resolves_at_call_time() {
    let bytes = lifecycle_descriptor();
    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let mut rt = Runtime::default();
    rt.load(&bytes).unwrap();

    let report = rt.initialize_layer(LayerSelector::from_raw(255), &registry, &mut sink);
    assert_eq!(report.layer, Some(0));
    assert_eq!(report.invocations, 1);

    rt.set_layer_state(1, LayerKind::Enabled, true);
    let report = rt.initialize_layer(LayerSelector::Top, &registry, &mut sink);
    assert_eq!(report.layer, Some(1));
    assert_eq!(report.invocations, 5);
}

#[test]
fn lifecycle_on_out_of_range_or_unloaded_is_empty() {
    let bytes = lifecycle_descriptor();
    let registry = probe_registry();
    let mut sink = RecordingSink::new();
    let mut rt = Runtime::default();

    let report = rt.initialize_layer(LayerSelector::Index(0), &registry, &mut sink);
    assert_eq!(report.layer, None);

    rt.load(&bytes).unwrap();
    let report = rt.deinitialize_layer(LayerSelector::Index(7), &registry, &mut sink);
    assert_eq!(report.layer, None);
    assert_eq!(report.invocations, 0);
    assert!(sink.is_empty());
}
