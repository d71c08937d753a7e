//! Descriptor load lock tests.
//!
//! Proves:
//! 1. Geometry, layer count and list sizes read back exactly as encoded
//! 2. A rejected load (wrong version, truncation, bad index) leaves the
//!    previous descriptor, registers and layer state in place
//! 3. Unknown keys are skipped, duplicate keys and trailing bytes are not
//! 4. The load digest is the domain-separated hash of the raw bytes

use lock_tests::probe::{probe_calls, probe_registry, EVENT_KEY};
use uad_kernel::carrier::cbor_writer::CborEncoder;
use uad_kernel::carrier::descriptor::{Descriptor, DescriptorError, SUPPORTED_VERSION};
use uad_kernel::carrier::descriptor_writer::{DescriptorBuilder, Operand, RecordSpec};
use uad_kernel::carrier::digest::{canonical_hash, HashDomain};
use uad_kernel::operators::event::{KeyId, KeyInfo, KeyState};
use uad_kernel::operators::registers::RegisterKey;
use uad_kernel::operators::sink::RecordingSink;
use uad_kernel::runtime::config::RuntimeConfig;
use uad_kernel::runtime::dispatcher::{DispatchOutcome, Runtime};
use uad_kernel::runtime::layer_state::LayerKind;

fn probe_descriptor(version: u64, tag: u64) -> Vec<u8> {
    let mut b = DescriptorBuilder::new(4, 2, 3);
    b.version(version);
    let probe = b.action("probe");
    let fx = b.effect("probe");
    b.bind_action(0, 0, 0, RecordSpec::new(probe).with(Operand::Unsigned(tag)))
        .bind_action(2, 3, 1, RecordSpec::new(probe))
        .bind_effect(1, 1, RecordSpec::new(fx));
    b.to_bytes().unwrap()
}

fn press() -> KeyInfo {
    KeyInfo::new(KeyState::Pressed, u16::MAX)
}

// ---------------------------------------------------------------------------
// 1. Read-back
// ---------------------------------------------------------------------------

#[test]
fn load_reads_back_encoded_shape() {
    let bytes = probe_descriptor(SUPPORTED_VERSION, 7);
    let mut rt = Runtime::new(RuntimeConfig::default());
    let summary = rt.load(&bytes).unwrap();

    assert_eq!(summary.version, 0);
    assert_eq!(summary.geometry.width, 4);
    assert_eq!(summary.geometry.height, 2);
    assert_eq!(summary.layer_count, 3);
    assert_eq!(summary.action_count, 1);
    assert_eq!(summary.effect_count, 1);
    assert_eq!(summary.bound_actions, 2);
    assert_eq!(summary.bound_effects, 1);

    let d = rt.descriptor().unwrap();
    assert_eq!(d.geometry().cell_count(), 8);
    assert!(d.action_records(0, 0).is_some());
    assert!(d.action_records(2, 7).is_some());
    assert!(d.action_records(1, 0).is_none());
    assert!(d.effect_records(5).is_some());
}

#[test]
fn load_digest_is_domain_separated_hash_of_bytes() {
    let bytes = probe_descriptor(SUPPORTED_VERSION, 1);
    let mut rt = Runtime::default();
    let summary = rt.load(&bytes).unwrap();
    assert_eq!(summary.digest, canonical_hash(HashDomain::Descriptor, &bytes));
    assert!(summary.digest.as_str().starts_with("sha256:"));
}

// ---------------------------------------------------------------------------
// 2. All-or-nothing
// ---------------------------------------------------------------------------

#[test]
fn wrong_version_keeps_previous_state() {
    let good = probe_descriptor(SUPPORTED_VERSION, 9);
    let bad = probe_descriptor(1, 1);
    let registry = probe_registry();
    let mut sink = RecordingSink::new();

    let mut rt = Runtime::default();
    rt.load(&good).unwrap();
    rt.set_layer_state(2, LayerKind::Enabled, true);
    let reg = RegisterKey::action(0, 0, 0);
    rt.set_register(reg, 42);

    let err = rt.load(&bad).unwrap_err();
    assert_eq!(
        err,
        DescriptorError::VersionMismatch {
            found: 1,
            supported: 0
        }
    );

    assert_eq!(rt.get_register(reg), Some(42));
    assert!(rt.get_layer_state(2, LayerKind::Enabled));
    assert_eq!(rt.top_layer(), Some(2));

    // The old descriptor still dispatches: (0,0) is unbound on layer 2 and
    // passes through to the probe on layer 0.
    let report = rt.key_event(KeyId::grid(0, 0).unwrap(), press(), &registry, &mut sink);
    assert_eq!(report.outcome, DispatchOutcome::Handled { layer: 0 });
    let calls = probe_calls(sink.effects());
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].event, EVENT_KEY);
    assert_eq!(calls[0].tag, 9);
}

#[test]
fn truncated_descriptor_rejected_at_every_length() {
    let good = probe_descriptor(SUPPORTED_VERSION, 3);
    let mut rt = Runtime::default();
    rt.load(&good).unwrap();
    for len in 0..good.len() {
        assert!(rt.load(&good[..len]).is_err(), "prefix of {len} bytes loaded");
        assert!(rt.is_loaded());
        assert_eq!(rt.descriptor().unwrap().bytes(), good.as_slice());
    }
}

#[test]
fn out_of_range_action_index_rejected() {
    let mut b = DescriptorBuilder::new(1, 1, 1);
    b.action("probe");
    b.bind_action(0, 0, 0, RecordSpec::new(5));
    let bytes = b.to_bytes().unwrap();
    assert!(matches!(
        Descriptor::parse(&bytes),
        Err(DescriptorError::Bounds { .. })
    ));
}

#[test]
fn too_many_records_per_cell_rejected_by_config() {
    let mut b = DescriptorBuilder::new(1, 1, 1);
    let probe = b.action("probe");
    for _ in 0..3 {
        b.bind_action(0, 0, 0, RecordSpec::new(probe));
    }
    let bytes = b.to_bytes().unwrap();

    let mut strict = Runtime::new(RuntimeConfig {
        max_records_per_cell: Some(2),
        ..RuntimeConfig::default()
    });
    assert!(matches!(strict.load(&bytes), Err(DescriptorError::Bounds { .. })));
    assert!(!strict.is_loaded());

    let mut relaxed = Runtime::default();
    assert!(relaxed.load(&bytes).is_ok());
}

// ---------------------------------------------------------------------------
// 3. Key handling
// ---------------------------------------------------------------------------

fn device(enc: &mut CborEncoder, width: u64, height: u64, layers: u64) {
    enc.map(3)
        .text("width")
        .unsigned(width)
        .text("height")
        .unsigned(height)
        .text("layers")
        .unsigned(layers);
}

#[test]
fn unknown_keys_are_skipped() {
    let mut enc = CborEncoder::new();
    enc.map(5).text("version").unsigned(0).text("device");
    device(&mut enc, 1, 1, 1);
    enc.text("vendor")
        .map(1)
        .text("name")
        .text("acme")
        .text("actions")
        .array(1)
        .text("probe")
        .text("actionMatrix")
        .array(1)
        .array(1)
        .array(1)
        .array(1)
        .unsigned(0);
    let bytes = enc.into_bytes();
    let d = Descriptor::parse(&bytes).unwrap();
    assert_eq!(d.actions().len(), 1);
    assert!(d.action_records(0, 0).is_some());
}

/// A valid 1x1 descriptor followed by `extra` unknown keys named `k0..`,
/// with `repeat` appended as one more unknown key when given.
fn descriptor_with_unknown_keys(extra: usize, repeat: Option<&str>) -> Vec<u8> {
    let mut enc = CborEncoder::new();
    enc.map(4 + extra + usize::from(repeat.is_some()))
        .text("version")
        .unsigned(0)
        .text("device");
    device(&mut enc, 1, 1, 1);
    enc.text("actions")
        .array(1)
        .text("probe")
        .text("actionMatrix")
        .array(1)
        .array(1)
        .array(1)
        .array(1)
        .unsigned(0);
    for i in 0..extra {
        enc.text(&format!("k{i}")).null();
    }
    if let Some(key) = repeat {
        enc.text(key).null();
    }
    enc.into_bytes()
}

#[test]
fn many_unknown_keys_are_skipped() {
    let bytes = descriptor_with_unknown_keys(40_000, None);
    let d = Descriptor::parse(&bytes).unwrap();
    assert_eq!(d.actions().len(), 1);
    assert!(d.action_records(0, 0).is_some());
}

#[test]
fn late_duplicate_unknown_key_rejected() {
    let bytes = descriptor_with_unknown_keys(5_000, Some("k17"));
    match Descriptor::parse(&bytes) {
        Err(DescriptorError::DuplicateKey { key }) => assert_eq!(key, "k17"),
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
}

#[test]
fn duplicate_key_rejected() {
    let mut enc = CborEncoder::new();
    enc.map(5).text("version").unsigned(0).text("version").unsigned(0).text("device");
    device(&mut enc, 1, 1, 1);
    enc.text("actions")
        .array(0)
        .text("actionMatrix")
        .array(1)
        .array(1)
        .array(1)
        .null();
    let bytes = enc.into_bytes();
    assert!(matches!(
        Descriptor::parse(&bytes),
        Err(DescriptorError::DuplicateKey { .. })
    ));
}

#[test]
fn trailing_bytes_rejected() {
    let mut bytes = probe_descriptor(SUPPORTED_VERSION, 0);
    bytes.push(0x00);
    assert!(matches!(
        Descriptor::parse(&bytes),
        Err(DescriptorError::Cbor(_))
    ));
}

#[test]
fn missing_action_matrix_rejected() {
    let mut enc = CborEncoder::new();
    enc.map(3).text("version").unsigned(0).text("device");
    device(&mut enc, 1, 1, 1);
    enc.text("actions").array(0);
    let bytes = enc.into_bytes();
    assert!(matches!(
        Descriptor::parse(&bytes),
        Err(DescriptorError::MissingSection { .. })
    ));
}
