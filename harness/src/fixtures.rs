//! Built-in demo descriptor and scenario.
//!
//! Used by the replay binary's `--demo` mode, the lock tests and the
//! benchmarks, so every consumer drives the same bytes.
//!
//! Geometry is 8x8 with two action layers:
//!
//! | cell  | layer 0              | layer 1                   |
//! |-------|----------------------|---------------------------|
//! | (0,0) | `note 60`            | `color ff0000`            |
//! | (1,0) | `toggle 00ff00 0`    | `fallthrough`             |
//! | (2,0) | `counter 4`          | bound to nothing          |
//! | (3,0) | `note 62 1`, `color` | unbound                   |
//! | (4,0) | unbound              | unbound                   |
//!
//! Effects: `color 0000ff` on (7,7) and `momentary 0000ff 000010` on (6,7).

use uad_kernel::carrier::descriptor_writer::{DescriptorBuilder, DescriptorWriteError, Operand, RecordSpec};

/// Demo scenario exercising key dispatch, layer changes, lifecycle and
/// rendering.
pub const DEMO_SCENARIO: &str = r#"{
  "schema_version": "scenario.v1",
  "steps": [
    { "op": "key", "x": 0, "y": 0, "state": "pressed", "velocity": 65535 },
    { "op": "key", "x": 0, "y": 0, "state": "released" },
    { "op": "key", "x": 1, "y": 0, "state": "pressed" },
    { "op": "key", "x": 2, "y": 0, "state": "pressed" },
    { "op": "key", "x": 3, "y": 0, "state": "pressed", "velocity": 32768 },
    { "op": "key", "x": 4, "y": 0, "state": "pressed" },
    { "op": "key", "raw": 65535, "state": "pressed" },
    { "op": "render" },
    { "op": "layer", "layer": 1, "kind": "enabled", "on": true },
    { "op": "init_layer", "layer": "top" },
    { "op": "key", "x": 0, "y": 0, "state": "pressed" },
    { "op": "key", "x": 1, "y": 0, "state": "pressed" },
    { "op": "key", "x": 2, "y": 0, "state": "pressed" },
    { "op": "key", "x": 3, "y": 0, "state": "pressed" },
    { "op": "layer", "layer": 1, "kind": "passthrough", "on": false },
    { "op": "key", "x": 3, "y": 0, "state": "pressed" },
    { "op": "deinit_layer", "layer": 1 },
    { "op": "reset_layers" },
    { "op": "effects", "cell": 63 }
  ]
}"#;

/// Encode the demo descriptor.
///
/// # Errors
///
/// Returns [`DescriptorWriteError`] only if the table above no longer fits
/// the geometry.
pub fn demo_descriptor() -> Result<Vec<u8>, DescriptorWriteError> {
    let mut b = DescriptorBuilder::new(8, 8, 2);
    let color = b.action("color");
    let note = b.action("note");
    let toggle = b.action("toggle");
    let counter = b.action("counter");
    let fallthrough = b.action("fallthrough");
    let fx_color = b.effect("color");
    let fx_momentary = b.effect("momentary");

    b.bind_action(0, 0, 0, RecordSpec::new(note).with(Operand::Unsigned(60)))
        .bind_action(
            0,
            1,
            0,
            RecordSpec::new(toggle)
                .with(Operand::Unsigned(0x00_ff00))
                .with(Operand::Unsigned(0)),
        )
        .bind_action(0, 2, 0, RecordSpec::new(counter).with(Operand::Unsigned(4)))
        .bind_action(
            0,
            3,
            0,
            RecordSpec::new(note)
                .with(Operand::Unsigned(62))
                .with(Operand::Unsigned(1)),
        )
        .bind_action(0, 3, 0, RecordSpec::new(color).with(Operand::Unsigned(0x12_3456)))
        .bind_action(1, 0, 0, RecordSpec::new(color).with(Operand::Unsigned(0xff_0000)))
        .bind_action(1, 1, 0, RecordSpec::new(fallthrough))
        .block_action(1, 2, 0)
        .bind_effect(7, 7, RecordSpec::new(fx_color).with(Operand::Unsigned(0x00_00ff)))
        .bind_effect(
            6,
            7,
            RecordSpec::new(fx_momentary)
                .with(Operand::Unsigned(0x00_00ff))
                .with(Operand::Unsigned(0x00_0010)),
        );
    b.to_bytes()
}
