//! Stock capability catalog.
//!
//! A small, fixed set of behaviors for replay scenarios and tests. Firmware
//! builds its own registry; nothing in the kernel depends on these names.
//!
//! | Name          | Operands                   | Behavior                                         |
//! |---------------|----------------------------|--------------------------------------------------|
//! | `color`       | `rgb`                      | paint the cell on every event                    |
//! | `note`        | `note [channel]`           | note on / off / pressure messages on key events  |
//! | `toggle`      | `on_rgb off_rgb`           | flip a register on press, paint the state        |
//! | `momentary`   | `on_rgb off_rgb`           | paint `on` while held, `off` otherwise           |
//! | `fallthrough` | none                       | pass the event to the next lower layer           |
//! | `counter`     | `[modulus]`                | count presses in the register                    |

use std::collections::BTreeSet;

use uad_kernel::carrier::descriptor::{Descriptor, Operands};
use uad_kernel::carrier::name_hash::NameHash;
use uad_kernel::operators::capability::{
    ActionContext, Capability, CapabilityError, CapabilityRegistry, Flow, RegistryError,
};
use uad_kernel::operators::event::{ActionEvent, KeyState};
use uad_kernel::operators::sink::SideEffect;

/// Names registered by [`standard_registry`], in registration order.
pub const STANDARD_NAMES: [&str; 6] = ["color", "note", "toggle", "momentary", "fallthrough", "counter"];

const MIDI_NOTE_OFF: u8 = 0x80;
const MIDI_NOTE_ON: u8 = 0x90;
const MIDI_POLY_PRESSURE: u8 = 0xA0;

/// Registry holding every stock capability.
///
/// # Errors
///
/// Returns [`RegistryError`] if two stock names collide, which would mean
/// the catalog itself is broken.
pub fn standard_registry() -> Result<CapabilityRegistry, RegistryError> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(Color))?;
    registry.register(Box::new(Note))?;
    registry.register(Box::new(Toggle))?;
    registry.register(Box::new(Momentary))?;
    registry.register(Box::new(Fallthrough))?;
    registry.register(Box::new(Counter))?;
    Ok(registry)
}

/// Name hashes referenced by `descriptor` that `registry` cannot resolve,
/// deduplicated and in ascending order.
///
/// Bindings that reference these names fail with an unresolved reference
/// at dispatch time.
#[must_use]
pub fn unregistered_names(
    descriptor: &Descriptor<'_>,
    registry: &CapabilityRegistry,
) -> Vec<NameHash> {
    descriptor
        .actions()
        .iter()
        .chain(descriptor.effects())
        .copied()
        .filter(|&hash| !registry.contains(hash))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn rgb_operand(operands: &Operands<'_>, index: usize) -> Result<u32, CapabilityError> {
    operands
        .u32(index)
        .filter(|&rgb| rgb <= 0xFF_FFFF)
        .ok_or_else(|| CapabilityError::operand(index, "24-bit color"))
}

// ---------------------------------------------------------------------------
// color
// ---------------------------------------------------------------------------

/// Paint the binding's cell with a fixed color.
#[derive(Debug, Clone, Copy, Default)]
pub struct Color;

impl Capability for Color {
    fn name(&self) -> &str {
        "color"
    }

    fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        event: &ActionEvent,
        operands: &Operands<'_>,
    ) -> Result<Flow, CapabilityError> {
        let rgb = rgb_operand(operands, 0)?;
        match event {
            ActionEvent::Deinitialization => ctx.set_color(0),
            _ => ctx.set_color(rgb),
        }
        Ok(Flow::Consume)
    }
}

// ---------------------------------------------------------------------------
// note
// ---------------------------------------------------------------------------

/// Send MIDI note messages for key transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Note;

impl Capability for Note {
    fn name(&self) -> &str {
        "note"
    }

    fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        event: &ActionEvent,
        operands: &Operands<'_>,
    ) -> Result<Flow, CapabilityError> {
        let note = operands
            .u8(0)
            .filter(|&n| n < 0x80)
            .ok_or_else(|| CapabilityError::operand(0, "note number 0..=127"))?;
        let channel = match operands.get(1) {
            None => 0,
            Some(_) => operands
                .u8(1)
                .filter(|&c| c < 16)
                .ok_or_else(|| CapabilityError::operand(1, "channel 0..=15"))?,
        };

        let Some(info) = event.key() else {
            return Ok(Flow::Consume);
        };
        let payload = match info.state {
            KeyState::Pressed => vec![MIDI_NOTE_ON | channel, note, info.velocity7().max(1)],
            KeyState::Released => vec![MIDI_NOTE_OFF | channel, note, 0],
            KeyState::Aftertouch => vec![MIDI_POLY_PRESSURE | channel, note, info.velocity7()],
            KeyState::Idle | KeyState::Hold => return Ok(Flow::Consume),
        };
        ctx.emit(SideEffect::Message { payload });
        Ok(Flow::Consume)
    }
}

// ---------------------------------------------------------------------------
// toggle
// ---------------------------------------------------------------------------

/// Latching switch: each press flips the register between 0 and 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Toggle;

impl Capability for Toggle {
    fn name(&self) -> &str {
        "toggle"
    }

    fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        event: &ActionEvent,
        operands: &Operands<'_>,
    ) -> Result<Flow, CapabilityError> {
        let on = rgb_operand(operands, 0)?;
        let off = rgb_operand(operands, 1)?;
        match event {
            ActionEvent::Initialization => {
                let state = ctx.register().unwrap_or(0);
                ctx.set_register(state);
                ctx.set_color(if state == 0 { off } else { on });
            }
            ActionEvent::Deinitialization => {
                ctx.clear_register();
            }
            ActionEvent::KeyEvent(info) if info.state == KeyState::Pressed => {
                let state = u32::from(ctx.register().unwrap_or(0) == 0);
                ctx.set_register(state);
                ctx.set_color(if state == 0 { off } else { on });
            }
            ActionEvent::Update | ActionEvent::KeyEvent(_) => {}
        }
        Ok(Flow::Consume)
    }
}

// ---------------------------------------------------------------------------
// momentary
// ---------------------------------------------------------------------------

/// Non-latching indicator: `on` while the key is down.
#[derive(Debug, Clone, Copy, Default)]
pub struct Momentary;

impl Capability for Momentary {
    fn name(&self) -> &str {
        "momentary"
    }

    fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        event: &ActionEvent,
        operands: &Operands<'_>,
    ) -> Result<Flow, CapabilityError> {
        let on = rgb_operand(operands, 0)?;
        let off = rgb_operand(operands, 1)?;
        match event {
            ActionEvent::Initialization => ctx.set_color(off),
            ActionEvent::KeyEvent(info) => match info.state {
                KeyState::Pressed => ctx.set_color(on),
                KeyState::Released => ctx.set_color(off),
                KeyState::Idle | KeyState::Hold | KeyState::Aftertouch => {}
            },
            ActionEvent::Update | ActionEvent::Deinitialization => {}
        }
        Ok(Flow::Consume)
    }
}

// ---------------------------------------------------------------------------
// fallthrough
// ---------------------------------------------------------------------------

/// Let the event continue to the next lower enabled layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fallthrough;

impl Capability for Fallthrough {
    fn name(&self) -> &str {
        "fallthrough"
    }

    fn execute(
        &self,
        _ctx: &mut ActionContext<'_>,
        _event: &ActionEvent,
        _operands: &Operands<'_>,
    ) -> Result<Flow, CapabilityError> {
        Ok(Flow::Fallthrough)
    }
}

// ---------------------------------------------------------------------------
// counter
// ---------------------------------------------------------------------------

/// Count presses in the register, wrapping at the optional modulus.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counter;

impl Capability for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        event: &ActionEvent,
        operands: &Operands<'_>,
    ) -> Result<Flow, CapabilityError> {
        let modulus = match operands.get(0) {
            None => None,
            Some(_) => Some(
                operands
                    .u32(0)
                    .filter(|&m| m > 0)
                    .ok_or_else(|| CapabilityError::operand(0, "positive modulus"))?,
            ),
        };
        match event {
            ActionEvent::KeyEvent(info) if info.state == KeyState::Pressed => {
                let next = ctx.register().unwrap_or(0).wrapping_add(1);
                ctx.set_register(modulus.map_or(next, |m| next % m));
            }
            ActionEvent::Deinitialization => {
                ctx.clear_register();
            }
            _ => {}
        }
        Ok(Flow::Consume)
    }
}
