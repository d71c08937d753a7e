//! Shared helpers for UAD benchmark suites.

use uad_kernel::carrier::descriptor_writer::{DescriptorBuilder, Operand, RecordSpec};
use uad_kernel::operators::sink::{EffectSink, SideEffect};

/// Sink that counts effects and drops them.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub count: usize,
}

impl EffectSink for CountingSink {
    fn emit(&mut self, _effect: SideEffect) {
        self.count += 1;
    }
}

/// A `size x size` grid with `layers` layers.
///
/// Every layer above 0 binds only the diagonal, with `fallthrough` when
/// `fall` is set and `color` otherwise, so a key off the diagonal passes
/// through every upper layer to the fully bound base layer. Every cell
/// also carries a `color` effect.
///
/// # Panics
///
/// Panics if `size` or `layers` exceeds the descriptor limits.
#[must_use]
pub fn grid_descriptor(size: u8, layers: u8, fall: bool) -> Vec<u8> {
    let mut b = DescriptorBuilder::new(size, size, layers);
    let color = b.action("color");
    let fallthrough = b.action("fallthrough");
    let fx = b.effect("color");
    for y in 0..size {
        for x in 0..size {
            let rgb = (u64::from(x) << 16) | (u64::from(y) << 8);
            b.bind_action(0, x, y, RecordSpec::new(color).with(Operand::Unsigned(rgb)));
            b.bind_effect(x, y, RecordSpec::new(fx).with(Operand::Unsigned(rgb)));
        }
    }
    for layer in 1..layers {
        for i in 0..size {
            let record = if fall {
                RecordSpec::new(fallthrough)
            } else {
                RecordSpec::new(color).with(Operand::Unsigned(0xff_ffff))
            };
            b.bind_action(layer, i, i, record);
        }
    }
    b.to_bytes().expect("grid fits the declared geometry")
}
