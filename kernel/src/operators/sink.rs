//! Outbound side effects. The runtime never performs I/O itself; it hands
//! every request to a caller-supplied [`EffectSink`].

/// A side-effect request emitted by a capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SideEffect {
    /// Set the LED of `cell` to a 24-bit `0xRRGGBB` color.
    Color { cell: u16, rgb: u32 },
    /// Send an outbound protocol message (e.g. a MIDI packet).
    Message { payload: Vec<u8> },
}

/// Receiver for side-effect requests.
pub trait EffectSink {
    fn emit(&mut self, effect: SideEffect);
}

/// Collects effects in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSink {
    effects: Vec<SideEffect>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn effects(&self) -> &[SideEffect] {
        &self.effects
    }

    /// Drain collected effects.
    pub fn take(&mut self) -> Vec<SideEffect> {
        std::mem::take(&mut self.effects)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

impl EffectSink for RecordingSink {
    fn emit(&mut self, effect: SideEffect) {
        self.effects.push(effect);
    }
}
