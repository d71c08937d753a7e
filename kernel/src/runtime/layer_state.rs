//! Layer state: the `enabled` and `passthrough` bitmaps.
//!
//! Bit *i* of each bitmap describes layer *i*. The raw bits survive a
//! descriptor reload; queries are masked by the active width (the loaded
//! descriptor's layer count, or 16 when nothing is loaded), so bits above
//! the current layer count are remembered but inert.

use crate::carrier::descriptor::MAX_LAYERS;
use crate::runtime::config::RuntimeConfig;

/// Which bitmap an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Enabled,
    Passthrough,
}

/// Target of a layer lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerSelector {
    /// The highest enabled layer at call time.
    Top,
    Index(u8),
}

impl LayerSelector {
    /// Raw selector: 255 means [`Top`](Self::Top).
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        if raw == u8::MAX {
            Self::Top
        } else {
            Self::Index(raw)
        }
    }
}

/// Bit position of the `(n + 1)`-th set bit counting from the LSB, or
/// `None` if `bitmap` has `n` or fewer set bits.
#[must_use]
pub fn index_in_bitmap(bitmap: u64, n: u8) -> Option<u8> {
    let mut rest = bitmap;
    for _ in 0..n {
        if rest == 0 {
            return None;
        }
        rest &= rest - 1;
    }
    if rest == 0 {
        None
    } else {
        u8::try_from(rest.trailing_zeros()).ok()
    }
}

/// The two layer bitmaps plus the active width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerState {
    enabled: u16,
    passthrough: u16,
    width: u8,
}

impl LayerState {
    /// Fresh state from config defaults, full width.
    #[must_use]
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            enabled: config.enabled(),
            passthrough: config.passthrough(),
            width: MAX_LAYERS,
        }
    }

    /// Number of addressable layers.
    #[must_use]
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Change the active width (on load or unload). Raw bits are kept.
    pub fn set_width(&mut self, width: u8) {
        self.width = width.min(MAX_LAYERS);
    }

    /// Restore both bitmaps to their configured defaults.
    pub fn reset(&mut self, config: &RuntimeConfig) {
        self.enabled = config.enabled();
        self.passthrough = config.passthrough();
    }

    const fn mask(&self) -> u16 {
        if self.width >= MAX_LAYERS {
            u16::MAX
        } else {
            (1u16 << self.width) - 1
        }
    }

    /// `enabled` bitmap within the active width.
    #[must_use]
    pub const fn enabled_bits(&self) -> u16 {
        self.enabled & self.mask()
    }

    /// `passthrough` bitmap within the active width.
    #[must_use]
    pub const fn passthrough_bits(&self) -> u16 {
        self.passthrough & self.mask()
    }

    /// Highest enabled layer, `None` if no layer is enabled.
    #[must_use]
    pub const fn top_layer(&self) -> Option<u8> {
        let bits = self.enabled_bits();
        if bits == 0 {
            None
        } else {
            Some(15 - bits.leading_zeros() as u8)
        }
    }

    #[must_use]
    pub const fn is_enabled(&self, layer: u8) -> bool {
        self.get(layer, LayerKind::Enabled)
    }

    #[must_use]
    pub const fn is_passthrough(&self, layer: u8) -> bool {
        self.get(layer, LayerKind::Passthrough)
    }

    /// Read one bit. Layers outside the active width read `false`.
    #[must_use]
    pub const fn get(&self, layer: u8, kind: LayerKind) -> bool {
        if layer >= self.width {
            return false;
        }
        let bits = match kind {
            LayerKind::Enabled => self.enabled,
            LayerKind::Passthrough => self.passthrough,
        };
        bits & (1 << layer) != 0
    }

    /// Write one bit. Layers outside the active width are ignored; returns
    /// whether the write applied.
    pub fn set(&mut self, layer: u8, kind: LayerKind, on: bool) -> bool {
        if layer >= self.width {
            return false;
        }
        let bits = match kind {
            LayerKind::Enabled => &mut self.enabled,
            LayerKind::Passthrough => &mut self.passthrough,
        };
        if on {
            *bits |= 1 << layer;
        } else {
            *bits &= !(1 << layer);
        }
        true
    }

    /// Enabled layers from the top down.
    pub fn enabled_layers(&self) -> impl Iterator<Item = u8> {
        let bits = self.enabled_bits();
        (0..MAX_LAYERS).rev().filter(move |&i| bits & (1 << i) != 0)
    }

    /// Resolve a selector to a layer index within the active width.
    #[must_use]
    pub const fn resolve(&self, selector: LayerSelector) -> Option<u8> {
        match selector {
            LayerSelector::Top => self.top_layer(),
            LayerSelector::Index(i) if i < self.width => Some(i),
            LayerSelector::Index(_) => None,
        }
    }
}
