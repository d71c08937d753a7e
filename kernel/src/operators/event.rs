//! Inbound event types: key identifiers, key transitions, and the
//! `ActionEvent` delivered to capabilities.

use std::fmt;

// ---------------------------------------------------------------------------
// KeyId
// ---------------------------------------------------------------------------

/// 16-bit physical key identifier.
///
/// Grid keys are encoded `0x1000 | (x << 6) | y` with `x, y < 64`. Any other
/// value is a non-grid key (function button, touch bar) and is never
/// dispatched through the binding tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(u16);

impl KeyId {
    const CLASS_MASK: u16 = 0xF000;
    const GRID_CLASS: u16 = 0x1000;
    const COORD_MASK: u16 = 0x3F;

    /// Grid key at `(x, y)`, or `None` if either coordinate is 64 or more.
    #[must_use]
    pub const fn grid(x: u8, y: u8) -> Option<Self> {
        if x < 64 && y < 64 {
            Some(Self(Self::GRID_CLASS | ((x as u16) << 6) | y as u16))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn to_raw(self) -> u16 {
        self.0
    }

    /// `(x, y)` of a grid key, `None` for non-grid keys.
    #[must_use]
    pub const fn grid_xy(self) -> Option<(u8, u8)> {
        if self.0 & Self::CLASS_MASK != Self::GRID_CLASS {
            return None;
        }
        let x = ((self.0 >> 6) & Self::COORD_MASK) as u8;
        let y = (self.0 & Self::COORD_MASK) as u8;
        Some((x, y))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.grid_xy() {
            Some((x, y)) => write!(f, "key({x},{y})"),
            None => write!(f, "key(0x{:04x})", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// KeyInfo
// ---------------------------------------------------------------------------

/// Physical key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Idle,
    Pressed,
    Hold,
    Released,
    Aftertouch,
}

impl KeyState {
    /// Canonical lowercase name (scenario files, transcripts).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pressed => "pressed",
            Self::Hold => "hold",
            Self::Released => "released",
            Self::Aftertouch => "aftertouch",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "pressed" => Some(Self::Pressed),
            "hold" => Some(Self::Hold),
            "released" => Some(Self::Released),
            "aftertouch" => Some(Self::Aftertouch),
            _ => None,
        }
    }
}

/// State and velocity of one key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyInfo {
    pub state: KeyState,
    /// Raw pressure, full scale `u16::MAX`.
    pub velocity: u16,
}

impl KeyInfo {
    #[must_use]
    pub const fn new(state: KeyState, velocity: u16) -> Self {
        Self { state, velocity }
    }

    /// Velocity scaled to 7 bits (MIDI range).
    #[must_use]
    pub const fn velocity7(self) -> u8 {
        (self.velocity >> 9) as u8
    }
}

// ---------------------------------------------------------------------------
// ActionEvent
// ---------------------------------------------------------------------------

/// Event delivered to a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionEvent {
    /// The binding's layer is being activated.
    Initialization,
    /// Render tick (effect bindings).
    Update,
    /// The binding's layer is being deactivated.
    Deinitialization,
    KeyEvent(KeyInfo),
}

impl ActionEvent {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Update => "update",
            Self::Deinitialization => "deinitialization",
            Self::KeyEvent(_) => "key",
        }
    }

    /// The key transition, if this is a key event.
    #[must_use]
    pub const fn key(&self) -> Option<KeyInfo> {
        match self {
            Self::KeyEvent(info) => Some(*info),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Binding identity
// ---------------------------------------------------------------------------

/// Which matrix a binding comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingScope {
    Action { layer: u8 },
    Effect,
}

/// Identity of one executable record: matrix, cell, and position in the
/// cell's record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingInfo {
    pub scope: BindingScope,
    pub cell: u16,
    pub slot: u8,
}

impl fmt::Display for BindingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            BindingScope::Action { layer } => {
                write!(f, "action[layer {layer}, cell {}, slot {}]", self.cell, self.slot)
            }
            BindingScope::Effect => write!(f, "effect[cell {}, slot {}]", self.cell, self.slot),
        }
    }
}
