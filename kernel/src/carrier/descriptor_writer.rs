//! `DescriptorBuilder`: programmatic construction of descriptor bytes.
//!
//! Produces exactly the layout [`Descriptor::parse`] accepts. Used by the
//! harness fixtures, the lock tests, and the benchmarks; it performs only
//! coordinate checks so tests can also build descriptors the parser must
//! reject (wrong version, dangling indices).
//!
//! [`Descriptor::parse`]: crate::carrier::descriptor::Descriptor::parse

use std::collections::BTreeMap;
use std::fmt;

use crate::carrier::cbor_writer::CborEncoder;
use crate::carrier::descriptor::SUPPORTED_VERSION;

/// One entry in the action or effect name list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSpec {
    /// Hashed with FNV-1a by the parser.
    Name(String),
    /// Precomputed hash, written as an unsigned integer.
    Hash(u32),
}

/// A record operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Unsigned(u64),
    Int(i64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Operand>),
}

/// One record: a name-list index and its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub index: u32,
    pub operands: Vec<Operand>,
}

impl RecordSpec {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self {
            index,
            operands: Vec::new(),
        }
    }

    /// Append an operand.
    #[must_use]
    pub fn with(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }
}

/// Content of one matrix cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellSpec {
    /// `null`: no binding.
    Unbound,
    /// Bound with an empty record list.
    Blocked,
    Records(Vec<RecordSpec>),
}

/// Failure while emitting descriptor bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorWriteError {
    /// A bound cell lies outside the declared grid or layer range.
    CellOutOfRange { layer: Option<u8>, x: u8, y: u8 },
}

impl fmt::Display for DescriptorWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CellOutOfRange {
                layer: Some(layer),
                x,
                y,
            } => write!(f, "action cell ({x}, {y}) on layer {layer} is outside the device"),
            Self::CellOutOfRange { layer: None, x, y } => {
                write!(f, "effect cell ({x}, {y}) is outside the device")
            }
        }
    }
}

impl std::error::Error for DescriptorWriteError {}

/// Builder for descriptor bytes.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    version: u64,
    width: u8,
    height: u8,
    layers: u8,
    actions: Vec<NameSpec>,
    effects: Vec<NameSpec>,
    action_cells: BTreeMap<(u8, u8, u8), CellSpec>,
    effect_cells: BTreeMap<(u8, u8), CellSpec>,
}

impl DescriptorBuilder {
    /// A descriptor with the given grid and layer count and no bindings.
    #[must_use]
    pub const fn new(width: u8, height: u8, layers: u8) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            width,
            height,
            layers,
            actions: Vec::new(),
            effects: Vec::new(),
            action_cells: BTreeMap::new(),
            effect_cells: BTreeMap::new(),
        }
    }

    /// Override the emitted `version` field.
    pub fn version(&mut self, version: u64) -> &mut Self {
        self.version = version;
        self
    }

    /// Append an action name; returns its list index.
    pub fn action(&mut self, name: &str) -> u32 {
        push_name(&mut self.actions, NameSpec::Name(name.to_owned()))
    }

    /// Append a precomputed action hash; returns its list index.
    pub fn action_hash(&mut self, hash: u32) -> u32 {
        push_name(&mut self.actions, NameSpec::Hash(hash))
    }

    /// Append an effect name; returns its list index.
    pub fn effect(&mut self, name: &str) -> u32 {
        push_name(&mut self.effects, NameSpec::Name(name.to_owned()))
    }

    /// Append a precomputed effect hash; returns its list index.
    pub fn effect_hash(&mut self, hash: u32) -> u32 {
        push_name(&mut self.effects, NameSpec::Hash(hash))
    }

    /// Append a record to the action cell at `(layer, x, y)`.
    pub fn bind_action(&mut self, layer: u8, x: u8, y: u8, record: RecordSpec) -> &mut Self {
        append(self.action_cells.entry((layer, y, x)).or_insert(CellSpec::Unbound), record);
        self
    }

    /// Mark the action cell at `(layer, x, y)` as bound to nothing.
    pub fn block_action(&mut self, layer: u8, x: u8, y: u8) -> &mut Self {
        self.action_cells.insert((layer, y, x), CellSpec::Blocked);
        self
    }

    /// Append a record to the effect cell at `(x, y)`.
    pub fn bind_effect(&mut self, x: u8, y: u8, record: RecordSpec) -> &mut Self {
        append(self.effect_cells.entry((y, x)).or_insert(CellSpec::Unbound), record);
        self
    }

    /// Emit the descriptor.
    ///
    /// The `effects` and `effectMatrix` sections are written only when at
    /// least one effect is declared or bound.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorWriteError::CellOutOfRange`] if a bound cell lies
    /// outside the declared geometry.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DescriptorWriteError> {
        for &(layer, y, x) in self.action_cells.keys() {
            if layer >= self.layers || x >= self.width || y >= self.height {
                return Err(DescriptorWriteError::CellOutOfRange {
                    layer: Some(layer),
                    x,
                    y,
                });
            }
        }
        for &(y, x) in self.effect_cells.keys() {
            if x >= self.width || y >= self.height {
                return Err(DescriptorWriteError::CellOutOfRange { layer: None, x, y });
            }
        }

        let with_effects = !self.effects.is_empty() || !self.effect_cells.is_empty();
        let mut e = CborEncoder::new();
        e.map(if with_effects { 6 } else { 4 });

        e.text("version").unsigned(self.version);
        e.text("device").map(3);
        e.text("width").unsigned(u64::from(self.width));
        e.text("height").unsigned(u64::from(self.height));
        e.text("layers").unsigned(u64::from(self.layers));

        e.text("actions");
        write_names(&mut e, &self.actions);
        if with_effects {
            e.text("effects");
            write_names(&mut e, &self.effects);
        }

        e.text("actionMatrix").array(usize::from(self.layers));
        for layer in 0..self.layers {
            self.write_grid(&mut e, |y, x| self.action_cells.get(&(layer, y, x)));
        }
        if with_effects {
            e.text("effectMatrix");
            self.write_grid(&mut e, |y, x| self.effect_cells.get(&(y, x)));
        }
        Ok(e.into_bytes())
    }

    fn write_grid<'s>(
        &self,
        e: &mut CborEncoder,
        cell: impl Fn(u8, u8) -> Option<&'s CellSpec>,
    ) {
        e.array(usize::from(self.height));
        for y in 0..self.height {
            e.array(usize::from(self.width));
            for x in 0..self.width {
                write_cell(e, cell(y, x).unwrap_or(&CellSpec::Unbound));
            }
        }
    }
}

fn push_name(list: &mut Vec<NameSpec>, name: NameSpec) -> u32 {
    list.push(name);
    u32::try_from(list.len() - 1).unwrap_or(u32::MAX)
}

fn append(cell: &mut CellSpec, record: RecordSpec) {
    match cell {
        CellSpec::Records(records) => records.push(record),
        _ => *cell = CellSpec::Records(vec![record]),
    }
}

fn write_names(e: &mut CborEncoder, names: &[NameSpec]) {
    e.array(names.len());
    for name in names {
        match name {
            NameSpec::Name(s) => e.text(s),
            NameSpec::Hash(h) => e.unsigned(u64::from(*h)),
        };
    }
}

fn write_cell(e: &mut CborEncoder, cell: &CellSpec) {
    match cell {
        CellSpec::Unbound => {
            e.null();
        }
        CellSpec::Blocked => {
            e.array(0);
        }
        CellSpec::Records(records) => {
            e.array(records.len());
            for record in records {
                if record.operands.is_empty() {
                    e.unsigned(u64::from(record.index));
                } else {
                    e.array(record.operands.len() + 1);
                    e.unsigned(u64::from(record.index));
                    for operand in &record.operands {
                        write_operand(e, operand);
                    }
                }
            }
        }
    }
}

fn write_operand(e: &mut CborEncoder, operand: &Operand) {
    match operand {
        Operand::Unsigned(v) => e.unsigned(*v),
        Operand::Int(v) => e.int(*v),
        Operand::Bool(v) => e.bool(*v),
        Operand::Text(v) => e.text(v),
        Operand::Bytes(v) => e.bytes(v),
        Operand::List(items) => {
            e.array(items.len());
            for item in items {
                write_operand(e, item);
            }
            e
        }
    };
}
