//! `Descriptor`: a validated, borrowed view over a UAD descriptor blob.
//!
//! Fail-closed and all-or-nothing: [`Descriptor::parse`] either returns a
//! fully validated descriptor with its binding tables built, or a typed
//! [`DescriptorError`]. Every record offset stored in a binding table has
//! been walked and bounds-checked at parse time, so later lookups cannot
//! step outside the buffer.
//!
//! # Wire layout (CBOR, definite lengths)
//!
//! ```text
//! {
//!   "version": 0,
//!   "device": { "width": W, "height": H, "layers": L },
//!   "actions": [ name-or-hash, ... ],
//!   "effects": [ name-or-hash, ... ],            -- optional
//!   "actionMatrix": [ L x [ H x [ W x cell ] ] ],
//!   "effectMatrix": [ H x [ W x cell ] ]          -- optional
//! }
//! cell   = null | [ record, ... ]
//! record = index | [ index, operand, ... ]
//! ```
//!
//! `null` means "no binding" and lets the dispatcher fall through on
//! passthrough layers. An empty list is a binding with no records: it
//! consumes the event.

use std::collections::BTreeSet;
use std::fmt;

use crate::carrier::cbor::{CborError, CborReader, Item};
use crate::carrier::lut::{ActionBindingTable, EffectBindingTable};
use crate::carrier::name_hash::NameHash;

/// The one descriptor version this runtime accepts.
pub const SUPPORTED_VERSION: u64 = 0;

/// Maximum number of virtual layers (width of the layer bitmaps).
pub const MAX_LAYERS: u8 = 16;

/// Maximum grid width or height (key ids carry 6-bit coordinates).
pub const MAX_GRID_DIMENSION: u8 = 64;

/// Default cap on records per cell.
pub const DEFAULT_MAX_RECORDS_PER_CELL: usize = 16;

const KEY_VERSION: &str = "version";
const KEY_DEVICE: &str = "device";
const KEY_ACTIONS: &str = "actions";
const KEY_EFFECTS: &str = "effects";
const KEY_ACTION_MATRIX: &str = "actionMatrix";
const KEY_EFFECT_MATRIX: &str = "effectMatrix";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Typed failure for descriptor parsing. Any variant rejects the whole load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The byte stream is not well-formed CBOR.
    Cbor(CborError),
    /// Well-formed CBOR with the wrong shape (type mismatch, bad record).
    Format { detail: String },
    /// `version` is not [`SUPPORTED_VERSION`].
    VersionMismatch { found: u64, supported: u64 },
    /// A required top-level or `device` key is absent.
    MissingSection { section: &'static str },
    /// A map key appears twice.
    DuplicateKey { key: String },
    /// An index, dimension, or count lies outside its declared range.
    Bounds { detail: String },
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cbor(e) => write!(f, "malformed descriptor encoding: {e}"),
            Self::Format { detail } => write!(f, "descriptor format error: {detail}"),
            Self::VersionMismatch { found, supported } => {
                write!(f, "descriptor version {found} not supported (expected {supported})")
            }
            Self::MissingSection { section } => {
                write!(f, "descriptor is missing required section \"{section}\"")
            }
            Self::DuplicateKey { key } => write!(f, "duplicate descriptor key \"{key}\""),
            Self::Bounds { detail } => write!(f, "descriptor bounds error: {detail}"),
        }
    }
}

impl std::error::Error for DescriptorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cbor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CborError> for DescriptorError {
    fn from(e: CborError) -> Self {
        Self::Cbor(e)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Grid dimensions. Cells are indexed `row * width + col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: u8,
    pub height: u8,
}

impl Geometry {
    #[must_use]
    pub const fn cell_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Cell index of `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub const fn cell_index(self, x: u8, y: u8) -> Option<u16> {
        if x < self.width && y < self.height {
            Some(y as u16 * self.width as u16 + x as u16)
        } else {
            None
        }
    }

    /// `(x, y)` of a cell index, or `None` outside the grid.
    #[must_use]
    pub fn cell_xy(self, cell: u16) -> Option<(u8, u8)> {
        if usize::from(cell) >= self.cell_count() {
            return None;
        }
        let width = u16::from(self.width);
        let x = u8::try_from(cell % width).ok()?;
        let y = u8::try_from(cell / width).ok()?;
        Some((x, y))
    }
}

// ---------------------------------------------------------------------------
// Parse options
// ---------------------------------------------------------------------------

/// Limits applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum records in one cell (capped at 256 so slots fit a `u8`).
    pub max_records_per_cell: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_records_per_cell: DEFAULT_MAX_RECORDS_PER_CELL,
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// A validated descriptor borrowing its backing bytes.
#[derive(Debug, Clone)]
pub struct Descriptor<'a> {
    bytes: &'a [u8],
    version: u64,
    geometry: Geometry,
    layer_count: u8,
    actions: Vec<NameHash>,
    effects: Vec<NameHash>,
    action_table: ActionBindingTable,
    effect_table: EffectBindingTable,
}

impl<'a> Descriptor<'a> {
    /// Parse and validate `bytes` with default [`ParseOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] on malformed encoding, version mismatch,
    /// missing sections, dimension mismatches, or out-of-range indices.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, DescriptorError> {
        Self::parse_with(bytes, ParseOptions::default())
    }

    /// Parse and validate `bytes`.
    ///
    /// # Errors
    ///
    /// Same as [`parse`](Self::parse).
    pub fn parse_with(bytes: &'a [u8], options: ParseOptions) -> Result<Self, DescriptorError> {
        if u32::try_from(bytes.len()).map_or(true, |len| len == u32::MAX) {
            return Err(DescriptorError::Bounds {
                detail: format!("descriptor of {} bytes exceeds u32 offsets", bytes.len()),
            });
        }
        let max_records = options.max_records_per_cell.min(usize::from(u8::MAX) + 1);

        let sections = locate_sections(bytes)?;

        // --- Version ---
        let mut r = section_reader(bytes, sections.version, KEY_VERSION)?;
        let version = expect_unsigned(&mut r, KEY_VERSION)?;
        if version != SUPPORTED_VERSION {
            return Err(DescriptorError::VersionMismatch {
                found: version,
                supported: SUPPORTED_VERSION,
            });
        }

        // --- Device ---
        let mut r = section_reader(bytes, sections.device, KEY_DEVICE)?;
        let (geometry, layer_count) = parse_device(&mut r)?;

        // --- Name lists ---
        let mut r = section_reader(bytes, sections.actions, KEY_ACTIONS)?;
        let actions = parse_name_list(&mut r, KEY_ACTIONS)?;
        let effects = match sections.effects {
            Some(offset) => parse_name_list(&mut CborReader::at(bytes, offset)?, KEY_EFFECTS)?,
            None => Vec::new(),
        };

        // --- Matrices ---
        let ctx = MatrixContext {
            geometry,
            max_records,
        };
        let mut r = section_reader(bytes, sections.action_matrix, KEY_ACTION_MATRIX)?;
        let action_cells = parse_action_matrix(&mut r, &ctx, layer_count, actions.len())?;
        let effect_cells = match sections.effect_matrix {
            Some(offset) => {
                let mut r = CborReader::at(bytes, offset)?;
                parse_grid(&mut r, &ctx, effects.len(), KEY_EFFECT_MATRIX)?
            }
            None => vec![None; geometry.cell_count()],
        };

        // --- Binding tables ---
        let action_table = ActionBindingTable::from_matrix(
            usize::from(layer_count),
            geometry.cell_count(),
            &action_cells,
        )
        .ok_or_else(|| DescriptorError::Bounds {
            detail: "action matrix does not fill the declared geometry".into(),
        })?;
        let effect_table = EffectBindingTable::from_matrix(geometry.cell_count(), &effect_cells)
            .ok_or_else(|| DescriptorError::Bounds {
                detail: "effect matrix does not fill the declared geometry".into(),
            })?;

        Ok(Self {
            bytes,
            version,
            geometry,
            layer_count,
            actions,
            effects,
            action_table,
            effect_table,
        })
    }

    /// The backing bytes.
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[must_use]
    pub const fn layer_count(&self) -> u8 {
        self.layer_count
    }

    /// Action name hashes, in descriptor order.
    #[must_use]
    pub fn actions(&self) -> &[NameHash] {
        &self.actions
    }

    /// Effect name hashes, in descriptor order.
    #[must_use]
    pub fn effects(&self) -> &[NameHash] {
        &self.effects
    }

    #[must_use]
    pub const fn action_table(&self) -> &ActionBindingTable {
        &self.action_table
    }

    #[must_use]
    pub const fn effect_table(&self) -> &EffectBindingTable {
        &self.effect_table
    }

    /// Records bound at `(layer, cell)` in the action matrix.
    #[must_use]
    pub fn action_records(&self, layer: u8, cell: u16) -> Option<Records<'a>> {
        let offset = self
            .action_table
            .get(usize::from(layer), usize::from(cell))?;
        Some(self.records_at(offset))
    }

    /// Records bound at `cell` in the effect matrix.
    #[must_use]
    pub fn effect_records(&self, cell: u16) -> Option<Records<'a>> {
        let offset = self.effect_table.get(usize::from(cell))?;
        Some(self.records_at(offset))
    }

    /// Iterate the record list starting at a table offset.
    #[must_use]
    pub fn records_at(&self, offset: u32) -> Records<'a> {
        Records::new(self.bytes, offset)
    }
}

// ---------------------------------------------------------------------------
// Records and operands
// ---------------------------------------------------------------------------

/// One executable record: a list index plus its operands.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    /// Position of the record within its cell (the binding slot).
    pub slot: u8,
    /// Index into the action or effect name list.
    pub index: u32,
    /// Byte offset of the record in the descriptor.
    pub offset: u32,
    pub operands: Operands<'a>,
}

/// Iterator over the records of one bound cell.
///
/// Yields `Err` once and then stops if the bytes do not decode. For tables
/// built by [`Descriptor::parse`] this cannot happen.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    reader: Option<CborReader<'a>>,
    remaining: usize,
    next_slot: usize,
    pending_error: Option<CborError>,
}

impl<'a> Records<'a> {
    fn new(bytes: &'a [u8], offset: u32) -> Self {
        let opened = usize::try_from(offset)
            .map_err(|_| CborError::Truncated {
                offset: usize::MAX,
                detail: "record offset does not fit usize".into(),
            })
            .and_then(|offset| CborReader::at(bytes, offset))
            .and_then(|mut reader| match reader.read()? {
                Item::Array(n) => Ok((reader, n)),
                other => Err(CborError::Unsupported {
                    offset: reader.position(),
                    detail: format!("expected record list, found {}", other.kind_name()),
                }),
            });
        match opened {
            Ok((reader, n)) => Self {
                reader: Some(reader),
                remaining: n,
                next_slot: 0,
                pending_error: None,
            },
            Err(e) => Self {
                reader: None,
                remaining: 0,
                next_slot: 0,
                pending_error: Some(e),
            },
        }
    }

    /// Records not yet yielded.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    fn next_record(reader: &mut CborReader<'a>, slot: usize) -> Result<Record<'a>, CborError> {
        let start = reader.position();
        let (index, operand_count) = match reader.read()? {
            Item::Unsigned(i) => (i, 0),
            Item::Array(n) if n >= 1 => match reader.read()? {
                Item::Unsigned(i) => (i, n - 1),
                other => return Err(bad_record(start, other)),
            },
            other => return Err(bad_record(start, other)),
        };
        let operands = Operands::new(reader.clone(), operand_count);
        for _ in 0..operand_count {
            reader.skip()?;
        }
        Ok(Record {
            slot: u8::try_from(slot).unwrap_or(u8::MAX),
            index: u32::try_from(index).unwrap_or(u32::MAX),
            offset: u32::try_from(start).unwrap_or(u32::MAX),
            operands,
        })
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>, CborError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            return Some(Err(e));
        }
        if self.remaining == 0 {
            return None;
        }
        let reader = self.reader.as_mut()?;
        let slot = self.next_slot;
        self.remaining -= 1;
        self.next_slot += 1;
        match Self::next_record(reader, slot) {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.remaining = 0;
                self.reader = None;
                Some(Err(e))
            }
        }
    }
}

fn bad_record(offset: usize, found: Item<'_>) -> CborError {
    CborError::Unsupported {
        offset,
        detail: format!("expected record, found {}", found.kind_name()),
    }
}

/// Borrowed view of a record's operands.
///
/// Typed accessors return `None` when the operand is absent or of another
/// type; capabilities decide whether that is an error.
#[derive(Debug, Clone)]
pub struct Operands<'a> {
    start: CborReader<'a>,
    count: usize,
}

impl<'a> Operands<'a> {
    const fn new(start: CborReader<'a>, count: usize) -> Self {
        Self { start, count }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Header of operand `n`.
    #[must_use]
    pub fn get(&self, n: usize) -> Option<Item<'a>> {
        self.reader_at(n)?.read().ok()
    }

    /// Complete encoded bytes of operand `n` (for nested operands).
    #[must_use]
    pub fn raw(&self, n: usize) -> Option<&'a [u8]> {
        self.reader_at(n)?.item_bytes().ok()
    }

    #[must_use]
    pub fn unsigned(&self, n: usize) -> Option<u64> {
        match self.get(n)? {
            Item::Unsigned(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn u32(&self, n: usize) -> Option<u32> {
        u32::try_from(self.unsigned(n)?).ok()
    }

    #[must_use]
    pub fn u8(&self, n: usize) -> Option<u8> {
        u8::try_from(self.unsigned(n)?).ok()
    }

    #[must_use]
    pub fn int(&self, n: usize) -> Option<i64> {
        match self.get(n)? {
            Item::Unsigned(v) => i64::try_from(v).ok(),
            Item::Negative(v) => i64::try_from(v).ok().map(|v| -1 - v),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool(&self, n: usize) -> Option<bool> {
        match self.get(n)? {
            Item::Bool(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self, n: usize) -> Option<&'a str> {
        match self.get(n)? {
            Item::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn bytes(&self, n: usize) -> Option<&'a [u8]> {
        match self.get(n)? {
            Item::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn reader_at(&self, n: usize) -> Option<CborReader<'a>> {
        if n >= self.count {
            return None;
        }
        let mut r = self.start.clone();
        for _ in 0..n {
            r.skip().ok()?;
        }
        Some(r)
    }
}

// ---------------------------------------------------------------------------
// Section location
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SectionOffsets {
    version: Option<usize>,
    device: Option<usize>,
    actions: Option<usize>,
    effects: Option<usize>,
    action_matrix: Option<usize>,
    effect_matrix: Option<usize>,
}

/// Walk the top-level map once, recording where each known section starts.
fn locate_sections(bytes: &[u8]) -> Result<SectionOffsets, DescriptorError> {
    let mut r = CborReader::new(bytes);
    let pairs = match r.read()? {
        Item::Map(n) => n,
        other => {
            return Err(DescriptorError::Format {
                detail: format!("top level must be a map, found {}", other.kind_name()),
            })
        }
    };

    let mut sections = SectionOffsets::default();
    let mut seen_unknown: BTreeSet<&str> = BTreeSet::new();
    for _ in 0..pairs {
        let key = expect_text(&mut r, "top-level key")?;
        let slot = match key {
            KEY_VERSION => Some(&mut sections.version),
            KEY_DEVICE => Some(&mut sections.device),
            KEY_ACTIONS => Some(&mut sections.actions),
            KEY_EFFECTS => Some(&mut sections.effects),
            KEY_ACTION_MATRIX => Some(&mut sections.action_matrix),
            KEY_EFFECT_MATRIX => Some(&mut sections.effect_matrix),
            _ => None,
        };
        match slot {
            Some(slot) => {
                if slot.replace(r.position()).is_some() {
                    return Err(DescriptorError::DuplicateKey { key: key.into() });
                }
            }
            None => {
                if !seen_unknown.insert(key) {
                    return Err(DescriptorError::DuplicateKey { key: key.into() });
                }
            }
        }
        r.skip()?;
    }
    r.finish()?;
    Ok(sections)
}

fn section_reader<'a>(
    bytes: &'a [u8],
    offset: Option<usize>,
    section: &'static str,
) -> Result<CborReader<'a>, DescriptorError> {
    let offset = offset.ok_or(DescriptorError::MissingSection { section })?;
    Ok(CborReader::at(bytes, offset)?)
}

// ---------------------------------------------------------------------------
// Section parsers
// ---------------------------------------------------------------------------

fn parse_device(r: &mut CborReader<'_>) -> Result<(Geometry, u8), DescriptorError> {
    let pairs = expect_map(r, KEY_DEVICE)?;
    let mut width = None;
    let mut height = None;
    let mut layers = None;
    for _ in 0..pairs {
        let key = expect_text(r, "device key")?;
        let slot = match key {
            "width" => &mut width,
            "height" => &mut height,
            "layers" => &mut layers,
            _ => {
                r.skip()?;
                continue;
            }
        };
        if slot.is_some() {
            return Err(DescriptorError::DuplicateKey {
                key: format!("device.{key}"),
            });
        }
        *slot = Some(expect_unsigned(r, key)?);
    }

    let width = width.ok_or(DescriptorError::MissingSection {
        section: "device.width",
    })?;
    let height = height.ok_or(DescriptorError::MissingSection {
        section: "device.height",
    })?;
    let layers = layers.ok_or(DescriptorError::MissingSection {
        section: "device.layers",
    })?;

    let width = dimension("width", width, MAX_GRID_DIMENSION)?;
    let height = dimension("height", height, MAX_GRID_DIMENSION)?;
    let layers = dimension("layers", layers, MAX_LAYERS)?;
    Ok((Geometry { width, height }, layers))
}

fn dimension(name: &str, value: u64, max: u8) -> Result<u8, DescriptorError> {
    match u8::try_from(value) {
        Ok(v) if (1..=max).contains(&v) => Ok(v),
        _ => Err(DescriptorError::Bounds {
            detail: format!("device.{name} = {value} outside 1..={max}"),
        }),
    }
}

fn parse_name_list(
    r: &mut CborReader<'_>,
    section: &str,
) -> Result<Vec<NameHash>, DescriptorError> {
    let len = expect_array(r, section)?;
    if len > r.remaining() {
        return Err(CborError::Truncated {
            offset: r.position(),
            detail: format!("{section}: {len} entries declared, {} bytes remain", r.remaining()),
        }
        .into());
    }
    let mut names = Vec::with_capacity(len);
    for i in 0..len {
        let hash = match r.read()? {
            Item::Text(name) => NameHash::of(name),
            Item::Unsigned(v) => {
                NameHash::from_u32(u32::try_from(v).map_err(|_| DescriptorError::Bounds {
                    detail: format!("{section}[{i}]: hash {v} exceeds 32 bits"),
                })?)
            }
            other => {
                return Err(DescriptorError::Format {
                    detail: format!(
                        "{section}[{i}]: expected name or hash, found {}",
                        other.kind_name()
                    ),
                })
            }
        };
        names.push(hash);
    }
    Ok(names)
}

struct MatrixContext {
    geometry: Geometry,
    max_records: usize,
}

fn parse_action_matrix(
    r: &mut CborReader<'_>,
    ctx: &MatrixContext,
    layer_count: u8,
    list_len: usize,
) -> Result<Vec<Option<u32>>, DescriptorError> {
    let layers = expect_array(r, KEY_ACTION_MATRIX)?;
    if layers != usize::from(layer_count) {
        return Err(DescriptorError::Bounds {
            detail: format!(
                "{KEY_ACTION_MATRIX} has {layers} layers, device declares {layer_count}"
            ),
        });
    }
    let mut cells = Vec::with_capacity(usize::from(layer_count) * ctx.geometry.cell_count());
    for _ in 0..layers {
        cells.extend(parse_grid(r, ctx, list_len, KEY_ACTION_MATRIX)?);
    }
    Ok(cells)
}

/// Parse one `[row][col]` grid of cells, returning record-list offsets.
fn parse_grid(
    r: &mut CborReader<'_>,
    ctx: &MatrixContext,
    list_len: usize,
    section: &str,
) -> Result<Vec<Option<u32>>, DescriptorError> {
    let Geometry { width, height } = ctx.geometry;
    let rows = expect_array(r, section)?;
    if rows != usize::from(height) {
        return Err(DescriptorError::Bounds {
            detail: format!("{section}: {rows} rows, device declares height {height}"),
        });
    }
    let mut cells = Vec::with_capacity(ctx.geometry.cell_count());
    for row in 0..rows {
        let cols = expect_array(r, section)?;
        if cols != usize::from(width) {
            return Err(DescriptorError::Bounds {
                detail: format!("{section}: row {row} has {cols} columns, device declares width {width}"),
            });
        }
        for _ in 0..cols {
            cells.push(parse_cell(r, ctx, list_len, section)?);
        }
    }
    Ok(cells)
}

/// Validate one cell and return the offset of its record list.
fn parse_cell(
    r: &mut CborReader<'_>,
    ctx: &MatrixContext,
    list_len: usize,
    section: &str,
) -> Result<Option<u32>, DescriptorError> {
    let offset = r.position();
    let records = match r.read()? {
        Item::Null => return Ok(None),
        Item::Array(n) => n,
        other => {
            return Err(DescriptorError::Format {
                detail: format!(
                    "{section}: cell at offset {offset} must be null or a record list, found {}",
                    other.kind_name()
                ),
            })
        }
    };
    if records > ctx.max_records {
        return Err(DescriptorError::Bounds {
            detail: format!(
                "{section}: cell at offset {offset} has {records} records (max {})",
                ctx.max_records
            ),
        });
    }
    for _ in 0..records {
        let record_offset = r.position();
        let index = match r.read()? {
            Item::Unsigned(i) => i,
            Item::Array(n) if n >= 1 => {
                let i = expect_unsigned(r, "record index")?;
                for _ in 1..n {
                    r.skip()?;
                }
                i
            }
            other => {
                return Err(DescriptorError::Format {
                    detail: format!(
                        "{section}: record at offset {record_offset} must be an index or a non-empty list, found {}",
                        other.kind_name()
                    ),
                })
            }
        };
        if usize::try_from(index).map_or(true, |i| i >= list_len) {
            return Err(DescriptorError::Bounds {
                detail: format!(
                    "{section}: record at offset {record_offset} references index {index} but list has {list_len} entries"
                ),
            });
        }
    }
    let offset = u32::try_from(offset).map_err(|_| DescriptorError::Bounds {
        detail: format!("cell offset {offset} exceeds u32"),
    })?;
    Ok(Some(offset))
}

// ---------------------------------------------------------------------------
// Typed item helpers
// ---------------------------------------------------------------------------

fn expect_unsigned(r: &mut CborReader<'_>, what: &str) -> Result<u64, DescriptorError> {
    match r.read()? {
        Item::Unsigned(v) => Ok(v),
        other => Err(type_error(what, "unsigned integer", other)),
    }
}

fn expect_text<'a>(r: &mut CborReader<'a>, what: &str) -> Result<&'a str, DescriptorError> {
    match r.read()? {
        Item::Text(s) => Ok(s),
        other => Err(type_error(what, "text string", other)),
    }
}

fn expect_array(r: &mut CborReader<'_>, what: &str) -> Result<usize, DescriptorError> {
    match r.read()? {
        Item::Array(n) => Ok(n),
        other => Err(type_error(what, "array", other)),
    }
}

fn expect_map(r: &mut CborReader<'_>, what: &str) -> Result<usize, DescriptorError> {
    match r.read()? {
        Item::Map(n) => Ok(n),
        other => Err(type_error(what, "map", other)),
    }
}

fn type_error(what: &str, expected: &str, found: Item<'_>) -> DescriptorError {
    DescriptorError::Format {
        detail: format!("{what}: expected {expected}, found {}", found.kind_name()),
    }
}
