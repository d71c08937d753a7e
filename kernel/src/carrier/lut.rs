//! Dense binding tables: O(1) `(layer, cell) -> record offset` lookup.
//!
//! Built once per successful descriptor load from the decoded matrices.
//!
//! # Layout
//!
//! - Action table: one `Box<[u32]>` per layer, `width * height` entries each.
//! - Effect table: a single `Box<[u32]>`, same indexing.
//!
//! Each entry is the byte offset (into the descriptor) of the cell's record
//! list, or [`UNBOUND`]. Offsets are validated by the parser before they
//! reach a table; the tables themselves never read descriptor bytes.

/// Sentinel for "no binding" in a dense table.
pub const UNBOUND: u32 = u32::MAX;

/// Per-layer action bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBindingTable {
    cell_count: usize,
    layers: Vec<Box<[u32]>>,
}

impl ActionBindingTable {
    /// Build from a decoded action matrix flattened as `[layer][cell]`.
    ///
    /// Returns `None` if `cells.len() != layer_count * cell_count` or an
    /// entry collides with the [`UNBOUND`] sentinel.
    #[must_use]
    pub fn from_matrix(layer_count: usize, cell_count: usize, cells: &[Option<u32>]) -> Option<Self> {
        if cells.len() != layer_count.checked_mul(cell_count)? {
            return None;
        }
        let mut layers = Vec::with_capacity(layer_count);
        for layer in 0..layer_count {
            let row = &cells[layer * cell_count..(layer + 1) * cell_count];
            layers.push(dense(row)?);
        }
        Some(Self { cell_count, layers })
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Record offset bound at `(layer, cell)`, if any.
    #[must_use]
    pub fn get(&self, layer: usize, cell: usize) -> Option<u32> {
        let offset = *self.layers.get(layer)?.get(cell)?;
        (offset != UNBOUND).then_some(offset)
    }

    /// Bound cells of one layer in ascending cell order.
    pub fn bound_cells(&self, layer: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.layers
            .get(layer)
            .into_iter()
            .flat_map(|cells| bound_entries(cells))
    }

    /// Number of bound cells across all layers.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.layers
            .iter()
            .map(|cells| cells.iter().filter(|&&o| o != UNBOUND).count())
            .sum()
    }
}

/// Unlayered effect bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectBindingTable {
    cells: Box<[u32]>,
}

impl EffectBindingTable {
    /// Build from a decoded effect matrix flattened as `[cell]`.
    #[must_use]
    pub fn from_matrix(cell_count: usize, cells: &[Option<u32>]) -> Option<Self> {
        if cells.len() != cell_count {
            return None;
        }
        Some(Self { cells: dense(cells)? })
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn get(&self, cell: usize) -> Option<u32> {
        let offset = *self.cells.get(cell)?;
        (offset != UNBOUND).then_some(offset)
    }

    pub fn bound_cells(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        bound_entries(&self.cells)
    }

    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.cells.iter().filter(|&&o| o != UNBOUND).count()
    }
}

fn dense(cells: &[Option<u32>]) -> Option<Box<[u32]>> {
    cells
        .iter()
        .map(|cell| match *cell {
            None => Some(UNBOUND),
            Some(UNBOUND) => None,
            Some(offset) => Some(offset),
        })
        .collect()
}

fn bound_entries(cells: &[u32]) -> impl Iterator<Item = (usize, u32)> + '_ {
    cells
        .iter()
        .enumerate()
        .filter(|&(_, &o)| o != UNBOUND)
        .map(|(i, &o)| (i, o))
}
