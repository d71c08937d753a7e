//! Runtime configuration.
//!
//! Every field is an optional override; `None` falls back to the documented
//! default constant.

use crate::carrier::descriptor::{ParseOptions, DEFAULT_MAX_RECORDS_PER_CELL};

/// Default `enabled` bitmap: base layer on.
pub const DEFAULT_ENABLED: u16 = 0b1;

/// Default `passthrough` bitmap: every layer falls through.
pub const DEFAULT_PASSTHROUGH: u16 = 0xFFFF;

/// Configuration overrides for a [`Runtime`](crate::runtime::dispatcher::Runtime).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Initial and reset value of the `enabled` bitmap.
    /// `None` uses [`DEFAULT_ENABLED`].
    pub initial_enabled: Option<u16>,
    /// Initial and reset value of the `passthrough` bitmap.
    /// `None` uses [`DEFAULT_PASSTHROUGH`].
    pub initial_passthrough: Option<u16>,
    /// Load-time cap on records per cell. `None` uses
    /// [`DEFAULT_MAX_RECORDS_PER_CELL`].
    pub max_records_per_cell: Option<usize>,
}

impl RuntimeConfig {
    #[must_use]
    pub fn enabled(&self) -> u16 {
        self.initial_enabled.unwrap_or(DEFAULT_ENABLED)
    }

    #[must_use]
    pub fn passthrough(&self) -> u16 {
        self.initial_passthrough.unwrap_or(DEFAULT_PASSTHROUGH)
    }

    #[must_use]
    pub fn max_records_per_cell(&self) -> usize {
        self.max_records_per_cell
            .unwrap_or(DEFAULT_MAX_RECORDS_PER_CELL)
    }

    /// Parser limits derived from this config.
    #[must_use]
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_records_per_cell: self.max_records_per_cell(),
        }
    }
}
