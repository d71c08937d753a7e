//! Operators module: events, capabilities, registers, and the record
//! interpreter.
//!
//! Depends on `carrier`. Does not import from `runtime`.

pub mod capability;
pub mod event;
pub mod execute;
pub mod registers;
pub mod sink;
