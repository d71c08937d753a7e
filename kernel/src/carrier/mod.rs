//! Carrier module: the descriptor wire format and the binding tables built
//! from it.
//!
//! This is the foundational layer. No other kernel module is imported here.

pub mod cbor;
pub mod cbor_writer;
pub mod descriptor;
pub mod descriptor_writer;
pub mod digest;
pub mod lut;
pub mod name_hash;
