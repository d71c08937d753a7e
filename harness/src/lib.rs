//! UAD harness: drive the runtime from files and record what it does.
//!
//! The harness replays JSON scenarios against a descriptor with a stock
//! capability catalog and packages the result as a content-addressed
//! transcript. It does not interpret descriptors itself; that is the
//! kernel's job.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod canon;
pub mod capabilities;
pub mod fixtures;
pub mod scenario;
pub mod session;
pub mod transcript;
