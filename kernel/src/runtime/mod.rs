//! Runtime module: configuration, layer state, and the event dispatcher.
//!
//! Depends on `carrier` and `operators`. Nothing depends on `runtime`.

pub mod config;
pub mod dispatcher;
pub mod layer_state;
