//! UAD kernel: loads Universal Action Descriptors and dispatches key and
//! render events through a stacked-layer binding model.
//!
//! # API Surface
//!
//! - [`runtime::dispatcher::Runtime::load`] -- validate a descriptor and swap it in atomically
//! - [`runtime::dispatcher::Runtime::key_event`] -- dispatch one key transition through the layer stack
//! - [`runtime::dispatcher::Runtime::render_tick`] -- run every bound effect cell
//! - [`runtime::dispatcher::Runtime::initialize_layer`] / [`runtime::dispatcher::Runtime::deinitialize_layer`] -- layer lifecycle
//!
//! Behavior behind each binding is supplied by the caller through an
//! [`operators::capability::CapabilityRegistry`]; side effects leave through
//! an [`operators::sink::EffectSink`].
//!
//! # Module Dependency Direction
//!
//! `carrier` ← `operators` ← `runtime`
//!
//! One-way only. No cycles. `carrier` depends on nothing internal.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod carrier;
pub mod operators;
pub mod runtime;
