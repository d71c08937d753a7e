//! Shared fixtures for the lock tests.

#![forbid(unsafe_code)]
