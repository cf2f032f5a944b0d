//! Deterministic JSON serialization for the Signet file format.
//!
//! Keeps persisted snapshots diff-friendly by:
//! - Using 2-space indentation
//! - Adding trailing newline
//! - UTF-8 encoding without BOM

mod json;

pub use json::*;
