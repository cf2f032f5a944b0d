//! Signet Application - Token identity coordination
//!
//! This crate wires the domain history into a process-wide coordinator:
//! the auth token context, the listener capability consumers implement,
//! and the ports (clock, history store) that infrastructure adapters fill
//! in.

pub mod context;
pub mod error;
pub mod ports;

pub use context::{AuthTokenContext, ContextOptions, TokenContextDelegate, token_preview};
pub use error::{ApplicationError, ApplicationResult};
