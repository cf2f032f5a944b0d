//! Auth token context for the Signet library.
//!
//! This module provides:
//! - The process-wide token context with bounded history
//! - Synchronous, ordered listener notification
//! - A log-safe token preview helper

mod delegate;
mod token_context;

pub use delegate::{TokenContextDelegate, token_preview};
pub use token_context::{AuthTokenContext, ContextOptions};
