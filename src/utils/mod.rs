//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod crypto;
pub mod encryption;
pub mod logging;
pub mod prompt;
pub mod session;

pub use crypto::*;
pub use prompt::{Prompter, TerminalPrompter};
pub use session::SigningSession;
