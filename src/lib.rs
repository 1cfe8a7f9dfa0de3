//! coldsign Core Library
//!
//! Offline signing for cold-storage Bitcoin transactions.
//!
//! # Architecture
//!
//! This crate provides:
//! - **wallet**: Seed resolution, deterministic key derivation, key-address
//!   tables and plain keylists
//! - **tx**: Transaction files, address-map reconciliation, the signing
//!   protocol and the run pipeline
//! - **config**: Run options
//! - **utils**: Logging, prompts, encrypted containers, the per-run session
//!
//! Every address a transaction claims was derived from a seed is checked
//! against an independent source before a single key reaches the signer.
//!
//! # Security
//!
//! This crate uses `zeroize` to securely clear sensitive data from memory.
//! Seeds and private keys are zeroed when dropped and never logged.
//!
//! # Example
//!
//! ```rust,ignore
//! use coldsign::{config::SignConfig, tx};
//!
//! let outcome = tx::run(&config, &collaborators)?;
//! ```

pub mod config;
pub mod error;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

pub use config::{RunMode, SignConfig};
pub use error::{ErrorCode, SignError, SignResult};
pub use types::*;
