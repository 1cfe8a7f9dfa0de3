//! Wallet Module
//!
//! Key material sources: seeds and their resolution, deterministic key
//! derivation, key-address tables and plain keylists.

mod derivation;
mod key_address;
mod keylist;
mod seed;

pub use derivation::*;
pub use key_address::*;
pub use keylist::*;
pub use seed::*;
