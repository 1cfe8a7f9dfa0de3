//! Transaction Module
//!
//! Transaction files, address-map reconciliation, the signing protocol and
//! the per-run pipeline that ties them together.

mod pipeline;
mod reconcile;
mod rpc;
mod signer;
mod transaction;

pub use pipeline::*;
pub use reconcile::*;
pub use rpc::*;
pub use signer::*;
pub use transaction::*;
