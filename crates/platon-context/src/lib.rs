// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-request processing context shared across handlers in one chain pass.
//!
//! [`ProcessingContext`] is the mutable state every [`Handler`] in
//! `platon-chain` reads and writes: the prompt/response text for the
//! active [`Phase`], the block/modified flags, the free-form `state` and
//! `metadata` maps, the append-only audit log, and an ambient
//! [`CancellationToken`] that a caller can use to abort an in-flight chain
//! pass.
//!
//! [`Handler`]: https://docs.rs/platon-chain (see the `platon-chain` crate)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod cancel;
mod context;

pub use audit::AuditEntry;
pub use cancel::CancellationToken;
pub use context::{Phase, ProcessingContext};
