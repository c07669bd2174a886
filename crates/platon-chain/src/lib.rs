// SPDX-License-Identifier: MIT OR Apache-2.0
//! Priority-ordered handler chain: the chain-of-responsibility dispatcher
//! that walks a pipeline's pre- and post-handler lists around a call to a
//! [`MainProcessor`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chain;
mod handler;
mod observer;
mod result;

pub use chain::{Chain, MainProcessor};
pub use handler::{Handler, HandlerType};
pub use observer::{set_observer, PipelineObserver};
pub use result::ProcessResult;
