// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide push and pull transport adapters over the NBoot parser.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Transport adapters for the NBoot container parser.
//!
//! Two delivery models drive the same decision engine: the push adapter
//! accepts arbitrarily sized chunks of a one-shot byte stream (serial
//! download), the pull adapter issues exact-size reads against a
//! block-addressable medium. Either way the parser sees the identical byte
//! sequence, so the load decisions are identical too.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod pull;
mod push;

pub use pull::{load_system, run_pull, BlockSource, LoadReport, MediumError, PullError};
pub use push::{PushAdapter, StreamError};
