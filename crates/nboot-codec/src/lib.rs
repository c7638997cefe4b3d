// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide NBoot container header types and codec primitives.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Wire types and codec primitives for the NBoot composite boot container.
//!
//! An NBoot image is a tree of records. Every record starts with a fixed
//! 64-byte header that names its type, optionally carries an identity
//! string, and declares how many payload bytes follow. Payloads may in turn
//! contain further records, which is how board configurations, DRAM
//! firmware and follow-on boot images are bundled into one file.
//!
//! This crate only knows about one record at a time: recognizing the
//! header, checking its CRC32, matching type and identity, and composing
//! new records. Walking the nesting is the parser's job.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod builder;
mod header;
mod identity;

pub use builder::ImageBuilder;
pub use header::{
    ChecksumScope, CodecError, HeaderFlags, ImageHeader, DESCR_LEN, HEADER_SIZE, MAGIC,
    PAYLOAD_ALIGN, TYPE_LEN,
};
pub use header::{stamp_board_rev, verify_record};
pub use identity::BoardId;
