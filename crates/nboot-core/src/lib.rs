// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define the NBoot streaming parser core and its collaborator seams.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Core of the NBoot container interpreter.
//!
//! One [`Session`] walks a nested container record by record and decides,
//! per record, whether to enter it, copy its payload to a fixed
//! destination, skip it, or stop. The session never reads bytes itself; it
//! announces how many bytes it needs next and where they go, and a
//! transport adapter (push or pull) supplies them. Both adapters drive the
//! same decision engine, so the outcome is byte-identical regardless of how
//! the container arrives.
//!
//! All mutable parse state lives in the session; nothing is global, and a
//! fresh session starts from a clean slate.

extern crate alloc;

#[cfg(test)]
extern crate std;

use alloc::string::String;

use nboot_codec::HEADER_SIZE;

mod frame;
mod jobs;
mod layout;
mod session;

pub use frame::{Frame, FrameStack, MAX_DEPTH};
pub use jobs::JobSet;
pub use layout::{LoadRegions, Platform, Region, StoredLayout};
pub use session::{LoadMode, ParserState, Session};

/// Fatal parse faults. Any of these means the container structure cannot be
/// trusted and the session aborts; per-record faults (bad magic, checksum
/// mismatch) are handled inside the session and never surface here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// A declared size exceeds the bytes left in the enclosing container.
    #[error("declared size {declared:#x} exceeds the {remaining:#x} bytes left in the enclosing container")]
    SizeUnderflow {
        /// Size the record declared.
        declared: u32,
        /// Bytes actually left at this nesting level.
        remaining: u32,
    },
    /// Container nesting exceeds the supported depth.
    #[error("container nesting deeper than {limit} levels")]
    StackOverflow {
        /// Maximum supported depth.
        limit: usize,
    },
    /// A payload does not fit its copy destination.
    #[error("payload needs {needed} bytes but the {region:?} region holds {capacity}")]
    RegionOverflow {
        /// Destination that would overflow.
        region: Region,
        /// Bytes the copy requires.
        needed: usize,
        /// Bytes the region provides.
        capacity: usize,
    },
}

/// DRAM selection extracted from a materialized board configuration: which
/// training firmware variant and which timing profile to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DramGoal {
    /// Identity of the DRAM chip type, e.g. `lpddr4`.
    pub dram_type: String,
    /// Identity of the timing profile for the mounted RAM chip.
    pub timing: String,
}

/// Platform hook that brings up DRAM once the training data is resident.
///
/// Invoked synchronously from the session; must not re-enter the parser.
pub trait DramInit {
    /// Run DRAM initialization against the loaded timing payload.
    /// Returns `false` when the controller did not come up.
    fn init_dram(&mut self, timing: &[u8]) -> bool;
}

/// Extracts the [`DramGoal`] from the materialized configuration record.
///
/// The slice is the configuration destination region, record at its start.
/// Returning `None` makes the parser accept any DRAM type section, which
/// mirrors what boards without the properties do.
pub trait DramSelect {
    /// Pick the DRAM identities for this board.
    fn select(&mut self, board_cfg: &[u8]) -> Option<DramGoal>;
}

/// Opaque image authentication capability.
///
/// When absent, payloads are trusted on their checksum alone, or, with no
/// checksum either, unconditionally. That weak mode is deliberate: it is
/// how unlocked boards operate.
pub trait Authenticator {
    /// Verify a loaded record. `header` is the raw record header, `payload`
    /// the materialized payload bytes.
    fn authenticate(&mut self, header: &[u8; HEADER_SIZE], payload: &[u8]) -> bool;
}

/// The caller-supplied collaborators for one session.
///
/// `'a` is the exclusive-borrow lifetime of the collaborator references;
/// `'d` is the lifetime of the trait objects themselves. Keeping them
/// distinct lets [`Collaborators::reborrow`] hand out a shorter-lived
/// exclusive borrow (`'a`) without shortening the underlying objects
/// (`'d`), which a single, invariant `&mut dyn` lifetime cannot do.
#[derive(Default)]
pub struct Collaborators<'a, 'd: 'a> {
    /// DRAM bring-up hook; required for the DRAM job to complete.
    pub dram_init: Option<&'a mut (dyn DramInit + 'd)>,
    /// DRAM identity lookup; `None` degrades to match-any.
    pub dram_select: Option<&'a mut (dyn DramSelect + 'd)>,
    /// Optional authentication engine.
    pub authenticator: Option<&'a mut (dyn Authenticator + 'd)>,
}

impl<'d> Collaborators<'_, 'd> {
    /// Reborrow the collaborators for a shorter-lived session attempt.
    pub fn reborrow(&mut self) -> Collaborators<'_, 'd> {
        Collaborators {
            dram_init: self.dram_init.as_deref_mut(),
            dram_select: self.dram_select.as_deref_mut(),
            authenticator: self.authenticator.as_deref_mut(),
        }
    }
}
