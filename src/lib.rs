// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! Root library for the NBoot streaming boot-container loader.
//!
//! NBoot bundles everything a first-stage loader needs — board
//! configurations, DRAM training firmware and timing data, trusted
//! firmware and TEE images — into one nested container. This crate ties
//! the member crates together: the record codec, the streaming parser
//! core, and the push/pull transport adapters that drive it from a serial
//! download or from block storage.

#![forbid(unsafe_code)]

/// Record headers, checksums, identities and the image builder.
pub use nboot_codec as codec;

/// The container-walking state machine and its collaborator seams.
pub use nboot_core as parser;

/// Push and pull transport adapters and the stored-system loader.
pub use nboot_transport as transport;

pub use nboot_codec::{
    stamp_board_rev, verify_record, BoardId, ChecksumScope, CodecError, HeaderFlags, ImageBuilder,
    ImageHeader, DESCR_LEN, HEADER_SIZE, MAGIC, PAYLOAD_ALIGN, TYPE_LEN,
};
pub use nboot_core::{
    Authenticator, Collaborators, DramGoal, DramInit, DramSelect, Frame, FrameStack, JobSet,
    LoadMode, LoadRegions, ParserState, Platform, Region, Session, SessionError, StoredLayout,
    MAX_DEPTH,
};
pub use nboot_transport::{
    load_system, run_pull, BlockSource, LoadReport, MediumError, PullError, PushAdapter,
    StreamError,
};
