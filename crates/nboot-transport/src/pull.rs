// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Drive the container parser from a block-addressable medium.
// Author: Lukas Bower

//! Pull delivery: the parser's byte needs are satisfied by exact-size
//! reads at a moving cursor. Skipped ranges advance the cursor without
//! touching the medium, and no read ever crosses the known bound of the
//! stored image, so a corrupt size field cannot make the loader read
//! unrelated storage.

use log::{info, warn};

use nboot_codec::{verify_record, BoardId, CodecError, ImageHeader, HEADER_SIZE};
use nboot_core::{
    Collaborators, JobSet, LoadRegions, Platform, Region, Session, SessionError, StoredLayout,
};

/// I/O fault reported by a medium reader. Offset granularity and alignment
/// quirks are the reader's problem, not the parser's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("medium read failed at offset {offset:#x}")]
pub struct MediumError {
    /// Offset of the failed read.
    pub offset: u64,
}

/// A block-addressable source of container bytes.
pub trait BlockSource {
    /// Read exactly `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), MediumError>;
}

/// Faults surfaced by the pull adapter.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PullError {
    /// The parser hit a structural fault.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The medium failed a read.
    #[error(transparent)]
    Medium(#[from] MediumError),
    /// A read would cross the known bound of the stored image.
    #[error("read of {len:#x} bytes at {offset:#x} crosses the image bound {end:#x}")]
    OutOfBounds {
        /// Cursor position of the attempted read.
        offset: u64,
        /// Bytes the parser asked for.
        len: u32,
        /// First offset past the stored image.
        end: u64,
    },
    /// The stored board configuration did not validate.
    #[error("stored configuration rejected: {0}")]
    BadStoredConfig(CodecError),
    /// The stored board configuration failed authentication.
    #[error("stored configuration failed authentication")]
    AuthenticationFailed,
    /// The walk finished with jobs still outstanding.
    #[error("jobs unsatisfied: {0:?}")]
    JobsUnsatisfied(JobSet),
    /// Neither stored copy yielded a configuration and a complete job set.
    #[error("no usable boot image in either copy")]
    NoUsableImage,
}

/// Report of a successful stored-system load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Resolved identity of the running board.
    pub board_id: BoardId,
    /// Payload length of the materialized configuration record.
    pub config_len: u32,
    /// Which stored copy satisfied the load (0 primary, 1 secondary).
    pub copy: usize,
}

/// Drive a session against a medium from `start`, bounded by `end`.
///
/// Pass a session started with unknown total size; the first record's
/// declared size bounds the walk.
pub fn run_pull<S: BlockSource>(
    session: &mut Session<'_, '_>,
    source: &mut S,
    start: u64,
    end: u64,
) -> Result<(), PullError> {
    let mut cursor = start;
    session.step()?;
    while !session.is_done() {
        let need = session.needed();
        if need > 0 {
            match session.target_mut() {
                Some(target) => {
                    if cursor + u64::from(need) > end {
                        return Err(PullError::OutOfBounds {
                            offset: cursor,
                            len: need,
                            end,
                        });
                    }
                    source.read(cursor, target)?;
                }
                // skipping: advance the cursor without reading
                None => {}
            }
            cursor = cursor.saturating_add(u64::from(need));
            session.commit(need);
        }
        session.step()?;
    }
    Ok(())
}

/// Load the stored boot system: the board configuration, then the
/// requested firmware jobs, trying the primary and secondary copy in turn.
///
/// Each copy holds a configuration record at its start and the firmware
/// section `layout.board_cfg_size` bytes in, `layout.nboot_size` bytes
/// total. A copy is usable when its configuration validates and the walk
/// clears every requested firmware job; otherwise the other copy is tried.
/// `secondary_first` supports running from the fallback copy.
#[allow(clippy::too_many_arguments)]
pub fn load_system<S: BlockSource>(
    source: &mut S,
    platform: &Platform,
    regions: &mut LoadRegions<'_>,
    hooks: &mut Collaborators<'_, '_>,
    jobs: JobSet,
    layout: &StoredLayout,
    copies: [u64; 2],
    secondary_first: bool,
) -> Result<LoadReport, PullError> {
    let order = if secondary_first { [1, 0] } else { [0, 1] };
    for index in order {
        let start = copies[index];
        match load_copy(source, platform, regions, hooks, jobs, layout, start) {
            Ok(mut report) => {
                report.copy = index;
                return Ok(report);
            }
            Err(err) => warn!("boot image copy {index} at {start:#x} unusable: {err}"),
        }
    }
    Err(PullError::NoUsableImage)
}

fn load_copy<S: BlockSource>(
    source: &mut S,
    platform: &Platform,
    regions: &mut LoadRegions<'_>,
    hooks: &mut Collaborators<'_, '_>,
    jobs: JobSet,
    layout: &StoredLayout,
    start: u64,
) -> Result<LoadReport, PullError> {
    // the stored configuration is loaded directly, not via the state
    // machine: its location and size are known
    let mut head = [0u8; HEADER_SIZE];
    source.read(start, &mut head)?;
    let hdr = ImageHeader::from(head);
    if !hdr.matches("BOARD-CFG", None) {
        return Err(PullError::BadStoredConfig(CodecError::BadMagic));
    }
    let total = hdr.total_size() as usize;
    let capacity = regions.config.len();
    if total > capacity {
        return Err(PullError::Session(SessionError::RegionOverflow {
            region: Region::Config,
            needed: total,
            capacity,
        }));
    }
    source.read(start, &mut regions.config[..total])?;
    verify_record(&regions.config[..total]).map_err(PullError::BadStoredConfig)?;
    if let Some(auth) = hooks.authenticator.as_deref_mut() {
        let mut stored = [0u8; HEADER_SIZE];
        stored.copy_from_slice(&regions.config[..HEADER_SIZE]);
        if !auth.authenticate(&stored, &regions.config[HEADER_SIZE..total]) {
            return Err(PullError::AuthenticationFailed);
        }
    }

    let mut id = BoardId::parse(hdr.descr().unwrap_or(""));
    if hdr.board_rev() != 0 {
        // newer layouts keep the revision out of the base name
        id.set_rev(hdr.board_rev());
    }
    info!("stored board configuration {id}");

    let config_len = hdr.payload_size();
    let fw_jobs = jobs & JobSet::FIRMWARE;
    if fw_jobs.is_empty() {
        return Ok(LoadReport {
            board_id: id,
            config_len,
            copy: 0,
        });
    }

    let mut session = Session::start(platform, regions.reborrow(), fw_jobs, 0, hooks.reborrow());
    session.set_wanted_id(id.clone());
    run_pull(
        &mut session,
        source,
        start + u64::from(layout.board_cfg_size),
        start + u64::from(layout.nboot_size),
    )?;
    let left = session.jobs_remaining();
    if !left.is_empty() {
        return Err(PullError::JobsUnsatisfied(left));
    }
    Ok(LoadReport {
        board_id: id,
        config_len,
        copy: 0,
    })
}
