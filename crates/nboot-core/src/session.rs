// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Walk an NBoot container and dispatch per-record load decisions.
// Author: Lukas Bower

//! The container-walking state machine.
//!
//! The session is driven through a byte-need interface: it announces how
//! many bytes it needs next ([`Session::needed`]) and where they belong
//! ([`Session::target_mut`]); the transport copies them in and calls
//! [`Session::commit`] and [`Session::step`]. A single `step` can run
//! several transitions back to back because transitions may schedule
//! zero-length skips.

use log::{debug, info, warn};

use nboot_codec::{stamp_board_rev, BoardId, ChecksumScope, ImageHeader, HEADER_SIZE};

use crate::frame::FrameStack;
use crate::{Collaborators, DramGoal, JobSet, LoadRegions, Platform, Region, SessionError};

/// Which part of the container the session is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Scanning for any recognized top-level record.
    Any,
    /// Inside a board-info section, scanning configuration candidates.
    BoardConfig,
    /// Inside a firmware section, looking for the DRAM info section.
    Dram,
    /// Inside DRAM info, looking for the section of the wanted chip type.
    DramType,
    /// Inside a DRAM type section, expecting training firmware.
    DramFirmware,
    /// Inside a DRAM type section, expecting timing data.
    DramTiming,
    /// Expecting the trusted firmware image.
    Atf,
    /// Expecting the TEE image.
    Tee,
}

/// How the bytes currently being consumed are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Collecting a record header.
    ReadingHeader,
    /// Copying a payload to its destination.
    ReadingImage,
    /// Discarding bytes.
    Skipping,
    /// The container is exhausted; all further input is dropped.
    Done,
}

/// Where committed bytes are written.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// Nowhere: the bytes are being skipped.
    None,
    /// Into the session's header buffer.
    Header { at: usize },
    /// Into a destination region.
    Region { region: Region, at: usize },
}

/// One container-parse session. Owns every piece of mutable parse state;
/// dropping it and starting a new one is a full reset.
pub struct Session<'a, 'd: 'a> {
    platform: &'a Platform,
    regions: LoadRegions<'a>,
    hooks: Collaborators<'a, 'd>,
    frames: FrameStack,
    jobs: JobSet,
    state: ParserState,
    mode: LoadMode,
    need: u32,
    target: Target,
    image_len: u32,
    header: [u8; HEADER_SIZE],
    wanted: Option<BoardId>,
    goal: Option<DramGoal>,
    config_len: Option<u32>,
}

impl<'a, 'd: 'a> Session<'a, 'd> {
    /// Start a session over a container of `total_size` bytes, pursuing
    /// `jobs`. Pass `total_size = 0` when the size is unknown (pull
    /// sources); the outermost frame is then back-filled from the first
    /// record's declared size.
    ///
    /// The first [`Session::step`] schedules the initial header read.
    #[must_use]
    pub fn start(
        platform: &'a Platform,
        regions: LoadRegions<'a>,
        jobs: JobSet,
        total_size: u32,
        hooks: Collaborators<'a, 'd>,
    ) -> Self {
        let root = if total_size == 0 {
            HEADER_SIZE as u32
        } else {
            total_size
        };
        let mut frames = FrameStack::new();
        frames.push_root(root);
        Self {
            platform,
            regions,
            hooks,
            frames,
            jobs,
            state: ParserState::Any,
            // a zero-length skip; the first step lands in the header scheduler
            mode: LoadMode::Skipping,
            need: 0,
            target: Target::None,
            image_len: 0,
            header: [0u8; HEADER_SIZE],
            wanted: None,
            goal: None,
            config_len: None,
        }
    }

    /// Bytes the session needs before the next transition.
    #[must_use]
    pub fn needed(&self) -> u32 {
        self.need
    }

    /// Current load mode.
    #[must_use]
    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Current parser state.
    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Whether the walk is complete (or aborted).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.mode == LoadMode::Done
    }

    /// Jobs still outstanding.
    #[must_use]
    pub fn jobs_remaining(&self) -> JobSet {
        self.jobs
    }

    /// Payload length of the materialized configuration, once loaded.
    #[must_use]
    pub fn config_len(&self) -> Option<u32> {
        self.config_len
    }

    /// Identity of the board being matched against, if known yet.
    #[must_use]
    pub fn wanted_id(&self) -> Option<&BoardId> {
        self.wanted.as_ref()
    }

    /// Preset the identity to match configuration records against. The
    /// pull path derives it from an already-stored configuration; a
    /// streamed container announces it in its BOARD-ID record instead.
    pub fn set_wanted_id(&mut self, id: BoardId) {
        self.wanted = Some(id);
    }

    /// Destination window for the currently needed bytes. `None` while
    /// skipping (the bytes are discarded) or when nothing is needed.
    pub fn target_mut(&mut self) -> Option<&mut [u8]> {
        if self.need == 0 {
            return None;
        }
        let need = self.need as usize;
        match self.target {
            Target::None => None,
            Target::Header { at } => Some(&mut self.header[at..at + need]),
            Target::Region { region, at } => {
                Some(&mut self.regions.get_mut(region)[at..at + need])
            }
        }
    }

    /// Record that `n` bytes (at most [`Session::needed`]) have been
    /// written to the target window, or discarded while skipping.
    pub fn commit(&mut self, n: u32) {
        debug_assert!(n <= self.need, "committed more bytes than requested");
        let n = n.min(self.need);
        self.need -= n;
        match &mut self.target {
            Target::Header { at } | Target::Region { at, .. } => *at += n as usize,
            Target::None => {}
        }
    }

    /// Run transition phases until more bytes are needed or the walk is
    /// done. Transitions can cascade: a record match may schedule a
    /// zero-length skip that immediately pops a frame, and so on.
    ///
    /// A structural fault (corrupt size, nesting overflow, destination
    /// overflow) aborts the session; it reports `Done` afterwards and the
    /// caller is expected to retry from another source.
    pub fn step(&mut self) -> Result<(), SessionError> {
        while self.need == 0 && self.mode != LoadMode::Done {
            let result = match self.mode {
                LoadMode::ReadingHeader => self.on_header(),
                LoadMode::ReadingImage => self.on_image(),
                LoadMode::Skipping => self.on_skip(),
                LoadMode::Done => Ok(()),
            };
            if let Err(err) = result {
                warn!("aborting container walk: {err}");
                self.mode = LoadMode::Done;
                self.need = 0;
                self.target = Target::None;
                return Err(err);
            }
        }
        Ok(())
    }

    /// A record header is fully buffered: decide what its payload is for.
    fn on_header(&mut self) -> Result<(), SessionError> {
        let hdr = ImageHeader::from(self.header);
        if !hdr.is_container() {
            // no record here: treat the rest of this level as filler
            debug!(
                "depth {}: no container magic, skipping filler",
                self.frames.depth()
            );
            return self.skip_rest();
        }

        let size = hdr.payload_size();
        if self.frames.at_root() && self.frames.remaining() == 0 {
            // pull sources start with an unknown total
            self.frames.backfill_root(size);
        }
        debug!(
            "depth {}: {} size {:#x} remaining {:#x} state {:?}",
            self.frames.depth(),
            hdr.type_tag(),
            size,
            self.frames.remaining(),
            self.state
        );

        let arch = self.platform.arch.as_str();
        match self.state {
            ParserState::Any => {
                if hdr.matches("BOARD-ID", None) {
                    let id = BoardId::parse(hdr.descr().unwrap_or(""));
                    info!("container announces board id {id}");
                    self.wanted = Some(id);
                    self.jobs.insert(JobSet::CONFIG);
                    self.enter_child(size, ParserState::Any)
                } else if hdr.matches("NBOOT", Some(arch)) {
                    self.enter_child(size, ParserState::Any)
                } else if hdr.matches("BOARD-INFO", Some(arch)) {
                    self.enter_child(size, ParserState::BoardConfig)
                } else if hdr.matches("FIRMWARE", Some(arch))
                    && !self.jobs.contains(JobSet::CONFIG)
                {
                    // firmware is only usable once the configuration is in
                    // place; with CONFIG still pending it is skipped
                    match self.next_firmware_state() {
                        Some(next) => self.enter_child(size, next),
                        None => self.skip(size),
                    }
                } else {
                    self.skip(size)
                }
            }
            ParserState::BoardConfig => {
                if self.matches_board_id(&hdr) {
                    // materialize the whole record: header first, payload
                    // streamed in right after it
                    let total = HEADER_SIZE + size as usize;
                    let capacity = self.regions.config.len();
                    if total > capacity {
                        return Err(SessionError::RegionOverflow {
                            region: Region::Config,
                            needed: total,
                            capacity,
                        });
                    }
                    self.regions.config[..HEADER_SIZE].copy_from_slice(&self.header);
                    self.copy(Region::Config, HEADER_SIZE, size)
                } else {
                    self.skip(size)
                }
            }
            ParserState::Dram => {
                if hdr.matches("DRAM-INFO", Some(arch)) {
                    self.goal = match self.hooks.dram_select.as_deref_mut() {
                        Some(select) => select.select(&*self.regions.config),
                        None => None,
                    };
                    match &self.goal {
                        Some(goal) => debug!(
                            "looking for DRAM type {} timing {}",
                            goal.dram_type, goal.timing
                        ),
                        None => debug!("no DRAM selection available, matching any type"),
                    }
                    self.enter_child(size, ParserState::DramType)
                } else {
                    self.skip(size)
                }
            }
            ParserState::DramType => {
                if hdr.matches("DRAM-TYPE", self.goal_type()) {
                    let next = if self.platform.split_dram_fw {
                        ParserState::DramFirmware
                    } else {
                        ParserState::DramTiming
                    };
                    self.enter_child(size, next)
                } else {
                    self.skip(size)
                }
            }
            ParserState::DramFirmware => {
                let matched = hdr.matches("DRAM-FW", self.goal_type());
                self.copy_or_skip(matched, Region::DramFw, size)
            }
            ParserState::DramTiming => {
                let matched = hdr.matches("DRAM-TIMING", self.goal_timing());
                self.copy_or_skip(matched, Region::DramTiming, size)
            }
            ParserState::Atf => {
                let matched = hdr.matches("ATF", Some(arch));
                self.copy_or_skip(matched, Region::Atf, size)
            }
            ParserState::Tee => {
                let matched = hdr.matches("TEE", Some(arch));
                self.copy_or_skip(matched, Region::Tee, size)
            }
        }
    }

    /// A payload copy is complete: act on it.
    fn on_image(&mut self) -> Result<(), SessionError> {
        let len = self.image_len;
        match self.state {
            ParserState::BoardConfig => {
                if self.verify_loaded(Region::Config, len) {
                    let rev = self.wanted.as_ref().map(BoardId::rev).unwrap_or(0);
                    let total = HEADER_SIZE + len as usize;
                    stamp_board_rev(&mut self.regions.config[..total], rev)
                        .unwrap_or_else(|err| warn!("could not stamp configuration: {err}"));
                    self.config_len = Some(len);
                    self.jobs.remove(JobSet::CONFIG);
                    if let Some(id) = &self.wanted {
                        info!("board configuration {id} loaded");
                    }
                    // one configuration is enough; drop the other candidates
                    self.skip_rest()
                } else {
                    self.next_header(ParserState::BoardConfig)
                }
            }
            ParserState::DramFirmware => {
                if self.verify_loaded(Region::DramFw, len) {
                    debug!("DRAM training firmware loaded");
                    self.next_header(ParserState::DramTiming)
                } else {
                    self.next_header(ParserState::DramFirmware)
                }
            }
            ParserState::DramTiming => {
                if self.verify_loaded(Region::DramTiming, len) {
                    let timing = &self.regions.dram_timing[..len as usize];
                    let ok = match self.hooks.dram_init.as_deref_mut() {
                        Some(init) => init.init_dram(timing),
                        None => {
                            warn!("no DRAM init hook supplied");
                            false
                        }
                    };
                    if ok {
                        self.jobs.remove(JobSet::DRAM);
                        info!("DRAM initialized");
                    } else {
                        // leave the job pending; the caller's retry loop
                        // decides whether another round gets a chance
                        warn!("DRAM initialization failed");
                    }
                    self.skip_rest()
                } else {
                    self.next_header(ParserState::DramTiming)
                }
            }
            ParserState::Atf => self.image_done(Region::Atf, JobSet::ATF, len),
            ParserState::Tee => self.image_done(Region::Tee, JobSet::TEE, len),
            // these states never schedule a payload copy
            ParserState::Any | ParserState::Dram | ParserState::DramType => self.skip_rest(),
        }
    }

    /// A skip is complete: continue with siblings or pop out of the frame.
    fn on_skip(&mut self) -> Result<(), SessionError> {
        if self.frames.remaining() > 0 {
            return self.next_header(self.state);
        }
        if self.frames.at_root() {
            debug!("container walk complete, jobs left {:?}", self.jobs);
            self.mode = LoadMode::Done;
            self.target = Target::None;
            return Ok(());
        }
        self.frames.exit();
        match self.state {
            ParserState::Any => self.next_header(ParserState::Any),
            ParserState::BoardConfig => self.next_header(ParserState::Any),
            ParserState::DramType => self.next_firmware(),
            ParserState::DramFirmware | ParserState::DramTiming => {
                self.state = ParserState::DramType;
                self.skip_rest()
            }
            ParserState::Dram | ParserState::Atf | ParserState::Tee => {
                self.next_header(ParserState::Any)
            }
        }
    }

    /// Schedule the next header read at the current level.
    fn next_header(&mut self, state: ParserState) -> Result<(), SessionError> {
        self.state = state;
        let remaining = self.frames.remaining();
        if (HEADER_SIZE as u32) > remaining {
            // no room for another record: the tail is padding
            return self.skip(remaining);
        }
        self.frames.consume(HEADER_SIZE as u32)?;
        self.need = HEADER_SIZE as u32;
        self.mode = LoadMode::ReadingHeader;
        self.target = Target::Header { at: 0 };
        Ok(())
    }

    /// Enter a child container and read its first header.
    fn enter_child(&mut self, size: u32, state: ParserState) -> Result<(), SessionError> {
        self.frames.enter(size)?;
        self.next_header(state)
    }

    /// Schedule a payload copy into `region` at `offset`.
    fn copy(&mut self, region: Region, offset: usize, size: u32) -> Result<(), SessionError> {
        self.frames.consume(size)?;
        let capacity = self.regions.capacity(region);
        let needed = offset + size as usize;
        if needed > capacity {
            return Err(SessionError::RegionOverflow {
                region,
                needed,
                capacity,
            });
        }
        self.need = size;
        self.image_len = size;
        self.mode = LoadMode::ReadingImage;
        self.target = Target::Region { region, at: offset };
        Ok(())
    }

    fn copy_or_skip(
        &mut self,
        matched: bool,
        region: Region,
        size: u32,
    ) -> Result<(), SessionError> {
        if matched {
            self.copy(region, 0, size)
        } else {
            self.skip(size)
        }
    }

    /// Schedule `size` bytes to be discarded.
    fn skip(&mut self, size: u32) -> Result<(), SessionError> {
        debug!(
            "depth {}: skip {:#x} state {:?}",
            self.frames.depth(),
            size,
            self.state
        );
        self.frames.consume(size)?;
        self.need = size;
        self.mode = LoadMode::Skipping;
        self.target = Target::None;
        Ok(())
    }

    /// Discard whatever is left at the current level.
    fn skip_rest(&mut self) -> Result<(), SessionError> {
        let rest = self.frames.remaining();
        self.skip(rest)
    }

    /// Move to the next outstanding firmware job, or drain the level.
    fn next_firmware(&mut self) -> Result<(), SessionError> {
        match self.next_firmware_state() {
            Some(state) => self.next_header(state),
            None => {
                self.state = ParserState::Any;
                self.skip_rest()
            }
        }
    }

    fn next_firmware_state(&self) -> Option<ParserState> {
        if self.jobs.contains(JobSet::DRAM) {
            Some(ParserState::Dram)
        } else if self.jobs.contains(JobSet::ATF) {
            Some(ParserState::Atf)
        } else if self.jobs.contains(JobSet::TEE) {
            Some(ParserState::Tee)
        } else {
            None
        }
    }

    /// ATF/TEE payload finished: verify, clear the job, move on.
    fn image_done(&mut self, region: Region, job: JobSet, len: u32) -> Result<(), SessionError> {
        if self.verify_loaded(region, len) {
            self.jobs.remove(job);
            debug!("{region:?} image loaded");
            self.next_firmware()
        } else {
            self.next_header(self.state)
        }
    }

    /// Decide whether a freshly loaded payload can be trusted. A rejected
    /// candidate keeps its job bit set; the walk goes on and may find
    /// another usable copy.
    fn verify_loaded(&mut self, region: Region, len: u32) -> bool {
        let hdr = ImageHeader::from(self.header);
        let offset = if region == Region::Config {
            HEADER_SIZE
        } else {
            0
        };
        let payload = &self.regions.get(region)[offset..offset + len as usize];
        match hdr.verify_checksum(payload) {
            Ok(ChecksumScope::None) => {
                if self.hooks.authenticator.is_none() {
                    debug!("{} carries no checksum, trusting as-is", hdr.type_tag());
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!("rejecting {} candidate: {err}", hdr.type_tag());
                return false;
            }
        }
        if let Some(auth) = self.hooks.authenticator.as_deref_mut() {
            if !auth.authenticate(&self.header, payload) {
                warn!("authentication failed for {}", hdr.type_tag());
                return false;
            }
        }
        true
    }

    /// Whether a configuration record's identity fits the wanted board.
    fn matches_board_id(&self, hdr: &ImageHeader) -> bool {
        if !hdr.matches("BOARD-CFG", None) {
            return false;
        }
        let Some(descr) = hdr.descr() else {
            return false;
        };
        let Some(wanted) = &self.wanted else {
            return false;
        };
        BoardId::matches(&BoardId::parse(descr), wanted)
    }

    fn goal_type(&self) -> Option<&str> {
        self.goal.as_ref().map(|goal| goal.dram_type.as_str())
    }

    fn goal_timing(&self) -> Option<&str> {
        self.goal.as_ref().map(|goal| goal.timing.as_str())
    }
}
