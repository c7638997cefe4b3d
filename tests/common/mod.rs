// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-07-21
#![allow(dead_code)]

//! Shared fixtures: container builders, destination buffers, collaborator
//! stubs and a vector-backed block medium.

use nboot::{
    Authenticator, BlockSource, BoardId, ChecksumScope, Collaborators, DramGoal, DramInit,
    DramSelect, ImageBuilder, JobSet, LoadRegions, MediumError, Platform, PushAdapter, Session,
    SessionError, HEADER_SIZE,
};

pub const ARCH: &str = "fsimx8mm";
pub const DRAM_TYPE: &str = "lpddr4";
pub const DRAM_TIMING: &str = "samsung-4gib";

pub const CFG_PAYLOAD: &[u8] = b"board-cfg device tree blob";
pub const DECOY_CFG_PAYLOAD: &[u8] = b"an older candidate configuration";
pub const DRAM_FW_PAYLOAD: &[u8] = b"ddr training engine";
pub const DRAM_TIMING_PAYLOAD: &[u8] = b"timing parameter table";
pub const ATF_PAYLOAD: &[u8] = b"trusted firmware a";
pub const TEE_PAYLOAD: &[u8] = b"trusted execution env";

pub fn platform() -> Platform {
    Platform::new(ARCH, true)
}

pub fn goal() -> DramGoal {
    DramGoal {
        dram_type: DRAM_TYPE.into(),
        timing: DRAM_TIMING.into(),
    }
}

/// A board-info section holding one matching candidate followed by a
/// decoy that must never be reached once the first one loads.
pub fn board_info(cfg_id: &str) -> Vec<u8> {
    let good = ImageBuilder::new("BOARD-CFG")
        .descr(cfg_id)
        .checksum(ChecksumScope::Full)
        .payload(CFG_PAYLOAD)
        .build()
        .expect("build board-cfg");
    let decoy = ImageBuilder::new("BOARD-CFG")
        .descr(cfg_id)
        .checksum(ChecksumScope::Full)
        .payload(DECOY_CFG_PAYLOAD)
        .build()
        .expect("build decoy board-cfg");
    ImageBuilder::new("BOARD-INFO")
        .descr(ARCH)
        .checksum(ChecksumScope::HeaderOnly)
        .child(good)
        .child(decoy)
        .build()
        .expect("build board-info")
}

/// A firmware section: DRAM info with a wrong-type section to skip, the
/// wanted type with a wrong-timing candidate to skip, then ATF and TEE.
pub fn firmware_section() -> Vec<u8> {
    let wrong_type = {
        let fw = ImageBuilder::new("DRAM-FW")
            .descr("ddr3l")
            .checksum(ChecksumScope::Full)
            .payload(b"wrong engine")
            .build()
            .expect("build wrong dram-fw");
        ImageBuilder::new("DRAM-TYPE")
            .descr("ddr3l")
            .checksum(ChecksumScope::HeaderOnly)
            .child(fw)
            .build()
            .expect("build wrong dram-type")
    };
    let wanted_type = {
        let fw = ImageBuilder::new("DRAM-FW")
            .descr(DRAM_TYPE)
            .checksum(ChecksumScope::Full)
            .payload(DRAM_FW_PAYLOAD)
            .build()
            .expect("build dram-fw");
        let wrong_timing = ImageBuilder::new("DRAM-TIMING")
            .descr("micron-1gib")
            .checksum(ChecksumScope::Full)
            .payload(b"wrong timing")
            .build()
            .expect("build wrong dram-timing");
        let timing = ImageBuilder::new("DRAM-TIMING")
            .descr(DRAM_TIMING)
            .checksum(ChecksumScope::Full)
            .payload(DRAM_TIMING_PAYLOAD)
            .build()
            .expect("build dram-timing");
        ImageBuilder::new("DRAM-TYPE")
            .descr(DRAM_TYPE)
            .checksum(ChecksumScope::HeaderOnly)
            .child(fw)
            .child(wrong_timing)
            .child(timing)
            .build()
            .expect("build dram-type")
    };
    let dram_info = ImageBuilder::new("DRAM-INFO")
        .descr(ARCH)
        .checksum(ChecksumScope::HeaderOnly)
        .child(wrong_type)
        .child(wanted_type)
        .build()
        .expect("build dram-info");
    let atf = ImageBuilder::new("ATF")
        .descr(ARCH)
        .checksum(ChecksumScope::Full)
        .payload(ATF_PAYLOAD)
        .build()
        .expect("build atf");
    let tee = ImageBuilder::new("TEE")
        .descr(ARCH)
        .checksum(ChecksumScope::Full)
        .payload(TEE_PAYLOAD)
        .build()
        .expect("build tee");
    ImageBuilder::new("FIRMWARE")
        .descr(ARCH)
        .checksum(ChecksumScope::HeaderOnly)
        .child(dram_info)
        .child(atf)
        .child(tee)
        .build()
        .expect("build firmware")
}

/// A complete downloadable image: identity announcement wrapping an NBOOT
/// container with configurations, firmware and a trailing extras section.
pub fn full_image(board_id: &str, cfg_id: &str) -> Vec<u8> {
    let extras = ImageBuilder::new("EXTRAS")
        .payload(b"#!/bin/sh\nexit 0\n")
        .build()
        .expect("build extras");
    let nboot = ImageBuilder::new("NBOOT")
        .descr(ARCH)
        .checksum(ChecksumScope::HeaderOnly)
        .child(board_info(cfg_id))
        .child(firmware_section())
        .child(extras)
        .build()
        .expect("build nboot");
    ImageBuilder::new("BOARD-ID")
        .descr(board_id)
        .checksum(ChecksumScope::HeaderOnly)
        .child(nboot)
        .build()
        .expect("build board-id")
}

/// Destination buffers for one or more session attempts.
pub struct Buffers {
    pub config: Vec<u8>,
    pub dram_fw: Vec<u8>,
    pub dram_timing: Vec<u8>,
    pub atf: Vec<u8>,
    pub tee: Vec<u8>,
}

impl Buffers {
    pub fn new() -> Self {
        Self {
            config: vec![0u8; 4096],
            dram_fw: vec![0u8; 4096],
            dram_timing: vec![0u8; 4096],
            atf: vec![0u8; 4096],
            tee: vec![0u8; 4096],
        }
    }

    pub fn regions(&mut self) -> LoadRegions<'_> {
        LoadRegions {
            config: &mut self.config,
            dram_fw: &mut self.dram_fw,
            dram_timing: &mut self.dram_timing,
            atf: &mut self.atf,
            tee: &mut self.tee,
        }
    }

    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        vec![
            self.config.clone(),
            self.dram_fw.clone(),
            self.dram_timing.clone(),
            self.atf.clone(),
            self.tee.clone(),
        ]
    }
}

/// DRAM selector that answers with a fixed goal.
pub struct StaticSelect(pub Option<DramGoal>);

impl DramSelect for StaticSelect {
    fn select(&mut self, _board_cfg: &[u8]) -> Option<DramGoal> {
        self.0.clone()
    }
}

/// DRAM init hook that records every invocation.
pub struct RecordingInit {
    pub ok: bool,
    pub calls: Vec<Vec<u8>>,
}

impl RecordingInit {
    pub fn new(ok: bool) -> Self {
        Self {
            ok,
            calls: Vec::new(),
        }
    }
}

impl DramInit for RecordingInit {
    fn init_dram(&mut self, timing: &[u8]) -> bool {
        self.calls.push(timing.to_vec());
        self.ok
    }
}

/// Authentication engine with a fixed verdict.
pub struct FixedAuth(pub bool);

impl Authenticator for FixedAuth {
    fn authenticate(&mut self, _header: &[u8; HEADER_SIZE], _payload: &[u8]) -> bool {
        self.0
    }
}

/// Vector-backed block medium.
pub struct VecSource(pub Vec<u8>);

impl BlockSource for VecSource {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), MediumError> {
        let start = offset as usize;
        let end = start + buf.len();
        if end > self.0.len() {
            return Err(MediumError { offset });
        }
        buf.copy_from_slice(&self.0[start..end]);
        Ok(())
    }
}

/// Stream `image` through a push adapter in fixed-size chunks.
pub fn deliver_in_chunks(
    session: &mut Session<'_, '_>,
    image: &[u8],
    chunk: usize,
) -> Result<(), SessionError> {
    let mut adapter = PushAdapter::new(session);
    for part in image.chunks(chunk.max(1)) {
        adapter.deliver(part)?;
    }
    Ok(())
}

/// Run one full push session over `image` and return the outstanding jobs.
pub fn push_session(
    platform: &Platform,
    buffers: &mut Buffers,
    jobs: JobSet,
    image: &[u8],
    chunk: usize,
    init: &mut RecordingInit,
    select: &mut StaticSelect,
) -> JobSet {
    let hooks = Collaborators {
        dram_init: Some(init),
        dram_select: Some(select),
        authenticator: None,
    };
    let mut session = Session::start(
        platform,
        buffers.regions(),
        jobs,
        image.len() as u32,
        hooks,
    );
    deliver_in_chunks(&mut session, image, chunk).expect("clean stream");
    assert!(session.is_done(), "stream must walk the whole container");
    session.jobs_remaining()
}

/// Resolved identity announced by `full_image` containers.
pub fn wanted(board_id: &str) -> BoardId {
    BoardId::parse(board_id)
}
