// CLASSIFICATION: COMMUNITY
// Filename: load_scenarios.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! End-to-end load scenarios: identity matching, the firmware job chain,
//! rejection paths, and the dual-copy stored-system loader.

mod common;

use common::*;
use nboot::{
    load_system, stamp_board_rev, verify_record, ChecksumScope, Collaborators, ImageBuilder,
    ImageHeader, JobSet, LoadReport, Platform, PullError, Session, StoredLayout, HEADER_SIZE,
};

#[test]
fn older_config_revision_matches_and_is_stamped() {
    let image = full_image("X.150", "X.100");
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(Some(goal()));
    let left = push_session(
        &platform,
        &mut buffers,
        JobSet::empty(),
        &image,
        512,
        &mut init,
        &mut select,
    );
    assert!(!left.contains(JobSet::CONFIG), "config job must clear");

    // the materialized record carries the wanted revision and a fresh CRC
    let cfg = ImageHeader::parse(&buffers.config).expect("materialized header");
    assert!(cfg.matches("BOARD-CFG", None));
    assert_eq!(cfg.board_rev(), 150);
    let total = cfg.total_size() as usize;
    assert_eq!(verify_record(&buffers.config[..total]), Ok(ChecksumScope::Full));
    assert_eq!(
        &buffers.config[HEADER_SIZE..HEADER_SIZE + CFG_PAYLOAD.len()],
        CFG_PAYLOAD
    );
}

#[test]
fn wrong_board_name_leaves_config_job_unsatisfied() {
    let image = full_image("Y.100", "X.100");
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(Some(goal()));
    let left = push_session(
        &platform,
        &mut buffers,
        JobSet::empty(),
        &image,
        512,
        &mut init,
        &mut select,
    );
    assert!(left.contains(JobSet::CONFIG));
    assert_eq!(buffers.config, Buffers::new().config, "nothing materialized");
}

#[test]
fn firmware_chain_loads_dram_then_atf_then_tee() {
    let image = full_image("fsimx8mm.150", "fsimx8mm.100");
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(Some(goal()));
    let left = push_session(
        &platform,
        &mut buffers,
        JobSet::FIRMWARE,
        &image,
        512,
        &mut init,
        &mut select,
    );
    assert!(left.is_empty());
    assert_eq!(&buffers.dram_fw[..DRAM_FW_PAYLOAD.len()], DRAM_FW_PAYLOAD);
    assert_eq!(
        &buffers.dram_timing[..DRAM_TIMING_PAYLOAD.len()],
        DRAM_TIMING_PAYLOAD
    );
    assert_eq!(&buffers.atf[..ATF_PAYLOAD.len()], ATF_PAYLOAD);
    assert_eq!(&buffers.tee[..TEE_PAYLOAD.len()], TEE_PAYLOAD);

    // the init hook saw exactly the loaded timing payload (incl. padding)
    assert_eq!(init.calls.len(), 1);
    assert_eq!(
        &init.calls[0][..DRAM_TIMING_PAYLOAD.len()],
        DRAM_TIMING_PAYLOAD
    );
}

#[test]
fn dram_init_failure_keeps_the_job_pending() {
    let image = full_image("fsimx8mm.150", "fsimx8mm.100");
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(false);
    let mut select = StaticSelect(Some(goal()));
    let left = push_session(
        &platform,
        &mut buffers,
        JobSet::FIRMWARE,
        &image,
        512,
        &mut init,
        &mut select,
    );
    // DRAM stays pending, and because it outranks the other firmware jobs
    // the rest of this round is spent looking for another DRAM section
    assert!(left.contains(JobSet::DRAM));
    assert_eq!(init.calls.len(), 1);
}

#[test]
fn no_split_firmware_stage_goes_straight_to_timing() {
    let image = full_image("fsimx8mm.150", "fsimx8mm.100");
    // this platform's boot ROM brings its own training engine
    let platform = Platform::new(ARCH, false);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(Some(goal()));
    let left = push_session(
        &platform,
        &mut buffers,
        JobSet::DRAM,
        &image,
        512,
        &mut init,
        &mut select,
    );
    assert!(left.is_empty());
    assert_eq!(buffers.dram_fw, Buffers::new().dram_fw, "no firmware stage");
    assert_eq!(init.calls.len(), 1);
}

#[test]
fn rejected_authentication_keeps_jobs_pending() {
    let image = full_image("fsimx8mm.150", "fsimx8mm.100");
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(Some(goal()));
    let mut auth = FixedAuth(false);
    let hooks = Collaborators {
        dram_init: Some(&mut init),
        dram_select: Some(&mut select),
        authenticator: Some(&mut auth),
    };
    let mut session = Session::start(
        &platform,
        buffers.regions(),
        JobSet::FIRMWARE,
        image.len() as u32,
        hooks,
    );
    deliver_in_chunks(&mut session, &image, 512).expect("clean stream");
    assert!(session.is_done());
    // nothing authenticates, so nothing completes: the firmware jobs stay
    // pending and so does the config job the BOARD-ID record announced
    assert_eq!(session.jobs_remaining(), JobSet::all());
    assert_eq!(init.calls.len(), 0);
}

#[test]
fn unchecksummed_payload_is_trusted_without_an_authenticator() {
    let atf = ImageBuilder::new("ATF")
        .descr(ARCH)
        .payload(ATF_PAYLOAD)
        .build()
        .expect("build atf");
    let image = ImageBuilder::new("FIRMWARE")
        .descr(ARCH)
        .child(atf)
        .build()
        .expect("build firmware");
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(None);
    let left = push_session(
        &platform,
        &mut buffers,
        JobSet::ATF,
        &image,
        512,
        &mut init,
        &mut select,
    );
    assert!(left.is_empty());
    assert_eq!(&buffers.atf[..ATF_PAYLOAD.len()], ATF_PAYLOAD);
}

/// One stored copy: a stamped BOARD-CFG record, padding up to the firmware
/// offset, then the firmware section.
fn stored_copy(cfg_id: &str, rev: u32, layout: &StoredLayout) -> Vec<u8> {
    let mut cfg = ImageBuilder::new("BOARD-CFG")
        .descr(cfg_id)
        .checksum(ChecksumScope::Full)
        .payload(CFG_PAYLOAD)
        .build()
        .expect("build stored board-cfg");
    stamp_board_rev(&mut cfg, rev).expect("stamp stored config");
    let mut copy = cfg;
    copy.resize(layout.board_cfg_size as usize, 0);
    copy.extend_from_slice(&firmware_section());
    copy.resize(layout.nboot_size as usize, 0);
    copy
}

fn stored_medium(layout: &StoredLayout, corrupt_primary: bool) -> (VecSource, [u64; 2]) {
    let copy = stored_copy("fsimx8mm.100", 130, layout);
    let mut medium = Vec::new();
    medium.extend_from_slice(&copy);
    medium.extend_from_slice(&copy);
    if corrupt_primary {
        // break the stored configuration checksum of the first copy
        medium[HEADER_SIZE + 3] ^= 0xff;
    }
    let offsets = [0u64, layout.nboot_size as u64];
    (VecSource(medium), offsets)
}

#[test]
fn load_system_loads_config_and_firmware_from_primary() {
    let layout = StoredLayout {
        board_cfg_size: 0x400,
        nboot_size: 0x1000,
    };
    let (mut source, offsets) = stored_medium(&layout, false);
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(Some(goal()));
    let mut hooks = Collaborators {
        dram_init: Some(&mut init),
        dram_select: Some(&mut select),
        authenticator: None,
    };
    let report: LoadReport = load_system(
        &mut source,
        &platform,
        &mut buffers.regions(),
        &mut hooks,
        JobSet::FIRMWARE,
        &layout,
        offsets,
        false,
    )
    .expect("stored load");
    assert_eq!(report.copy, 0);
    // the stamped revision overrides the one in the identity string
    assert_eq!(report.board_id.to_string(), "fsimx8mm.130");
    assert_eq!(&buffers.atf[..ATF_PAYLOAD.len()], ATF_PAYLOAD);
    assert_eq!(init.calls.len(), 1);
}

#[test]
fn load_system_falls_back_to_the_secondary_copy() {
    let layout = StoredLayout {
        board_cfg_size: 0x400,
        nboot_size: 0x1000,
    };
    let (mut source, offsets) = stored_medium(&layout, true);
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut init = RecordingInit::new(true);
    let mut select = StaticSelect(Some(goal()));
    let mut hooks = Collaborators {
        dram_init: Some(&mut init),
        dram_select: Some(&mut select),
        authenticator: None,
    };
    let report = load_system(
        &mut source,
        &platform,
        &mut buffers.regions(),
        &mut hooks,
        JobSet::FIRMWARE,
        &layout,
        offsets,
        false,
    )
    .expect("fallback load");
    assert_eq!(report.copy, 1);
    assert_eq!(&buffers.tee[..TEE_PAYLOAD.len()], TEE_PAYLOAD);
}

#[test]
fn load_system_with_both_copies_bad_reports_no_image() {
    let layout = StoredLayout {
        board_cfg_size: 0x400,
        nboot_size: 0x1000,
    };
    let (mut source, offsets) = stored_medium(&layout, false);
    // wipe both stored configurations
    source.0[0] = 0;
    source.0[layout.nboot_size as usize] = 0;
    let platform = Platform::new(ARCH, true);
    let mut buffers = Buffers::new();
    let mut hooks = Collaborators::default();
    let result = load_system(
        &mut source,
        &platform,
        &mut buffers.regions(),
        &mut hooks,
        JobSet::empty(),
        &layout,
        offsets,
        false,
    );
    assert!(matches!(result, Err(PullError::NoUsableImage)));
}
