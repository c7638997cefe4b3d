// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Describe per-platform identities, copy destinations and storage geometry.
// Author: Lukas Bower

//! Per-platform configuration, selected once at startup and passed into the
//! session. Board differences live in these structs, not in conditional
//! compilation.

use alloc::string::String;

/// Identity and behavior of the hardware the loader runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Architecture identity compared against top-level and firmware
    /// records (NBOOT, BOARD-INFO, FIRMWARE, ATF, TEE carry it).
    pub arch: String,
    /// Whether DRAM bring-up needs a discrete training-firmware image
    /// before the timing data. Platforms whose boot ROM ships the training
    /// engine go straight to the timing stage.
    pub split_dram_fw: bool,
}

impl Platform {
    /// Describe a platform.
    #[must_use]
    pub fn new(arch: impl Into<String>, split_dram_fw: bool) -> Self {
        Self {
            arch: arch.into(),
            split_dram_fw,
        }
    }
}

/// The fixed copy destinations a session can write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Board configuration; holds the full record, header included.
    Config,
    /// DRAM training firmware, placed right after the loader's own code.
    DramFw,
    /// DRAM timing data. May physically overlap a later destination; that
    /// is safe because the overlapping image is not loaded yet.
    DramTiming,
    /// Trusted firmware image.
    Atf,
    /// Trusted execution environment image.
    Tee,
}

/// Caller-owned destination memory for one parse session.
///
/// Every payload copy is bounds-checked against its region; corrupt sizes
/// abort the session instead of writing past an end.
pub struct LoadRegions<'a> {
    /// Destination for the materialized configuration record.
    pub config: &'a mut [u8],
    /// Destination for DRAM training firmware.
    pub dram_fw: &'a mut [u8],
    /// Destination for DRAM timing data.
    pub dram_timing: &'a mut [u8],
    /// Destination for the trusted firmware image.
    pub atf: &'a mut [u8],
    /// Destination for the TEE image.
    pub tee: &'a mut [u8],
}

impl LoadRegions<'_> {
    /// Reborrow the regions for a shorter-lived session attempt, so one set
    /// of buffers can back several attempts in turn.
    pub fn reborrow(&mut self) -> LoadRegions<'_> {
        LoadRegions {
            config: &mut *self.config,
            dram_fw: &mut *self.dram_fw,
            dram_timing: &mut *self.dram_timing,
            atf: &mut *self.atf,
            tee: &mut *self.tee,
        }
    }

    /// Shared view of one region.
    #[must_use]
    pub fn get(&self, region: Region) -> &[u8] {
        match region {
            Region::Config => &*self.config,
            Region::DramFw => &*self.dram_fw,
            Region::DramTiming => &*self.dram_timing,
            Region::Atf => &*self.atf,
            Region::Tee => &*self.tee,
        }
    }

    /// Mutable view of one region.
    pub fn get_mut(&mut self, region: Region) -> &mut [u8] {
        match region {
            Region::Config => &mut *self.config,
            Region::DramFw => &mut *self.dram_fw,
            Region::DramTiming => &mut *self.dram_timing,
            Region::Atf => &mut *self.atf,
            Region::Tee => &mut *self.tee,
        }
    }

    /// Capacity of one region in bytes.
    #[must_use]
    pub fn capacity(&self, region: Region) -> usize {
        self.get(region).len()
    }
}

/// Geometry of the boot container copies on a block medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredLayout {
    /// Bytes reserved for the stored board configuration at the start of
    /// each copy; the firmware section begins right after it.
    pub board_cfg_size: u32,
    /// Total bytes reserved per copy. Reads never cross this bound.
    pub nboot_size: u32,
}
