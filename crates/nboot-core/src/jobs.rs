// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Represent outstanding boot initialization jobs as a bitset.
// Author: Lukas Bower

//! The set of initialization tasks a parse session is asked to perform.

use bitflags::bitflags;

bitflags! {
    /// Outstanding initialization jobs. A bit is cleared exactly once, in
    /// the same transition that completes the corresponding work; whatever
    /// is still set when the container is exhausted was not satisfied.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct JobSet: u32 {
        /// Load the board configuration matching the running hardware.
        const CONFIG = 1 << 0;
        /// Load DRAM training data and bring up the controller.
        const DRAM = 1 << 1;
        /// Load the trusted firmware image.
        const ATF = 1 << 2;
        /// Load the trusted execution environment image.
        const TEE = 1 << 3;
    }
}

impl JobSet {
    /// The jobs served by a FIRMWARE section.
    pub const FIRMWARE: JobSet = JobSet::DRAM.union(JobSet::ATF).union(JobSet::TEE);
}
