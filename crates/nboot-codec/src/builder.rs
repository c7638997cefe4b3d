// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Compose NBoot records and nested containers with checksums.
// Author: Lukas Bower

//! The encode side of the codec: assemble records and nested containers.

use alloc::string::String;
use alloc::vec::Vec;

use crate::header::{
    ChecksumScope, CodecError, HeaderFlags, CRC_SLOT, DESCR_LEN, HEADER_SIZE, HEADER_VERSION,
    MAGIC, OFF_DESCR, OFF_FLAGS, OFF_PADSIZE, OFF_SIZE_LOW, OFF_TYPE, OFF_VERSION, PAYLOAD_ALIGN,
    TYPE_LEN,
};
use crc32fast::Hasher;

/// Builds one record: header, flags, checksum and padded payload.
///
/// Nested containers are built bottom-up by adding finished child records
/// as payload of the enclosing record.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    type_tag: String,
    descr: Option<String>,
    scope: ChecksumScope,
    payload: Vec<u8>,
}

impl ImageBuilder {
    /// Start a record of the given type.
    #[must_use]
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            descr: None,
            scope: ChecksumScope::None,
            payload: Vec::new(),
        }
    }

    /// Attach an identity string (sets the description flag).
    #[must_use]
    pub fn descr(mut self, descr: impl Into<String>) -> Self {
        self.descr = Some(descr.into());
        self
    }

    /// Select which ranges the checksum covers.
    #[must_use]
    pub fn checksum(mut self, scope: ChecksumScope) -> Self {
        self.scope = scope;
        self
    }

    /// Append raw payload bytes.
    #[must_use]
    pub fn payload(mut self, bytes: &[u8]) -> Self {
        self.payload.extend_from_slice(bytes);
        self
    }

    /// Append a finished child record to the payload.
    #[must_use]
    pub fn child(mut self, record: Vec<u8>) -> Self {
        self.payload.extend_from_slice(&record);
        self
    }

    /// Assemble the record: header plus payload padded to the alignment.
    pub fn build(self) -> Result<Vec<u8>, CodecError> {
        let tag = self.type_tag.as_bytes();
        let tag_max = if self.scope == ChecksumScope::None {
            TYPE_LEN
        } else {
            // The CRC slot overlays the tag tail, and matching stops at a
            // NUL, so one terminator byte must separate tag and slot.
            CRC_SLOT - OFF_TYPE - 1
        };
        if tag.len() > tag_max {
            return Err(CodecError::TypeTooLong {
                len: tag.len(),
                max: tag_max,
            });
        }
        if let Some(descr) = &self.descr {
            if descr.len() > DESCR_LEN {
                return Err(CodecError::DescrTooLong {
                    len: descr.len(),
                    max: DESCR_LEN,
                });
            }
        }

        let mut payload = self.payload;
        let pad = (PAYLOAD_ALIGN - payload.len() % PAYLOAD_ALIGN) % PAYLOAD_ALIGN;
        payload.resize(payload.len() + pad, 0);
        let size: u32 = payload
            .len()
            .try_into()
            .map_err(|_| CodecError::PayloadTooLarge)?;

        let mut flags = HeaderFlags::empty();
        if self.descr.is_some() {
            flags |= HeaderFlags::DESCR;
        }
        if matches!(self.scope, ChecksumScope::HeaderOnly | ChecksumScope::Full) {
            flags |= HeaderFlags::HEADER_CRC;
        }
        if matches!(self.scope, ChecksumScope::PayloadOnly | ChecksumScope::Full) {
            flags |= HeaderFlags::PAYLOAD_CRC;
        }

        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&MAGIC);
        header[OFF_SIZE_LOW..OFF_SIZE_LOW + 4].copy_from_slice(&size.to_le_bytes());
        header[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&flags.bits().to_le_bytes());
        header[OFF_PADSIZE] = pad as u8;
        header[OFF_VERSION] = HEADER_VERSION;
        header[OFF_TYPE..OFF_TYPE + tag.len()].copy_from_slice(tag);
        if let Some(descr) = &self.descr {
            header[OFF_DESCR..OFF_DESCR + descr.len()].copy_from_slice(descr.as_bytes());
        }

        if self.scope != ChecksumScope::None {
            let mut hasher = Hasher::new();
            if flags.contains(HeaderFlags::HEADER_CRC) {
                hasher.update(&header[..CRC_SLOT]);
                hasher.update(&[0u8; 4]);
                hasher.update(&header[CRC_SLOT + 4..]);
            }
            if flags.contains(HeaderFlags::PAYLOAD_CRC) {
                hasher.update(&payload);
            }
            let crc = hasher.finalize();
            header[CRC_SLOT..CRC_SLOT + 4].copy_from_slice(&crc.to_le_bytes());
        }

        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&payload);
        Ok(out)
    }
}
