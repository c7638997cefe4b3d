// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Decode, match and checksum fixed-size NBoot record headers.
// Author: Lukas Bower

//! The fixed 64-byte record header and its checksum rules.

use core::fmt;
use core::str;

use bitflags::bitflags;
use crc32fast::Hasher;

/// Size of a record header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Magic tag identifying a container record.
pub const MAGIC: [u8; 4] = *b"FSLX";

/// Maximum length of the type tag field.
pub const TYPE_LEN: usize = 16;

/// Maximum length of the description/identity field.
pub const DESCR_LEN: usize = 32;

/// Payloads are padded to this alignment.
pub const PAYLOAD_ALIGN: usize = 16;

/// Byte offset of the CRC32 slot inside the header.
///
/// The slot overlays the last four bytes of the type tag field, so on a
/// checksummed record the tag and its terminating NUL must end before the
/// slot (11 usable tag bytes). This aliasing is part of the wire format;
/// the slot is exposed only through [`ImageHeader`] accessors, never as a
/// separate field.
pub(crate) const CRC_SLOT: usize = 28;

pub(crate) const OFF_SIZE_LOW: usize = 4;
pub(crate) const OFF_SIZE_HIGH: usize = 8;
pub(crate) const OFF_FLAGS: usize = 12;
pub(crate) const OFF_PADSIZE: usize = 14;
pub(crate) const OFF_VERSION: usize = 15;
pub(crate) const OFF_TYPE: usize = 16;
pub(crate) const OFF_DESCR: usize = 32;

/// Header format version written by the builder (major 1, minor 0).
pub(crate) const HEADER_VERSION: u8 = 0x10;

bitflags! {
    /// Flag bits carried in the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u16 {
        /// The description field holds an identity string.
        const DESCR = 0x8000;
        /// The CRC32 covers the payload.
        const PAYLOAD_CRC = 0x4000;
        /// The CRC32 covers the header.
        const HEADER_CRC = 0x2000;
    }
}

/// Which byte ranges a record checksum covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumScope {
    /// No checksum present.
    None,
    /// Header bytes only.
    HeaderOnly,
    /// Payload bytes only.
    PayloadOnly,
    /// Header and payload.
    Full,
}

/// Errors produced while decoding or checking records.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input was shorter than the record requires.
    #[error("truncated record: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes the record requires.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },
    /// The magic tag does not identify a container record.
    #[error("bad container magic")]
    BadMagic,
    /// The stored CRC32 does not match the computed one.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// CRC32 stored in the header slot.
        stored: u32,
        /// CRC32 computed over the covered ranges.
        computed: u32,
    },
    /// A type tag does not fit the header field.
    #[error("type tag does not fit ({len} bytes, {max} usable)")]
    TypeTooLong {
        /// Length of the supplied tag.
        len: usize,
        /// Usable field length for this record.
        max: usize,
    },
    /// An identity string does not fit the header field.
    #[error("identity string does not fit ({len} bytes, {max} usable)")]
    DescrTooLong {
        /// Length of the supplied identity.
        len: usize,
        /// Usable field length.
        max: usize,
    },
    /// A payload exceeds the 32-bit size field.
    #[error("payload too large for the size field")]
    PayloadTooLarge,
}

/// One fixed-size record header, kept as raw bytes with typed accessors.
///
/// The checksum slot and the tail of the type tag share storage; both
/// views go through accessors on this one buffer rather than separate
/// fields, because the overlay is a wire-format invariant.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader([u8; HEADER_SIZE]);

impl ImageHeader {
    /// Decode a header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::Truncated {
                needed: HEADER_SIZE,
                have: bytes.len(),
            });
        }
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&bytes[..HEADER_SIZE]);
        Ok(Self(raw))
    }

    /// Borrow the raw header bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.0
    }

    /// Check the magic tag.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.0[..4] == MAGIC
    }

    /// Flag bits; unknown bits are carried along but not interpreted.
    #[must_use]
    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.read_u16(OFF_FLAGS))
    }

    /// Declared payload size in bytes, padding included.
    ///
    /// Only the low 32 bits of the size are consulted; boot containers are
    /// well below 4 GiB.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        self.read_u32(OFF_SIZE_LOW)
    }

    /// Declared payload size plus the header itself.
    #[must_use]
    pub fn total_size(&self) -> u32 {
        self.payload_size().saturating_add(HEADER_SIZE as u32)
    }

    /// The high size word, reused as the stamped board revision.
    #[must_use]
    pub fn board_rev(&self) -> u32 {
        self.read_u32(OFF_SIZE_HIGH)
    }

    /// Number of padding bytes at the payload end.
    #[must_use]
    pub fn padsize(&self) -> u8 {
        self.0[OFF_PADSIZE]
    }

    /// Header format version (major in the high nibble).
    #[must_use]
    pub fn version(&self) -> u8 {
        self.0[OFF_VERSION]
    }

    /// The type tag, up to the first NUL.
    ///
    /// Checksummed records keep their CRC32 in the tag tail, so the text
    /// portion always ends before the slot on such records.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        trimmed_str(&self.0[OFF_TYPE..OFF_TYPE + TYPE_LEN])
    }

    /// The identity string, when the record carries one.
    #[must_use]
    pub fn descr(&self) -> Option<&str> {
        if !self.flags().contains(HeaderFlags::DESCR) {
            return None;
        }
        Some(trimmed_str(&self.0[OFF_DESCR..OFF_DESCR + DESCR_LEN]))
    }

    /// CRC32 stored in the overlay slot.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.read_u32(CRC_SLOT)
    }

    /// Match magic and type tag, and the identity string when one is asked
    /// for. Identity matching requires the record to carry a description.
    #[must_use]
    pub fn matches(&self, type_tag: &str, descr: Option<&str>) -> bool {
        if !self.is_container() {
            return false;
        }
        if !field_eq(&self.0[OFF_TYPE..OFF_TYPE + TYPE_LEN], type_tag) {
            return false;
        }
        match descr {
            None => true,
            Some(want) => {
                self.flags().contains(HeaderFlags::DESCR)
                    && field_eq(&self.0[OFF_DESCR..OFF_DESCR + DESCR_LEN], want)
            }
        }
    }

    /// Verify the record checksum against this header and its payload.
    ///
    /// The covered ranges follow the flag bits; the CRC is computed with the
    /// slot treated as zero, which is the wire-format rule for storing it.
    /// `payload` must hold at least the declared payload bytes whenever the
    /// payload is covered.
    pub fn verify_checksum(&self, payload: &[u8]) -> Result<ChecksumScope, CodecError> {
        let flags = self.flags();
        let scope = match (
            flags.contains(HeaderFlags::HEADER_CRC),
            flags.contains(HeaderFlags::PAYLOAD_CRC),
        ) {
            (false, false) => return Ok(ChecksumScope::None),
            (true, false) => ChecksumScope::HeaderOnly,
            (false, true) => ChecksumScope::PayloadOnly,
            (true, true) => ChecksumScope::Full,
        };

        let mut hasher = Hasher::new();
        if flags.contains(HeaderFlags::HEADER_CRC) {
            hasher.update(&self.0[..CRC_SLOT]);
            hasher.update(&[0u8; 4]);
            hasher.update(&self.0[CRC_SLOT + 4..]);
        }
        if flags.contains(HeaderFlags::PAYLOAD_CRC) {
            let size = self.payload_size() as usize;
            if payload.len() < size {
                return Err(CodecError::Truncated {
                    needed: size,
                    have: payload.len(),
                });
            }
            hasher.update(&payload[..size]);
        }

        let computed = hasher.finalize();
        let stored = self.checksum();
        if computed != stored {
            return Err(CodecError::ChecksumMismatch { stored, computed });
        }
        Ok(scope)
    }

    fn read_u16(&self, off: usize) -> u16 {
        u16::from_le_bytes([self.0[off], self.0[off + 1]])
    }

    fn read_u32(&self, off: usize) -> u32 {
        u32::from_le_bytes([self.0[off], self.0[off + 1], self.0[off + 2], self.0[off + 3]])
    }
}

impl From<[u8; HEADER_SIZE]> for ImageHeader {
    fn from(raw: [u8; HEADER_SIZE]) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for ImageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHeader")
            .field("type", &self.type_tag())
            .field("descr", &self.descr())
            .field("flags", &self.flags())
            .field("payload_size", &self.payload_size())
            .finish()
    }
}

/// Verify a contiguous materialized record (header followed by payload).
///
/// Used to decide whether a stored board configuration can be trusted
/// before any of its contents are interpreted.
pub fn verify_record(record: &[u8]) -> Result<ChecksumScope, CodecError> {
    let header = ImageHeader::parse(record)?;
    if !header.is_container() {
        return Err(CodecError::BadMagic);
    }
    let total = header.total_size() as usize;
    if record.len() < total {
        return Err(CodecError::Truncated {
            needed: total,
            have: record.len(),
        });
    }
    header.verify_checksum(&record[HEADER_SIZE..total])
}

/// Stamp the resolved board revision into a materialized configuration
/// record and refresh its checksum.
///
/// The revision lands in the otherwise-unused high size word, the checksum
/// flags are forced to cover header and payload, and the CRC32 is
/// recomputed over the whole record.
pub fn stamp_board_rev(record: &mut [u8], rev: u32) -> Result<(), CodecError> {
    let header = ImageHeader::parse(record)?;
    if !header.is_container() {
        return Err(CodecError::BadMagic);
    }
    let total = header.total_size() as usize;
    if record.len() < total {
        return Err(CodecError::Truncated {
            needed: total,
            have: record.len(),
        });
    }

    record[OFF_SIZE_HIGH..OFF_SIZE_HIGH + 4].copy_from_slice(&rev.to_le_bytes());
    let flags = header.flags() | HeaderFlags::HEADER_CRC | HeaderFlags::PAYLOAD_CRC;
    record[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&flags.bits().to_le_bytes());

    let mut hasher = Hasher::new();
    hasher.update(&record[..CRC_SLOT]);
    hasher.update(&[0u8; 4]);
    hasher.update(&record[CRC_SLOT + 4..total]);
    let crc = hasher.finalize();
    record[CRC_SLOT..CRC_SLOT + 4].copy_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// Bounded, NUL-terminated field comparison: equal when all field bytes up
/// to the field length or a terminating NUL match `want`.
fn field_eq(field: &[u8], want: &str) -> bool {
    let want = want.as_bytes();
    if want.len() > field.len() {
        return false;
    }
    if field[..want.len()] != *want {
        return false;
    }
    want.len() == field.len() || field[want.len()] == 0
}

fn trimmed_str(field: &[u8]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    str::from_utf8(&field[..end]).unwrap_or("")
}
