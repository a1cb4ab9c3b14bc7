//! On-media frame for the device record.
//!
//! # Binary Layout (little endian)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     magic (0x5049434F, "PICO")
//! 4       4     format_version
//! 8       16    board_identity
//! 24      1     unlocked (ignored on load)
//! 25      8     last_activity_ms
//! 33      4     auto_lock_timeout_s
//! 37      64    master_credential_hash (hex, zeros = unprovisioned)
//! 101     396   4 x slot: occupied(1) iv(16) ciphertext_len(2) ciphertext(80)
//! 497     4     crc32 over bytes 0..497
//! ```

use alloc::vec::Vec;
use core::fmt;

use crate::config::MAX_PASSWORD_SLOTS;
use crate::crypto::identity::{BOARD_ID_LEN, CREDENTIAL_HASH_LEN};
use crate::crypto::{BoardIdentity, CredentialHash, IV_LEN, MAX_CIPHERTEXT_LEN};
use crate::record::{DeviceRecord, PasswordSlot};

pub const STORAGE_MAGIC: u32 = 0x5049_434F;
pub const FORMAT_VERSION: u32 = 1;

pub const HEADER_LEN: usize = 8;
pub const SLOT_LEN: usize = 1 + IV_LEN + 2 + MAX_CIPHERTEXT_LEN;
pub const RECORD_LEN: usize = BOARD_ID_LEN + 1 + 8 + 4 + CREDENTIAL_HASH_LEN + MAX_PASSWORD_SLOTS * SLOT_LEN;
pub const CHECKSUM_LEN: usize = 4;
pub const FRAME_LEN: usize = HEADER_LEN + RECORD_LEN + CHECKSUM_LEN;

/// Why a frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFault {
    Truncated,
    BadMagic(u32),
    UnsupportedVersion(u32),
    ChecksumMismatch { stored: u32, computed: u32 },
    BadFlag,
    MalformedSlot(usize),
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFault::Truncated => write!(f, "frame truncated"),
            FrameFault::BadMagic(magic) => write!(f, "bad magic {magic:#010x}"),
            FrameFault::UnsupportedVersion(v) => write!(f, "unsupported format version {v}"),
            FrameFault::ChecksumMismatch { stored, computed } => {
                write!(f, "checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")
            }
            FrameFault::BadFlag => write!(f, "boolean field out of range"),
            FrameFault::MalformedSlot(i) => write!(f, "slot {i} malformed"),
        }
    }
}

/// Serializes `record` into a complete frame of `FRAME_LEN` bytes.
pub fn encode(record: &DeviceRecord) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_LEN);

    buf.extend_from_slice(&STORAGE_MAGIC.to_le_bytes());
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

    buf.extend_from_slice(record.board_identity.as_bytes());
    buf.push(u8::from(record.unlocked));
    buf.extend_from_slice(&record.last_activity_ms.to_le_bytes());
    buf.extend_from_slice(&record.auto_lock_timeout_s.to_le_bytes());
    buf.extend_from_slice(record.master_credential_hash.as_bytes());

    for slot in &record.slots {
        buf.push(u8::from(slot.occupied));
        buf.extend_from_slice(&slot.iv);
        // ciphertext_len never exceeds MAX_CIPHERTEXT_LEN for a well-formed slot
        let len = u16::try_from(slot.ciphertext_len).unwrap_or(u16::MAX);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&slot.ciphertext);
    }

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    debug_assert_eq!(buf.len(), FRAME_LEN);
    buf
}

/// Parses and validates a frame. Bytes past `FRAME_LEN` are ignored.
pub fn decode(bytes: &[u8]) -> Result<DeviceRecord, FrameFault> {
    if bytes.len() < FRAME_LEN {
        return Err(FrameFault::Truncated);
    }
    let frame = &bytes[..FRAME_LEN];
    let mut r = Reader::new(frame);

    let magic = r.u32()?;
    if magic != STORAGE_MAGIC {
        return Err(FrameFault::BadMagic(magic));
    }
    let version = r.u32()?;
    if version != FORMAT_VERSION {
        return Err(FrameFault::UnsupportedVersion(version));
    }

    let body_end = FRAME_LEN - CHECKSUM_LEN;
    let stored = u32::from_le_bytes(r.array_at::<CHECKSUM_LEN>(body_end)?);
    let computed = crc32fast::hash(&frame[..body_end]);
    if stored != computed {
        return Err(FrameFault::ChecksumMismatch { stored, computed });
    }

    let board_identity = BoardIdentity::new(r.array::<BOARD_ID_LEN>()?);
    let unlocked = r.flag()?;
    let last_activity_ms = u64::from_le_bytes(r.array::<8>()?);
    let auto_lock_timeout_s = r.u32()?;
    let master_credential_hash = CredentialHash::from_bytes(r.array::<CREDENTIAL_HASH_LEN>()?);

    let mut record = DeviceRecord::new(board_identity, auto_lock_timeout_s);
    record.unlocked = unlocked;
    record.last_activity_ms = last_activity_ms;
    record.master_credential_hash = master_credential_hash;

    for (i, slot) in record.slots.iter_mut().enumerate() {
        *slot = read_slot(&mut r).map_err(|_| FrameFault::MalformedSlot(i))?;
        if !slot.is_well_formed() {
            return Err(FrameFault::MalformedSlot(i));
        }
    }

    Ok(record)
}

fn read_slot(r: &mut Reader<'_>) -> Result<PasswordSlot, FrameFault> {
    Ok(PasswordSlot {
        occupied: r.flag()?,
        iv: r.array::<IV_LEN>()?,
        ciphertext_len: usize::from(u16::from_le_bytes(r.array::<2>()?)),
        ciphertext: r.array::<MAX_CIPHERTEXT_LEN>()?,
    })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn array_at<const N: usize>(&self, at: usize) -> Result<[u8; N], FrameFault> {
        self.buf
            .get(at..at + N)
            .and_then(|s| s.try_into().ok())
            .ok_or(FrameFault::Truncated)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FrameFault> {
        let out = self.array_at::<N>(self.pos)?;
        self.pos += N;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, FrameFault> {
        Ok(u32::from_le_bytes(self.array::<4>()?))
    }

    fn flag(&mut self) -> Result<bool, FrameFault> {
        match self.array::<1>()? {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(FrameFault::BadFlag),
        }
    }
}
