// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Durable Raft Log
//!
//! # Files
//! ```text
//! raft.entries = [Entry][Entry]...
//! Entry        = [term: i32][len: u32][crc64: u64][frame]
//! raft.meta    = [magic "SQRM"][version: u32][term: i32][voted_for: i32]
//!                [commit_index: i64][crc64: u64]
//! ```
//!
//! Entries are appended and synced one at a time; truncation shortens the
//! file with `set_len`. The metadata file is small and rewritten whole
//! through a temp file and a rename, so a crash leaves either the old or the
//! new term/vote pair.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use crc64fast::Digest;
use sequent_kernel::error::{LogError, LogResult};
use sequent_kernel::raft::{RaftEntry, RaftLog, NOT_VOTED_YET};

use crate::error::{PersistenceError, Result};

const ENTRIES_FILE: &str = "raft.entries";
const META_FILE: &str = "raft.meta";
const ENTRY_HEADER_SIZE: usize = 4 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Meta {
    current_term: i32,
    voted_for: i32,
    commit_index: i64,
}

impl Meta {
    const SIZE: usize = 4 + 4 + 4 + 4 + 8 + 8; // 32 bytes
    const MAGIC: [u8; 4] = *b"SQRM";
    const VERSION: u32 = 1;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&Self::MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], Self::VERSION);
        LittleEndian::write_i32(&mut buf[8..12], self.current_term);
        LittleEndian::write_i32(&mut buf[12..16], self.voted_for);
        LittleEndian::write_i64(&mut buf[16..24], self.commit_index);
        let mut digest = Digest::new();
        digest.write(&buf[..24]);
        LittleEndian::write_u64(&mut buf[24..32], digest.sum64());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != Self::SIZE {
            return Err(PersistenceError::InvalidFormat(format!(
                "raft metadata is {} bytes, expected {}",
                buf.len(),
                Self::SIZE
            )));
        }
        if buf[0..4] != Self::MAGIC {
            return Err(PersistenceError::InvalidMagic);
        }
        let version = LittleEndian::read_u32(&buf[4..8]);
        if version != Self::VERSION {
            return Err(PersistenceError::InvalidFormat(format!(
                "unsupported raft metadata version {version}"
            )));
        }
        let mut digest = Digest::new();
        digest.write(&buf[..24]);
        let expected = LittleEndian::read_u64(&buf[24..32]);
        if digest.sum64() != expected {
            return Err(PersistenceError::ChecksumMismatch {
                expected,
                found: digest.sum64(),
            });
        }
        Ok(Self {
            current_term: LittleEndian::read_i32(&buf[8..12]),
            voted_for: LittleEndian::read_i32(&buf[12..16]),
            commit_index: LittleEndian::read_i64(&buf[16..24]),
        })
    }
}

fn entry_checksum(term: i32, frame: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(&term.to_le_bytes());
    digest.write(&(frame.len() as u32).to_le_bytes());
    digest.write(frame);
    digest.sum64()
}

/// A [`RaftLog`] persisted in a directory. Entries are also kept in memory
/// so reads never touch the disk.
pub struct FileRaftLog {
    dir: PathBuf,
    file: File,
    entries: Vec<RaftEntry>,
    /// File offset of every entry, for truncation.
    offsets: Vec<u64>,
    end: u64,
    meta: Meta,
}

impl FileRaftLog {
    /// Opens the log in `dir`, creating the directory and files as needed.
    /// Entries after the first damaged one are dropped.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let meta = match fs::read(dir.join(META_FILE)) {
            Ok(bytes) => Meta::from_bytes(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Meta {
                current_term: 0,
                voted_for: NOT_VOTED_YET,
                commit_index: -1,
            },
            Err(e) => return Err(e.into()),
        };

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(dir.join(ENTRIES_FILE))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut entries = Vec::new();
        let mut offsets = Vec::new();
        let mut offset = 0usize;
        while offset + ENTRY_HEADER_SIZE <= bytes.len() {
            let term = LittleEndian::read_i32(&bytes[offset..]);
            let len = LittleEndian::read_u32(&bytes[offset + 4..]) as usize;
            let stored = LittleEndian::read_u64(&bytes[offset + 8..]);
            let start = offset + ENTRY_HEADER_SIZE;
            if start + len > bytes.len() {
                tracing::warn!("Torn raft entry at offset {}", offset);
                break;
            }
            let frame = &bytes[start..start + len];
            if entry_checksum(term, frame) != stored {
                tracing::warn!("Raft entry checksum mismatch at offset {}", offset);
                break;
            }
            offsets.push(offset as u64);
            entries.push(RaftEntry::new(term, Arc::from(frame)));
            offset = start + len;
        }

        let end = offset as u64;
        if end < bytes.len() as u64 {
            file.set_len(end)?;
            file.sync_all()?;
        }

        if meta.commit_index >= entries.len() as i64 {
            return Err(PersistenceError::InvalidFormat(format!(
                "commit index {} is past the {} recovered entries",
                meta.commit_index,
                entries.len()
            )));
        }

        tracing::info!(
            "Opened raft log {}: {} entries, term {}, commit {}",
            dir.display(),
            entries.len(),
            meta.current_term,
            meta.commit_index
        );

        Ok(Self {
            dir,
            file,
            entries,
            offsets,
            end,
            meta,
        })
    }

    fn store_meta(&mut self, meta: Meta) -> Result<()> {
        let tmp_path = self.dir.join(format!("{META_FILE}.tmp"));
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&meta.to_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, self.dir.join(META_FILE))?;
        self.meta = meta;
        Ok(())
    }

    fn write_entry(&mut self, term: i32, frame: &[u8]) -> Result<()> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        LittleEndian::write_i32(&mut header[0..4], term);
        LittleEndian::write_u32(&mut header[4..8], frame.len() as u32);
        LittleEndian::write_u64(&mut header[8..16], entry_checksum(term, frame));

        self.file.write_all(&header)?;
        self.file.write_all(frame)?;
        self.file.sync_data()?;
        self.end += (ENTRY_HEADER_SIZE + frame.len()) as u64;
        Ok(())
    }
}

impl RaftLog for FileRaftLog {
    fn size(&self) -> i64 {
        self.entries.len() as i64
    }

    fn term(&self, index: i64) -> Option<i32> {
        self.entry(index).map(|e| e.term)
    }

    fn entry(&self, index: i64) -> Option<&RaftEntry> {
        usize::try_from(index).ok().and_then(|i| self.entries.get(i))
    }

    fn append(&mut self, term: i32, frame: Arc<[u8]>) -> LogResult<i64> {
        let last_term = self.last_term();
        if !self.entries.is_empty() && term < last_term {
            return Err(LogError::TermRegression { term, last_term });
        }
        let offset = self.end;
        self.write_entry(term, &frame)?;
        self.offsets.push(offset);
        self.entries.push(RaftEntry::new(term, frame));
        Ok(self.size() - 1)
    }

    fn truncate(&mut self, from: i64) -> LogResult<()> {
        if from <= self.meta.commit_index {
            return Err(LogError::TruncateCommitted {
                from,
                commit_index: self.meta.commit_index,
            });
        }
        let Some(&offset) = usize::try_from(from).ok().and_then(|i| self.offsets.get(i)) else {
            return Ok(());
        };
        self.file.set_len(offset)?;
        self.file.sync_all()?;
        let keep = from as usize;
        self.entries.truncate(keep);
        self.offsets.truncate(keep);
        self.end = offset;
        tracing::debug!("Truncated raft log to {} entries", keep);
        Ok(())
    }

    fn current_term(&self) -> i32 {
        self.meta.current_term
    }

    fn voted_for(&self) -> i32 {
        self.meta.voted_for
    }

    fn vote_for(&mut self, candidate: i32) -> LogResult<()> {
        Ok(self.store_meta(Meta {
            voted_for: candidate,
            ..self.meta
        })?)
    }

    fn clear_vote_for_and_set_current_term(&mut self, term: i32) -> LogResult<()> {
        Ok(self.store_meta(Meta {
            current_term: term,
            voted_for: NOT_VOTED_YET,
            ..self.meta
        })?)
    }

    fn clear_vote_for_and_inc_current_term(&mut self) -> LogResult<i32> {
        let term = self.meta.current_term + 1;
        self.clear_vote_for_and_set_current_term(term)?;
        Ok(term)
    }

    fn commit_index(&self) -> i64 {
        self.meta.commit_index
    }

    fn set_commit_index(&mut self, index: i64) -> LogResult<()> {
        if index > self.last_index() {
            return Err(LogError::IndexOutOfRange {
                index,
                size: self.size(),
            });
        }
        if index <= self.meta.commit_index {
            return Ok(());
        }
        Ok(self.store_meta(Meta {
            commit_index: index,
            ..self.meta
        })?)
    }
}
