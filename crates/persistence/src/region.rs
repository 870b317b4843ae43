// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Memory-mapped file region.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use sequent_kernel::error::LogResult;
use sequent_kernel::log::Region;

use crate::error::Result;

/// A [`Region`] backed by a memory-mapped file. The file grows by doubling;
/// fresh space reads as zeroes, which the log treats as its end marker.
pub struct MmapRegion {
    file: File,
    map: MmapMut,
    path: PathBuf,
}

impl MmapRegion {
    /// Opens (or creates) `path` and maps at least `capacity` bytes of it.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        let wanted = capacity.max(1) as u64;
        if len < wanted {
            file.set_len(wanted)?;
        }
        // SAFETY: the file is opened read-write by this process only; the
        // kernel's log takes a write lock around every mutation.
        let map = unsafe { MmapMut::map_mut(&file)? };
        tracing::debug!("Mapped {} ({} bytes)", path.display(), map.len());

        Ok(Self { file, map, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remap(&mut self, len: u64) -> std::io::Result<()> {
        self.map.flush()?;
        self.file.set_len(len)?;
        // SAFETY: see `open`.
        self.map = unsafe { MmapMut::map_mut(&self.file)? };
        Ok(())
    }
}

impl Region for MmapRegion {
    fn bytes(&self) -> &[u8] {
        &self.map
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }

    fn ensure_capacity(&mut self, required: usize) -> LogResult<()> {
        let current = self.map.len();
        if required <= current {
            return Ok(());
        }
        let grown = required.max(current * 2);
        tracing::info!("Growing {} from {} to {} bytes", self.path.display(), current, grown);
        self.remap(grown as u64)?;
        Ok(())
    }

    fn flush(&mut self, offset: usize, len: usize) -> LogResult<()> {
        self.map.flush_range(offset, len)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_region_grows_and_keeps_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region.log");

        let mut region = MmapRegion::open(&path, 16).unwrap();
        region.bytes_mut()[..4].copy_from_slice(b"abcd");
        region.flush(0, 4).unwrap();
        region.ensure_capacity(100).unwrap();
        assert!(region.capacity() >= 100);
        assert_eq!(&region.bytes()[..4], b"abcd");
        assert!(region.bytes()[4..].iter().all(|b| *b == 0));
        drop(region);

        let reopened = MmapRegion::open(&path, 16).unwrap();
        assert!(reopened.capacity() >= 100);
        assert_eq!(&reopened.bytes()[..4], b"abcd");
    }
}
