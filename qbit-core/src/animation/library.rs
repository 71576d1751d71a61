//! Packed animation archive
//!
//! Layout:
//! - magic `QLIB`, `count: u8`
//! - `count` entries of `name_len: u8`, `name`, `len: u32le`, then `len`
//!   bytes of `.qgif` data
//!
//! The catalogue is scanned once at boot. Entries whose `.qgif` header does
//! not validate are skipped; a broken archive structure aborts the scan.

use heapless::{String, Vec};

use crate::codec::{QgifHeader, FRAME_BYTES, QGIF_HEADER_SIZE};
use crate::traits::{AnimationStore, StoreError, MAX_ANIMATION_NAME};

/// Archive magic
pub const LIBRARY_MAGIC: &[u8; 4] = b"QLIB";

/// Catalogue capacity
pub const MAX_ANIMATIONS: usize = 32;

/// Entry played once at boot and never shuffled
pub const BOOT_ANIMATION: &str = "boot";

/// Errors from scanning or reading the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LibraryError {
    Store(StoreError),
    /// Region does not start with `QLIB`
    BadMagic,
    /// Entry name empty, too long or not UTF-8
    BadName,
    /// Entry extends past the end of the region
    Truncated,
    /// More entries than the catalogue holds
    TooMany,
    /// Frame index past the end of the animation
    FrameOutOfRange,
}

impl From<StoreError> for LibraryError {
    fn from(e: StoreError) -> Self {
        LibraryError::Store(e)
    }
}

/// One playable animation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnimationEntry {
    pub name: String<MAX_ANIMATION_NAME>,
    /// Offset of the `.qgif` data in the store
    pub offset: usize,
    pub header: QgifHeader,
}

impl AnimationEntry {
    pub fn frame_count(&self) -> usize {
        usize::from(self.header.frame_count)
    }

    /// Read the authored delay of frame `index`
    pub fn read_delay<S: AnimationStore>(
        &self,
        store: &mut S,
        index: usize,
    ) -> Result<u16, LibraryError> {
        if index >= self.frame_count() {
            return Err(LibraryError::FrameOutOfRange);
        }
        let mut raw = [0u8; 2];
        store.read(self.offset + self.header.delays_offset() + index * 2, &mut raw)?;
        Ok(u16::from_le_bytes(raw))
    }

    /// Read the raw bitplane of frame `index`
    pub fn read_frame<S: AnimationStore>(
        &self,
        store: &mut S,
        index: usize,
        buf: &mut [u8; FRAME_BYTES],
    ) -> Result<(), LibraryError> {
        let at = self
            .header
            .frame_offset(index)
            .map_err(|_| LibraryError::FrameOutOfRange)?;
        store.read(self.offset + at, buf)?;
        Ok(())
    }
}

/// Catalogue of the archive
#[derive(Debug, Clone, Default)]
pub struct AnimationLibrary {
    entries: Vec<AnimationEntry, MAX_ANIMATIONS>,
}

impl AnimationLibrary {
    pub const fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Scan the archive catalogue
    pub fn scan<S: AnimationStore>(store: &mut S) -> Result<Self, LibraryError> {
        let capacity = store.capacity();
        let mut head = [0u8; 5];
        store.read(0, &mut head)?;
        if &head[..4] != LIBRARY_MAGIC {
            return Err(LibraryError::BadMagic);
        }
        let count = usize::from(head[4]);

        let mut entries = Vec::new();
        let mut cursor = head.len();
        for _ in 0..count {
            let mut name_len = [0u8; 1];
            store.read(cursor, &mut name_len)?;
            let name_len = usize::from(name_len[0]);
            if name_len == 0 || name_len > MAX_ANIMATION_NAME {
                return Err(LibraryError::BadName);
            }
            cursor += 1;

            let mut name_buf = [0u8; MAX_ANIMATION_NAME];
            store.read(cursor, &mut name_buf[..name_len])?;
            let name = core::str::from_utf8(&name_buf[..name_len])
                .map_err(|_| LibraryError::BadName)?;
            cursor += name_len;

            let mut len = [0u8; 4];
            store.read(cursor, &mut len)?;
            let len = u32::from_le_bytes(len) as usize;
            cursor += 4;

            let offset = cursor;
            cursor = cursor.checked_add(len).ok_or(LibraryError::Truncated)?;
            if cursor > capacity {
                return Err(LibraryError::Truncated);
            }

            let mut raw = [0u8; QGIF_HEADER_SIZE];
            if len < raw.len() {
                continue;
            }
            store.read(offset, &mut raw)?;
            let Ok(header) = QgifHeader::parse(&raw) else {
                continue;
            };
            if header.total_len() > len {
                continue;
            }

            let mut owned = String::new();
            // Length already checked against the capacity
            let _ = owned.push_str(name);
            entries
                .push(AnimationEntry {
                    name: owned,
                    offset,
                    header,
                })
                .map_err(|_| LibraryError::TooMany)?;
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AnimationEntry> {
        self.entries.get(index)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Indices eligible for shuffled playback
    pub fn playable(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name != BOOT_ANIMATION)
            .map(|(i, _)| i)
    }

    /// Whether any animation besides the boot one exists
    pub fn has_playable(&self) -> bool {
        self.playable().next().is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::qgif::tests::build_qgif;
    use crate::traits::SliceStore;
    use alloc::vec::Vec as StdVec;

    /// Pack `(name, qgif bytes)` pairs into an archive
    pub(crate) fn build_library(entries: &[(&str, StdVec<u8>)]) -> StdVec<u8> {
        let mut out = StdVec::new();
        out.extend_from_slice(LIBRARY_MAGIC);
        out.push(entries.len() as u8);
        for (name, data) in entries {
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    #[test]
    fn test_scan_catalogue() {
        let archive = build_library(&[
            ("boot", build_qgif(&[50])),
            ("cat", build_qgif(&[100, 200])),
            ("dog", build_qgif(&[80])),
        ]);
        let mut store = SliceStore::new(&archive);
        let lib = AnimationLibrary::scan(&mut store).unwrap();

        assert_eq!(lib.len(), 3);
        assert_eq!(lib.find("cat"), Some(1));
        let cat = lib.get(1).unwrap();
        assert_eq!(cat.frame_count(), 2);
        assert_eq!(cat.read_delay(&mut store, 1), Ok(200));

        let mut frame = [0u8; FRAME_BYTES];
        cat.read_frame(&mut store, 1, &mut frame).unwrap();
        assert!(frame.iter().all(|b| *b == 1));
        assert_eq!(
            cat.read_frame(&mut store, 2, &mut frame),
            Err(LibraryError::FrameOutOfRange)
        );

        let playable: StdVec<usize> = lib.playable().collect();
        assert_eq!(playable, [1, 2]);
    }

    #[test]
    fn test_invalid_qgif_entry_is_skipped() {
        let mut bad = build_qgif(&[100]);
        bad[3] = 32;
        let archive = build_library(&[("bad", bad), ("good", build_qgif(&[100]))]);
        let lib = AnimationLibrary::scan(&mut SliceStore::new(&archive)).unwrap();
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get(0).unwrap().name.as_str(), "good");
    }

    #[test]
    fn test_structural_errors() {
        let archive = build_library(&[("a", build_qgif(&[100]))]);

        let mut wrong = archive.clone();
        wrong[0] = b'X';
        assert_eq!(
            AnimationLibrary::scan(&mut SliceStore::new(&wrong)).err(),
            Some(LibraryError::BadMagic)
        );

        let short = &archive[..archive.len() - 10];
        assert_eq!(
            AnimationLibrary::scan(&mut SliceStore::new(short)).err(),
            Some(LibraryError::Truncated)
        );
    }

    #[test]
    fn test_only_boot_is_not_playable() {
        let archive = build_library(&[("boot", build_qgif(&[50]))]);
        let lib = AnimationLibrary::scan(&mut SliceStore::new(&archive)).unwrap();
        assert!(!lib.has_playable());
        assert_eq!(lib.find(BOOT_ANIMATION), Some(0));
    }
}
