//! Read-only animation archive storage

/// Errors from reading the animation archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Read past the end of the region
    OutOfBounds,
    /// Flash read failed
    Read,
}

/// Random-access byte storage holding the packed animation archive
///
/// On the device this is a memory-mapped flash region; tests use a slice.
pub trait AnimationStore {
    /// Total size of the region in bytes
    fn capacity(&self) -> usize;

    /// Fill `buf` with bytes starting at `offset`
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError>;
}

/// Slice-backed store
pub struct SliceStore<'a> {
    data: &'a [u8],
}

impl<'a> SliceStore<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl AnimationStore for SliceStore<'_> {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        let end = offset.checked_add(buf.len()).ok_or(StoreError::OutOfBounds)?;
        let src = self.data.get(offset..end).ok_or(StoreError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
