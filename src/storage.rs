//! Persistent byte store for the security layer.
//!
//! The security layer writes and reads its own blob front to back. The
//! only contract here is a cursor over a byte region: `open` rewinds,
//! `read`/`write` advance, nothing is interpreted.

use core::ops::Range;

use embedded_storage::{ReadStorage, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    NotOpen,
    /// Access would run past the end of the region.
    OutOfRange,
    /// Underlying storage failed.
    Device,
}

pub struct PersistCursor<S> {
    store: S,
    start: u32,
    len: u32,
    pos: u32,
    mode: Option<OpenMode>,
}

impl<S: Storage> PersistCursor<S> {
    /// Cursor over `len` bytes of `store` starting at `start`.
    pub fn new(store: S, start: u32, len: u32) -> Self {
        Self {
            store,
            start,
            len,
            pos: 0,
            mode: None,
        }
    }

    /// Cursor over the whole of `store`.
    pub fn whole(store: S) -> Self {
        let len = store.capacity() as u32;
        Self::new(store, 0, len)
    }

    pub fn open(&mut self, mode: OpenMode) {
        self.pos = 0;
        self.mode = Some(mode);
    }

    pub fn close(&mut self) {
        self.mode = None;
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        if self.mode != Some(OpenMode::Write) {
            return Err(StorageError::NotOpen);
        }
        let end = self.advance(bytes.len())?;
        self.store
            .write(self.start + self.pos, bytes)
            .map_err(|_| StorageError::Device)?;
        self.pos = end;
        Ok(())
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), StorageError> {
        if self.mode.is_none() {
            return Err(StorageError::NotOpen);
        }
        let end = self.advance(buf.len())?;
        self.store
            .read(self.start + self.pos, buf)
            .map_err(|_| StorageError::Device)?;
        self.pos = end;
        Ok(())
    }

    pub fn position(&self) -> u32 {
        self.pos
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn advance(&self, n: usize) -> Result<u32, StorageError> {
        let n = u32::try_from(n).map_err(|_| StorageError::OutOfRange)?;
        self.pos
            .checked_add(n)
            .filter(|&end| end <= self.len)
            .ok_or(StorageError::OutOfRange)
    }
}

/// RAM-backed region that survives radio power cycles but not a reset.
pub struct RamStore<const N: usize> {
    mem: [u8; N],
}

impl<const N: usize> RamStore<N> {
    pub const fn new() -> Self {
        Self { mem: [0; N] }
    }
}

/// Byte range `offset..offset + len`, or `OutOfRange` if it overflows.
fn span(offset: u32, len: usize) -> Result<Range<usize>, StorageError> {
    let start = usize::try_from(offset).map_err(|_| StorageError::OutOfRange)?;
    let end = start.checked_add(len).ok_or(StorageError::OutOfRange)?;
    Ok(start..end)
}

impl<const N: usize> Default for RamStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ReadStorage for RamStore<N> {
    type Error = StorageError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let src = self
            .mem
            .get(span(offset, bytes.len())?)
            .ok_or(StorageError::OutOfRange)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Storage for RamStore<N> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let dst = self
            .mem
            .get_mut(span(offset, bytes.len())?)
            .ok_or(StorageError::OutOfRange)?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_back() {
        let mut cursor = PersistCursor::whole(RamStore::<16>::new());
        cursor.open(OpenMode::Write);
        cursor.write(&[1, 2, 3]).unwrap();
        cursor.write(&[4]).unwrap();
        assert_eq!(cursor.position(), 4);
        cursor.close();

        cursor.open(OpenMode::Read);
        let mut a = [0u8; 2];
        let mut b = [0u8; 2];
        cursor.read(&mut a).unwrap();
        cursor.read(&mut b).unwrap();
        assert_eq!(a, [1, 2]);
        assert_eq!(b, [3, 4]);
    }

    #[test]
    fn test_bounds_and_mode() {
        let mut cursor = PersistCursor::new(RamStore::<16>::new(), 8, 4);
        assert_eq!(cursor.write(&[0]), Err(StorageError::NotOpen));
        cursor.open(OpenMode::Read);
        assert_eq!(cursor.write(&[0]), Err(StorageError::NotOpen));
        cursor.open(OpenMode::Write);
        assert_eq!(cursor.write(&[0; 5]), Err(StorageError::OutOfRange));
        cursor.write(&[9; 4]).unwrap();
        assert_eq!(cursor.write(&[0]), Err(StorageError::OutOfRange));

        let mut store = cursor.into_inner();
        let mut raw = [0u8; 16];
        store.read(0, &mut raw).unwrap();
        assert_eq!(&raw[8..12], &[9; 4]);
        assert_eq!(&raw[..8], &[0; 8]);
    }

    #[test]
    fn test_offset_past_end_rejected() {
        let mut store = RamStore::<16>::new();
        let mut buf = [0u8; 4];
        assert_eq!(store.read(u32::MAX, &mut buf), Err(StorageError::OutOfRange));
        assert_eq!(store.write(u32::MAX - 1, &[1; 4]), Err(StorageError::OutOfRange));
        assert_eq!(store.write(14, &[1; 4]), Err(StorageError::OutOfRange));
        assert_eq!(span(u32::MAX, usize::MAX), Err(StorageError::OutOfRange));
    }
}
