use super::{Addr, PoolError};

/// One static byte region. Space is handed out front to back and never
/// given back; pools carve their chunk ranges out of it at boot.
pub struct Arena<const N: usize> {
    mem: [u8; N],
    next: usize,
}

impl<const N: usize> Arena<N> {
    pub const fn new() -> Self {
        Self {
            mem: [0; N],
            next: 0,
        }
    }

    /// Reserve `len` bytes for the rest of the arena's life.
    pub fn bump_allocate(&mut self, len: usize) -> Result<Addr, PoolError> {
        let end = self
            .next
            .checked_add(len)
            .filter(|&end| end <= N)
            .ok_or(PoolError::OutOfArena)?;
        let addr = Addr(self.next);
        self.next = end;
        Ok(addr)
    }

    pub fn remaining(&self) -> usize {
        N - self.next
    }

    pub fn used(&self) -> usize {
        self.next
    }

    pub fn bytes(&self, addr: Addr, len: usize) -> Option<&[u8]> {
        let end = addr.0.checked_add(len)?;
        if end > self.next {
            return None;
        }
        self.mem.get(addr.0..end)
    }

    pub fn bytes_mut(&mut self, addr: Addr, len: usize) -> Option<&mut [u8]> {
        let end = addr.0.checked_add(len)?;
        if end > self.next {
            return None;
        }
        self.mem.get_mut(addr.0..end)
    }
}

impl<const N: usize> Default for Arena<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_is_monotonic() {
        let mut arena = Arena::<64>::new();
        let a = arena.bump_allocate(10).unwrap();
        let b = arena.bump_allocate(6).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 10);
        assert_eq!(arena.remaining(), 48);
    }

    #[test]
    fn test_bump_out_of_arena() {
        let mut arena = Arena::<16>::new();
        assert!(arena.bump_allocate(16).is_ok());
        assert_eq!(arena.bump_allocate(1), Err(PoolError::OutOfArena));
    }

    #[test]
    fn test_bump_overflow_is_checked() {
        let mut arena = Arena::<16>::new();
        arena.bump_allocate(4).unwrap();
        assert_eq!(arena.bump_allocate(usize::MAX), Err(PoolError::OutOfArena));
        assert_eq!(arena.remaining(), 12);
    }

    #[test]
    fn test_bytes_only_cover_reserved_space() {
        let mut arena = Arena::<16>::new();
        let a = arena.bump_allocate(4).unwrap();
        assert_eq!(arena.bytes(a, 4), Some(&[0u8; 4][..]));
        assert!(arena.bytes(a, 5).is_none());
    }
}
