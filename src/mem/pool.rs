use heapless::Vec;

use super::{Addr, PoolError};
use crate::config::MAX_STACK_ITEMS;

/// Bounded LIFO of free chunk addresses. Its depth is the owning pool's
/// chunk count.
#[derive(Debug)]
pub struct FreeStack {
    items: Vec<Addr, MAX_STACK_ITEMS>,
    depth: usize,
}

impl FreeStack {
    pub fn with_depth(depth: usize) -> Self {
        Self {
            items: Vec::new(),
            depth: depth.min(MAX_STACK_ITEMS),
        }
    }

    /// Hands the address back when the stack is full.
    pub fn push(&mut self, addr: Addr) -> Result<(), Addr> {
        if self.items.len() >= self.depth {
            return Err(addr);
        }
        self.items.push(addr)
    }

    pub fn pop(&mut self) -> Option<Addr> {
        self.items.pop()
    }

    pub fn contains(&self, addr: Addr) -> bool {
        self.items.contains(&addr)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.depth
    }
}

/// Same-size chunks over one contiguous arena range.
#[derive(Debug)]
pub struct MemoryPool {
    base: Addr,
    chunk_size: usize,
    chunk_count: usize,
    free: FreeStack,
}

impl MemoryPool {
    /// Every chunk starts out free. The lowest address sits on top of the
    /// stack so it is handed out first.
    pub(super) fn new(base: Addr, chunk_size: usize, chunk_count: usize) -> Self {
        let mut free = FreeStack::with_depth(chunk_count);
        for i in (0..chunk_count).rev() {
            // depth == chunk_count, cannot overflow
            let _ = free.push(Addr(base.0 + i * chunk_size));
        }
        Self {
            base,
            chunk_size,
            chunk_count,
            free,
        }
    }

    pub fn base(&self) -> Addr {
        self.base
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// True when `addr` falls anywhere inside this pool's byte range.
    pub fn contains(&self, addr: Addr) -> bool {
        addr.0 >= self.base.0 && addr.0 < self.base.0 + self.chunk_size * self.chunk_count
    }

    /// In range and on a chunk boundary.
    pub fn check(&self, addr: Addr) -> Result<(), PoolError> {
        if !self.contains(addr) || (addr.0 - self.base.0) % self.chunk_size != 0 {
            return Err(PoolError::AddressNotInPool);
        }
        Ok(())
    }

    pub(super) fn take(&mut self) -> Result<Addr, PoolError> {
        self.free.pop().ok_or(PoolError::PoolExhausted)
    }

    pub(super) fn is_free(&self, addr: Addr) -> bool {
        self.free.contains(addr)
    }

    pub(super) fn give_back(&mut self, addr: Addr) -> Result<(), PoolError> {
        self.free.push(addr).map_err(|_| PoolError::AddressNotInPool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_stack_bounds() {
        let mut stack = FreeStack::with_depth(2);
        assert!(stack.pop().is_none());
        assert!(stack.push(Addr(0)).is_ok());
        assert!(stack.push(Addr(8)).is_ok());
        assert!(stack.is_full());
        assert_eq!(stack.push(Addr(16)), Err(Addr(16)));
        assert_eq!(stack.pop(), Some(Addr(8)));
    }

    #[test]
    fn test_free_stack_depth_is_capped() {
        let stack = FreeStack::with_depth(MAX_STACK_ITEMS + 5);
        assert_eq!(stack.depth, MAX_STACK_ITEMS);
    }

    #[test]
    fn test_pool_hands_out_lowest_first() {
        let mut pool = MemoryPool::new(Addr(100), 8, 3);
        assert_eq!(pool.free_count(), 3);
        assert_eq!(pool.take(), Ok(Addr(100)));
        assert_eq!(pool.take(), Ok(Addr(108)));
        assert_eq!(pool.take(), Ok(Addr(116)));
        assert_eq!(pool.take(), Err(PoolError::PoolExhausted));
    }

    #[test]
    fn test_pool_check() {
        let pool = MemoryPool::new(Addr(16), 8, 2);
        assert!(pool.check(Addr(16)).is_ok());
        assert!(pool.check(Addr(24)).is_ok());
        assert_eq!(pool.check(Addr(17)), Err(PoolError::AddressNotInPool));
        assert_eq!(pool.check(Addr(32)), Err(PoolError::AddressNotInPool));
        assert_eq!(pool.check(Addr(8)), Err(PoolError::AddressNotInPool));
    }
}
