//! Fixed-arena pool allocator.
//!
//! One static [`Arena`] is split into up to [`MAX_POOLS`] pools of
//! same-size chunks plus a bump region for buffers that live for the rest
//! of the program. Nothing here touches a global heap.

mod arena;
mod pool;

use heapless::Vec;

pub use arena::Arena;
pub use pool::{FreeStack, MemoryPool};

use crate::config::{ARENA_SIZE, DEFAULT_POOLS, MAX_POOLS, MAX_STACK_ITEMS};
use crate::error::{fatal, Fatal};

/// Offset of a byte inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Addr(usize);

impl Addr {
    pub const fn offset(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolHandle(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PoolError {
    InvalidArgument,
    OutOfPools,
    OutOfArena,
    InvalidHandle,
    PoolExhausted,
    AddressNotInPool,
    /// No pool has chunks large enough for the request.
    NoFittingPool,
}

pub struct PoolRegistry<const N: usize = ARENA_SIZE> {
    arena: Arena<N>,
    pools: Vec<MemoryPool, MAX_POOLS>,
}

impl<const N: usize> PoolRegistry<N> {
    /// Empty arena, no pools.
    pub const fn new() -> Self {
        Self {
            arena: Arena::new(),
            pools: Vec::new(),
        }
    }

    /// Arena carved into the default buffer classes.
    pub fn with_default_layout() -> Result<Self, PoolError> {
        let mut registry = Self::new();
        for (size, count) in DEFAULT_POOLS {
            registry.create_pool(size, count)?;
        }
        Ok(registry)
    }

    /// Boot-time layout. A layout that does not fit is fatal.
    pub fn init() -> Self {
        match Self::with_default_layout() {
            Ok(registry) => registry,
            Err(e) => {
                error!("pool layout does not fit: {:?}", e);
                fatal(Fatal::PoolMemAllocFail)
            }
        }
    }

    pub fn create_pool(&mut self, chunk_size: usize, chunk_count: usize) -> Result<PoolHandle, PoolError> {
        if chunk_size == 0 || chunk_count == 0 || chunk_count > MAX_STACK_ITEMS {
            return Err(PoolError::InvalidArgument);
        }
        if self.pools.is_full() {
            return Err(PoolError::OutOfPools);
        }
        let bytes = chunk_size.checked_mul(chunk_count).ok_or(PoolError::OutOfArena)?;
        let base = self.arena.bump_allocate(bytes)?;

        let handle = PoolHandle(self.pools.len() as u8);
        self.pools
            .push(MemoryPool::new(base, chunk_size, chunk_count))
            .map_err(|_| PoolError::OutOfPools)?;
        debug!(
            "pool {} created: {} x {} at {}",
            handle.0,
            chunk_size,
            chunk_count,
            base.offset()
        );
        Ok(handle)
    }

    pub fn allocate(&mut self, handle: PoolHandle) -> Result<Addr, PoolError> {
        self.pool_mut(handle)?.take()
    }

    /// Return a chunk. Freeing an already free chunk is accepted and
    /// changes nothing.
    pub fn free(&mut self, handle: PoolHandle, addr: Addr) -> Result<(), PoolError> {
        let pool = self.pool(handle)?;
        pool.check(addr)?;
        if pool.is_free(addr) {
            debug!("double free of {} ignored", addr.offset());
            return Ok(());
        }
        let size = pool.chunk_size();
        if let Some(bytes) = self.arena.bytes_mut(addr, size) {
            bytes.fill(0);
        }
        self.pool_mut(handle)?.give_back(addr)
    }

    pub fn bump_allocate(&mut self, len: usize) -> Result<Addr, PoolError> {
        self.arena.bump_allocate(len)
    }

    /// Chunk from the smallest pool that fits `len` and has one spare.
    pub fn alloc_mem(&mut self, len: usize) -> Result<Addr, PoolError> {
        if len == 0 {
            return Err(PoolError::InvalidArgument);
        }
        let mut fits = false;
        let mut best: Option<usize> = None;
        for (i, pool) in self.pools.iter().enumerate() {
            if pool.chunk_size() < len {
                continue;
            }
            fits = true;
            if pool.free_count() == 0 {
                continue;
            }
            match best {
                Some(b) if self.pools[b].chunk_size() <= pool.chunk_size() => {}
                _ => best = Some(i),
            }
        }
        match best {
            Some(i) => self.pools[i].take(),
            None if fits => Err(PoolError::PoolExhausted),
            None => Err(PoolError::NoFittingPool),
        }
    }

    /// Free a chunk handed out by [`alloc_mem`](Self::alloc_mem).
    pub fn free_mem(&mut self, addr: Addr) -> Result<(), PoolError> {
        let handle = self.owner(addr).ok_or(PoolError::AddressNotInPool)?;
        self.free(handle, addr)
    }

    /// Free a chunk this crate allocated itself. Refusal means the pool
    /// bookkeeping is broken.
    pub(crate) fn release(&mut self, addr: Addr) {
        if let Err(e) = self.free_mem(addr) {
            error!("release of {} refused: {:?}", addr.offset(), e);
            fatal(Fatal::InvalidPoolFree);
        }
    }

    /// Pool whose range covers `addr`.
    pub fn owner(&self, addr: Addr) -> Option<PoolHandle> {
        self.pools
            .iter()
            .position(|p| p.contains(addr))
            .map(|i| PoolHandle(i as u8))
    }

    /// The whole chunk starting at `addr`.
    pub fn chunk(&self, addr: Addr) -> Result<&[u8], PoolError> {
        let pool = self.pool(self.owner(addr).ok_or(PoolError::AddressNotInPool)?)?;
        pool.check(addr)?;
        let size = pool.chunk_size();
        self.arena.bytes(addr, size).ok_or(PoolError::AddressNotInPool)
    }

    pub fn chunk_mut(&mut self, addr: Addr) -> Result<&mut [u8], PoolError> {
        let pool = self.pool(self.owner(addr).ok_or(PoolError::AddressNotInPool)?)?;
        pool.check(addr)?;
        let size = pool.chunk_size();
        self.arena.bytes_mut(addr, size).ok_or(PoolError::AddressNotInPool)
    }

    pub fn bytes(&self, addr: Addr, len: usize) -> Option<&[u8]> {
        self.arena.bytes(addr, len)
    }

    pub fn bytes_mut(&mut self, addr: Addr, len: usize) -> Option<&mut [u8]> {
        self.arena.bytes_mut(addr, len)
    }

    pub fn pool(&self, handle: PoolHandle) -> Result<&MemoryPool, PoolError> {
        self.pools.get(handle.0 as usize).ok_or(PoolError::InvalidHandle)
    }

    fn pool_mut(&mut self, handle: PoolHandle) -> Result<&mut MemoryPool, PoolError> {
        self.pools.get_mut(handle.0 as usize).ok_or(PoolError::InvalidHandle)
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Free chunks across every pool.
    pub fn free_total(&self) -> usize {
        self.pools.iter().map(MemoryPool::free_count).sum()
    }

    pub fn free_count(&self, handle: PoolHandle) -> Result<usize, PoolError> {
        Ok(self.pool(handle)?.free_count())
    }

    pub fn chunk_count(&self, handle: PoolHandle) -> Result<usize, PoolError> {
        Ok(self.pool(handle)?.chunk_count())
    }

    pub fn remaining(&self) -> usize {
        self.arena.remaining()
    }
}

impl<const N: usize> Default for PoolRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
