use std::{
  io,
  ops::{Deref, DerefMut},
  ptr::{self, NonNull},
};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};
use log::debug;

use crate::{allocator::Allocator, config::Config, error::SetupError};

/// Private anonymous memory obtained straight from the kernel.
struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  fn map(len: usize) -> io::Result<Self> {
    let addr = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };
    if addr == MAP_FAILED {
      return Err(io::Error::last_os_error());
    }
    let base = NonNull::new(addr.cast::<u8>()).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))?;
    Ok(Self { base, len })
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    unsafe { munmap(self.base.as_ptr().cast::<c_void>(), self.len) };
  }
}

/// An [`Allocator`] together with the arena memory it manages.
///
/// The arena is mapped once up front; after that no request reaches the
/// system allocator for the memory handed out. Dereferences to [`Allocator`].
pub struct Heap {
  allocator: Allocator,
  // dropped after `allocator`
  region: Region,
}

// SAFETY: the region is owned by the heap and only reached through the allocator
unsafe impl Send for Heap {}

impl Heap {
  /// Maps `config.arena_size` bytes and sets an allocator up over them.
  pub fn new(config: Config) -> Result<Self, SetupError> {
    config.validate()?;
    let region = Region::map(config.arena_size)?;
    // SAFETY: the mapping is exclusively ours and lives as long as the heap
    let allocator = unsafe { Allocator::setup(config, region.base)? };
    debug!("mapped {} byte arena at {:p}", region.len, region.base);
    Ok(Self { allocator, region })
  }

  /// Like [`Heap::new`] with the configuration taken from the environment.
  pub fn from_env() -> Result<Self, SetupError> {
    Self::new(Config::from_env()?)
  }

  pub fn len(&self) -> usize {
    self.region.len
  }
}

impl Deref for Heap {
  type Target = Allocator;

  fn deref(&self) -> &Allocator {
    &self.allocator
  }
}

impl DerefMut for Heap {
  fn deref_mut(&mut self) -> &mut Allocator {
    &mut self.allocator
  }
}

impl Drop for Heap {
  fn drop(&mut self) {
    self.allocator.cleanup();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Strategy;

  #[test]
  fn test_heap_memory_is_usable() {
    let mut heap = Heap::new(Config::default().with_arena_size(1 << 16)).unwrap();
    assert_eq!(heap.len(), 1 << 16);

    let ptr = heap.allocate(1000).unwrap();
    unsafe {
      ptr::write_bytes(ptr.as_ptr(), 0xAB, 1000);
      assert_eq!(*ptr.as_ptr().add(999), 0xAB);
      heap.release(ptr.as_ptr());
    }
    assert_eq!(heap.stats().free_blocks, 1);
  }

  #[test]
  fn test_slab_heap() {
    let mut heap = Heap::new(
      Config::default()
        .with_strategy(Strategy::Slab)
        .with_arena_size(1 << 16),
    )
    .unwrap();

    let a = heap.allocate(48).unwrap().cast::<[u64; 6]>();
    unsafe {
      a.write_unaligned([7; 6]);
      assert_eq!(a.read_unaligned(), [7; 6]);
    }
    assert_eq!(heap.stats().live_slabs, 1);
  }

  #[test]
  fn test_invalid_config() {
    let err = Heap::new(Config::default().with_min_chunk_size(3)).err().unwrap();
    assert!(matches!(err, SetupError::ChunkNotPowerOfTwo(3)));
  }
}
