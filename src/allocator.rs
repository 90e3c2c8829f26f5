use std::ptr::NonNull;

use log::{debug, warn};

use crate::{
  arena::Arena,
  buddy::BuddyAllocator,
  config::{Config, Strategy},
  error::SetupError,
  slab::SlabAllocator,
};

/// Point-in-time view of an allocator's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
  pub strategy: Strategy,
  pub max_order: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub live_slabs: usize,
}

/// Routes `allocate`/`release` to the buddy allocator, or to slabs carved
/// out of it, depending on the configured [`Strategy`].
#[derive(Debug)]
pub struct Allocator {
  arena: Arena,
  strategy: Strategy,
  buddy: BuddyAllocator,
  slab: Option<SlabAllocator>,
}

// SAFETY: the arena pointer is only dereferenced through `&mut self`, and
// whoever set the allocator up promised exclusive access to the region
unsafe impl Send for Allocator {}

impl Allocator {
  /// Sets up an allocator over the `config.arena_size` bytes at `base`.
  ///
  /// The buddy allocator is always initialized; the slab allocator is layered
  /// on top when `config.strategy` is [`Strategy::Slab`].
  ///
  /// # Safety
  ///
  /// `base` must be valid for reads and writes of `config.arena_size` bytes
  /// until the allocator is dropped, and the region must not be accessed
  /// other than through pointers the allocator hands out.
  pub unsafe fn setup(
    config: Config,
    base: NonNull<u8>,
  ) -> Result<Self, SetupError> {
    config.validate()?;

    let arena = unsafe { Arena::new(base, &config) };
    let buddy = BuddyAllocator::new(&arena);
    let slab = match config.strategy {
      Strategy::Buddy => None,
      Strategy::Slab => Some(SlabAllocator::new()),
    };

    debug!(
      "set up {:?} allocator over {} bytes at {:p}, max order {}",
      config.strategy,
      config.arena_size,
      base,
      buddy.max_order()
    );

    Ok(Self {
      arena,
      strategy: config.strategy,
      buddy,
      slab,
    })
  }

  pub fn strategy(&self) -> Strategy {
    self.strategy
  }

  pub fn arena(&self) -> &Arena {
    &self.arena
  }

  pub fn buddy(&self) -> &BuddyAllocator {
    &self.buddy
  }

  pub fn slab(&self) -> Option<&SlabAllocator> {
    self.slab.as_ref()
  }

  /// Returns `size` usable bytes, or `None` if `size` is zero or the arena
  /// has nothing left that fits.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    match self.slab.as_mut() {
      Some(slab) => slab.allocate(&self.arena, &mut self.buddy, size),
      None => self.buddy.allocate(&self.arena, size),
    }
  }

  /// Gives back memory obtained from [`Allocator::allocate`].
  ///
  /// Null pointers, pointers outside the arena, and pointers whose header
  /// does not describe a live allocation are ignored.
  ///
  /// # Safety
  ///
  /// If `ptr` points into the arena it must be a pointer returned by
  /// [`Allocator::allocate`] on this allocator, and it must not be used after
  /// this call.
  pub unsafe fn release(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(ptr) = NonNull::new(ptr) else {
      return;
    };
    if self.arena.block_offset(ptr.as_ptr()).is_none() {
      warn!("release of {ptr:p}: outside the arena");
      return;
    }

    match self.slab.as_mut() {
      Some(slab) => unsafe { slab.release(&self.arena, &mut self.buddy, ptr) },
      None => unsafe { self.buddy.release(&self.arena, ptr) },
    }
  }

  /// Tears the slab layer down first, then the buddy free lists.
  ///
  /// Every later `allocate` fails. The arena memory is not touched.
  pub fn cleanup(&mut self) {
    if let Some(slab) = self.slab.as_mut() {
      slab.teardown(&self.arena, &mut self.buddy);
    }
    self.buddy.teardown();
    debug!("cleaned up allocator at {:p}", self.arena.base());
  }

  pub fn stats(&self) -> Stats {
    Stats {
      strategy: self.strategy,
      max_order: self.buddy.max_order(),
      free_blocks: self.buddy.free_block_count(),
      free_bytes: self.buddy.free_bytes(&self.arena),
      live_slabs: self.slab.as_ref().map_or(0, SlabAllocator::live_slabs),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn setup(
    memory: &mut [u8],
    config: Config,
  ) -> Allocator {
    let base = NonNull::new(memory.as_mut_ptr()).unwrap();
    unsafe { Allocator::setup(config.with_arena_size(memory.len()), base) }.unwrap()
  }

  #[test]
  fn test_setup_rejects_bad_geometry() {
    let mut memory = vec![0u8; 256];
    let base = NonNull::new(memory.as_mut_ptr()).unwrap();
    let config = Config::default().with_arena_size(memory.len());

    let err = unsafe { Allocator::setup(config, base) }.unwrap_err();
    assert!(matches!(err, SetupError::ArenaTooSmall { .. }));
  }

  #[test]
  fn test_buddy_dispatch() {
    let mut memory = vec![0u8; 8192];
    let mut allocator = setup(&mut memory, Config::default());
    assert!(allocator.slab().is_none());

    let ptr = allocator.allocate(500).unwrap();
    assert_eq!(allocator.stats().free_bytes, 8192 - 512);

    unsafe { allocator.release(ptr.as_ptr()) };
    assert_eq!(
      allocator.stats(),
      Stats {
        strategy: Strategy::Buddy,
        max_order: 4,
        free_blocks: 1,
        free_bytes: 8192,
        live_slabs: 0,
      }
    );
  }

  #[test]
  fn test_slab_dispatch() {
    let mut memory = vec![0u8; 1 << 16];
    let mut allocator = setup(
      &mut memory,
      Config::default()
        .with_strategy(Strategy::Slab)
        .with_objects_per_slab(4),
    );

    let a = allocator.allocate(24).unwrap();
    let b = allocator.allocate(24).unwrap();
    assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 32);
    assert_eq!(allocator.stats().live_slabs, 1);

    unsafe {
      allocator.release(a.as_ptr());
      allocator.release(b.as_ptr());
    }
    assert_eq!(allocator.stats().live_slabs, 0);
    assert_eq!(allocator.stats().free_blocks, 1);
  }

  #[test]
  fn test_release_ignores_null_and_foreign() {
    let mut memory = vec![0u8; 8192];
    let mut allocator = setup(&mut memory, Config::default());
    let mut outside = [0u8; 16];

    let ptr = allocator.allocate(10).unwrap();
    let before = allocator.stats();
    unsafe {
      allocator.release(std::ptr::null_mut());
      allocator.release(outside.as_mut_ptr().add(8));
    }
    assert_eq!(allocator.stats(), before);

    unsafe { allocator.release(ptr.as_ptr()) };
    assert_eq!(allocator.stats().free_blocks, 1);
  }

  #[test]
  fn test_zero_size() {
    let mut memory = vec![0u8; 8192];
    let mut allocator = setup(&mut memory, Config::default().with_strategy(Strategy::Slab));

    assert!(allocator.allocate(0).is_none());
    assert_eq!(allocator.stats().live_slabs, 0);
  }

  #[test]
  fn test_cleanup() {
    let mut memory = vec![0u8; 1 << 16];
    let mut allocator = setup(&mut memory, Config::default().with_strategy(Strategy::Slab));

    allocator.allocate(10).unwrap();
    allocator.allocate(99).unwrap();
    allocator.cleanup();

    assert_eq!(allocator.stats().live_slabs, 0);
    assert_eq!(allocator.stats().free_blocks, 0);
    assert!(allocator.allocate(10).is_none());

    allocator.cleanup();
  }
}
