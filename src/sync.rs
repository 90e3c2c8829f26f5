use std::ptr::NonNull;

use parking_lot::{Mutex, MutexGuard};

use crate::{allocator::Stats, config::Config, error::SetupError, heap::Heap};

/// A [`Heap`] shared between threads behind one coarse lock.
///
/// The slab layer calls into the buddy layer, so both sit under the same
/// mutex; every call holds it for its full duration.
pub struct LockedAllocator {
  inner: Mutex<Heap>,
}

impl LockedAllocator {
  pub fn new(config: Config) -> Result<Self, SetupError> {
    Ok(Self::from_heap(Heap::new(config)?))
  }

  pub fn from_heap(heap: Heap) -> Self {
    Self {
      inner: Mutex::new(heap),
    }
  }

  pub fn allocate(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.inner.lock().allocate(size)
  }

  /// # Safety
  ///
  /// Same contract as [`crate::Allocator::release`].
  pub unsafe fn release(
    &self,
    ptr: *mut u8,
  ) {
    unsafe { self.inner.lock().release(ptr) }
  }

  pub fn stats(&self) -> Stats {
    self.inner.lock().stats()
  }

  /// Holds the lock across several operations.
  pub fn lock(&self) -> MutexGuard<'_, Heap> {
    self.inner.lock()
  }

  pub fn into_inner(self) -> Heap {
    self.inner.into_inner()
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, thread};

  use super::*;
  use crate::config::Strategy;

  #[test]
  fn test_threads_share_one_arena() {
    let locked = Arc::new(
      LockedAllocator::new(
        Config::default()
          .with_strategy(Strategy::Slab)
          .with_arena_size(1 << 20)
          .with_objects_per_slab(16),
      )
      .unwrap(),
    );

    let handles: Vec<_> = (0..4)
      .map(|t| {
        let locked = Arc::clone(&locked);
        thread::spawn(move || {
          let size = 16 + t * 8;
          let mut addrs = Vec::new();
          for i in 0..100 {
            let ptr = locked.allocate(size).unwrap();
            unsafe { ptr.as_ptr().write_bytes(i as u8, size) };
            addrs.push(ptr.as_ptr() as usize);
          }
          for (i, addr) in addrs.into_iter().enumerate() {
            let ptr = addr as *mut u8;
            assert!(unsafe { std::slice::from_raw_parts(ptr, size) }.iter().all(|&b| b == i as u8));
            unsafe { locked.release(ptr) };
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    let stats = locked.stats();
    assert_eq!(stats.live_slabs, 0);
    assert_eq!(stats.free_blocks, 1);
  }

  #[test]
  fn test_lock_spans_operations() {
    let locked = LockedAllocator::new(Config::default().with_arena_size(1 << 14)).unwrap();
    {
      let mut heap = locked.lock();
      let a = heap.allocate(100).unwrap();
      let b = heap.allocate(100).unwrap();
      unsafe {
        heap.release(a.as_ptr());
        heap.release(b.as_ptr());
      }
    }
    assert_eq!(locked.into_inner().stats().free_blocks, 1);
  }
}
