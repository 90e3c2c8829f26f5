use std::ptr::NonNull;

use crate::config::Config;

/// The contiguous region an allocator carves up, addressed by byte offsets.
///
/// Bookkeeping inside the allocators never stores addresses: every block is
/// an offset from `base`, and only `allocate`/`release` translate between
/// offsets and pointers.
#[derive(Debug, Clone, Copy)]
pub struct Arena {
  base: NonNull<u8>,
  size: usize,
  header_size: usize,
  min_chunk_size: usize,
  objects_per_slab: usize,
}

impl Arena {
  /// Describes the `config.arena_size` bytes starting at `base`.
  ///
  /// # Safety
  ///
  /// `base` must be valid for reads and writes of `config.arena_size` bytes
  /// for as long as the arena is in use, and nothing else may access that
  /// memory except through pointers handed out by the allocator.
  pub unsafe fn new(
    base: NonNull<u8>,
    config: &Config,
  ) -> Self {
    Self {
      base,
      size: config.arena_size,
      header_size: config.header_size,
      min_chunk_size: config.min_chunk_size,
      objects_per_slab: config.objects_per_slab,
    }
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn header_size(&self) -> usize {
    self.header_size
  }

  pub fn min_chunk_size(&self) -> usize {
    self.min_chunk_size
  }

  pub fn objects_per_slab(&self) -> usize {
    self.objects_per_slab
  }

  /// Bytes covered by a block of `order`.
  #[inline]
  pub fn block_size(
    &self,
    order: usize,
  ) -> usize {
    self.min_chunk_size << order
  }

  /// Translates an in-arena offset into an address.
  ///
  /// # Panics
  ///
  /// Panics in debug builds if `offset` lies outside the arena.
  #[inline]
  pub fn pointer(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset < self.size);
    // SAFETY: offsets are only ever produced inside [0, size)
    unsafe { self.base.add(offset) }
  }

  /// Translates an address back into an offset, if it points into the arena.
  #[inline]
  pub fn offset_of(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    let offset = (ptr as usize).checked_sub(self.base.as_ptr() as usize)?;
    (offset < self.size).then_some(offset)
  }

  /// Address handed to the caller for a block starting at `offset`.
  #[inline]
  pub fn user_pointer(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    // SAFETY: every block is larger than its header
    unsafe { self.pointer(offset).add(self.header_size) }
  }

  /// Offset of the block whose user pointer is `ptr`.
  ///
  /// Returns `None` when the header would fall outside the arena.
  #[inline]
  pub fn block_offset(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    self.offset_of(ptr)?.checked_sub(self.header_size)
  }
}
