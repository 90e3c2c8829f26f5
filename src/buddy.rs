use std::{collections::BTreeSet, ptr::NonNull};

use log::{trace, warn};

use crate::{
  align::{is_aligned, next_pow2, order_of},
  arena::Arena,
  block::BlockHeader,
};

/// Upper bound on the number of orders an arena can have.
pub const MAX_ORDER: usize = 32;

/// Power-of-two allocator over an [`Arena`].
///
/// ```text
///   order 2  ┌───────────────────────────────────────────────┐
///            │                       0                       │
///            └───────────────────────┬───────────────────────┘
///                          split     │
///   order 1  ┌───────────────────────┴───┬───────────────────┐
///            │             0             │       1024        │ ← free
///            └─────────────┬─────────────┴───────────────────┘
///                  split   │
///   order 0  ┌─────────────┴─┬───────────┐
///            │       0       │    512    │ ← free
///            └───────────────┴───────────┘
///                    ▲
///                    └── handed out
/// ```
///
/// Each order keeps the offsets of its free blocks in ascending order, so
/// the lowest block is always the one handed out and merging can look a
/// buddy up by its exact offset.
#[derive(Debug)]
pub struct BuddyAllocator {
  free_lists: [BTreeSet<usize>; MAX_ORDER],
  max_order: usize,
}

impl BuddyAllocator {
  /// Starts with the whole arena as one free block at the highest order.
  ///
  /// Only the largest power-of-two number of chunks that fits is managed.
  pub fn new(arena: &Arena) -> Self {
    let chunks = arena.size() / arena.min_chunk_size();
    let max_order = match chunks.checked_ilog2() {
      Some(order) => (order as usize).min(MAX_ORDER - 1),
      None => 0,
    };

    let mut allocator = Self {
      free_lists: std::array::from_fn(|_| BTreeSet::new()),
      max_order,
    };

    if chunks > 0 {
      allocator.free_lists[max_order].insert(0);
    }
    allocator
  }

  pub fn max_order(&self) -> usize {
    self.max_order
  }

  /// Free block offsets at `order`, lowest first.
  pub fn free_offsets(
    &self,
    order: usize,
  ) -> impl Iterator<Item = usize> + '_ {
    self
      .free_lists
      .get(order)
      .into_iter()
      .flat_map(|list| list.iter().copied())
  }

  pub fn free_block_count(&self) -> usize {
    self.free_lists.iter().map(BTreeSet::len).sum()
  }

  pub fn free_bytes(
    &self,
    arena: &Arena,
  ) -> usize {
    self
      .free_lists
      .iter()
      .enumerate()
      .map(|(order, list)| list.len() * arena.block_size(order))
      .sum()
  }

  /// Order of the smallest block able to hold `user_size` bytes plus a header.
  fn order_for(
    &self,
    arena: &Arena,
    user_size: usize,
  ) -> Option<usize> {
    let need = user_size
      .checked_add(arena.header_size())?
      .max(arena.min_chunk_size());
    let block = next_pow2(need)?;
    let order = order_of(block, arena.min_chunk_size());
    (order <= self.max_order).then_some(order)
  }

  /// Takes a free block of exactly `want_order`, splitting a larger one if needed.
  fn take_block(
    &mut self,
    arena: &Arena,
    want_order: usize,
  ) -> Option<usize> {
    if let Some(offset) = self.free_lists[want_order].pop_first() {
      return Some(offset);
    }

    let mut order = (want_order + 1..=self.max_order).find(|&o| !self.free_lists[o].is_empty())?;
    let offset = self.free_lists[order].pop_first()?;

    while order > want_order {
      let half = arena.block_size(order) >> 1;
      order -= 1;
      self.free_lists[order].insert(offset + half);
      trace!("split block {offset:#x} into order {order}, right half {:#x} free", offset + half);
    }

    Some(offset)
  }

  /// Hands out a block able to hold `user_size` bytes.
  ///
  /// Returns `None` for zero-sized requests or when no block of a large
  /// enough order is free.
  pub fn allocate(
    &mut self,
    arena: &Arena,
    user_size: usize,
  ) -> Option<NonNull<u8>> {
    let offset = self.allocate_block(arena, user_size)?;
    Some(arena.user_pointer(offset))
  }

  /// Like [`BuddyAllocator::allocate`], returning the offset of the block
  /// start (its header) instead of the user pointer.
  pub fn allocate_block(
    &mut self,
    arena: &Arena,
    user_size: usize,
  ) -> Option<usize> {
    if user_size == 0 {
      return None;
    }

    let order = self.order_for(arena, user_size)?;
    let offset = self.take_block(arena, order)?;

    let block = arena.pointer(offset);
    // SAFETY: the block lies inside the arena and is at least one chunk long
    unsafe { BlockHeader::Buddy { order: order as u32 }.write(block) };

    trace!("buddy allocate {user_size} bytes -> offset {offset:#x}, order {order}");
    Some(offset)
  }

  /// Returns the block behind `ptr`, merging it with free buddies.
  ///
  /// Pointers whose header does not describe a live buddy block are ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must point into `arena` and, if it is a live buddy block, must
  /// have been returned by [`BuddyAllocator::allocate`] on this allocator.
  pub unsafe fn release(
    &mut self,
    arena: &Arena,
    ptr: NonNull<u8>,
  ) {
    let Some(offset) = arena.block_offset(ptr.as_ptr()) else {
      warn!("buddy release of {ptr:p}: no room for a header");
      return;
    };
    let block = arena.pointer(offset);

    let order = match unsafe { BlockHeader::read(block) } {
      Some(BlockHeader::Buddy { order }) => order as usize,
      other => {
        warn!("buddy release of {ptr:p}: header is {other:?}");
        return;
      }
    };
    if order > self.max_order || !is_aligned(offset, arena.block_size(order)) {
      warn!("buddy release of {ptr:p}: corrupt order {order} at offset {offset:#x}");
      return;
    }

    unsafe { BlockHeader::mark_released(block) };
    self.insert_merged(arena, offset, order);
  }

  /// Frees the block at `offset`, absorbing free buddies on the way up.
  fn insert_merged(
    &mut self,
    arena: &Arena,
    mut offset: usize,
    mut order: usize,
  ) {
    while order < self.max_order {
      let buddy = offset ^ arena.block_size(order);
      if !self.free_lists[order].remove(&buddy) {
        break;
      }
      trace!("merge {offset:#x} with buddy {buddy:#x} at order {order}");
      offset = offset.min(buddy);
      order += 1;
    }
    self.free_lists[order].insert(offset);
  }

  /// Drops every free-list record. The arena memory itself is left untouched.
  pub fn teardown(&mut self) {
    for list in &mut self.free_lists {
      list.clear();
    }
  }
}
