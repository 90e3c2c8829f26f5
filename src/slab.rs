use std::ptr::NonNull;

use log::{debug, warn};

use crate::{arena::Arena, block::BlockHeader, buddy::BuddyAllocator};

/// Capacity of the slab descriptor table.
pub const MAX_SLABS: usize = 4096;

/// One buddy block cut into `capacity` slots of `stride` bytes.
///
/// ```text
///   slab_offset
///   │
///   ▼
///   ┌────────┬──────────────┬──────────────┬─────┬──────────────┐
///   │ buddy  │   slot 0     │   slot 1     │ ... │ slot cap-1   │
///   │ header │ hdr │ object │ hdr │ object │     │ hdr │ object │
///   └────────┴──────────────┴──────────────┴─────┴──────────────┘
///            ◄─── stride ──►
/// ```
#[derive(Debug)]
struct Slab {
  offset: usize,
  stride: usize,
  capacity: usize,
  used: usize,
  free: Vec<usize>,
}

impl Slab {
  /// Offset of slot 0, right after the buddy header of the backing block.
  fn first_slot(
    &self,
    arena: &Arena,
  ) -> usize {
    self.offset + arena.header_size()
  }

  /// Whether `slot` is the start of one of this slab's slots.
  fn owns_slot(
    &self,
    arena: &Arena,
    slot: usize,
  ) -> bool {
    let Some(rel) = slot.checked_sub(self.first_slot(arena)) else {
      return false;
    };
    rel % self.stride == 0 && rel / self.stride < self.capacity
  }

  fn is_reclaimable(&self) -> bool {
    self.used == 0 && self.free.len() == self.capacity
  }
}

/// Read-only snapshot of one live slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabInfo {
  /// Offset of the buddy block backing the slab.
  pub offset: usize,
  pub stride: usize,
  pub capacity: usize,
  pub used: usize,
  pub free: usize,
}

/// Fixed-size object allocator layered on a [`BuddyAllocator`].
///
/// Every distinct request size gets its own slabs; slots are handed out from
/// a per-slab stack of free offsets and a slab's backing block goes back to
/// the buddy allocator as soon as its last object is released.
#[derive(Debug, Default)]
pub struct SlabAllocator {
  slabs: Vec<Option<Slab>>,
}

impl SlabAllocator {
  pub fn new() -> Self {
    Self { slabs: Vec::new() }
  }

  /// Number of descriptor slots ever used, alive or dead.
  pub fn slab_count(&self) -> usize {
    self.slabs.len()
  }

  pub fn live_slabs(&self) -> usize {
    self.slabs.iter().flatten().count()
  }

  /// Snapshot of the slab at `index`, or `None` if that slot is dead.
  pub fn slab(
    &self,
    index: usize,
  ) -> Option<SlabInfo> {
    let slab = self.slabs.get(index)?.as_ref()?;
    Some(SlabInfo {
      offset: slab.offset,
      stride: slab.stride,
      capacity: slab.capacity,
      used: slab.used,
      free: slab.free.len(),
    })
  }

  /// First live slab of `stride` with a free slot, in table order.
  fn find_slab(
    &self,
    stride: usize,
  ) -> Option<usize> {
    self.slabs.iter().position(|slab| {
      slab
        .as_ref()
        .is_some_and(|s| s.stride == stride && !s.free.is_empty())
    })
  }

  /// Carves a fresh buddy block into slots of `stride` bytes.
  fn create_slab(
    &mut self,
    arena: &Arena,
    buddy: &mut BuddyAllocator,
    stride: usize,
  ) -> Option<usize> {
    let index = match self.slabs.iter().position(Option::is_none) {
      Some(index) => index,
      None if self.slabs.len() < MAX_SLABS => {
        self.slabs.push(None);
        self.slabs.len() - 1
      }
      None => {
        debug!("slab table full, cannot create slab of stride {stride}");
        return None;
      }
    };

    let capacity = arena.objects_per_slab();
    let Some(offset) = capacity
      .checked_mul(stride)
      .and_then(|bytes| buddy.allocate_block(arena, bytes))
    else {
      debug!("no backing block for {capacity} objects of stride {stride}");
      self.trim_dead_tail();
      return None;
    };

    let mut slab = Slab {
      offset,
      stride,
      capacity,
      used: 0,
      free: Vec::with_capacity(capacity),
    };
    let first = slab.first_slot(arena);
    slab.free.extend((0..capacity).rev().map(|i| first + i * stride));

    debug!("created slab {index} at {offset:#x}: {capacity} slots of {stride} bytes");
    self.slabs[index] = Some(slab);
    Some(index)
  }

  /// Drops trailing dead descriptors left behind by a failed creation.
  fn trim_dead_tail(&mut self) {
    while matches!(self.slabs.last(), Some(None)) {
      self.slabs.pop();
    }
  }

  /// Hands out one object slot able to hold `user_size` bytes.
  pub fn allocate(
    &mut self,
    arena: &Arena,
    buddy: &mut BuddyAllocator,
    user_size: usize,
  ) -> Option<NonNull<u8>> {
    if user_size == 0 {
      return None;
    }
    let stride = user_size.checked_add(arena.header_size())?;

    let index = match self.find_slab(stride) {
      Some(index) => index,
      None => self.create_slab(arena, buddy, stride)?,
    };
    let slab = self.slabs[index].as_mut()?;
    let slot = slab.free.pop()?;
    slab.used += 1;

    // SAFETY: the slot lies inside the slab's backing block
    unsafe { BlockHeader::Slab { index: index as u32 }.write(arena.pointer(slot)) };
    Some(arena.user_pointer(slot))
  }

  /// Puts the slot behind `ptr` back on its slab's free stack.
  ///
  /// Releases that do not match a live slot of a live slab are ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must point into `arena` and, if it is a live slab object, must
  /// have been returned by [`SlabAllocator::allocate`] on this allocator.
  pub unsafe fn release(
    &mut self,
    arena: &Arena,
    buddy: &mut BuddyAllocator,
    ptr: NonNull<u8>,
  ) {
    let Some(slot) = arena.block_offset(ptr.as_ptr()) else {
      warn!("slab release of {ptr:p}: no room for a header");
      return;
    };
    let header = arena.pointer(slot);

    let index = match unsafe { BlockHeader::read(header) } {
      Some(BlockHeader::Slab { index }) => index as usize,
      other => {
        warn!("slab release of {ptr:p}: header is {other:?}");
        return;
      }
    };
    let Some(slab) = self.slabs.get_mut(index).and_then(Option::as_mut) else {
      warn!("slab release of {ptr:p}: slab {index} is not alive");
      return;
    };
    if !slab.owns_slot(arena, slot) || slab.used == 0 {
      warn!("slab release of {ptr:p}: offset {slot:#x} is not a slot of slab {index}");
      return;
    }

    unsafe { BlockHeader::mark_released(header) };
    slab.free.push(slot);
    slab.used -= 1;

    if slab.is_reclaimable() {
      let backing = arena.user_pointer(slab.offset);
      debug!("slab {index} empty, returning {:#x} to buddy", slab.offset);
      self.slabs[index] = None;
      unsafe { buddy.release(arena, backing) };
    }
  }

  /// Returns every live slab's backing block to `buddy` and empties the table.
  pub fn teardown(
    &mut self,
    arena: &Arena,
    buddy: &mut BuddyAllocator,
  ) {
    for slab in self.slabs.drain(..).flatten() {
      // SAFETY: backing blocks were produced by this buddy allocator
      unsafe { buddy.release(arena, arena.user_pointer(slab.offset)) };
    }
  }
}
