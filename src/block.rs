use std::{mem, ptr::NonNull};

use static_assertions::const_assert_eq;

/// Tag of a block handed out by the buddy allocator ("BUDY").
pub const BUDDY_MAGIC: u32 = 0x4255_4459;
/// Tag of an object slot handed out by the slab allocator ("SLAB").
pub const SLAB_MAGIC: u32 = 0x534C_4142;
/// Tag left behind once a block has been released ("FREE").
pub const RELEASED_MAGIC: u32 = 0x4652_4545;

/// On-arena layout of a header: a tag followed by a tag-specific value.
#[repr(C)]
struct RawHeader {
  tag: u32,
  value: u32,
}

const_assert_eq!(mem::size_of::<RawHeader>(), 8);
const_assert_eq!(mem::size_of::<RawHeader>(), BlockHeader::SIZE);

/// Metadata written immediately before every pointer returned to a caller.
///
/// ```text
///   block start                     returned pointer
///   │                               │
///   ▼                               ▼
///   ┌────────┬────────┬─────────────┬──────────────────────┐
///   │  tag   │ value  │  (padding)  │      user bytes      │
///   │  u32   │  u32   │             │                      │
///   └────────┴────────┴─────────────┴──────────────────────┘
///   ◄───────── header_size ────────►
/// ```
///
/// The tag tells which allocator produced the block, so recovering the header
/// never depends on remembering the mode that was active at allocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockHeader {
  /// A buddy block of the given order.
  Buddy { order: u32 },
  /// An object slot owned by the slab at `index` in the descriptor table.
  Slab { index: u32 },
}

impl BlockHeader {
  /// Bytes occupied by the tag/value pair. `header_size` may be larger.
  pub const SIZE: usize = mem::size_of::<RawHeader>();

  /// Decodes the header stored at `block`.
  ///
  /// Returns `None` for released blocks or anything without a known tag.
  ///
  /// # Safety
  ///
  /// `block` must be valid for reading [`BlockHeader::SIZE`] bytes.
  pub unsafe fn read(block: NonNull<u8>) -> Option<Self> {
    let raw = unsafe { block.cast::<RawHeader>().read_unaligned() };
    match raw.tag {
      BUDDY_MAGIC => Some(BlockHeader::Buddy { order: raw.value }),
      SLAB_MAGIC => Some(BlockHeader::Slab { index: raw.value }),
      _ => None,
    }
  }

  /// Encodes `self` at `block`.
  ///
  /// # Safety
  ///
  /// `block` must be valid for writing [`BlockHeader::SIZE`] bytes.
  pub unsafe fn write(
    self,
    block: NonNull<u8>,
  ) {
    let raw = match self {
      BlockHeader::Buddy { order } => RawHeader {
        tag: BUDDY_MAGIC,
        value: order,
      },
      BlockHeader::Slab { index } => RawHeader {
        tag: SLAB_MAGIC,
        value: index,
      },
    };
    unsafe { block.cast::<RawHeader>().write_unaligned(raw) };
  }

  /// Overwrites the tag at `block` so a later [`BlockHeader::read`] yields `None`.
  ///
  /// # Safety
  ///
  /// `block` must be valid for writing [`BlockHeader::SIZE`] bytes.
  pub unsafe fn mark_released(block: NonNull<u8>) {
    unsafe { block.cast::<u32>().write_unaligned(RELEASED_MAGIC) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_tags() {
    let mut buf = [0u8; 16];
    // odd offset: slab strides are not rounded, headers can land anywhere
    let block = NonNull::new(buf[3..].as_mut_ptr()).unwrap();

    unsafe {
      assert_eq!(BlockHeader::read(block), None);

      BlockHeader::Buddy { order: 7 }.write(block);
      assert_eq!(BlockHeader::read(block), Some(BlockHeader::Buddy { order: 7 }));

      BlockHeader::Slab { index: 42 }.write(block);
      assert_eq!(BlockHeader::read(block), Some(BlockHeader::Slab { index: 42 }));

      BlockHeader::mark_released(block);
      assert_eq!(BlockHeader::read(block), None);
    }

    assert_eq!(&buf[3..7], &RELEASED_MAGIC.to_ne_bytes());
  }

  #[test]
  fn test_buddy_and_slab_tags_differ() {
    let mut buf = [0u8; 8];
    let block = NonNull::new(buf.as_mut_ptr()).unwrap();

    unsafe {
      BlockHeader::Buddy { order: 3 }.write(block);
      assert!(matches!(BlockHeader::read(block), Some(BlockHeader::Buddy { .. })));
    }
    assert_eq!(&buf[..4], &BUDDY_MAGIC.to_ne_bytes());
    assert_eq!(&buf[4..], &3u32.to_ne_bytes());
  }
}
