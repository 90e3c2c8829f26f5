//! # arenalloc - Buddy and Slab Allocators over a Fixed Arena
//!
//! This crate manages one pre-allocated region of memory (the **arena**) and
//! serves `malloc`/`free`-style requests out of it. Nothing is requested from
//! the system allocator for the memory handed out.
//!
//! Two strategies share the same arena:
//!
//! - **Buddy**: every request gets a power-of-two block, split from larger
//!   free blocks and merged back with its buddy when released.
//! - **Slab**: every distinct request size gets slabs of fixed-size slots;
//!   each slab is itself one buddy block.
//!
//! ## Overview
//!
//! ```text
//!   Arena (8 KiB, 512 byte chunks):
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ order 4                              0                               │
//!   ├───────────────────────────────────┬──────────────────────────────────┤
//!   │ order 3            0              │ order 3          4096            │
//!   ├─────────────────┬─────────────────┼──────────────────────────────────┤
//!   │ order 2   0     │ order 2  2048   │                                  │
//!   ├────────┬────────┼─────────────────┤                                  │
//!   │ o1  0  │ o1 1024│                 │                                  │
//!   ├───┬────┼────────┤                 │                                  │
//!   │ 0 │512 │        │                 │                                  │
//!   └───┴────┴────────┴─────────────────┴──────────────────────────────────┘
//!
//!   Blocks are named by their offset from the arena base. The buddy of the
//!   block at `offset` with order `k` lives at `offset ^ (min_chunk << k)`.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   arenalloc
//!   ├── align      - Power-of-two helpers
//!   ├── arena      - Arena geometry, offset <-> pointer translation
//!   ├── block      - Tagged header written before every returned pointer
//!   ├── buddy      - BuddyAllocator
//!   ├── slab       - SlabAllocator (layered on BuddyAllocator)
//!   ├── allocator  - Allocator: setup / allocate / release / cleanup
//!   ├── config     - Config, Strategy, environment overrides
//!   ├── error      - SetupError
//!   ├── heap       - Heap: an Allocator over its own mmap'ed arena
//!   └── sync       - LockedAllocator: a Heap behind one mutex
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arenalloc::{Config, Heap, Strategy};
//!
//! let mut heap = Heap::new(
//!   Config::default()
//!     .with_strategy(Strategy::Slab)
//!     .with_arena_size(1 << 20),
//! )?;
//!
//! let ptr = heap.allocate(48).expect("arena exhausted");
//! unsafe {
//!   ptr.as_ptr().write_bytes(0, 48);
//!   heap.release(ptr.as_ptr());
//! }
//! # Ok::<(), arenalloc::SetupError>(())
//! ```
//!
//! ## Headers
//!
//! Every pointer handed out is preceded by `header_size` bytes whose first
//! eight hold a tag and a value:
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ tag: BUDY/SLAB  │  │  ┌──────────────────────────┐  │
//!   │  │ value: order or │  │  │                          │  │
//!   │  │   slab index    │  │  │     N bytes usable       │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │   header_size bytes   │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! Releasing a block rewrites its tag, so a second release of the same
//! pointer is recognized and ignored.
//!
//! ## Limitations
//!
//! - **Single owner**: an [`Allocator`] needs `&mut self`; share it through
//!   [`LockedAllocator`]
//! - **Fixed arena**: the arena never grows or shrinks
//! - **Raw bytes**: returned memory is only as aligned as the arena layout
//!   makes it; slab strides are not rounded
//!
//! ## Safety
//!
//! Setting an allocator up over caller-provided memory and releasing pointers
//! are `unsafe`: the allocator trusts the arena bounds it was given and the
//! headers in front of the pointers it receives.

pub mod align;
pub mod allocator;
pub mod arena;
pub mod block;
pub mod buddy;
pub mod config;
pub mod error;
pub mod heap;
pub mod slab;
pub mod sync;

pub use allocator::{Allocator, Stats};
pub use arena::Arena;
pub use block::BlockHeader;
pub use buddy::{BuddyAllocator, MAX_ORDER};
pub use config::{Config, Strategy};
pub use error::SetupError;
pub use heap::Heap;
pub use slab::{MAX_SLABS, SlabAllocator, SlabInfo};
pub use sync::LockedAllocator;
