use std::{io::Read, ptr::NonNull};

use arenalloc::{Allocator, BlockHeader, Config, Heap, SetupError, Strategy};

/// Waits until the user presses ENTER.
/// Gives you time to look at the printed free lists before the next step.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the free blocks of every order, lowest offset first.
fn print_free_lists(
  label: &str,
  allocator: &Allocator,
) {
  println!("[{}] free lists:", label);
  let buddy = allocator.buddy();
  for order in 0..=buddy.max_order() {
    let offsets: Vec<String> = buddy.free_offsets(order).map(|o| format!("{o:#x}")).collect();
    if !offsets.is_empty() {
      let size = allocator.arena().block_size(order);
      println!("  order {order} ({size:>6} bytes): {}", offsets.join(", "));
    }
  }
}

/// Prints the header sitting in front of `ptr`.
fn print_alloc(
  allocator: &Allocator,
  size: usize,
  ptr: NonNull<u8>,
) {
  let arena = allocator.arena();
  let offset = arena.block_offset(ptr.as_ptr()).unwrap();
  let header = unsafe { BlockHeader::read(arena.pointer(offset)) };
  println!("Allocated {size} bytes, address = {ptr:?}, offset = {offset:#x}, header = {header:?}");
}

fn main() -> Result<(), SetupError> {
  // Geometry can be overridden through ARENALLOC_* variables; the buddy
  // walkthrough below assumes the small arena configured here.
  let config = Config::default()
    .with_arena_size(8192)
    .with_min_chunk_size(512)
    .with_header_size(8);

  // --------------------------------------------------------------------
  // 1) Buddy mode: one 8 KiB block at order 4.
  // --------------------------------------------------------------------
  let mut heap = Heap::new(config)?;
  print_free_lists("start", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) 500 bytes + 8 byte header fit one 512 byte chunk.
  //    The 8 KiB block is split down to order 0 on the way.
  // --------------------------------------------------------------------
  let first = heap.allocate(500).unwrap();
  println!("\n[2] Allocate 500 bytes");
  print_alloc(&heap, 500, first);
  print_free_lists("after split", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A second small block takes the buddy of the first.
  // --------------------------------------------------------------------
  let second = heap.allocate(100).unwrap();
  println!("\n[3] Allocate 100 bytes");
  print_alloc(&heap, 100, second);
  print_free_lists("after second", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Releasing both merges the pair, then all the way back up.
  // --------------------------------------------------------------------
  unsafe {
    heap.release(first.as_ptr());
    print_free_lists("first released", &heap);
    heap.release(second.as_ptr());
  }
  print_free_lists("both released", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Slab mode: same-sized objects sit next to each other.
  // --------------------------------------------------------------------
  drop(heap);
  let mut heap = Heap::new(
    Config::from_env()?
      .with_strategy(Strategy::Slab)
      .with_objects_per_slab(4),
  )?;

  let objects: Vec<_> = (0..5).map(|_| heap.allocate(24).unwrap()).collect();
  println!("\n[5] Allocate five 24 byte objects, four per slab");
  for ptr in &objects {
    print_alloc(&heap, 24, *ptr);
  }
  println!("[5] live slabs = {}", heap.stats().live_slabs);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Releasing the first four empties the first slab; its buddy block
  //    goes back to the free lists while the second slab stays alive.
  // --------------------------------------------------------------------
  for ptr in &objects[..4] {
    unsafe { heap.release(ptr.as_ptr()) };
  }
  println!("\n[6] Released the first four");
  println!("[6] stats = {:?}", heap.stats());

  println!("\n[7] End of example. Dropping the heap unmaps the arena.");
  Ok(())
}
