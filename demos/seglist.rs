//! Narrated walkthrough of the segregated free-list allocator.
//!
//! Run with `cargo run --example seglist`. Pauses between steps so the
//! program break and heap contents can be inspected with `cat /proc/<pid>/maps`
//! in another terminal, the same way the teacher's original `bump` example
//! did for the simpler bump allocator.

use sflalloc::Allocator;
use std::io::{self, Write};

fn pause(step: &str) {
  print!("\n-- {step} -- press enter to continue --");
  io::stdout().flush().unwrap();
  let mut buf = String::new();
  io::stdin().read_line(&mut buf).ok();
}

fn program_break() -> *mut libc::c_void {
  unsafe { libc::sbrk(0) }
}

fn main() {
  println!("program break before init: {:?}", program_break());

  let mut alloc = Allocator::new();
  assert!(alloc.initialize(), "initial sbrk extension failed");
  println!("program break after init:  {:?}", program_break());
  pause("allocator initialized, one big free block sits after the prologue");

  let a = alloc.allocate(64);
  alloc.dbg_alloc("a", 64, a);
  pause("allocated a (64 bytes)");

  let b = alloc.allocate(16);
  alloc.dbg_alloc("b", 16, b);
  pause("allocated b (16 bytes, split at the low address since it's under the split threshold)");

  let c = alloc.allocate(512);
  alloc.dbg_alloc("c", 512, c);
  pause("allocated c (512 bytes)");

  alloc.print_heap();
  pause("heap dump above: a, b, c, then one trailing free block");

  unsafe { alloc.free(b) };
  println!("freed b");
  alloc.print_heap();
  pause("b is free; its neighbors are both allocated, so it just sits in its class list");

  unsafe { alloc.free(a) };
  println!("freed a");
  alloc.print_heap();
  pause("a is free and adjacent to free b: coalesced into one larger free block");

  let grown = unsafe { alloc.reallocate(c, 4096) };
  println!("reallocate c -> {grown:?}");
  alloc.print_heap();
  pause("c grew into the trailing free block without moving, since nothing else was allocated after it");

  unsafe { alloc.free(grown) };
  alloc.check_heap("end of demo");
  println!("final check_heap passed; program break: {:?}", program_break());
}
