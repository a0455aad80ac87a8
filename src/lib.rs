//! # sflalloc — a segregated-fit dynamic memory allocator
//!
//! This crate implements the allocate/free/reallocate/zero-allocate contract
//! on top of a single, contiguous, monotonically-growable heap managed with
//! `sbrk`. It grew out of a simple bump allocator (this repo's original
//! design) into something closer to a real `malloc`: segregated, size-ordered
//! free lists; header-only metadata with footer-elision on allocated blocks;
//! immediate four-way coalescing; and a placement policy tuned by a size
//! threshold.
//!
//! ## Crate structure
//!
//! ```text
//!   sflalloc
//!   ├── constants  - tuning constants (K, CHUNKSIZE, SPLIT_THRESHOLD, ...)
//!   ├── align      - alignment macros (align!, align_up!)
//!   ├── heap       - sbrk-backed heap primitive (extend/lo/hi)
//!   ├── block      - block header/footer encoder-decoder
//!   ├── index      - segregated, size-ordered free-list index
//!   ├── placement  - find_fit / place
//!   ├── coalesce   - four-case free-block merging
//!   └── checker    - check_heap, the invariant-sweeping observer
//! ```
//!
//! ## Heap layout
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │ class heads (K words) │ pad │ prologue │ blocks... │ epilogue     │
//!   └───────────────────────────────────────────────────────────────────┘
//!   ▲                                  ▲                  ▲
//!   class_head_base                   base (= heap_listp) heap_hi-ish
//! ```
//!
//! Free-list `pred`/`succ` fields and class-head slots are 4-byte offsets
//! relative to `base`, not raw pointers — the original design this crate
//! ports assumes the whole heap fits in under 4 GiB, which more than halves
//! free-node overhead and is what lets [`constants::MIN_BLOCK`] be as small
//! as 16 bytes.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sflalloc::Allocator;
//!
//! let mut alloc = Allocator::new();
//! assert!(alloc.initialize());
//!
//! let p = alloc.allocate(64) as *mut u64;
//! assert!(!p.is_null());
//! unsafe {
//!     p.write(42);
//!     assert_eq!(p.read(), 42);
//! }
//!
//! let p = unsafe { alloc.reallocate(p as *mut u8, 256) };
//! unsafe { alloc.free(p) };
//! ```
//!
//! ## Safety
//!
//! [`Allocator::free`] and [`Allocator::reallocate`] are `unsafe fn`, matching
//! the teacher's convention for any entry point that dereferences a raw
//! pointer it did not itself produce (`examples/0xErwin1-rallocator/src/bump.rs`'s
//! `allocate`/`deallocate`): the caller must not pass a pointer that was not
//! returned by this same `Allocator`, and must not use a pointer after it has
//! been freed. [`Allocator::allocate`] and [`Allocator::zero_allocate`] stay
//! safe `fn` — they only ever write into memory the heap primitive itself
//! handed back, never a pointer the caller supplied.
//!
//! ## Thread safety
//!
//! None. This allocator assumes a single serialized caller; wrap it in a
//! `Mutex` for multi-threaded use.

pub mod align;
pub mod block;
pub mod checker;
pub mod coalesce;
pub mod constants;
pub mod heap;
pub mod index;
pub mod placement;

use constants::{ALLOCATED, CHUNKSIZE, CLASS_NUM, DSIZE, FREE, INITSIZE, PREV_ALLOCATED, PREV_FREE, WSIZE};
use heap::Heap;
use index::FreeListIndex;
use std::ptr;

/// Rounds a requested payload size up to a legal block size, folding very
/// small requests to the flat minimum exactly as the source this crate
/// ports does (`size <= 3*WSIZE` collapses to `4*WSIZE`) rather than relying
/// purely on the generic round-up formula, which agrees for these sizes but
/// is a more expensive branch to reach the same place.
fn adjusted_size(size: usize) -> usize {
  if size <= 3 * WSIZE {
    4 * WSIZE
  } else {
    DSIZE * ((size + WSIZE + DSIZE - 1) / DSIZE)
  }
}

/// The allocator: owns one heap and the two fixed addresses (the class-head
/// array base and the prologue/`base` pointer used for free-list offset
/// encoding) that make up all of its state. A fresh `Allocator` gets a fresh
/// heap on [`Allocator::initialize`], and multiple instances never
/// interfere with each other.
pub struct Allocator {
  heap: Heap,
  /// Prologue payload pointer; also the base address free-list offsets are
  /// relative to ("heap_listp" in the design this crate ports).
  base: *mut u8,
  class_head_base: *mut u8,
}

impl Allocator {
  /// An allocator with no heap yet. Call [`Allocator::initialize`] (or just
  /// call [`Allocator::allocate`], which initializes lazily) before use.
  pub const fn new() -> Self {
    Self {
      heap: Heap::new(),
      base: ptr::null_mut(),
      class_head_base: ptr::null_mut(),
    }
  }

  fn index(&self) -> FreeListIndex {
    FreeListIndex {
      class_head_base: self.class_head_base,
      base: self.base,
    }
  }

  /// Lays out the class-head array, padding, prologue, and epilogue, then
  /// performs the first heap extension. Returns `false` on `sbrk` failure.
  pub fn initialize(&mut self) -> bool {
    // Pad the class-head array so the prologue header that follows lands on
    // a double-word boundary, exactly as the ported design does.
    let padding = if CLASS_NUM % 2 != 0 { 0 } else { 1 };
    let total_words = CLASS_NUM + padding + 3;

    let class_head_base = match unsafe { self.heap.extend(total_words * WSIZE) } {
      Some(p) => p,
      None => return false,
    };
    unsafe { ptr::write_bytes(class_head_base, 0, CLASS_NUM * WSIZE) };

    let mut heap_listp = unsafe { class_head_base.add((CLASS_NUM + padding) * WSIZE) };
    unsafe {
      *(heap_listp as *mut u32) = constants::pack(DSIZE, PREV_ALLOCATED, ALLOCATED);
      *(heap_listp.add(WSIZE) as *mut u32) = constants::pack(DSIZE, PREV_ALLOCATED, ALLOCATED);
      *(heap_listp.add(2 * WSIZE) as *mut u32) = constants::pack(0, PREV_ALLOCATED, ALLOCATED);
    }
    heap_listp = unsafe { heap_listp.add(WSIZE) };

    self.class_head_base = class_head_base;
    self.base = heap_listp;

    self.extend_heap(INITSIZE / WSIZE).is_some()
  }

  /// Grows the heap by `words * WSIZE` bytes (rounded up to an even word
  /// count so the new region stays double-word aligned), installs it as a
  /// single free block that inherits the old epilogue's `prev_alloc` bit,
  /// writes a fresh epilogue, and coalesces with whatever free block
  /// preceded the old epilogue.
  fn extend_heap(&mut self, words: usize) -> Option<*mut u8> {
    let words = if words % 2 != 0 { words + 1 } else { words };
    let size = words * WSIZE;

    let bp = unsafe { self.heap.extend(size) }?;
    unsafe {
      let prev_alloc = if block::is_prev_alloc(bp) { PREV_ALLOCATED } else { PREV_FREE };

      block::set_header(bp, size, prev_alloc, FREE);
      block::set_footer(bp, size, prev_alloc, FREE);
      block::set_header(block::next_blkp(bp), 0, PREV_FREE, ALLOCATED);

      Some(coalesce::coalesce(&self.index(), bp))
    }
  }

  /// Allocates at least `size` bytes, returning a payload pointer 8-byte
  /// aligned and within the heap, or null if `size == 0` or the heap could
  /// not be extended. Lazily initializes the allocator on first use.
  pub fn allocate(&mut self, size: usize) -> *mut u8 {
    if self.base.is_null() && !self.initialize() {
      return ptr::null_mut();
    }
    if size == 0 {
      return ptr::null_mut();
    }

    let asize = adjusted_size(size);

    let bp = match placement::find_fit(&self.index(), asize) {
      Some(bp) => bp,
      None => {
        let extend_size = asize.max(CHUNKSIZE);
        match self.extend_heap(extend_size / WSIZE) {
          Some(bp) => bp,
          None => return ptr::null_mut(),
        }
      }
    };

    let result = unsafe { placement::place(&self.index(), bp, asize) };
    self.debug_check("allocate");
    result
  }

  /// Frees `ptr`. A no-op if `ptr` is null. Double-freeing an already-freed
  /// pointer is undefined behavior, same as the C convention this mirrors —
  /// not detected or guarded against.
  ///
  /// # Safety
  ///
  /// `bp` must be null, or a pointer previously returned by
  /// [`Allocator::allocate`], [`Allocator::reallocate`], or
  /// [`Allocator::zero_allocate`] on this same `Allocator`, not already
  /// freed. Matches the teacher's convention for raw-pointer-consuming
  /// operations (`examples/0xErwin1-rallocator/src/bump.rs`'s `deallocate`).
  pub unsafe fn free(&mut self, bp: *mut u8) {
    if bp.is_null() {
      return;
    }

    unsafe {
      let size = block::block_size(bp);
      let prev_alloc = if block::is_prev_alloc(bp) { PREV_ALLOCATED } else { PREV_FREE };
      block::set_header(bp, size, prev_alloc, FREE);
      block::set_footer(bp, size, prev_alloc, FREE);

      block::set_prev_alloc(block::next_blkp(bp), PREV_FREE);

      coalesce::coalesce(&self.index(), bp);
    }
    self.debug_check("free");
  }

  /// Resizes the allocation at `ptr` to `size` bytes.
  ///
  /// - `size == 0` frees `ptr` and returns null.
  /// - `ptr == null` behaves like [`Allocator::allocate`].
  /// - Otherwise, grows or shrinks in place when the old block plus an
  ///   immediately following free block are enough; falls back to a fresh
  ///   allocation, copy, and free when they are not. On allocation failure
  ///   in the copy path, the original block is left untouched and null is
  ///   returned.
  ///
  /// # Safety
  ///
  /// `bp` must be null, or a pointer previously returned by
  /// [`Allocator::allocate`], [`Allocator::reallocate`], or
  /// [`Allocator::zero_allocate`] on this same `Allocator`, not already
  /// freed — same contract as [`Allocator::free`], which this calls on both
  /// its `size == 0` and copy-path branches.
  pub unsafe fn reallocate(&mut self, bp: *mut u8, size: usize) -> *mut u8 {
    if size == 0 {
      unsafe { self.free(bp) };
      return ptr::null_mut();
    }
    if bp.is_null() {
      return self.allocate(size);
    }

    let oldsize = unsafe { block::block_size(bp) };
    let prev_alloc = if unsafe { block::is_prev_alloc(bp) } { PREV_ALLOCATED } else { PREV_FREE };
    let next = unsafe { block::next_blkp(bp) };
    let next_is_free = !unsafe { block::is_alloc(next) };
    let freesize = if next_is_free { unsafe { block::block_size(next) } } else { 0 };
    let asize = adjusted_size(size);

    if oldsize + freesize >= asize {
      let index = self.index();

      unsafe {
        if oldsize + freesize >= asize + 2 * DSIZE {
          if next_is_free {
            index.remove(next);
          }
          block::set_header(bp, asize, prev_alloc, ALLOCATED);

          let freebp = block::next_blkp(bp);
          let rem_size = oldsize + freesize - asize;
          block::set_header(freebp, rem_size, PREV_ALLOCATED, FREE);
          block::set_footer(freebp, rem_size, PREV_ALLOCATED, FREE);
          index.insert(freebp);

          if !next_is_free {
            // The block after the new free tail didn't already know its
            // predecessor became free — its own alloc/size bits might belong
            // to any block, not necessarily the epilogue, so re-read them
            // rather than assume.
            block::set_prev_alloc(block::next_blkp(freebp), PREV_FREE);
          }
        } else {
          if next_is_free {
            index.remove(next);
          }
          block::set_header(bp, oldsize + freesize, prev_alloc, ALLOCATED);
          if next_is_free {
            block::set_prev_alloc(block::next_blkp(bp), PREV_ALLOCATED);
          }
        }
      }

      self.debug_check("reallocate in-place");
      return bp;
    }

    let newbp = self.allocate(size);
    if newbp.is_null() {
      return ptr::null_mut();
    }

    let copy_len = size.min(oldsize);
    unsafe {
      ptr::copy_nonoverlapping(bp, newbp, copy_len);
      self.free(bp);
    }

    newbp
  }

  /// `allocate(count * elem_size)` followed by zeroing. Returns null (without
  /// allocating) if `count * elem_size` overflows `usize`, matching
  /// `calloc`'s overflow contract.
  pub fn zero_allocate(&mut self, count: usize, elem_size: usize) -> *mut u8 {
    let total = match count.checked_mul(elem_size) {
      Some(total) => total,
      None => return ptr::null_mut(),
    };

    let bp = self.allocate(total);
    if !bp.is_null() && total > 0 {
      unsafe { ptr::write_bytes(bp, 0, total) };
    }
    bp
  }

  /// Runs the full invariant sweep (I1-I9) and panics on the first
  /// violation, tagging the panic message with `origin_tag` so a failing
  /// test or debug session can tell which call site triggered it.
  pub fn check_heap(&self, origin_tag: &str) {
    checker::check_heap(self.base, self.class_head_base, self.heap.lo(), self.heap.hi(), origin_tag);
  }

  #[inline]
  fn debug_check(&self, origin_tag: &str) {
    #[cfg(debug_assertions)]
    self.check_heap(origin_tag);
    #[cfg(not(debug_assertions))]
    let _ = origin_tag;
  }

  /// Prints one line per block from the prologue to the epilogue: offset,
  /// size, `prev_alloc`/`alloc` bits, and (for free blocks) the `pred`/
  /// `succ` fields. The direct descendant of the original's `print_heap`,
  /// kept for the same reason: inspecting heap state by eye while debugging.
  pub fn print_heap(&self) {
    let index = self.index();
    let mut bp = self.base;
    let mut n = 0usize;

    while (bp as usize) < (self.heap.hi() as usize) {
      unsafe {
        let size = block::block_size(bp);
        print!(
          "block {n}: size {size}\tprev_alloc {}\talloc {}",
          block::is_prev_alloc(bp) as u32,
          block::is_alloc(bp) as u32
        );
        if !block::is_alloc(bp) {
          print!("\tpred {:?}\tsucc {:?}", index.pred_blkp(bp), index.succ_blkp(bp));
        }
        println!();
        bp = block::next_blkp(bp);
      }
      n += 1;
    }
    println!("epilogue at {bp:?}");
  }

  /// Reports the outcome of a single allocation: the size requested, the
  /// pointer returned, and the current heap high-water mark. The direct
  /// descendant of the teacher bump allocator's `print_alloc`.
  pub fn dbg_alloc(&self, label: &str, size: usize, ptr: *mut u8) {
    println!("[{label}] requested {size} bytes, returned {ptr:?}, heap_hi = {:?}", self.heap.hi());
  }
}

impl Default for Allocator {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn is_aligned(p: *mut u8) -> bool {
    (p as usize) % DSIZE == 0
  }

  #[test]
  fn scenario_init_plus_one_allocate() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let p = alloc.allocate(24);
    assert!(!p.is_null());
    assert!(is_aligned(p));
    assert_eq!(unsafe { block::block_size(p) }, 32);
    alloc.check_heap("scenario 1");
  }

  #[test]
  fn scenario_split_policy_places_small_allocation_low() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let a = alloc.allocate(64);
    let b = alloc.allocate(16);
    assert!(!a.is_null() && !b.is_null());

    // b (< SPLIT_THRESHOLD) must land at the low address of the split,
    // i.e. immediately after a, with the free tail now starting after b.
    unsafe {
      assert_eq!(b, block::next_blkp(a));
      let tail = block::next_blkp(b);
      assert!(!block::is_alloc(tail));
    }
    alloc.check_heap("scenario 2");
  }

  #[test]
  fn scenario_coalescing_all_four_cases() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let a = alloc.allocate(24);
    let b = alloc.allocate(24);
    let c = alloc.allocate(24);
    alloc.check_heap("three allocated");

    // (a) A/A: b's neighbors are both allocated, so freeing it just inserts.
    unsafe { alloc.free(b) };
    assert!(!unsafe { block::is_alloc(b) });
    alloc.check_heap("after free b");

    // (b) F/A: freeing a merges it with free b (a is now the prev-merge).
    unsafe { alloc.free(a) };
    assert!(!unsafe { block::is_alloc(a) });
    assert_eq!(
      unsafe { block::block_size(a) },
      64,
      "a absorbs b's 32-byte block into a single 64-byte free block"
    );
    alloc.check_heap("after free a");

    // (c) F/F: free c to merge the trailing tail in on the high side too.
    unsafe { alloc.free(c) };
    alloc.check_heap("after free c");
    assert!(!unsafe { block::is_alloc(a) });
  }

  #[test]
  fn scenario_in_place_grow() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let p = alloc.allocate(32);
    assert!(!p.is_null());

    let q = unsafe { alloc.reallocate(p, 200) };
    assert_eq!(q, p, "growing into the trailing free tail must not move the pointer");
    alloc.check_heap("scenario 4");
  }

  #[test]
  fn scenario_fallback_copy_grow_preserves_payload() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let p = alloc.allocate(32) as *mut u8;
    assert!(!p.is_null());
    unsafe {
      for i in 0..32u8 {
        p.add(i as usize).write(i);
      }
    }

    // Allocate x right after p so p's successor is no longer free.
    let x = alloc.allocate(32);
    assert!(!x.is_null());
    assert_eq!(unsafe { block::next_blkp(p) }, x);

    let q = unsafe { alloc.reallocate(p, 200) };
    assert_ne!(q, p, "p's successor was allocated, so this must be a copy");
    unsafe {
      for i in 0..32u8 {
        assert_eq!(q.add(i as usize).read(), i);
      }
    }
    alloc.check_heap("scenario 5");
  }

  #[test]
  fn round_trip_free_returns_same_allocated_count() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let p = alloc.allocate(48);
    assert!(!p.is_null());
    unsafe { alloc.free(p) };
    alloc.check_heap("round trip free");
  }

  #[test]
  fn reallocate_null_is_allocate() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let p = unsafe { alloc.reallocate(ptr::null_mut(), 40) };
    assert!(!p.is_null());
    alloc.check_heap("realloc null");
  }

  #[test]
  fn reallocate_zero_is_free() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let p = alloc.allocate(40);
    let q = unsafe { alloc.reallocate(p, 0) };
    assert!(q.is_null());
    alloc.check_heap("realloc zero");
  }

  #[test]
  fn allocate_zero_returns_null() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());
    assert!(alloc.allocate(0).is_null());
  }

  #[test]
  fn free_null_is_a_noop() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());
    unsafe { alloc.free(ptr::null_mut()) };
    alloc.check_heap("free null");
  }

  #[test]
  fn zero_allocate_zeroes_every_byte() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let count = 17usize;
    let elem = 5usize;
    let p = alloc.zero_allocate(count, elem);
    assert!(!p.is_null());
    unsafe {
      for i in 0..(count * elem) {
        assert_eq!(p.add(i).read(), 0);
      }
    }
  }

  #[test]
  fn zero_allocate_overflow_returns_null() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());
    assert!(alloc.zero_allocate(usize::MAX, 2).is_null());
  }

  #[test]
  fn allocations_are_always_aligned_and_in_heap() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    for size in [1usize, 7, 8, 15, 16, 100, 257, 4096] {
      let p = alloc.allocate(size);
      assert!(!p.is_null());
      assert!(is_aligned(p));
      assert!((p as usize) >= (alloc.heap.lo() as usize));
      assert!((p as usize) + size <= (alloc.heap.hi() as usize) + 1);
    }
  }

  #[test]
  fn heap_extension_beyond_initial_chunk_still_succeeds() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let big = alloc.allocate(CHUNKSIZE * 4);
    assert!(!big.is_null());
    alloc.check_heap("large allocation forcing extend_heap");

    // Remaining capacity should still serve a small request.
    let small = alloc.allocate(16);
    assert!(!small.is_null());
    alloc.check_heap("small allocation after large one");
  }

  #[test]
  fn many_allocations_and_frees_preserve_invariants() {
    let mut alloc = Allocator::new();
    assert!(alloc.initialize());

    let mut live = Vec::new();
    for i in 0..64usize {
      let size = 8 + (i * 13) % 500;
      let p = alloc.allocate(size);
      assert!(!p.is_null());
      live.push(p);
      if i % 3 == 0 {
        if let Some(victim) = live.pop() {
          unsafe { alloc.free(victim) };
        }
      }
    }
    for p in live {
      unsafe { alloc.free(p) };
    }
    alloc.check_heap("after churn");
  }
}
