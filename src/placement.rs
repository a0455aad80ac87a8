//! The placement engine (design §4.3): `find_fit` locates a free block large
//! enough for a request, `place` commits the allocation into it, splitting
//! off a remainder when that is worthwhile.

use crate::block;
use crate::constants::{ALLOCATED, CLASS_NUM, FREE, MIN_BLOCK, PREV_ALLOCATED, PREV_FREE, SPLIT_THRESHOLD};
use crate::index::{class_of, FreeListIndex};

/// Starting at `asize`'s own class, scans each class list in increasing
/// order and returns the first block large enough. Because every list is
/// kept sorted by ascending size, the first fit found within a class *is*
/// that class's best fit; scanning classes in order approximates a global
/// best fit without ever walking a list of blocks too small to matter.
///
/// Returns `None` once every class has been exhausted. Safe to call with a
/// safe signature: every pointer it dereferences is one it retrieved itself
/// by walking `index`'s own linked lists, never a pointer handed in from
/// outside.
pub fn find_fit(index: &FreeListIndex, asize: usize) -> Option<*mut u8> {
  let mut i = class_of(asize);
  while i < CLASS_NUM {
    let head = index.class_head(i);
    if index.a2o(head) != 0 {
      let mut bp = head;
      while index.a2o(bp) != 0 && unsafe { block::block_size(bp) } < asize {
        bp = unsafe { index.succ_blkp(bp) };
      }
      if index.a2o(bp) != 0 {
        return Some(bp);
      }
    }
    i += 1;
  }
  None
}

/// Commits an allocation of `asize` bytes inside `bp`, which must be free
/// and at least `asize` bytes. Removes `bp` from its free list first.
///
/// If the residual after carving out `asize` is smaller than [`MIN_BLOCK`],
/// the whole block is handed to the caller allocated. Otherwise the block is
/// split, and which half becomes the allocation is decided by
/// [`SPLIT_THRESHOLD`] (`T`):
///
/// - requests smaller than `T` go at the **low** address (remainder high) —
///   small, long-lived allocations cluster low, leaving large contiguous
///   free runs at high addresses;
/// - requests at or above `T` go at the **high** address (remainder low) —
///   the symmetric policy, which empirically helps workloads that free
///   recently allocated small objects.
///
/// Returns the payload pointer of the allocated block (which may differ
/// from `bp` when the large-allocation branch is taken).
///
/// # Safety
///
/// `bp` must point at a free block, currently linked into `index`, whose
/// size is at least `asize` — the same raw-pointer-with-no-validity-check
/// situation as [`crate::index::FreeListIndex::remove`], which this calls
/// first.
pub unsafe fn place(index: &FreeListIndex, bp: *mut u8, asize: usize) -> *mut u8 {
  unsafe {
    index.remove(bp);

    let csize = block::block_size(bp);
    let prev_alloc = if block::is_prev_alloc(bp) { PREV_ALLOCATED } else { PREV_FREE };
    let rest = csize - asize;

    if rest < MIN_BLOCK {
      block::set_header(bp, csize, prev_alloc, ALLOCATED);
      block::set_prev_alloc(block::next_blkp(bp), PREV_ALLOCATED);
      return bp;
    }

    if asize < SPLIT_THRESHOLD {
      block::set_header(bp, asize, prev_alloc, ALLOCATED);

      let remainder = block::next_blkp(bp);
      block::set_header(remainder, rest, PREV_ALLOCATED, FREE);
      block::set_footer(remainder, rest, PREV_ALLOCATED, FREE);
      index.insert(remainder);

      block::set_prev_alloc(block::next_blkp(remainder), PREV_FREE);
      bp
    } else {
      block::set_header(bp, rest, prev_alloc, FREE);
      block::set_footer(bp, rest, prev_alloc, FREE);
      index.insert(bp);

      let allocated = block::next_blkp(bp);
      block::set_header(allocated, asize, PREV_FREE, ALLOCATED);
      block::set_prev_alloc(block::next_blkp(allocated), PREV_ALLOCATED);
      allocated
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::constants::WSIZE;

  struct Scratch {
    _buf: Vec<u8>,
    base: *mut u8,
    class_head_base: *mut u8,
  }

  impl Scratch {
    fn new(capacity: usize) -> Self {
      let mut buf = vec![0u8; capacity];
      let class_head_base = buf.as_mut_ptr();
      let base = unsafe { class_head_base.add(CLASS_NUM * WSIZE + WSIZE) };
      Self {
        _buf: buf,
        base,
        class_head_base,
      }
    }

    fn index(&self) -> FreeListIndex {
      FreeListIndex {
        class_head_base: self.class_head_base,
        base: self.base,
      }
    }
  }

  #[test]
  fn find_fit_returns_smallest_sufficient_block_in_its_class() {
    let scratch = Scratch::new(4096);
    let idx = scratch.index();

    let small = unsafe { scratch.base.add(64) };
    let bigger = unsafe { scratch.base.add(128) };
    unsafe {
      block::set_header(small, 32, PREV_ALLOCATED, FREE);
      block::set_footer(small, 32, PREV_ALLOCATED, FREE);
      idx.insert(small);

      block::set_header(bigger, 48, PREV_ALLOCATED, FREE);
      block::set_footer(bigger, 48, PREV_ALLOCATED, FREE);
      idx.insert(bigger);
    }

    assert_eq!(find_fit(&idx, 40), Some(bigger));
    assert_eq!(find_fit(&idx, 24), Some(small));
    assert_eq!(find_fit(&idx, 1000), None);
  }

  #[test]
  fn place_consumes_whole_block_when_residual_too_small() {
    let scratch = Scratch::new(4096);
    let idx = scratch.index();

    let bp = unsafe { scratch.base.add(64) };
    unsafe {
      block::set_header(bp, 32, PREV_ALLOCATED, FREE);
      block::set_footer(bp, 32, PREV_ALLOCATED, FREE);
      idx.insert(bp);

      // Epilogue-ish marker after the block so next_blkp has something to read.
      let after = block::next_blkp(bp);
      block::set_header(after, 0, PREV_FREE, ALLOCATED);

      let placed = place(&idx, bp, 32);
      assert_eq!(placed, bp);
      assert!(block::is_alloc(bp));
      assert_eq!(block::block_size(bp), 32);
      assert!(block::is_prev_alloc(after));
    }
  }

  #[test]
  fn place_splits_small_allocation_at_low_address() {
    let scratch = Scratch::new(4096);
    let idx = scratch.index();

    let bp = unsafe { scratch.base.add(64) };
    unsafe {
      block::set_header(bp, 64, PREV_ALLOCATED, FREE);
      block::set_footer(bp, 64, PREV_ALLOCATED, FREE);
      idx.insert(bp);

      let after = block::next_blkp(bp);
      block::set_header(after, 0, PREV_FREE, ALLOCATED);

      let placed = place(&idx, bp, 16);
      assert_eq!(placed, bp, "small allocation goes at the low address");
      assert!(block::is_alloc(bp));
      assert_eq!(block::block_size(bp), 16);

      let remainder = block::next_blkp(bp);
      assert!(!block::is_alloc(remainder));
      assert_eq!(block::block_size(remainder), 48);
    }
  }

  #[test]
  fn place_splits_large_allocation_at_high_address() {
    let scratch = Scratch::new(4096);
    let idx = scratch.index();

    let bp = unsafe { scratch.base.add(64) };
    let total = crate::constants::SPLIT_THRESHOLD + 64;
    unsafe {
      block::set_header(bp, total, PREV_ALLOCATED, FREE);
      block::set_footer(bp, total, PREV_ALLOCATED, FREE);
      idx.insert(bp);

      let after = block::next_blkp(bp);
      block::set_header(after, 0, PREV_FREE, ALLOCATED);

      let asize = crate::constants::SPLIT_THRESHOLD;
      let placed = place(&idx, bp, asize);

      assert_ne!(placed, bp, "large allocation goes at the high address");
      assert!(block::is_alloc(placed));
      assert_eq!(block::block_size(placed), asize);

      assert!(!block::is_alloc(bp));
      assert_eq!(block::block_size(bp), total - asize);
    }
  }
}
