//! `check_heap`: a pure observer that walks the whole heap and the whole
//! free-list index and panics with a diagnostic on the first inconsistency
//! it finds (design §8, invariants I1-I9). It mutates nothing.
//!
//! Not wired into the hot allocate/free/realloc path by default — per §7,
//! "production builds skip checks" — but every public entry point on
//! [`crate::Allocator`] calls it when `debug_assertions` are enabled, the
//! same way the original's `CHECK(lineno)` macro only expanded under its
//! `DEBUG` build. Tests call it directly and unconditionally.
//!
//! `check_heap` keeps its plain, safe `pub fn` signature even though its
//! body dereferences raw heap memory: unlike `free`/`reallocate`, it never
//! takes an arbitrary caller-supplied allocation pointer — `base` and
//! `class_head_base` are an [`crate::Allocator`]'s own trusted fields — so it
//! is a sound safe wrapper around the `unsafe fn`s in [`crate::block`] and
//! [`crate::index`] it calls, the same encapsulation [`crate::placement::find_fit`]
//! relies on.

use crate::block;
use crate::constants::{pack, ALLOCATED, CLASS_NUM, DSIZE, MIN_BLOCK, PREV_ALLOCATED};
use crate::index::{class_of, FreeListIndex};

fn in_heap(p: *mut u8, lo: *mut u8, hi: *mut u8) -> bool {
  (p as usize) >= (lo as usize) && (p as usize) <= (hi as usize)
}

fn aligned(p: *mut u8) -> bool {
  (p as usize) % DSIZE == 0
}

/// Walks the heap from the prologue to the epilogue and the free-list index
/// from each class head, checking every invariant in design §3 (I1-I9).
/// Panics with `origin_tag` folded into the message on the first violation.
pub fn check_heap(base: *mut u8, class_head_base: *mut u8, heap_lo: *mut u8, heap_hi: *mut u8, origin_tag: &str) {
  let index = FreeListIndex { class_head_base, base };

  let prologue_word = unsafe { *(block::hdrp(base) as *mut u32) };
  let expected_prologue = pack(DSIZE, PREV_ALLOCATED, ALLOCATED);
  assert_eq!(
    prologue_word, expected_prologue,
    "check_heap[{origin_tag}]: invalid prologue header {prologue_word:#x}, expected {expected_prologue:#x}"
  );

  let epilogue_word = unsafe { *(heap_hi.sub(3) as *mut u32) } & !0x2;
  let expected_epilogue = pack(0, 0, ALLOCATED);
  assert_eq!(
    epilogue_word, expected_epilogue,
    "check_heap[{origin_tag}]: invalid epilogue word {epilogue_word:#x}"
  );

  let mut heap_free_count = 0usize;
  let mut prev_bp: Option<*mut u8> = None;
  let mut bp = base;

  while (bp as usize) < (heap_hi as usize) {
    let hdr = unsafe { block::hdrp(bp) };
    if !aligned(bp) {
      panic!("check_heap[{origin_tag}]: unaligned block at payload {bp:p}");
    }
    if !in_heap(hdr, heap_lo, heap_hi) {
      panic!("check_heap[{origin_tag}]: block header {hdr:p} outside heap [{heap_lo:p}, {heap_hi:p}]");
    }

    let size = unsafe { block::block_size(bp) };
    if bp != base && size < MIN_BLOCK {
      panic!("check_heap[{origin_tag}]: block at {bp:p} has size {size} < MIN_BLOCK");
    }

    if let Some(prev) = prev_bp {
      let prev_was_alloc = unsafe { block::is_alloc(prev) };
      if prev_was_alloc != unsafe { block::is_prev_alloc(bp) } {
        panic!(
          "check_heap[{origin_tag}]: I2 violated — prev block alloc={prev_was_alloc} but {bp:p}.prev_alloc disagrees"
        );
      }
      if !prev_was_alloc && !unsafe { block::is_alloc(bp) } {
        panic!("check_heap[{origin_tag}]: I3 violated — adjacent free blocks at {prev:p} and {bp:p}");
      }
    }

    if !unsafe { block::is_alloc(bp) } {
      heap_free_count += 1;
      let hdr_word = unsafe { *(hdr as *mut u32) };
      let ftr_word = unsafe { *(block::ftrp(bp) as *mut u32) };
      if hdr_word != ftr_word {
        panic!("check_heap[{origin_tag}]: I4 violated — header {hdr_word:#x} != footer {ftr_word:#x} at {bp:p}");
      }
    }

    prev_bp = Some(bp);
    bp = unsafe { block::next_blkp(bp) };
  }

  let mut list_free_count = 0usize;
  for i in 0..CLASS_NUM {
    let mut prev_node: Option<*mut u8> = None;
    let mut node = index.class_head(i);
    while index.a2o(node) != 0 {
      if !in_heap(node, heap_lo, heap_hi) {
        panic!("check_heap[{origin_tag}]: free-list node {node:p} (class {i}) outside heap");
      }
      let node_size = unsafe { block::block_size(node) };
      if class_of(node_size) != i {
        panic!(
          "check_heap[{origin_tag}]: I5 violated — node {node:p} of size {node_size} lives in class {i} but belongs in class {}",
          class_of(node_size)
        );
      }
      if let Some(prev) = prev_node {
        if unsafe { index.pred_blkp(node) } != prev {
          panic!("check_heap[{origin_tag}]: I7 violated — {node:p}.pred != {prev:p}");
        }
        if unsafe { block::block_size(prev) } > node_size {
          panic!(
            "check_heap[{origin_tag}]: I6 violated — class {i} list not ascending at {prev:p} -> {node:p}"
          );
        }
      }
      prev_node = Some(node);
      list_free_count += 1;
      node = unsafe { index.succ_blkp(node) };
    }
  }

  if heap_free_count != list_free_count {
    panic!(
      "check_heap[{origin_tag}]: I8 violated — {heap_free_count} free blocks by iteration, {list_free_count} by index"
    );
  }
}
