//! The coalescer (design §4.4): merges a freshly-freed block with whichever
//! of its immediate neighbors are also free, maintaining invariant I3 (no
//! two adjacent free blocks survive a public call).
//!
//! Precondition: `bp` is free, its header and footer are already written,
//! and it is not yet linked into any class list. The caller (`free`,
//! `extend_heap`) is responsible for having already set the `prev_alloc` bit
//! of the block immediately following `bp` to false — `coalesce` itself
//! only ever rewrites `bp`'s own header/footer or its immediate free
//! neighbors', never reaches past them.

use crate::block;
use crate::constants::FREE;
use crate::index::FreeListIndex;

/// Coalesces `bp` with a free predecessor and/or successor, four-way:
///
/// | prev free? | next free? | action |
/// |---|---|---|
/// | no | no | insert `bp` alone |
/// | no | yes | absorb successor |
/// | yes | no | absorb into predecessor |
/// | yes | yes | absorb both |
///
/// Returns the address of the final coalesced block, which may differ from
/// `bp` when the predecessor was free.
///
/// # Safety
///
/// `bp` must point at a free block, not yet linked into any class list,
/// whose header and footer already carry its true size — the same
/// raw-pointer-with-no-validity-check contract as
/// [`crate::index::FreeListIndex::insert`]/`remove`, both of which this
/// calls.
pub unsafe fn coalesce(index: &FreeListIndex, bp: *mut u8) -> *mut u8 {
  unsafe {
    let prev_alloc = block::is_prev_alloc(bp);
    let next = block::next_blkp(bp);
    let next_alloc = block::is_alloc(next);
    let size = block::block_size(bp);

    match (prev_alloc, next_alloc) {
      (true, true) => {
        index.insert(bp);
        bp
      }
      (true, false) => {
        index.remove(next);
        let merged = size + block::block_size(next);
        block::set_header(bp, merged, crate::constants::PREV_ALLOCATED, FREE);
        block::set_footer(bp, merged, crate::constants::PREV_ALLOCATED, FREE);
        index.insert(bp);
        bp
      }
      (false, true) => {
        let prev = block::prev_blkp(bp);
        index.remove(prev);
        let merged = size + block::block_size(prev);
        let prev_prev_alloc_bit = if block::is_prev_alloc(prev) {
          crate::constants::PREV_ALLOCATED
        } else {
          crate::constants::PREV_FREE
        };
        // bp's own header is still untouched here, so ftrp(bp) still resolves
        // to the trailing edge of the region being merged — exactly where the
        // new block's footer belongs.
        block::set_footer(bp, merged, prev_prev_alloc_bit, FREE);
        block::set_header(prev, merged, prev_prev_alloc_bit, FREE);
        index.insert(prev);
        prev
      }
      (false, false) => {
        let prev = block::prev_blkp(bp);
        index.remove(prev);
        index.remove(next);
        let merged = size + block::block_size(prev) + block::block_size(next);
        let prev_prev_alloc_bit = if block::is_prev_alloc(prev) {
          crate::constants::PREV_ALLOCATED
        } else {
          crate::constants::PREV_FREE
        };
        block::set_header(prev, merged, prev_prev_alloc_bit, FREE);
        // next's header is still untouched, so ftrp(next) still resolves to
        // the true trailing edge of the merged region.
        block::set_footer(next, merged, prev_prev_alloc_bit, FREE);
        index.insert(prev);
        prev
      }
    }
  }
}
