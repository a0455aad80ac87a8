//! Tuning constants for the segregated-fit allocator.
//!
//! None of these affect correctness (see the invariants in [`crate::checker`]);
//! they only affect fragmentation and throughput. Kept as a flat table of
//! `const`s rather than a configuration layer — this crate is a library, not
//! a CLI, and takes no flags, environment variables, or config files.

/// Word size in bytes. A header or a free-list link field is one word.
pub const WSIZE: usize = 4;

/// Double-word size in bytes. Every block size is a multiple of this.
pub const DSIZE: usize = 8;

/// Number of segregated size classes (`K` in the design doc).
///
/// The elaborate two-attempt design this crate follows uses 12 classes
/// (the simpler alternative design used 11 and skipped the `prev_alloc`
/// optimization); see `DESIGN.md`.
pub const CLASS_NUM: usize = 12;

/// Amount by which the heap is extended when no free block fits a request,
/// or when initializing. A tuning constant in the `2^11..2^14` range.
pub const CHUNKSIZE: usize = 1 << 12;

/// Initial heap extension performed by `initialize`.
pub const INITSIZE: usize = CHUNKSIZE;

/// Split threshold `T`: allocations smaller than this are placed at the low
/// address of a split block (remainder goes high); allocations at or above
/// it are placed at the high address (remainder goes low). See
/// `placement::place`.
pub const SPLIT_THRESHOLD: usize = 256;

/// Smallest legal block size: header + two 4-byte link fields + footer, or
/// header + 12 payload bytes — either way, 16 bytes.
pub const MIN_BLOCK: usize = 16;

/// Current block's `alloc` bit (bit 0).
pub const ALLOCATED: u32 = 1;
/// Current block's `alloc` bit, free.
pub const FREE: u32 = 0;
/// Predecessor block's `alloc` bit (bit 1), set.
pub const PREV_ALLOCATED: u32 = 2;
/// Predecessor block's `alloc` bit (bit 1), clear.
pub const PREV_FREE: u32 = 0;

/// Packs a size and the two allocation bits into one header/footer word.
///
/// Bit 0 is this block's own `alloc` flag, bit 1 is the predecessor's
/// `alloc` flag, bits 3..31 are the size (always a multiple of 8, so the
/// low 3 bits are free for flags).
#[inline]
pub const fn pack(size: usize, prev_alloc: u32, alloc: u32) -> u32 {
  size as u32 | prev_alloc | alloc
}
