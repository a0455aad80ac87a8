//! The heap primitive: a thin `sbrk`-backed adapter exposing exactly the
//! `extend` / `heap_lo` / `heap_hi` surface §6 of the design calls the "host
//! primitive". Everything above this module treats the heap as an opaque,
//! contiguous, monotonically-growable region; this is the only place that
//! talks to the OS.
//!
//! Grounded on the teacher's own use of `libc::sbrk` in `bump.rs`: the same
//! `(void*)-1` failure sentinel, the same `intptr_t` cast for the requested
//! delta.

use libc::{intptr_t, sbrk};

/// Owns the single, ever-growing heap region used by an [`crate::Allocator`].
///
/// `lo` is latched on the first successful extension and never changes
/// afterwards — per §9 ("no global mutable state across initialize cycles"),
/// a fresh [`crate::Allocator`] gets a fresh `Heap`, so there is nothing to
/// reset here beyond constructing a new value.
///
/// Not `Sync`: the allocator built on top of this is explicitly
/// single-threaded (§5), and `Heap` holds only raw addresses with no
/// synchronization of its own.
pub struct Heap {
  lo: *mut u8,
  hi: *mut u8,
}

impl Heap {
  /// An empty heap that has never been extended.
  pub const fn new() -> Self {
    Self {
      lo: std::ptr::null_mut(),
      hi: std::ptr::null_mut(),
    }
  }

  /// Extends the heap by exactly `bytes` bytes, returning the address of the
  /// old break (the start of the newly available region), or `None` if the
  /// host refused (out of memory / resource limits).
  ///
  /// # Safety
  ///
  /// Must only be called while no other reference to this `Heap` is being
  /// used to read or write heap memory — matches the single-threaded,
  /// serialized-caller contract of the whole crate (§5).
  pub unsafe fn extend(&mut self, bytes: usize) -> Option<*mut u8> {
    let raw = unsafe { sbrk(bytes as intptr_t) };
    if raw as usize == usize::MAX {
      // sbrk returns (void*)-1 on failure.
      return None;
    }

    let old_break = raw as *mut u8;
    if self.lo.is_null() {
      self.lo = old_break;
    }
    self.hi = unsafe { old_break.add(bytes).sub(1) };

    Some(old_break)
  }

  /// Lowest valid heap address (inclusive). Null until the first successful
  /// [`Heap::extend`].
  pub fn lo(&self) -> *mut u8 {
    self.lo
  }

  /// Highest valid heap address (inclusive). Null until the first successful
  /// [`Heap::extend`].
  pub fn hi(&self) -> *mut u8 {
    self.hi
  }
}

impl Default for Heap {
  fn default() -> Self {
    Self::new()
  }
}
