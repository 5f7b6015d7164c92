//! Indexed fixed-slot allocator: O(1) allocate/deallocate of equal-size
//! objects via an intrusive singly-linked free list threaded through the
//! unused slots themselves.
//!
//! Grounded in
//! `examples/original_source/source/main/cpp/x_idx_allocator_array.cpp`
//! (`x_indexed_array_allocator`). Every free slot's first 4 bytes hold the
//! index of the next free slot, terminated by [`NIL_INDEX`]; a used slot's
//! bytes are entirely the caller's.
use core::mem::size_of;
use core::ptr::NonNull;

use crate::facade::Allocator;
use crate::tlsf::PoolError;

/// Sentinel meaning "no slot" (spec.md §3.5), matching the original's
/// `NILL_IDX = 0xffffffff`.
pub const NIL_INDEX: u32 = 0xffff_ffff;

/// A pool of `slot_count` equal-size, equal-alignment slots carved out of a
/// caller-supplied region.
pub struct IndexedPool<'a> {
    storage: &'a mut [u8],
    /// Byte offset of slot 0 within `storage`, needed to align the first
    /// slot to `alignment` when `storage` itself isn't already aligned.
    base_offset: usize,
    slot_size: usize,
    alignment: usize,
    slot_count: u32,
    free_head: u32,
    live_count: u32,
}

impl<'a> IndexedPool<'a> {
    /// Carve `storage` into `slot_count` slots of `slot_size` bytes each,
    /// aligned to `alignment`, and thread them onto the free list.
    ///
    /// `slot_size` must be a multiple of 4: the free-list next-pointer is
    /// stored as a `u32` at the start of every free slot, and the original's
    /// `init_freelist` advances its cursor by `slot_size / 4` words, which
    /// silently truncates (corrupting the list) when `slot_size` is not a
    /// multiple of 4. Spec.md §9 leaves this as an open question; this
    /// implementation makes it an explicit, checked precondition instead.
    pub fn new(
        storage: &'a mut [u8],
        slot_size: usize,
        alignment: usize,
        slot_count: u32,
    ) -> Result<Self, PoolError> {
        if slot_size % 4 != 0 {
            return Err(PoolError::BadAlignment);
        }
        if slot_size < size_of::<u32>() {
            return Err(PoolError::TooSmall);
        }
        // Only slot 0 is explicitly aligned via `aligned_base` below; every
        // later slot sits `slot_size` bytes after the previous one, so it
        // stays aligned only if `slot_size` is itself a multiple of
        // `alignment`.
        if slot_size % alignment != 0 {
            return Err(PoolError::BadAlignment);
        }
        let base = storage.as_ptr() as usize;
        let aligned_base = (base + alignment - 1) & !(alignment - 1);
        let pad = aligned_base - base;
        let required = pad + slot_size * slot_count as usize;
        if storage.len() < required {
            return Err(PoolError::TooSmall);
        }

        let mut pool = Self {
            storage,
            base_offset: pad,
            slot_size,
            alignment,
            slot_count,
            free_head: if slot_count == 0 { NIL_INDEX } else { 0 },
            live_count: 0,
        };
        pool.init_freelist();
        Ok(pool)
    }

    fn slot_ptr(&mut self, idx: u32) -> NonNull<u8> {
        let offset = self.base_offset + idx as usize * self.slot_size;
        unsafe { NonNull::new_unchecked(self.storage.as_mut_ptr().add(offset)) }
    }

    fn init_freelist(&mut self) {
        for i in 0..self.slot_count {
            let next = if i + 1 == self.slot_count {
                NIL_INDEX
            } else {
                i + 1
            };
            let slot = self.slot_ptr(i);
            unsafe {
                slot.cast::<u32>().write(next);
            }
        }
    }

    /// Map a slot index to its address, or `None` if `idx` is out of range
    /// or `NIL_INDEX`. Mirrors the original's bounds-checked `to_ptr`.
    pub fn to_ptr(&mut self, idx: u32) -> Option<NonNull<u8>> {
        if idx >= self.slot_count {
            return None;
        }
        Some(self.slot_ptr(idx))
    }

    /// Map an address back to its slot index, or [`NIL_INDEX`] if `ptr`
    /// does not fall within one of this pool's slots. Mirrors the
    /// original's bounds-checked `to_idx`.
    pub fn to_idx(&self, ptr: NonNull<u8>) -> u32 {
        let base = self.storage.as_ptr() as usize + self.base_offset;
        let addr = ptr.as_ptr() as usize;
        let span = self.slot_size * self.slot_count as usize;
        if addr < base || addr >= base + span {
            return NIL_INDEX;
        }
        let offset = addr - base;
        if offset % self.slot_size != 0 {
            return NIL_INDEX;
        }
        (offset / self.slot_size) as u32
    }

    /// Allocate one slot, or `None` if the pool is exhausted.
    pub fn iallocate(&mut self) -> Option<u32> {
        if self.free_head == NIL_INDEX {
            return None;
        }
        let idx = self.free_head;
        let slot = self.slot_ptr(idx);
        self.free_head = unsafe { slot.cast::<u32>().read() };
        self.live_count += 1;
        log::trace!("pool: allocated slot {idx}");
        Some(idx)
    }

    /// Return slot `idx` to the free list.
    pub fn ideallocate(&mut self, idx: u32) {
        debug_assert!(idx < self.slot_count, "slot index out of range");
        let slot = self.slot_ptr(idx);
        unsafe {
            slot.cast::<u32>().write(self.free_head);
        }
        self.free_head = idx;
        self.live_count -= 1;
        log::trace!("pool: deallocated slot {idx}");
    }

    /// Number of slots currently allocated.
    pub fn live_count(&self) -> u32 {
        self.live_count
    }

    /// Total number of slots in this pool.
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }
}

impl<'a> Allocator for IndexedPool<'a> {
    fn name(&self) -> &'static str {
        "indexed-pool"
    }

    /// `size`/`align` beyond this pool's fixed slot geometry are rejected;
    /// every slot satisfies the pool's own `slot_size`/`alignment`, but a
    /// caller asking for more alignment than the pool was built with isn't
    /// guaranteed that on slots after the first (see `new`'s `slot_size %
    /// alignment == 0` precondition).
    fn allocate(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if size > self.slot_size || align > self.alignment {
            return None;
        }
        let idx = self.iallocate()?;
        self.to_ptr(idx)
    }

    /// Slots are fixed-size: growing or shrinking in place is only possible
    /// when the request still fits the existing slot.
    fn reallocate(
        &mut self,
        ptr: Option<NonNull<u8>>,
        size: usize,
        align: usize,
    ) -> Option<NonNull<u8>> {
        match ptr {
            None => self.allocate(size, align),
            Some(p) if size == 0 => {
                self.deallocate(Some(p));
                None
            }
            Some(p) if size <= self.slot_size && align <= self.alignment => Some(p),
            Some(_) => None,
        }
    }

    fn deallocate(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else { return };
        let idx = self.to_idx(ptr);
        self.ideallocate(idx);
    }

    fn release(&mut self) {
        self.free_head = NIL_INDEX;
        self.live_count = 0;
    }
}
