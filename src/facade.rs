//! The allocator façade shared by every concrete engine in this crate.
//!
//! Grounded in `examples/original_source/source/main/include/xallocator/x_allocator.h`
//! and the `x_iallocator`/`xalloc` abstract base class implemented by each of
//! `x_allocator_tlsf.cpp`, `x_allocator_forward.cpp`, and
//! `x_idx_allocator_array.cpp`. The original is a C++ abstract class with four
//! virtual methods; spec.md §9 ("Polymorphic façade") calls for the same
//! shape as a Rust trait, with concrete engines as separate implementing
//! types.
use core::ptr::NonNull;

/// Capability interface implemented by every allocator in this crate.
///
/// Every method follows the contract from spec.md §6/§7: allocation failure
/// is reported by returning `None`, never by panicking or unwinding, and a
/// null `ptr` passed to [`Allocator::deallocate`] is silently ignored.
pub trait Allocator {
    /// A short, human-readable name for this allocator, primarily useful in
    /// logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Allocate `size` bytes aligned to `align`, which must be a power of
    /// two. Returns `None` if the request cannot be satisfied, `size` is
    /// zero, or `align` is not a power of two.
    fn allocate(&mut self, size: usize, align: usize) -> Option<NonNull<u8>>;

    /// Resize a previously allocated block in place if possible, or migrate
    /// it to a new location, preserving the first `min(old_size, size)`
    /// bytes of content. `ptr == None` behaves like [`Allocator::allocate`];
    /// `size == 0` behaves like [`Allocator::deallocate`] and returns `None`.
    fn reallocate(
        &mut self,
        ptr: Option<NonNull<u8>>,
        size: usize,
        align: usize,
    ) -> Option<NonNull<u8>>;

    /// Return a previously allocated block to this allocator. `ptr == None`
    /// is a no-op.
    fn deallocate(&mut self, ptr: Option<NonNull<u8>>);

    /// Tear this allocator down, returning its backing region to whatever
    /// supplied it (if anything did). Double-`release` is undefined, as
    /// noted in spec.md §5.
    fn release(&mut self);
}
