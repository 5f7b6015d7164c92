//! A user-space memory allocator family built entirely over caller-supplied
//! memory: a constant-time TLSF general-purpose heap, plus three smaller
//! building blocks — a forward/bump allocator, an indexed fixed-slot pool,
//! and a hierarchical bitmap.
//!
//!  - **`Tlsf` allocation and deallocation are guaranteed to complete in
//!    constant time.** Suitable for real-time applications, per the
//!    original TLSF paper¹.
//!
//!  - **Every allocator here is handed its backing memory by the caller.**
//!    None of them call into a system allocator or manage virtual memory;
//!    examples include a `static` array for a fixed arena, or a block
//!    carved out of a larger allocator.
//!
//!  - **This crate supports `#![no_std]`.** It can be used in bare-metal and
//!    RTOS-based applications.
//!
//! # Layout
//!
//! - [`tlsf`] — the general-purpose heap ([`tlsf::Tlsf`]).
//! - [`forward`] — a bump allocator ([`forward::ForwardAllocator`]).
//! - [`pool`] — an indexed fixed-slot allocator ([`pool::IndexedPool`]).
//! - [`bitmap`] — the hierarchical bitmap ([`bitmap::Bitlist`]) the other
//!   three engines do not directly depend on, but which the same family of
//!   original allocators builds on for availability tracking.
//! - [`facade`] — the [`facade::Allocator`] trait every engine above
//!   implements, so callers can hold one of several allocator kinds behind a
//!   single interface.
//!
//! The original C sources this crate's algorithms are grounded in expose a
//! `gCreateHeapAllocator` facade that simply forwards to TLSF construction;
//! there is no separate "generic heap" type here for the same reason —
//! [`create_tlsf`] *is* that entry point.
//!
//! <sub>¹ M. Masmano, I. Ripoll, A. Crespo and J. Real, "TLSF: a new dynamic
//! memory allocator for real-time systems," *Proceedings. 16th Euromicro
//! Conference on Real-Time Systems*, 2004. ECRTS 2004., Catania, Italy, 2004,
//! pp. 79-88, doi: 10.1109/EMRTS.2004.1311009.</sub>
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![cfg_attr(feature = "doc_cfg", feature(doc_cfg))]

pub mod bitmap;
pub mod facade;
pub mod forward;
mod int;
pub mod pool;
pub mod tlsf;

pub use facade::Allocator;
pub use tlsf::PoolError;

/// Construct the general-purpose TLSF heap over `region` (spec.md §6).
pub fn create_tlsf(region: &mut [u8]) -> Result<tlsf::Tlsf, PoolError> {
    tlsf::Tlsf::new(region)
}

/// Construct a forward (bump) allocator over `region` (spec.md §6). This
/// constructor never fails: any non-empty region is usable.
pub fn create_forward(region: &mut [u8]) -> forward::ForwardAllocator<'_> {
    forward::ForwardAllocator::new(region)
}

/// Construct an indexed fixed-slot pool over `region`, carving it into
/// `slot_count` slots of `slot_size` bytes aligned to `alignment`
/// (spec.md §6).
pub fn create_indexed_pool(
    region: &mut [u8],
    slot_size: usize,
    alignment: usize,
    slot_count: u32,
) -> Result<pool::IndexedPool<'_>, PoolError> {
    pool::IndexedPool::new(region, slot_size, alignment, slot_count)
}

#[cfg(any(test, feature = "std"))]
extern crate std;
