//! Block lifecycle: allocation, retain/release, and payload access.
//!
//! A block is a single heap allocation consisting of a header (atomic
//! reference count, optional destructor, debug link-list head) followed
//! immediately by the caller's payload bytes. Callers only ever see the
//! opaque [`Ref`] handle, which keeps library-managed pointers distinct
//! from pointers obtained elsewhere.
//!
//! ## Layout
//!
//! ```text
//! ┌────────────────────────────┬───────────────────────────────┐
//! │ BlockHeader (align 16)     │ payload (caller-sized)        │
//! │  reference_count: atomic   │                               │
//! │  destructor: Option<fn>    │  address stable for the       │
//! │  payload_size              │  block's whole lifetime       │
//! │  links head (debug only)   │                               │
//! └────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! The header is 16-byte aligned so the payload that follows it is
//! suitably aligned for any scalar type.
//!
//! ## Contract
//!
//! `retain`, `release`, and `access` trust the caller's bookkeeping:
//! calling them on a block whose count already reached zero is undefined
//! behavior, not a reported error. Debug builds carry `debug_assert!`
//! underflow checks, mirroring manual reference-counting discipline.

use std::alloc::{self, Layout};
use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

#[cfg(feature = "debug-links")]
use std::sync::atomic::AtomicPtr;

use crate::error::AllocError;
use crate::stats::runtime_stats;

#[cfg(feature = "debug-links")]
use crate::links::{self, LinkNode};

/// Destructor callback invoked with the payload pointer, at most once,
/// immediately before the block's memory is returned to the allocator.
pub type Destructor = unsafe fn(*mut u8);

/// Header prefixed before every payload.
///
/// Only the reference count (and, in debug mode, the link-list head) is
/// ever mutated after creation, and only through atomics.
#[repr(C, align(16))]
pub(crate) struct BlockHeader {
    /// Live iff > 0; the 1 -> 0 transition destroys the block exactly once.
    reference_count: AtomicUsize,
    /// Associated destructor, if any.
    destructor: Option<Destructor>,
    /// Payload size in bytes, kept for deallocation.
    payload_size: usize,
    /// Head of the append-only list of diagnostic child edges.
    #[cfg(feature = "debug-links")]
    pub(crate) links: AtomicPtr<LinkNode>,
}

/// Layout of the whole allocation (header + payload) for a payload size.
fn block_layout(payload_size: usize) -> Result<Layout, AllocError> {
    let total = mem::size_of::<BlockHeader>()
        .checked_add(payload_size)
        .ok_or(AllocError::LayoutOverflow { size: payload_size })?;
    Layout::from_size_align(total, mem::align_of::<BlockHeader>())
        .map_err(|_| AllocError::LayoutOverflow { size: payload_size })
}

/// Opaque handle to a reference-counted block.
///
/// `Ref` is a plain copyable handle, not an owning smart pointer: copying
/// it does not retain, and dropping it does not release. All bookkeeping
/// is explicit through [`Ref::retain`] and [`Ref::release`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ref(NonNull<BlockHeader>);

// Safety: the header is only mutated through atomic operations; the
// payload carries no synchronization guarantee of its own and callers
// coordinate payload access themselves.
unsafe impl Send for Ref {}
unsafe impl Sync for Ref {}

impl Ref {
    /// Allocate a reference-counted block with a count of 1 and no
    /// destructor.
    pub fn allocate(size: usize) -> Result<Self, AllocError> {
        Self::allocate_inner(size, None)
    }

    /// Allocate a reference-counted block with a count of 1 and an
    /// associated destructor.
    ///
    /// The destructor is called with the payload pointer when the count
    /// reaches zero, before the block is freed.
    pub fn allocate_with(size: usize, destructor: Destructor) -> Result<Self, AllocError> {
        Self::allocate_inner(size, Some(destructor))
    }

    fn allocate_inner(size: usize, destructor: Option<Destructor>) -> Result<Self, AllocError> {
        let layout = block_layout(size)?;
        let Some(header) = NonNull::new(unsafe { alloc::alloc(layout) } as *mut BlockHeader)
        else {
            return Err(AllocError::OutOfMemory { size });
        };

        unsafe {
            header.as_ptr().write(BlockHeader {
                reference_count: AtomicUsize::new(1),
                destructor,
                payload_size: size,
                #[cfg(feature = "debug-links")]
                links: AtomicPtr::new(std::ptr::null_mut()),
            });
        }

        #[cfg(feature = "debug-links")]
        crate::registry::block_registry().register(header.as_ptr() as usize, size);

        runtime_stats().allocations.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "allocated block {:#x} ({} payload bytes)",
            header.as_ptr() as usize,
            size
        );

        Ok(Self(header))
    }

    /// Increase the reference count by one.
    ///
    /// Wait-free: a single atomic fetch-add. There is no failure mode.
    ///
    /// # Safety
    ///
    /// The block must be live (count > 0). Retaining a block after its
    /// count reached zero is undefined behavior.
    pub unsafe fn retain(self) {
        let old = self
            .header()
            .reference_count
            .fetch_add(1, Ordering::Relaxed);
        debug_assert!(old > 0, "retain of a destroyed block");
        runtime_stats().retains.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrease the reference count by one, destroying the block if this
    /// was the last reference.
    ///
    /// On reaching zero the destructor (if any) runs exactly once with
    /// the payload pointer, every owned link node is freed (debug mode),
    /// and the whole allocation is returned to the system allocator. The
    /// destructor runs synchronously on the releasing thread, without
    /// any lock held.
    ///
    /// The zero check uses the value returned by the atomic decrement,
    /// so exactly one caller observes the 1 -> 0 transition regardless
    /// of how many threads release concurrently.
    ///
    /// # Safety
    ///
    /// The caller must own a reference (from `allocate` or `retain`).
    /// Releasing more times than retained is undefined behavior, as is
    /// any use of the handle after the count reaches zero.
    pub unsafe fn release(self) {
        runtime_stats().releases.fetch_add(1, Ordering::Relaxed);
        let old = self
            .header()
            .reference_count
            .fetch_sub(1, Ordering::Release);
        debug_assert!(old > 0, "release of a destroyed block");
        if old == 1 {
            // Synchronize with payload writes made under other handles
            // before tearing the block down.
            fence(Ordering::Acquire);
            self.destroy();
        }
    }

    /// Returns the stable address of the payload region.
    ///
    /// Pure: no side effects, and the same address for every call over
    /// the block's lifetime.
    ///
    /// # Safety
    ///
    /// The block must be live (count > 0).
    pub unsafe fn access(self) -> *mut u8 {
        self.payload_ptr()
    }

    /// Current reference count, for diagnostics and tests.
    ///
    /// The value may be stale by the time the caller inspects it.
    ///
    /// # Safety
    ///
    /// The block must be live (count > 0).
    pub unsafe fn count(self) -> usize {
        self.header().reference_count.load(Ordering::Acquire)
    }

    /// Payload size in bytes, as requested at allocation.
    ///
    /// # Safety
    ///
    /// The block must be live (count > 0).
    pub unsafe fn payload_size(self) -> usize {
        self.header().payload_size
    }

    pub(crate) fn header_ptr(self) -> *mut BlockHeader {
        self.0.as_ptr()
    }

    unsafe fn header(&self) -> &BlockHeader {
        self.0.as_ref()
    }

    unsafe fn payload_ptr(self) -> *mut u8 {
        (self.0.as_ptr() as *mut u8).add(mem::size_of::<BlockHeader>())
    }

    #[cold]
    unsafe fn destroy(self) {
        let header = self.0.as_ptr();
        let size = (*header).payload_size;

        if let Some(destructor) = (*header).destructor {
            destructor(self.payload_ptr());
            runtime_stats().destructor_runs.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "debug-links")]
        {
            links::free_list((*header).links.load(Ordering::Acquire));
            crate::registry::block_registry().unregister(header as usize);
        }

        log::trace!("destroying block {:#x}", header as usize);

        // Layout arithmetic was validated when the block was allocated.
        let layout = Layout::from_size_align_unchecked(
            mem::size_of::<BlockHeader>() + size,
            mem::align_of::<BlockHeader>(),
        );
        alloc::dealloc(header as *mut u8, layout);
        runtime_stats().deallocations.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("address", &format_args!("{:#x}", self.0.as_ptr() as usize))
            .finish()
    }
}
