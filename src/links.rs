//! Debug link graph: diagnostic parent→child ownership edges.
//!
//! Manual reference counting cannot reclaim ownership cycles, so a
//! cycle that sneaks into a program leaks forever. This module lets a
//! program declare its intended ownership edges and rejects any edge
//! that would close a cycle, turning a silent leak into a loud result.
//!
//! Each block carries the head of an append-only, lock-free singly
//! linked list of [`LinkNode`]s. Insertion is a compare-exchange push
//! onto the front; removal never unlinks a node, it only clears the
//! node's child pointer (a tombstone). Structural removal from a
//! lock-free singly linked list while other threads traverse it is a
//! known hazard, and the append-only design sidesteps it entirely:
//! `next` pointers are never written after a node is created, so a
//! plain traversal is always safe. Nodes are reclaimed in one sweep
//! when their owning block is destroyed, tombstoned or not.
//!
//! Linking is purely diagnostic. It never changes a reference count,
//! and the cycle search is best effort: it is not linearized against
//! concurrent `link` calls elsewhere in the graph, so it may (rarely)
//! miss a cycle formed concurrently or traverse an edge that was just
//! tombstoned. That is an accepted limitation of the design, suitable
//! for debugging and assertions rather than safety-critical enforcement.
//!
//! Without the `debug-links` feature there is no graph to maintain:
//! [`link`] reports success without recording anything and [`unlink`]
//! reports not-found.

use crate::block::Ref;
use crate::error::LinkError;

#[cfg(feature = "debug-links")]
use std::alloc::{self, Layout};
#[cfg(feature = "debug-links")]
use std::ptr;
#[cfg(feature = "debug-links")]
use std::sync::atomic::{AtomicPtr, Ordering};

#[cfg(feature = "debug-links")]
use crate::block::BlockHeader;
#[cfg(feature = "debug-links")]
use crate::stats::runtime_stats;

/// A single parent→child edge in a block's link list.
#[cfg(feature = "debug-links")]
pub(crate) struct LinkNode {
    /// The child block, or null once the edge is tombstoned.
    value: AtomicPtr<BlockHeader>,
    /// The list head at insertion time. Never written after creation.
    next: *const LinkNode,
}

/// Record a diagnostic ownership edge from `parent` to `child`.
///
/// The edge is rejected with [`LinkError::Cycle`] if `child` already
/// reaches `parent` through existing edges (including `parent == child`),
/// in which case nothing is mutated. On success a fresh node is pushed
/// onto the front of the parent's edge list with a lock-free
/// compare-exchange retry loop; only the commit step retries.
///
/// Linking the same pair twice records two independent edges.
///
/// # Safety
///
/// Both blocks must be live (count > 0) for the duration of the call.
#[cfg(feature = "debug-links")]
pub unsafe fn link(parent: Ref, child: Ref) -> Result<(), LinkError> {
    let parent_ptr = parent.header_ptr();
    let child_ptr = child.header_ptr();

    if parent_ptr == child_ptr || reaches(child_ptr, parent_ptr) {
        runtime_stats().links_rejected.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "link {:#x} -> {:#x} rejected: would close a cycle",
            parent_ptr as usize,
            child_ptr as usize
        );
        return Err(LinkError::Cycle);
    }

    let node = alloc::alloc(Layout::new::<LinkNode>()) as *mut LinkNode;
    if node.is_null() {
        runtime_stats().links_rejected.fetch_add(1, Ordering::Relaxed);
        return Err(LinkError::NodeAllocation);
    }
    node.write(LinkNode {
        value: AtomicPtr::new(child_ptr),
        next: ptr::null(),
    });

    let head = &(*parent_ptr).links;
    let mut current = head.load(Ordering::Acquire);
    loop {
        // The node is unpublished until the compare-exchange commits, so
        // rewriting `next` on a retry is still a plain store.
        (*node).next = current;
        match head.compare_exchange_weak(current, node, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }

    runtime_stats().links_created.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

/// Remove the diagnostic edge from `parent` to `child`.
///
/// Scans the parent's edge list from the head and tombstones the first
/// node whose child matches: a single atomic null store into the node's
/// value. Returns `true` if an edge was removed, `false` if no live
/// matching edge was found. The node itself stays in the list until the
/// parent block is destroyed, so a second identical call returns
/// `false` and a later re-`link` creates a fresh edge rather than
/// reviving the tombstone.
///
/// # Safety
///
/// Both blocks must be live (count > 0) for the duration of the call.
#[cfg(feature = "debug-links")]
pub unsafe fn unlink(parent: Ref, child: Ref) -> bool {
    let child_ptr = child.header_ptr();
    let mut node = (*parent.header_ptr()).links.load(Ordering::Acquire) as *const LinkNode;
    while !node.is_null() {
        if (*node).value.load(Ordering::Acquire) == child_ptr {
            (*node).value.store(ptr::null_mut(), Ordering::Release);
            runtime_stats().unlinks.fetch_add(1, Ordering::Relaxed);
            log::trace!(
                "unlinked {:#x} -> {:#x}",
                parent.header_ptr() as usize,
                child_ptr as usize
            );
            return true;
        }
        node = (*node).next;
    }
    false
}

/// Depth-first search for `target` in the set reachable from `from`'s
/// edges, skipping tombstones.
///
/// The graph is kept acyclic by `link`, which bounds the recursion.
#[cfg(feature = "debug-links")]
unsafe fn reaches(from: *const BlockHeader, target: *const BlockHeader) -> bool {
    let mut node = (*from).links.load(Ordering::Acquire) as *const LinkNode;
    while !node.is_null() {
        let child = (*node).value.load(Ordering::Acquire);
        if !child.is_null() && (child as *const BlockHeader == target || reaches(child, target)) {
            return true;
        }
        node = (*node).next;
    }
    false
}

/// Free every node in a block's edge list, tombstoned or not.
///
/// Called once, when the owning block is destroyed; there is no
/// ordering guarantee among the freed nodes.
#[cfg(feature = "debug-links")]
pub(crate) unsafe fn free_list(head: *mut LinkNode) {
    let mut node = head;
    while !node.is_null() {
        let next = (*node).next as *mut LinkNode;
        alloc::dealloc(node as *mut u8, Layout::new::<LinkNode>());
        node = next;
    }
}

/// Record a diagnostic ownership edge from `parent` to `child`.
///
/// The `debug-links` feature is disabled, so there is no graph to
/// maintain: this always reports success without recording anything.
///
/// # Safety
///
/// Both blocks must be live (count > 0).
#[cfg(not(feature = "debug-links"))]
pub unsafe fn link(_parent: Ref, _child: Ref) -> Result<(), LinkError> {
    Ok(())
}

/// Remove the diagnostic edge from `parent` to `child`.
///
/// The `debug-links` feature is disabled, so there is no graph to
/// maintain: this always reports that no edge was found.
///
/// # Safety
///
/// Both blocks must be live (count > 0).
#[cfg(not(feature = "debug-links"))]
pub unsafe fn unlink(_parent: Ref, _child: Ref) -> bool {
    false
}
