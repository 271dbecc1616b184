//! # refc
//!
//! Reference-counted raw allocations with optional destructors and a
//! debug-mode ownership-cycle detector.
//!
//! The library hands out opaque [`Ref`] handles to blocks of raw memory
//! whose lifetime is governed by an atomic reference count instead of a
//! single owner. The ownership rules mirror classic manual reference
//! counting:
//!
//! 1. You own any block you create with [`Ref::allocate`].
//! 2. If you receive a `Ref` as a parameter you do not own it.
//! 3. To keep it past the call you must own it: call [`Ref::retain`].
//! 4. If you own it you must call [`Ref::release`] when done.
//!
//! A block may carry a destructor that runs exactly once, on whichever
//! thread drives the count to zero, immediately before the memory is
//! returned to the system allocator.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                          refc                             │
//! ├───────────────────────────────────────────────────────────┤
//! │                                                           │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │    Blocks    │   │  Link Graph  │   │   Registry   │   │
//! │  │  (block.rs)  │   │  (links.rs)  │   │(registry.rs) │   │
//! │  └──────────────┘   └──────────────┘   └──────────────┘   │
//! │         │                  │                  │           │
//! │         └──────────────────┼──────────────────┘           │
//! │                            │                              │
//! │                   system allocator                        │
//! │                                                           │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Debug link graph
//!
//! With the `debug-links` feature (on by default), [`link`] and
//! [`unlink`] maintain a lock-free, per-block list of caller-declared
//! parent→child ownership edges. `link` rejects any edge that would
//! close a cycle, catching the ownership loops that manual reference
//! counting can never reclaim. The graph is purely diagnostic: linking
//! never touches a reference count. Without the feature both operations
//! compile to no-ops.
//!
//! ## What this is not
//!
//! - Not a garbage collector: cycles are detected, never broken.
//! - Not a synchronization primitive for payload contents: only the
//!   count and the link graph are synchronized; callers coordinate
//!   payload access themselves.
//!
//! ## Example
//!
//! ```
//! use refc::Ref;
//!
//! let r = Ref::allocate(64).unwrap();
//! unsafe {
//!     let payload = r.access();
//!     payload.write(42);
//!     r.retain();
//!     r.release();
//!     assert_eq!(*r.access(), 42);
//!     r.release(); // count reaches zero, memory is freed
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod block;
pub mod error;
pub mod links;
#[cfg(feature = "debug-links")]
pub mod registry;
pub mod stats;

pub use block::{Destructor, Ref};
pub use error::{AllocError, LinkError};
pub use links::{link, unlink};
pub use stats::{runtime_stats, RuntimeStats};

#[cfg(feature = "debug-links")]
pub use registry::{block_registry, BlockRegistry};
