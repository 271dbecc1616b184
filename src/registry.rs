//! Live-block registry for leak diagnostics (`debug-links` only).
//!
//! Tracks the address and payload size of every block that has been
//! allocated but not yet destroyed. A program that believes it has
//! released everything can ask the registry what is still outstanding,
//! which together with the link graph pins down where a leaked cycle
//! lives.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

/// Registry of live blocks, keyed by header address.
pub struct BlockRegistry {
    blocks: RwLock<HashMap<usize, usize>>,
}

impl BlockRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Record a freshly allocated block.
    pub(crate) fn register(&self, address: usize, payload_size: usize) {
        self.blocks.write().insert(address, payload_size);
    }

    /// Forget a destroyed block.
    pub(crate) fn unregister(&self, address: usize) {
        self.blocks.write().remove(&address);
    }

    /// Whether a block at this address is currently live.
    pub fn is_live(&self, address: usize) -> bool {
        self.blocks.read().contains_key(&address)
    }

    /// Payload size of a live block, if any.
    pub fn payload_size(&self, address: usize) -> Option<usize> {
        self.blocks.read().get(&address).copied()
    }

    /// Number of live blocks.
    pub fn live_count(&self) -> usize {
        self.blocks.read().len()
    }

    /// Snapshot of all live blocks as (address, payload size) pairs.
    pub fn live_blocks(&self) -> Vec<(usize, usize)> {
        self.blocks.read().iter().map(|(&a, &s)| (a, s)).collect()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global registry instance.
static BLOCK_REGISTRY: OnceLock<BlockRegistry> = OnceLock::new();

/// Get the global block registry.
pub fn block_registry() -> &'static BlockRegistry {
    BLOCK_REGISTRY.get_or_init(BlockRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Ref;

    #[test]
    fn allocation_appears_and_disappears() {
        let r = Ref::allocate(96).unwrap();
        let address = r.header_ptr() as usize;

        let registry = block_registry();
        assert!(registry.is_live(address));
        assert_eq!(registry.payload_size(address), Some(96));
        assert!(registry.live_blocks().contains(&(address, 96)));

        unsafe { r.release() };
        // A parallel test may reuse the freed address, but not with this
        // test's distinctive payload size.
        assert_ne!(registry.payload_size(address), Some(96));
    }

    #[test]
    fn retained_block_stays_live() {
        let r = Ref::allocate(97).unwrap();
        let address = r.header_ptr() as usize;

        unsafe {
            r.retain();
            r.release();
            assert_eq!(block_registry().payload_size(address), Some(97));
            r.release();
        }
        assert_ne!(block_registry().payload_size(address), Some(97));
    }
}
