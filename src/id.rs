//! Process-wide allocator for AST node identities.

use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// Opaque, monotonically increasing node identity.
pub type NodeId = u32;

/// Allocates the next unused id.
pub fn next() -> NodeId {
    NEXT_ID.fetch_add(1, Ordering::SeqCst)
}

/// Resets the allocator. Only meant for test isolation between
/// independent compilations running in the same process.
pub fn reset() {
    NEXT_ID.store(0, Ordering::SeqCst);
}
