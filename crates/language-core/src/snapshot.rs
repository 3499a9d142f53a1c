use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of one content snapshot.
///
/// Ids are handed out from a monotonic counter, so a snapshot created later
/// always has a larger id. Every derived structure (source maps, linked-code
/// maps, line indexes) is cached under this id; replacing a document's
/// snapshot is what invalidates those caches, never in-place mutation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct SnapshotId(u64);

/// An immutable piece of document content with a stable identity.
///
/// Cloning shares both the text and the identity; constructing a new snapshot
/// from equal text yields a distinct identity. Identity, not text equality,
/// is what all snapshot-keyed caches compare.
#[derive(Clone)]
pub struct Snapshot {
    id: SnapshotId,
    text: Arc<str>,
}

impl Snapshot {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            id: SnapshotId(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed)),
            text: text.into(),
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id.0)
            .field("len", &self.text.len())
            .finish()
    }
}
