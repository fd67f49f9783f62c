//! Port for the external checkpoint blob store `remap_store` copies into
//! (spec.md §4.2). Owned by collaborators, not the core (spec.md §1
//! Non-goals: "does not implement the checkpoint store") — this is the seam
//! the core dispatches through, grounded in the teacher's pattern of a small
//! `Store`-suffixed async trait per external dependency rather than a single
//! god-trait.

use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copies `tmp_bucket/tmp_key` to `bucket/key`, then deletes the source.
    async fn copy_then_delete(
        &self,
        tmp_bucket: &str,
        tmp_key: &str,
        bucket: &str,
        key: &str,
    ) -> anyhow::Result<()>;
}

/// Default binding used when no real object store is wired in — logs the
/// operation and succeeds. Matches spec.md §9's acknowledged open question
/// about behavior implementers should preserve rather than invent: the core
/// commits to dispatching `remap_store`, not to owning the storage backend.
pub struct NullObjectStore;

#[async_trait]
impl ObjectStore for NullObjectStore {
    async fn copy_then_delete(
        &self,
        tmp_bucket: &str,
        tmp_key: &str,
        bucket: &str,
        key: &str,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            tmp_bucket,
            tmp_key,
            bucket,
            key,
            "remap_store: no object store wired in, treating as a no-op"
        );
        Ok(())
    }
}
