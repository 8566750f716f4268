//! Snapshot source trait — read-only access to the remote record store.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Snapshot;

/// Fetches the full current record set.
///
/// Implementations perform exactly one read per call and never retry;
/// the next scheduled cycle is the retry. Any transport, status or payload
/// problem is reported as an error with no partial result.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Snapshot>;
}
