//! # StoreWatch Store
//! Snapshot sources for the remote record store.

pub mod jsonbin;

pub use jsonbin::JsonBinSource;

use storewatch_core::config::StoreConfig;
use storewatch_core::error::Result;
use storewatch_core::traits::SnapshotSource;

/// Create the snapshot source described by the store configuration.
pub fn create_source(config: &StoreConfig) -> Result<Box<dyn SnapshotSource>> {
    Ok(Box::new(JsonBinSource::new(config)?))
}
