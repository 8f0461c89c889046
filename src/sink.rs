//! Persistence sinks for ingested records.
//!
//! A sink is opened once per worker and shared by every connection task, so
//! implementations must tolerate concurrent inserts.

use std::{path::Path, sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::time::timeout;

use crate::{error::SinkError, settings::Settings, structures::Record};

#[async_trait]
pub trait Sink: Send + Sync {
    async fn insert(&self, record: Record) -> Result<(), SinkError>;
}

/// Records stored as JSON documents in one sled tree, keyed by a
/// monotonically generated id.
#[derive(Debug, Clone)]
pub struct SledSink {
    db: sled::Db,
    tree: sled::Tree,
    timeout: Duration,
}

impl SledSink {
    pub fn open(
        path: &Path,
        collection: &str,
        compression: bool,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let db = sled::Config::default()
            .use_compression(compression)
            .path(path)
            .open()?;
        log::info!("Database opened: {}", path.display());
        log::info!("Database was recovered: {}", db.was_recovered());
        log::info!("Database size on disk: {:?}", db.size_on_disk());
        let tree = db.open_tree(collection)?;
        Ok(SledSink { db, tree, timeout })
    }

    pub fn from_settings(cfg: &Settings) -> Result<Self, SinkError> {
        Self::open(
            &cfg.store_path(),
            &cfg.store_collection,
            cfg.store_compression,
            cfg.sink_timeout(),
        )
    }

    /// Every stored record in insertion order.
    pub fn records(&self) -> Result<Vec<Record>, SinkError> {
        self.tree
            .iter()
            .values()
            .map(|value| Ok(serde_json::from_slice(&value?)?))
            .collect()
    }
}

#[async_trait]
impl Sink for SledSink {
    async fn insert(&self, record: Record) -> Result<(), SinkError> {
        let document = serde_json::to_vec(&record)?;
        let db = self.db.clone();
        let tree = self.tree.clone();
        // sled blocks on IO, keep it off the reactor threads
        let write = tokio::task::spawn_blocking(move || -> Result<u64, SinkError> {
            let id = db.generate_id()?;
            tree.insert(id.to_be_bytes(), document)?;
            Ok(id)
        });
        let id = timeout(self.timeout, write)
            .await
            .map_err(|_| SinkError::Timeout(self.timeout))???;
        log::debug!("Stored record {}", id);
        Ok(())
    }
}

/// Keeps records in memory. Useful when embedding the pipeline without a store.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn insert(&self, record: Record) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|e| SinkError::Rejected(e.to_string()))?
            .push(record);
        Ok(())
    }
}
