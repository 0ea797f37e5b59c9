//! Swap Registry
//!
//! Tracks every swap this node takes part in, ongoing and past. An identity lives in
//! exactly one map entry, so it can never be both ongoing and past. The map lock is
//! held only for the map operation itself; status changes go through the entry's own
//! lock so unrelated swaps never contend on them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, SwapError};
use crate::swap::db::SwapDb;
use crate::swap::info::Info;
use crate::types::{Hash, Status};

/// Registry operations used by the protocol roles and the operator surface
#[async_trait]
pub trait SwapManager: Send + Sync {
    /// Inserts a new ongoing swap
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Swap registered
    /// * `Err(SwapError::DuplicateSwap)` - Identity already known, ongoing or past
    async fn add_swap(&self, info: Arc<Info>) -> Result<()>;

    async fn get_ongoing_swap(&self, id: &Hash) -> Option<Arc<Info>>;

    async fn get_ongoing_swaps(&self) -> Vec<Arc<Info>>;

    async fn get_past_swap(&self, id: &Hash) -> Option<Arc<Info>>;

    /// Past swap identities in completion order
    async fn get_past_ids(&self) -> Vec<Hash>;

    /// Sets the status of an ongoing swap. Terminal statuses are final.
    async fn update_status(&self, id: &Hash, status: Status) -> Result<()>;

    /// Moves a swap from ongoing to past, publishing its final status first.
    ///
    /// Completing an already completed swap is a no-op.
    async fn complete_ongoing_swap(&self, id: &Hash) -> Result<()>;
}

enum Entry {
    Ongoing(Arc<Info>),
    Past(Arc<Info>),
}

#[derive(Default)]
struct Swaps {
    entries: HashMap<Hash, Entry>,
    past_ids: Vec<Hash>,
}

/// In-memory registry with optional persistence of completed swaps
pub struct Manager {
    swaps: RwLock<Swaps>,
    db: Option<Arc<dyn SwapDb>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        Self {
            swaps: RwLock::new(Swaps::default()),
            db: None,
        }
    }

    /// Creates a registry backed by `db`, loading previously completed swaps as past swaps
    ///
    /// # Arguments
    ///
    /// * `db` - Store that completed swaps are written to
    ///
    /// # Returns
    ///
    /// * `Ok(Manager)` - Registry with past swaps restored
    /// * `Err(anyhow::Error)` - Failed to read the store
    pub fn with_db(db: Arc<dyn SwapDb>) -> anyhow::Result<Self> {
        let mut swaps = Swaps::default();
        for snapshot in db.get_all_swaps()? {
            if snapshot.status.is_ongoing() {
                warn!("Skipping persisted swap {:#x} with non-terminal status", snapshot.id);
                continue;
            }
            let id = snapshot.id;
            swaps.past_ids.push(id);
            swaps
                .entries
                .insert(id, Entry::Past(Arc::new(Info::from_snapshot(snapshot))));
        }
        info!("Loaded {} past swaps", swaps.past_ids.len());

        Ok(Self {
            swaps: RwLock::new(swaps),
            db: Some(db),
        })
    }
}

#[async_trait]
impl SwapManager for Manager {
    async fn add_swap(&self, info: Arc<Info>) -> Result<()> {
        let id = info.id();
        let mut swaps = self.swaps.write().await;
        if swaps.entries.contains_key(&id) {
            return Err(SwapError::DuplicateSwap(id));
        }
        swaps.entries.insert(id, Entry::Ongoing(info));
        drop(swaps);

        info!("Added swap {:#x}", id);
        Ok(())
    }

    async fn get_ongoing_swap(&self, id: &Hash) -> Option<Arc<Info>> {
        match self.swaps.read().await.entries.get(id) {
            Some(Entry::Ongoing(info)) => Some(info.clone()),
            _ => None,
        }
    }

    async fn get_ongoing_swaps(&self) -> Vec<Arc<Info>> {
        self.swaps
            .read()
            .await
            .entries
            .values()
            .filter_map(|entry| match entry {
                Entry::Ongoing(info) => Some(info.clone()),
                Entry::Past(_) => None,
            })
            .collect()
    }

    async fn get_past_swap(&self, id: &Hash) -> Option<Arc<Info>> {
        match self.swaps.read().await.entries.get(id) {
            Some(Entry::Past(info)) => Some(info.clone()),
            _ => None,
        }
    }

    async fn get_past_ids(&self) -> Vec<Hash> {
        self.swaps.read().await.past_ids.clone()
    }

    async fn update_status(&self, id: &Hash, status: Status) -> Result<()> {
        let info = self
            .get_ongoing_swap(id)
            .await
            .ok_or(SwapError::NotFound(*id))?;
        info.set_status(status)?;
        debug!("Swap {:#x} status updated to {}", id, status);
        Ok(())
    }

    async fn complete_ongoing_swap(&self, id: &Hash) -> Result<()> {
        let info = {
            let mut swaps = self.swaps.write().await;
            let info = match swaps.entries.get(id) {
                Some(Entry::Ongoing(info)) => info.clone(),
                Some(Entry::Past(_)) => return Ok(()),
                None => return Err(SwapError::NotFound(*id)),
            };
            // Publish while still holding the map lock so no second completer can
            // observe the entry as ongoing.
            let status = info.finalize()?;
            swaps.entries.insert(*id, Entry::Past(info.clone()));
            swaps.past_ids.push(*id);
            info!("Completed swap {:#x} with status {}", id, status);
            info
        };

        if let Some(db) = &self.db {
            if let Err(e) = db.put_swap(&info.snapshot()) {
                warn!("Failed to persist completed swap {:#x}: {:#}", id, e);
            }
        }
        Ok(())
    }
}
