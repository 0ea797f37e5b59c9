//! Past-swap persistence
//!
//! Completed swaps are written as one JSON file per swap and reloaded as past
//! swaps when the registry starts.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::swap::info::InfoSnapshot;
use crate::types::Hash;

pub trait SwapDb: Send + Sync {
    fn put_swap(&self, info: &InfoSnapshot) -> Result<()>;
    fn get_swap(&self, id: &Hash) -> Result<Option<InfoSnapshot>>;
    /// All persisted swaps, ordered by end time
    fn get_all_swaps(&self) -> Result<Vec<InfoSnapshot>>;
}

pub struct JsonFileDb {
    base_dir: PathBuf,
}

impl JsonFileDb {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create directory: {:?}", base_dir))?;
        Ok(Self { base_dir })
    }

    fn swap_file_path(&self, id: &Hash) -> PathBuf {
        self.base_dir.join(format!("{:x}.json", id))
    }
}

impl SwapDb for JsonFileDb {
    fn put_swap(&self, info: &InfoSnapshot) -> Result<()> {
        let path = self.swap_file_path(&info.id);
        let json = serde_json::to_string_pretty(info)
            .with_context(|| format!("Failed to serialize swap {:#x}", info.id))?;
        fs::write(&path, json).with_context(|| format!("Failed to write swap file: {:?}", path))?;
        Ok(())
    }

    fn get_swap(&self, id: &Hash) -> Result<Option<InfoSnapshot>> {
        let path = self.swap_file_path(id);
        if !path.exists() {
            return Ok(None);
        }
        read_swap_file(&path).map(Some)
    }

    fn get_all_swaps(&self) -> Result<Vec<InfoSnapshot>> {
        let entries = fs::read_dir(&self.base_dir)
            .with_context(|| format!("Failed to read directory: {:?}", self.base_dir))?;

        let mut swaps = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read entry in {:?}", self.base_dir))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            swaps.push(read_swap_file(&path)?);
        }
        swaps.sort_by_key(|s| (s.end_time.unwrap_or(i64::MAX), s.start_time));
        Ok(swaps)
    }
}

fn read_swap_file(path: &Path) -> Result<InfoSnapshot> {
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read swap file: {:?}", path))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse swap file: {:?}", path))
}
