//! JSON persistence for crawl inputs, checkpoints and results
//!
//! Every file is a pretty-printed (two-space indented) JSON array. Writes go
//! to a sibling temporary file that is renamed over the target, so an
//! interrupted write never clobbers the previous checkpoint.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::{ffi::OsString, io};
use tokio::fs;
use tracing::debug;

use super::{CatalogItem, CrawlEntry};
use crate::error::Error as CrateError;

/// Locations of the files produced and consumed by the crawler
#[derive(Debug, Clone)]
pub struct CrawlPaths {
    /// Output of link enumeration, input of the product crawl
    pub links: PathBuf,

    /// Periodic partial snapshot of the product crawl
    pub checkpoint: PathBuf,

    /// Complete product crawl result
    pub output: PathBuf,
}

impl Default for CrawlPaths {
    fn default() -> Self {
        Self {
            links: PathBuf::from("shl_links_with_adaptive.json"),
            checkpoint: PathBuf::from("shl_products_final_checkpoint.json"),
            output: PathBuf::from("shl_products_final.json"),
        }
    }
}

impl CrawlPaths {
    /// Place all three default file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let defaults = Self::default();
        let dir = dir.as_ref();
        Self {
            links: dir.join(defaults.links),
            checkpoint: dir.join(defaults.checkpoint),
            output: dir.join(defaults.output),
        }
    }
}

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl From<StorageError> for CrateError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => CrateError::Io(e),
            StorageError::Json(e) => CrateError::Json(e),
            StorageError::NotFound(_) => CrateError::Storage(err.to_string()),
        }
    }
}

type Result<T> = std::result::Result<T, StorageError>;

/// Write `value` as an indented JSON document, replacing `path` atomically
pub async fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Read a JSON document, reporting a missing file as `NotFound`
pub async fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Persist the enumerated catalog
pub async fn save_links(path: &Path, items: &[CatalogItem]) -> Result<()> {
    write_json(path, items).await
}

/// Load the enumerated catalog
pub async fn load_links(path: &Path) -> Result<Vec<CatalogItem>> {
    read_json(path).await
}

/// Persist crawl entries (checkpoint or final output)
pub async fn save_entries(path: &Path, entries: &[CrawlEntry]) -> Result<()> {
    write_json(path, entries).await
}

/// Load crawl entries written by `save_entries`
pub async fn load_entries(path: &Path) -> Result<Vec<CrawlEntry>> {
    read_json(path).await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("crawl"));
    name.push(".tmp");
    path.with_file_name(name)
}
