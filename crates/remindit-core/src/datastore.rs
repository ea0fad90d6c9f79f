use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::item::Item;
use crate::store::ItemStore;

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub items_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let items_path = data_dir.join("items.data");
        if !items_path.exists() {
            fs::write(&items_path, "")
                .with_context(|| format!("failed to create {}", items_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            items = %items_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            items_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_items(&self) -> anyhow::Result<ItemStore> {
        let items: Vec<Item> = load_jsonl(&self.items_path).context("failed to load items.data")?;
        ItemStore::from_items(items).context("items.data contains a duplicate id")
    }

    #[tracing::instrument(skip(self, store), fields(count = store.len()))]
    pub fn save_items(&self, store: &ItemStore) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.items_path, store.list()).context("failed to save items.data")
    }
}

fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let reader = BufReader::new(fs::File::open(path)?);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records");
    Ok(out)
}

fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    let mut payload = String::new();
    for record in records {
        payload.push_str(&serde_json::to_string(record)?);
        payload.push('\n');
    }
    write_atomic(path, payload.as_bytes())
}

/// Replaces `path` through a temp file in the same directory so readers never
/// observe a partial write.
#[tracing::instrument(skip_all, fields(path = %path.display(), bytes = contents.len()))]
pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    debug!("wrote file atomically");
    Ok(())
}
