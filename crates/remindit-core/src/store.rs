use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::item::{Item, ItemPatch};
use crate::reorder::ReorderError;

/// Result of a successful [`ItemStore::reorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moved {
    pub from: usize,
    pub to: usize,
}

/// The committed, ordered task list. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStore {
    items: Vec<Item>,
}

impl ItemStore {
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<Self, ReorderError> {
        let mut store = Self::default();
        for item in items {
            store.append(item)?;
        }
        Ok(store)
    }

    pub fn list(&self) -> &[Item] {
        &self.items
    }

    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.items.iter().map(|item| item.id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn append(&mut self, item: Item) -> Result<(), ReorderError> {
        if self.position(item.id).is_some() {
            return Err(ReorderError::DuplicateItem(item.id));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Result<Item, ReorderError> {
        let idx = self.position(id).ok_or(ReorderError::InvalidReference(id))?;
        Ok(self.items.remove(idx))
    }

    pub fn update(&mut self, id: Uuid, patch: &ItemPatch, now: DateTime<Utc>) -> Result<&Item, ReorderError> {
        let idx = self.position(id).ok_or(ReorderError::InvalidReference(id))?;
        let item = &mut self.items[idx];
        patch.apply(item, now);
        Ok(item)
    }

    /// Moves `id` so it ends up at `target`, counted with the item already
    /// taken out. Out-of-range targets clamp to the end.
    #[instrument(skip(self), fields(len = self.items.len()))]
    pub fn reorder(&mut self, id: Uuid, target: usize) -> Result<Moved, ReorderError> {
        let from = self.position(id).ok_or(ReorderError::InvalidReference(id))?;
        let item = self.items.remove(from);
        let to = target.min(self.items.len());
        self.items.insert(to, item);
        debug!(%id, from, to, "reordered item");
        Ok(Moved { from, to })
    }
}
