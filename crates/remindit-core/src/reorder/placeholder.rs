use tracing::trace;
use uuid::Uuid;

/// One row of the displayed list while a drag is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Item(Uuid),
    Placeholder,
}

/// Owns the drop marker inside the displayed sequence.
///
/// The displayed sequence is the committed order with the dragged item
/// detached; it holds at most one [`Slot::Placeholder`].
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTracker {
    slots: Vec<Slot>,
    index: Option<usize>,
}

impl PlaceholderTracker {
    pub fn new(items: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            slots: items.into_iter().map(Slot::Item).collect(),
            index: None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_visible(&self) -> bool {
        self.index.is_some()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Moves the marker to `new_index`. Returns `false` when nothing changed.
    pub fn set_index(&mut self, new_index: usize) -> bool {
        let item_count = self.item_count();
        let new_index = new_index.min(item_count);
        if self.index == Some(new_index) {
            return false;
        }

        self.detach();
        self.slots.insert(new_index, Slot::Placeholder);
        self.index = Some(new_index);
        trace!(index = new_index, "placeholder moved");
        true
    }

    /// Removes the marker. Safe to call when it is already hidden.
    pub fn clear(&mut self) -> bool {
        let was_visible = self.is_visible();
        self.detach();
        self.index = None;
        was_visible
    }

    /// Replaces the item rows, keeping the marker at a valid index.
    pub fn sync_items(&mut self, items: impl IntoIterator<Item = Uuid>) {
        let index = self.index;
        self.slots = items.into_iter().map(Slot::Item).collect();
        self.index = None;
        if let Some(index) = index {
            self.set_index(index);
        }
    }

    fn detach(&mut self) {
        self.slots.retain(|slot| *slot != Slot::Placeholder);
    }

    fn item_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Item(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{PlaceholderTracker, Slot};

    fn placeholder_count(tracker: &PlaceholderTracker) -> usize {
        tracker
            .slots()
            .iter()
            .filter(|slot| **slot == Slot::Placeholder)
            .count()
    }

    #[test]
    fn moving_keeps_a_single_marker() {
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let mut tracker = PlaceholderTracker::new(ids);

        assert!(tracker.set_index(0));
        assert!(tracker.set_index(2));
        assert_eq!(placeholder_count(&tracker), 1);
        assert_eq!(tracker.slots()[2], Slot::Placeholder);
        assert_eq!(tracker.slots()[0], Slot::Item(ids[0]));
    }

    #[test]
    fn same_index_is_a_no_op() {
        let mut tracker = PlaceholderTracker::new([Uuid::new_v4()]);
        assert!(tracker.set_index(1));
        assert!(!tracker.set_index(1));
        assert!(!tracker.set_index(7));
        assert_eq!(tracker.index(), Some(1));
    }

    #[test]
    fn clear_twice_is_safe() {
        let mut tracker = PlaceholderTracker::new([Uuid::new_v4()]);
        tracker.set_index(0);
        assert!(tracker.clear());
        assert!(!tracker.clear());
        assert!(!tracker.is_visible());
        assert_eq!(placeholder_count(&tracker), 0);
    }

    #[test]
    fn sync_clamps_marker_to_shorter_list() {
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut tracker = PlaceholderTracker::new(ids);
        tracker.set_index(3);

        tracker.sync_items([ids[0]]);
        assert_eq!(tracker.index(), Some(1));
        assert_eq!(tracker.slots(), &[Slot::Item(ids[0]), Slot::Placeholder]);
    }
}
