//! Flat selection index: one vector of records, three minimum cursors.
//!
//! Push is `O(1)`; any mutation that could move a minimum refreshes the
//! affected cursors with a linear sweep. For the small client counts most
//! deployments actually run, the sweep's locality beats the heaps' pointer
//! chasing.

use crate::client::{ClientStore, SlotId};
use crate::index::{precedes, View, VIEW_COUNT};

/// Vector-backed selection index.
pub(crate) struct FlatIndex {
    items: Vec<SlotId>,
    /// Position of the current minimum under each view. Meaningless while
    /// `items` is empty.
    tops: [usize; VIEW_COUNT],
}

impl FlatIndex {
    pub(crate) const fn new() -> Self {
        Self {
            items: Vec::new(),
            tops: [0; VIEW_COUNT],
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// The minimum record under `view`, `O(1)`.
    pub(crate) fn top(&self, view: View) -> Option<SlotId> {
        self.items.get(self.tops[view.as_usize()]).copied()
    }

    pub(crate) fn push<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        store.get_mut(slot).vec_pos = self.items.len();
        self.items.push(slot);
        self.refresh_all(store);
    }

    pub(crate) fn remove<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        let pos = store.get(slot).vec_pos;
        debug_assert_eq!(self.items[pos], slot, "flat index position out of sync");
        self.items.swap_remove(pos);
        if pos < self.items.len() {
            store.get_mut(self.items[pos]).vec_pos = pos;
        }
        self.refresh_all(store);
    }

    /// Recomputes all three cursors in a single sweep.
    pub(crate) fn refresh_all<C, R>(&mut self, store: &ClientStore<C, R>) {
        self.tops = [0; VIEW_COUNT];
        for i in 1..self.items.len() {
            for view in [View::Reservation, View::Ready, View::Limit] {
                let v = view.as_usize();
                if precedes(
                    view,
                    store.get(self.items[i]),
                    store.get(self.items[self.tops[v]]),
                ) {
                    self.tops[v] = i;
                }
            }
        }
    }

    /// Recomputes one cursor.
    pub(crate) fn refresh_view<C, R>(&mut self, view: View, store: &ClientStore<C, R>) {
        let v = view.as_usize();
        self.tops[v] = 0;
        for i in 1..self.items.len() {
            if precedes(
                view,
                store.get(self.items[i]),
                store.get(self.items[self.tops[v]]),
            ) {
                self.tops[v] = i;
            }
        }
    }
}
