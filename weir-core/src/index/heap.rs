//! Indexed intrusive binary heap, one instance per view.
//!
//! The heap stores [`SlotId`]s; each client record carries its position in
//! every heap (`heap_pos`), so a key change anywhere in the heap can be
//! repaired in `O(log n)` without searching. Keys live in the records
//! themselves (front-request tags), which is why every operation takes the
//! backing store.

use crate::client::{ClientStore, SlotId};
use crate::index::{precedes, View};

/// A min-heap of client records under one view's ordering.
pub(crate) struct TagHeap {
    view: View,
    items: Vec<SlotId>,
}

impl TagHeap {
    pub(crate) const fn new(view: View) -> Self {
        Self {
            view,
            items: Vec::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// The minimum record, `O(1)`.
    pub(crate) fn top(&self) -> Option<SlotId> {
        self.items.first().copied()
    }

    pub(crate) fn push<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        let pos = self.items.len();
        self.items.push(slot);
        store.get_mut(slot).heap_pos[self.view.as_usize()] = pos;
        self.sift_up(pos, store);
    }

    pub(crate) fn remove<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        let pos = store.get(slot).heap_pos[self.view.as_usize()];
        debug_assert_eq!(self.items[pos], slot, "intrusive heap position out of sync");
        let last = self.items.len() - 1;
        self.items.swap(pos, last);
        self.items.pop();
        if pos < self.items.len() {
            store.get_mut(self.items[pos]).heap_pos[self.view.as_usize()] = pos;
            let pos = self.sift_up(pos, store);
            self.sift_down(pos, store);
        }
    }

    /// Repairs the heap after `slot`'s key decreased.
    pub(crate) fn promote<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        let pos = store.get(slot).heap_pos[self.view.as_usize()];
        self.sift_up(pos, store);
    }

    /// Repairs the heap after `slot`'s key increased.
    pub(crate) fn demote<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        let pos = store.get(slot).heap_pos[self.view.as_usize()];
        self.sift_down(pos, store);
    }

    /// Repairs the heap after `slot`'s key moved an unknown direction.
    pub(crate) fn adjust<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        let pos = store.get(slot).heap_pos[self.view.as_usize()];
        let pos = self.sift_up(pos, store);
        self.sift_down(pos, store);
    }

    fn precedes_at<C, R>(&self, i: usize, j: usize, store: &ClientStore<C, R>) -> bool {
        precedes(self.view, store.get(self.items[i]), store.get(self.items[j]))
    }

    fn swap_entries<C, R>(&mut self, i: usize, j: usize, store: &mut ClientStore<C, R>) {
        self.items.swap(i, j);
        store.get_mut(self.items[i]).heap_pos[self.view.as_usize()] = i;
        store.get_mut(self.items[j]).heap_pos[self.view.as_usize()] = j;
    }

    fn sift_up<C, R>(&mut self, mut pos: usize, store: &mut ClientStore<C, R>) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.precedes_at(pos, parent, store) {
                self.swap_entries(pos, parent, store);
                pos = parent;
            } else {
                break;
            }
        }
        pos
    }

    fn sift_down<C, R>(&mut self, mut pos: usize, store: &mut ClientStore<C, R>) {
        loop {
            let left = 2 * pos + 1;
            if left >= self.items.len() {
                return;
            }
            let right = left + 1;
            let mut child = left;
            if right < self.items.len() && self.precedes_at(right, left, store) {
                child = right;
            }
            if self.precedes_at(child, pos, store) {
                self.swap_entries(child, pos, store);
                pos = child;
            } else {
                return;
            }
        }
    }
}
