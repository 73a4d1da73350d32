//! Client records and their backing arena.
//!
//! Each live client owns a FIFO of tagged requests plus the bookkeeping the
//! engine needs: the previous tag (seed for the next one), the idle flag,
//! the proportion-drift correction, and the aging tick. Records live in a
//! slot arena; the client map and the selection views both refer to a record
//! by its [`SlotId`], which stays stable for the record's whole lifetime.

use std::collections::VecDeque;

use crate::index::VIEW_COUNT;
use crate::profile::ClientProfile;
use crate::tag::RequestTag;

/// Monotonic enqueue counter, used by the cleaner for age comparisons.
pub(crate) type Tick = u64;

/// Stable handle to a client record in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(usize);

/// One pending request: its tag, the submitting client, and the owned
/// payload (moved out on dispatch).
pub(crate) struct ClientReq<C, R> {
    pub(crate) tag: RequestTag,
    pub(crate) client: C,
    pub(crate) request: R,
}

/// Per-client scheduler state.
pub(crate) struct ClientRec<C, R> {
    pub(crate) client: C,
    pub(crate) profile: ClientProfile,

    /// The tag of the most recently enqueued request; seed for the next.
    pub(crate) prev_tag: RequestTag,

    /// Pending requests in submission order.
    pub(crate) requests: VecDeque<ClientReq<C, R>>,

    /// Correction added to the proportion tag when ordering by proportion.
    /// Set on idle reactivation so the client rejoins at the front-runners'
    /// virtual time instead of its own stale one.
    pub(crate) prop_delta: f64,

    /// True at creation and after long quiescence.
    pub(crate) idle: bool,

    /// Tick of the client's most recent enqueue.
    pub(crate) last_tick: Tick,

    /// Position of this record within each view's heap.
    pub(crate) heap_pos: [usize; VIEW_COUNT],

    /// Position of this record within the flat index.
    pub(crate) vec_pos: usize,
}

impl<C, R> ClientRec<C, R> {
    pub(crate) fn new(client: C, profile: ClientProfile, tick: Tick) -> Self {
        Self {
            client,
            profile,
            prev_tag: RequestTag::zero(),
            requests: VecDeque::new(),
            prop_delta: 0.0,
            idle: true,
            last_tick: tick,
            heap_pos: [0; VIEW_COUNT],
            vec_pos: 0,
        }
    }

    pub(crate) fn has_request(&self) -> bool {
        !self.requests.is_empty()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// The request next in line for this client, if any.
    pub(crate) fn next_request(&self) -> Option<&ClientReq<C, R>> {
        self.requests.front()
    }

    pub(crate) fn push_request(&mut self, req: ClientReq<C, R>) {
        self.requests.push_back(req);
    }

    pub(crate) fn pop_request(&mut self) -> Option<ClientReq<C, R>> {
        self.requests.pop_front()
    }

    /// Marks the front request within-limit. The flag is one-way.
    pub(crate) fn mark_front_ready(&mut self) {
        if let Some(front) = self.requests.front_mut() {
            front.tag.ready = true;
        }
    }

    /// Removes matching requests in submission order, collecting payloads
    /// into `out`. Returns whether anything was removed.
    pub(crate) fn remove_matching<F>(&mut self, filter: &mut F, out: &mut Vec<R>) -> bool
    where
        F: FnMut(&R) -> bool,
    {
        let mut any_removed = false;
        let mut i = 0;
        while i < self.requests.len() {
            if filter(&self.requests[i].request) {
                if let Some(req) = self.requests.remove(i) {
                    out.push(req.request);
                    any_removed = true;
                }
            } else {
                i += 1;
            }
        }
        any_removed
    }

    /// As [`remove_matching`](Self::remove_matching), visiting the queue
    /// most-recent-first. Lets a caller expecting matches near the tail
    /// (e.g. cancelling just-submitted work) bound its scan.
    pub(crate) fn remove_matching_backwards<F>(&mut self, filter: &mut F, out: &mut Vec<R>) -> bool
    where
        F: FnMut(&R) -> bool,
    {
        let mut any_removed = false;
        let mut i = self.requests.len();
        while i > 0 {
            i -= 1;
            if filter(&self.requests[i].request) {
                if let Some(req) = self.requests.remove(i) {
                    out.push(req.request);
                    any_removed = true;
                }
            }
        }
        any_removed
    }
}

/// Slot arena owning every live client record.
///
/// Slots are reused after removal, but a [`SlotId`] handed out for a record
/// is never re-targeted while that record lives, which is what lets the
/// client map and the selection views share records without shared
/// ownership.
pub(crate) struct ClientStore<C, R> {
    slots: Vec<Option<ClientRec<C, R>>>,
    free: Vec<usize>,
}

impl<C, R> ClientStore<C, R> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn insert(&mut self, rec: ClientRec<C, R>) -> SlotId {
        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(rec);
            SlotId(index)
        } else {
            self.slots.push(Some(rec));
            SlotId(self.slots.len() - 1)
        }
    }

    pub(crate) fn remove(&mut self, slot: SlotId) -> ClientRec<C, R> {
        let rec = self.slots[slot.0].take().expect("removing a vacant client slot");
        self.free.push(slot.0);
        rec
    }

    pub(crate) fn get(&self, slot: SlotId) -> &ClientRec<C, R> {
        self.slots[slot.0].as_ref().expect("reading a vacant client slot")
    }

    pub(crate) fn get_mut(&mut self, slot: SlotId) -> &mut ClientRec<C, R> {
        self.slots[slot.0].as_mut().expect("reading a vacant client slot")
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (SlotId, &ClientRec<C, R>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|rec| (SlotId(i), rec)))
    }
}
