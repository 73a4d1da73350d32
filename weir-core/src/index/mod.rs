//! Indexed selection over client records.
//!
//! The engine needs, at every decision point, the minimum client under three
//! different orderings: by reservation tag, by effective proportion tag
//! (ready view), and by limit tag. Two interchangeable structures provide
//! those minima behind one façade, chosen once at construction:
//!
//! - [`heap::TagHeap`], one indexed binary heap per view: every mutation is
//!   `O(log n)`, `top` is `O(1)`.
//! - [`flat::FlatIndex`], one vector with three minimum cursors: push is
//!   `O(1)`, any mutation that may move a minimum re-scans in `O(n)`. The
//!   constant factors beat the heaps while the client count stays small.

pub(crate) mod flat;
pub(crate) mod heap;

use crate::client::{ClientRec, ClientStore, SlotId};

use self::flat::FlatIndex;
use self::heap::TagHeap;

/// Number of orderings maintained.
pub(crate) const VIEW_COUNT: usize = 3;

/// One of the three orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum View {
    /// Minimum reservation tag.
    Reservation = 0,
    /// Minimum effective proportion tag (`proportion + prop_delta`), with
    /// ready requests sorting ahead of not-ready ones.
    Ready = 1,
    /// Minimum limit tag, with ready requests sorting behind not-ready ones
    /// (a ready request has left the limit view's concern).
    Limit = 2,
}

impl View {
    pub(crate) const fn as_usize(self) -> usize {
        self as usize
    }
}

/// Whether `a` must be selected before `b` under `view`.
///
/// A client with no pending request sorts after any client with one, so the
/// top of a non-empty structure is guaranteed to be a client with work
/// whenever any client has work. Equal keys (and two empty clients) compare
/// false, keeping the structures stable.
pub(crate) fn precedes<C, R>(view: View, a: &ClientRec<C, R>, b: &ClientRec<C, R>) -> bool {
    let (Some(fa), Some(fb)) = (a.next_request(), b.next_request()) else {
        return a.has_request();
    };
    let (ta, tb) = (&fa.tag, &fb.tag);
    match view {
        View::Reservation => ta.reservation < tb.reservation,
        View::Ready => {
            if ta.ready == tb.ready {
                (ta.proportion + a.prop_delta) < (tb.proportion + b.prop_delta)
            } else {
                ta.ready
            }
        }
        View::Limit => {
            if ta.ready == tb.ready {
                ta.limit < tb.limit
            } else {
                tb.ready
            }
        }
    }
}

/// The selection structure façade.
///
/// Operations take the backing [`ClientStore`] explicitly: the structures
/// hold only [`SlotId`]s plus intrusive positions inside the records.
pub(crate) enum ClientIndex {
    /// One indexed binary heap per view.
    Heaps {
        resv: TagHeap,
        ready: TagHeap,
        limit: TagHeap,
    },
    /// One flat vector with a minimum cursor per view.
    Flat(FlatIndex),
}

impl ClientIndex {
    pub(crate) fn new(use_heap: bool) -> Self {
        if use_heap {
            Self::Heaps {
                resv: TagHeap::new(View::Reservation),
                ready: TagHeap::new(View::Ready),
                limit: TagHeap::new(View::Limit),
            }
        } else {
            Self::Flat(FlatIndex::new())
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::Heaps { resv, .. } => resv.is_empty(),
            Self::Flat(vec) => vec.is_empty(),
        }
    }

    /// Registers a new client record in every view.
    pub(crate) fn push<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        match self {
            Self::Heaps { resv, ready, limit } => {
                resv.push(slot, store);
                ready.push(slot, store);
                limit.push(slot, store);
            }
            Self::Flat(vec) => vec.push(slot, store),
        }
    }

    /// Removes a client record from every view.
    pub(crate) fn remove<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        match self {
            Self::Heaps { resv, ready, limit } => {
                resv.remove(slot, store);
                ready.remove(slot, store);
                limit.remove(slot, store);
            }
            Self::Flat(vec) => vec.remove(slot, store),
        }
    }

    /// The minimum client under `view`, or `None` when no clients exist.
    pub(crate) fn top(&self, view: View) -> Option<SlotId> {
        match self {
            Self::Heaps { resv, ready, limit } => match view {
                View::Reservation => resv.top(),
                View::Ready => ready.top(),
                View::Limit => limit.top(),
            },
            Self::Flat(vec) => vec.top(view),
        }
    }

    /// Re-establishes ordering for a client whose key may have moved either
    /// way (fresh enqueue, bulk removal).
    pub(crate) fn adjust<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        match self {
            Self::Heaps { resv, ready, limit } => {
                resv.adjust(slot, store);
                ready.adjust(slot, store);
                limit.adjust(slot, store);
            }
            Self::Flat(vec) => vec.refresh_all(store),
        }
    }

    /// Re-establishes ordering after the client's front request was popped.
    ///
    /// The reservation and ready keys can only have grown. The limit key is
    /// the exception: a popped front that had been promoted to ready leaves
    /// a not-yet-ready successor, and not-ready fronts precede ready ones in
    /// the limit ordering, so the client may rise there.
    pub(crate) fn demote<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        match self {
            Self::Heaps { resv, ready, limit } => {
                resv.demote(slot, store);
                ready.demote(slot, store);
                limit.adjust(slot, store);
            }
            Self::Flat(vec) => vec.refresh_all(store),
        }
    }

    /// Re-indexes a client whose front request just became ready: it rises
    /// in the ready view and sinks in the limit view.
    pub(crate) fn promote_ready<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        match self {
            Self::Heaps { ready, limit, .. } => {
                ready.promote(slot, store);
                limit.demote(slot, store);
            }
            Self::Flat(vec) => {
                vec.refresh_view(View::Ready, store);
                vec.refresh_view(View::Limit, store);
            }
        }
    }

    /// Re-indexes a client whose reservation tags were just reduced.
    pub(crate) fn promote_reservation<C, R>(&mut self, slot: SlotId, store: &mut ClientStore<C, R>) {
        match self {
            Self::Heaps { resv, .. } => resv.promote(slot, store),
            Self::Flat(vec) => vec.refresh_view(View::Reservation, store),
        }
    }
}
